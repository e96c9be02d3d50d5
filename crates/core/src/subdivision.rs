//! Delaunay subdivision over a quad-edge graph.
//!
//! A [`Subdivision`] starts as a single frame triangle that encloses every point it will
//! ever hold, then grows by incremental site insertion (Guibas–Stolfi, with the locate
//! walk of Lischinski). Constraint edges are forced in afterwards; see
//! [`Subdivision::insert_constraint`].
//!
//! # Vertex index
//!
//! Every vertex maps (by its exact coordinate bits) to one outgoing edge. Every mutation
//! keeps the map current so constraint end points resolve in O(1). A site that merges
//! into an existing vertex within tolerance leaves an alias entry behind.
//!
//! # Frame
//!
//! The three frame vertices are synthetic. Triangles touching them are excluded from
//! [`Subdivision::triangles`] unless asked for, and the three hull edges are never
//! deleted.

use std::collections::{HashMap, HashSet};

use geo::{Coord, Line};

use crate::cancel::CancellationToken;
use crate::extent::Extent;
use crate::primitives::{
    centroid, in_circle, is_ccw, lowest_point_index, normalize_zero, on_edge, orient,
    point_cmp, point_equal, right_of, round_point, segment_intersect,
};
use crate::quadedge::{EdgeId, QuadEdgeGraph};
use crate::{Error, RepairConfig, Result};

/// Payload value marking a constraint edge.
pub(crate) const CONSTRAINT: u32 = 1;

/// Lower bound on the locate walk before it falls back to a full scan.
const MIN_LOCATE_STEPS: usize = 16;

/// Exact bit pattern of a coordinate, with `-0.0` folded into `0.0`.
pub(crate) type VertexKey = (u64, u64);

pub(crate) fn vertex_key(pt: Coord<f64>) -> VertexKey {
    let pt = normalize_zero(pt);
    (pt.x.to_bits(), pt.y.to_bits())
}

fn constraint_key(a: Coord<f64>, b: Coord<f64>) -> (VertexKey, VertexKey) {
    if point_cmp(a, b).is_le() {
        (vertex_key(a), vertex_key(b))
    } else {
        (vertex_key(b), vertex_key(a))
    }
}

// ============================================================================
// Triangle
// ============================================================================

/// Three vertices of a face. Not stored in the graph; produced on demand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle(pub [Coord<f64>; 3]);

impl Triangle {
    pub fn new(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> Self {
        Triangle([a, b, c])
    }

    pub fn points(&self) -> [Coord<f64>; 3] {
        self.0
    }

    pub fn centroid(&self) -> Coord<f64> {
        centroid(self.0[0], self.0[1], self.0[2])
    }

    /// Counter-clockwise in y-up coordinates.
    pub fn is_ccw(&self) -> bool {
        is_ccw(self.0[0], self.0[1], self.0[2])
    }

    /// The vertex that is neither `a` nor `b`, if both are vertices of this triangle.
    pub fn third_point(&self, a: Coord<f64>, b: Coord<f64>) -> Option<Coord<f64>> {
        let has = |p: Coord<f64>| self.0.iter().any(|v| point_equal(*v, p));
        if !has(a) || !has(b) {
            return None;
        }
        self.0
            .iter()
            .copied()
            .find(|v| !point_equal(*v, a) && !point_equal(*v, b))
    }

    pub fn edges(&self) -> [Line<f64>; 3] {
        let [a, b, c] = self.0;
        [Line::new(a, b), Line::new(b, c), Line::new(c, a)]
    }

    /// Counter-clockwise, starting at the lexicographically smallest vertex.
    pub fn normalized(self) -> Self {
        let mut pts = self.0;
        if orient(pts[0], pts[1], pts[2]) < 0.0 {
            pts.swap(1, 2);
        }
        let idx = lowest_point_index(&pts);
        pts.rotate_left(idx);
        Triangle(pts)
    }
}

// ============================================================================
// Subdivision
// ============================================================================

/// Triangulation of a point set inside a synthetic frame triangle.
#[derive(Debug, Clone)]
pub struct Subdivision {
    pub(crate) graph: QuadEdgeGraph,
    pub(crate) starting_edge: EdgeId,
    pub(crate) frame: [Coord<f64>; 3],
    pub(crate) vertices: HashMap<VertexKey, EdgeId>,
    pub(crate) aliases: HashMap<VertexKey, Coord<f64>>,
    pub(crate) constraints: HashSet<(VertexKey, VertexKey)>,
    pub(crate) ptcount: usize,
    pub(crate) validate_mutations: bool,
}

/// Frame triangle enclosing `extent`, grown by `buffer` and rounded.
///
/// The vertices come back counter-clockwise: bottom-left, bottom-right, top.
pub fn frame_for_extent(extent: &Extent, buffer: f64) -> [Coord<f64>; 3] {
    let xlen = extent.width();
    let ylen = extent.height();

    let nx = extent.min_x - (xlen / 2.0) * buffer - buffer;
    let cx = extent.min_x + xlen / 2.0;
    let xx = extent.max_x + (xlen / 2.0) * buffer + buffer;

    let ny = extent.min_y - ylen * buffer - buffer;
    let xy = extent.max_y + 2.0 * ylen * buffer + buffer;

    [
        round_point(Coord { x: nx, y: ny }),
        round_point(Coord { x: xx, y: ny }),
        round_point(Coord { x: cx, y: xy }),
    ]
}

impl Subdivision {
    /// A subdivision holding only the frame triangle `abc`.
    ///
    /// A clockwise frame is reordered to counter-clockwise.
    pub fn new(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> Self {
        let (a, b, c) = (normalize_zero(a), normalize_zero(b), normalize_zero(c));
        let (b, c) = if orient(a, b, c) < 0.0 { (c, b) } else { (b, c) };

        let mut graph = QuadEdgeGraph::new();
        let ea = graph.make_edge(a, b);
        let eb = graph.make_edge(b, c);
        graph.splice(ea.sym(), eb);
        let ec = graph.make_edge(c, a);
        graph.splice(eb.sym(), ec);
        graph.splice(ec.sym(), ea);

        let mut vertices = HashMap::new();
        vertices.insert(vertex_key(a), ea);
        vertices.insert(vertex_key(b), eb);
        vertices.insert(vertex_key(c), ec);

        Self {
            graph,
            starting_edge: ea,
            frame: [a, b, c],
            vertices,
            aliases: HashMap::new(),
            constraints: HashSet::new(),
            ptcount: 3,
            validate_mutations: false,
        }
    }

    /// Delaunay triangulation of `points` inside a frame grown from their extent.
    ///
    /// Exact duplicates are dropped up front; near duplicates merge during insertion.
    pub fn new_for_points(
        cancel: &CancellationToken,
        points: &[Coord<f64>],
        config: &RepairConfig,
    ) -> Result<Self> {
        let mut extent = Extent::from_points(points.iter().copied());
        if !extent.is_valid() {
            extent = Extent::new(0.0, 0.0, 0.0, 0.0);
        }
        let [a, b, c] = frame_for_extent(&extent, config.frame_buffer);
        let mut sd = Subdivision::new(a, b, c);
        sd.validate_mutations = config.validate_mutations;

        let mut pts: Vec<Coord<f64>> = points.iter().map(|p| normalize_zero(*p)).collect();
        pts.sort_by(|a, b| point_cmp(*a, *b));
        pts.dedup();

        for pt in pts {
            cancel.check()?;
            sd.insert_site(pt)?;
        }
        log::debug!(
            "triangulated {} points into {} edges",
            sd.ptcount - 3,
            sd.graph.edge_count()
        );
        Ok(sd)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn graph(&self) -> &QuadEdgeGraph {
        &self.graph
    }

    pub fn starting_edge(&self) -> EdgeId {
        self.starting_edge
    }

    pub fn frame(&self) -> [Coord<f64>; 3] {
        self.frame
    }

    /// Number of vertices, frame included.
    pub fn vertex_count(&self) -> usize {
        self.ptcount
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_frame_point(&self, pt: Coord<f64>) -> bool {
        self.frame.iter().any(|f| point_equal(*f, pt))
    }

    pub fn is_frame_edge(&self, e: EdgeId) -> bool {
        self.is_frame_point(self.graph.orig(e)) && self.is_frame_point(self.graph.dest(e))
    }

    pub fn is_constraint(&self, e: EdgeId) -> bool {
        self.graph.data(e) == Some(CONSTRAINT)
    }

    /// An edge leaving `pt`, resolving aliases of merged sites.
    pub fn vertex_edge(&self, pt: Coord<f64>) -> Option<EdgeId> {
        let key = vertex_key(pt);
        if let Some(e) = self.vertices.get(&key) {
            return Some(*e);
        }
        let real = self.aliases.get(&key)?;
        self.vertices.get(&vertex_key(*real)).copied()
    }

    /// The directed edge `a → b`, if present.
    pub fn find_edge(&self, a: Coord<f64>, b: Coord<f64>) -> Option<EdgeId> {
        let e = self.vertex_edge(a)?;
        self.graph.find_onext_dest(e, b)
    }

    // ------------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------------

    /// Every counter-clockwise face, once each, starting at its lowest vertex.
    ///
    /// Faces touching a frame vertex are skipped unless `include_frame` is set.
    pub fn triangles(&self, include_frame: bool) -> Vec<Triangle> {
        let mut out = Vec::new();
        for e in self.graph.edges() {
            for d in [e, e.sym()] {
                let b = self.graph.lnext(d);
                let c = self.graph.lnext(b);
                if self.graph.lnext(c) != d || d > b || d > c {
                    continue;
                }
                let pts = [self.graph.orig(d), self.graph.orig(b), self.graph.orig(c)];
                if !is_ccw(pts[0], pts[1], pts[2]) {
                    continue;
                }
                if !include_frame && pts.iter().any(|p| self.is_frame_point(*p)) {
                    continue;
                }
                out.push(Triangle(pts).normalized());
            }
        }
        out
    }

    /// Every undirected edge.
    pub fn edges(&self, include_frame: bool) -> Vec<Line<f64>> {
        self.graph
            .edges()
            .map(|e| Line::new(self.graph.orig(e), self.graph.dest(e)))
            .filter(|l| {
                include_frame || !(self.is_frame_point(l.start) || self.is_frame_point(l.end))
            })
            .collect()
    }

    /// Every vertex, sorted lexicographically.
    pub fn points(&self, include_frame: bool) -> Vec<Coord<f64>> {
        let mut pts: Vec<Coord<f64>> = self
            .vertices
            .values()
            .map(|e| self.graph.orig(*e))
            .filter(|p| include_frame || !self.is_frame_point(*p))
            .collect();
        pts.sort_by(|a, b| point_cmp(*a, *b));
        pts
    }

    // ------------------------------------------------------------------------
    // Locate
    // ------------------------------------------------------------------------

    /// An edge whose left face contains `x` (boundary included).
    pub fn locate(&self, x: Coord<f64>) -> Result<EdgeId> {
        let g = &self.graph;
        let cap = (self.ptcount * 2).max(MIN_LOCATE_STEPS);
        let mut e = self.starting_edge;
        for _ in 0..cap {
            let (org, dest) = (g.orig(e), g.dest(e));
            if point_equal(x, org) || point_equal(x, dest) {
                return Ok(e);
            }
            if right_of(x, org, dest) {
                e = e.sym();
                continue;
            }
            let onext = g.onext(e);
            if !right_of(x, g.orig(onext), g.dest(onext)) {
                e = onext;
                continue;
            }
            let dprev = g.dprev(e);
            if !right_of(x, g.orig(dprev), g.dest(dprev)) {
                e = dprev;
                continue;
            }
            return Ok(e);
        }
        log::debug!("locate walk for {:?} exceeded {} steps, scanning faces", x, cap);
        self.locate_exhaustive(x)
    }

    fn locate_exhaustive(&self, x: Coord<f64>) -> Result<EdgeId> {
        let g = &self.graph;
        for e in g.edges() {
            for d in [e, e.sym()] {
                let b = g.lnext(d);
                let c = g.lnext(b);
                if g.lnext(c) != d || !is_ccw(g.orig(d), g.orig(b), g.orig(c)) {
                    continue;
                }
                if [d, b, c]
                    .iter()
                    .all(|s| !right_of(x, g.orig(*s), g.dest(*s)))
                {
                    return Ok(d);
                }
            }
        }
        Err(Error::LocateFailed(x))
    }

    // ------------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------------

    /// Add a site, keeping the triangulation Delaunay (constraint edges excepted).
    ///
    /// # Returns
    ///
    /// `true` if a new vertex was created, `false` if `x` merged into an existing one.
    pub fn insert_site(&mut self, x: Coord<f64>) -> Result<bool> {
        let x = normalize_zero(x);
        let e = self.locate(x)?;
        let (g, key) = (&self.graph, vertex_key(x));

        let corners = [g.orig(e), g.dest(e), g.dest(g.lnext(e))];
        if let Some(existing) = corners.iter().find(|p| point_equal(**p, x)) {
            if !self.vertices.contains_key(&key) {
                self.aliases.insert(key, *existing);
            }
            return Ok(false);
        }

        let sides = [e, g.lnext(e), g.lprev(e)];
        let on = sides
            .iter()
            .copied()
            .find(|s| on_edge(x, g.orig(*s), g.dest(*s)));
        match on {
            Some(s) if self.is_constraint(s) => self.split_edge(s, x)?,
            Some(s) => self.fan_insert(x, s, true, None)?,
            None => self.fan_insert(x, e, false, None)?,
        }
        Ok(true)
    }

    /// Split edge `e` at `x`, keeping constraint status on both halves.
    pub fn split_edge(&mut self, e: EdgeId, x: Coord<f64>) -> Result<()> {
        let x = normalize_zero(x);
        if self.is_frame_edge(e) {
            return Err(Error::InvariantViolation(format!(
                "cannot split frame edge at {:?}",
                x
            )));
        }
        let (p, q) = (self.graph.orig(e), self.graph.dest(e));
        if point_equal(x, p) || point_equal(x, q) {
            return Ok(());
        }
        let halves = if self.is_constraint(e) {
            self.constraints.remove(&constraint_key(p, q));
            Some((p, q))
        } else {
            None
        };
        log::trace!("splitting edge {:?} -> {:?} at {:?}", p, q, x);
        self.fan_insert(x, e, true, halves)
    }

    /// Connect `x` to the face left of `e` (or to the quadrilateral around `e` when
    /// `delete` is set), then restore the Delaunay property around `x`.
    fn fan_insert(
        &mut self,
        x: Coord<f64>,
        e: EdgeId,
        delete: bool,
        halves: Option<(Coord<f64>, Coord<f64>)>,
    ) -> Result<()> {
        let mut e = e;
        if delete {
            if self.is_frame_edge(e) {
                return Err(Error::InvariantViolation(format!(
                    "site {:?} lies on the frame",
                    x
                )));
            }
            let doomed = e;
            e = self.graph.oprev(doomed);
            self.delete_edge(doomed);
        }

        let org = self.graph.orig(e);
        let mut base = self.graph.make_edge(org, x);
        self.graph.splice(base, e);
        let starting = base;
        self.starting_edge = base;
        self.vertices.insert(vertex_key(x), base.sym());
        self.aliases.remove(&vertex_key(x));
        self.ptcount += 1;

        let guard = self.graph.edge_count() + 3;
        let mut steps = 0;
        loop {
            base = self.graph.connect(e, base.sym());
            e = self.graph.oprev(base);
            if self.graph.lnext(e) == starting {
                break;
            }
            steps += 1;
            if steps > guard {
                return Err(Error::InvariantViolation(format!(
                    "fan around {:?} did not close",
                    x
                )));
            }
        }

        if let Some((p, q)) = halves {
            for end in [p, q] {
                let half = self.graph.find_onext_dest(base.sym(), end).ok_or_else(|| {
                    Error::InvariantViolation(format!("split half {:?} -> {:?} missing", x, end))
                })?;
                self.mark_constraint(half);
            }
        }

        let guard = 8 * (self.graph.edge_count() + 3);
        let mut steps = 0;
        loop {
            steps += 1;
            if steps > guard {
                return Err(Error::InvariantViolation(format!(
                    "Delaunay repair around {:?} did not terminate",
                    x
                )));
            }
            let t = self.graph.oprev(e);
            let (e_org, e_dest, t_dest) =
                (self.graph.orig(e), self.graph.dest(e), self.graph.dest(t));
            if right_of(t_dest, e_org, e_dest)
                && in_circle(e_org, t_dest, e_dest, x)
                && !self.is_constraint(e)
            {
                self.swap_edge(e);
                e = self.graph.oprev(e);
            } else if self.graph.onext(e) == starting {
                break;
            } else {
                e = self.graph.lprev(self.graph.onext(e));
            }
        }

        log::trace!("inserted site {:?}", x);
        if self.validate_mutations {
            self.validate()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Indexed mutation
    // ------------------------------------------------------------------------

    fn unindex(&mut self, d: EdgeId) {
        let key = vertex_key(self.graph.orig(d));
        if self.vertices.get(&key) == Some(&d) {
            let next = self.graph.onext(d);
            if next != d {
                self.vertices.insert(key, next);
            } else {
                self.vertices.remove(&key);
            }
        }
    }

    fn index(&mut self, d: EdgeId) {
        let key = vertex_key(self.graph.orig(d));
        self.vertices.entry(key).or_insert(d);
    }

    pub(crate) fn swap_edge(&mut self, e: EdgeId) {
        self.unindex(e);
        self.unindex(e.sym());
        self.graph.swap(e);
        self.index(e);
        self.index(e.sym());
    }

    pub(crate) fn delete_edge(&mut self, e: EdgeId) {
        self.unindex(e);
        self.unindex(e.sym());
        if self.is_constraint(e) {
            let key = constraint_key(self.graph.orig(e), self.graph.dest(e));
            self.constraints.remove(&key);
        }
        self.graph.delete(e);
        if !self.graph.is_live(self.starting_edge) {
            if let Some(live) = self.graph.edges().next() {
                self.starting_edge = live;
            }
        }
    }

    pub(crate) fn mark_constraint(&mut self, e: EdgeId) {
        self.graph.set_data(e, Some(CONSTRAINT));
        self.graph.set_data(e.sym(), Some(CONSTRAINT));
        let key = constraint_key(self.graph.orig(e), self.graph.dest(e));
        self.constraints.insert(key);
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Walk the whole graph and re-check its invariants.
    ///
    /// Checks the bundle algebra of every edge, that every face is a triangle, that only
    /// the outer face is clockwise, that no two edges cross, and that the vertex index
    /// points at live edges leaving the right vertex.
    pub fn validate(&self) -> Result<()> {
        let g = &self.graph;
        let violation = |msg: String| Error::InvariantViolation(msg);

        let mut outer_faces = 0;
        for e in g.edges() {
            g.validate_bundle(e).map_err(violation)?;
            for d in [e, e.sym()] {
                let b = g.lnext(d);
                let c = g.lnext(b);
                if g.lnext(c) != d {
                    return Err(violation(format!(
                        "face left of {:?} -> {:?} is not a triangle",
                        g.orig(d),
                        g.dest(d)
                    )));
                }
                if d > b || d > c {
                    continue;
                }
                let o = orient(g.orig(d), g.orig(b), g.orig(c));
                if o == 0.0 {
                    return Err(violation(format!(
                        "degenerate face at {:?}, {:?}, {:?}",
                        g.orig(d),
                        g.orig(b),
                        g.orig(c)
                    )));
                }
                if o < 0.0 {
                    outer_faces += 1;
                }
            }
        }
        if outer_faces != 1 {
            return Err(violation(format!(
                "expected one clockwise outer face, found {}",
                outer_faces
            )));
        }

        let lines: Vec<Line<f64>> = g
            .edges()
            .map(|e| Line::new(g.orig(e), g.dest(e)))
            .collect();
        for (i, a) in lines.iter().enumerate() {
            for b in &lines[i + 1..] {
                if let Some(pt) = segment_intersect(*a, *b) {
                    let is_end = |l: &Line<f64>| point_equal(pt, l.start) || point_equal(pt, l.end);
                    if !(is_end(a) && is_end(b)) {
                        return Err(violation(format!(
                            "edges {:?} and {:?} cross at {:?}",
                            a, b, pt
                        )));
                    }
                }
            }
        }

        for (key, e) in &self.vertices {
            if !g.is_live(*e) || vertex_key(g.orig(*e)) != *key {
                return Err(violation(format!("stale vertex index entry {:?}", e)));
            }
        }
        Ok(())
    }
}
