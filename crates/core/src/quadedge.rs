//! Quad-edge graph.
//!
//! Each undirected edge is a bundle of four directed edges: the primal edge `e`, its
//! reverse `e.sym()`, and the two dual edges `e.rot()` / `e.inv_rot()` that cross it
//! and reach the left and right faces.
//!
//! Bundles live in an arena and are addressed by [`EdgeId`] handles. `rot` and `sym`
//! are computed from the handle's low two bits; only the `onext` ring pointer is
//! stored. Deleting an edge marks its bundle free and pushes it on a free list, so
//! stale handles never alias freed memory.
//!
//! All topology changes go through [`QuadEdgeGraph::splice`]; `connect`, `swap` and
//! `delete` are built on it.

use geo::Coord;

use crate::primitives::{cross, point_equal};

/// Handle to one directed edge: `bundle << 2 | rotation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(u32);

impl EdgeId {
    fn new(bundle: usize, rotation: u32) -> Self {
        EdgeId(((bundle as u32) << 2) | (rotation & 3))
    }

    pub fn bundle(self) -> usize {
        (self.0 >> 2) as usize
    }

    pub fn rotation(self) -> u32 {
        self.0 & 3
    }

    /// The dual edge, rotated 90° counter-clockwise.
    pub fn rot(self) -> EdgeId {
        EdgeId((self.0 & !3) | ((self.0 + 1) & 3))
    }

    /// The same edge, reversed.
    pub fn sym(self) -> EdgeId {
        EdgeId((self.0 & !3) | ((self.0 + 2) & 3))
    }

    /// The dual edge, rotated 90° clockwise.
    pub fn inv_rot(self) -> EdgeId {
        EdgeId((self.0 & !3) | ((self.0 + 3) & 3))
    }

    /// Primal edges connect vertices; dual edges connect faces.
    pub fn is_primal(self) -> bool {
        self.rotation() & 1 == 0
    }

    /// The rotation-0 edge of the bundle.
    pub fn canonical(self) -> EdgeId {
        EdgeId(self.0 & !3)
    }
}

#[derive(Debug, Clone)]
struct Bundle {
    next: [EdgeId; 4],
    /// Origins of the rotation-0 and rotation-2 edges.
    origin: [Coord<f64>; 2],
    data: [Option<u32>; 4],
    live: bool,
}

/// Why [`QuadEdgeGraph::resolve_edge`] could not find a bracketing edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// The target is the origin vertex itself.
    SameAsOrigin,
    /// The target direction runs along this existing edge.
    Colinear(EdgeId),
    /// Two edges of the origin ring point in the same direction.
    CoincidentEdges,
    /// The ring was exhausted without a match.
    NotFound,
}

/// Outcome of testing one wedge `(a, onext(a))` of an origin ring against a target direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bracket {
    Found,
    Next,
    Colinear,
    Coincident,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Neg,
    Zero,
    Pos,
}

fn sign(v: f64) -> Sign {
    if v > 0.0 {
        Sign::Pos
    } else if v < 0.0 {
        Sign::Neg
    } else {
        Sign::Zero
    }
}

fn dot(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.x * b.x + a.y * b.y
}

/// Does direction `d` fall strictly inside the counter-clockwise wedge from `a` to `b`?
///
/// `a` and `b` are the directions of an edge and its `onext` (relative to their shared
/// origin); `single` means the origin has only this one edge. The decision table over
/// the signs of `a×b`, `a×d` and `d×b`:
///
/// | a×b | a×d | d×b | result                                   |
/// |-----|-----|-----|------------------------------------------|
/// |  *  |  0  |  *  | colinear with `a` when `d·a > 0`         |
/// |  +  |  +  |  +  | found (convex wedge)                     |
/// |  +  |  *  |  *  | next                                     |
/// |  -  | ≤0  | ≤0  | next (`d` lies in the convex complement) |
/// |  -  |  *  |  *  | found (reflex wedge)                     |
/// |  0  |  +  |  *  | found (half-plane wedge, `a·b < 0`)      |
/// |  0  |  *  |  *  | next, or coincident edges when `a·b > 0` |
fn bracket(a: Coord<f64>, b: Coord<f64>, d: Coord<f64>, single: bool) -> Bracket {
    let ad = sign(cross(a, d));
    if ad == Sign::Zero && dot(a, d) > 0.0 {
        return Bracket::Colinear;
    }
    if single {
        return Bracket::Found;
    }
    let ab = sign(cross(a, b));
    let db = sign(cross(d, b));
    match (ab, ad, db) {
        (Sign::Pos, Sign::Pos, Sign::Pos) => Bracket::Found,
        (Sign::Pos, _, _) => Bracket::Next,
        (Sign::Neg, Sign::Neg | Sign::Zero, Sign::Neg | Sign::Zero) => Bracket::Next,
        (Sign::Neg, _, _) => Bracket::Found,
        (Sign::Zero, _, _) if dot(a, b) > 0.0 => Bracket::Coincident,
        (Sign::Zero, Sign::Pos, _) => Bracket::Found,
        (Sign::Zero, _, _) => Bracket::Next,
    }
}

/// Arena of quad-edge bundles.
#[derive(Debug, Clone, Default)]
pub struct QuadEdgeGraph {
    bundles: Vec<Bundle>,
    free: Vec<usize>,
}

impl QuadEdgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an isolated edge `org → dest`.
    pub fn make_edge(&mut self, org: Coord<f64>, dest: Coord<f64>) -> EdgeId {
        let idx = match self.free.pop() {
            Some(idx) => idx,
            None => {
                self.bundles.push(Bundle {
                    next: [EdgeId(0); 4],
                    origin: [org, dest],
                    data: [None; 4],
                    live: false,
                });
                self.bundles.len() - 1
            }
        };
        let e = [
            EdgeId::new(idx, 0),
            EdgeId::new(idx, 1),
            EdgeId::new(idx, 2),
            EdgeId::new(idx, 3),
        ];
        self.bundles[idx] = Bundle {
            next: [e[0], e[3], e[2], e[1]],
            origin: [org, dest],
            data: [None; 4],
            live: true,
        };
        e[0]
    }

    /// Number of live bundles (undirected edges).
    pub fn edge_count(&self) -> usize {
        self.bundles.len() - self.free.len()
    }

    pub fn is_live(&self, e: EdgeId) -> bool {
        self.bundles.get(e.bundle()).map_or(false, |b| b.live)
    }

    /// Canonical primal handle of every live bundle.
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.bundles
            .iter()
            .enumerate()
            .filter(|(_, b)| b.live)
            .map(|(i, _)| EdgeId::new(i, 0))
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    /// Next edge counter-clockwise around the origin.
    pub fn onext(&self, e: EdgeId) -> EdgeId {
        self.bundles[e.bundle()].next[e.rotation() as usize]
    }

    /// Next edge clockwise around the origin.
    pub fn oprev(&self, e: EdgeId) -> EdgeId {
        self.onext(e.rot()).rot()
    }

    pub fn dnext(&self, e: EdgeId) -> EdgeId {
        self.onext(e.sym()).sym()
    }

    pub fn dprev(&self, e: EdgeId) -> EdgeId {
        self.onext(e.inv_rot()).inv_rot()
    }

    /// Next edge counter-clockwise around the left face.
    pub fn lnext(&self, e: EdgeId) -> EdgeId {
        self.onext(e.inv_rot()).rot()
    }

    pub fn lprev(&self, e: EdgeId) -> EdgeId {
        self.onext(e).sym()
    }

    pub fn rnext(&self, e: EdgeId) -> EdgeId {
        self.onext(e.rot()).inv_rot()
    }

    pub fn rprev(&self, e: EdgeId) -> EdgeId {
        self.onext(e.sym())
    }

    fn set_next(&mut self, e: EdgeId, next: EdgeId) {
        self.bundles[e.bundle()].next[e.rotation() as usize] = next;
    }

    // ------------------------------------------------------------------------
    // Vertices and payload
    // ------------------------------------------------------------------------

    /// Origin vertex of a primal edge.
    pub fn orig(&self, e: EdgeId) -> Coord<f64> {
        debug_assert!(e.is_primal());
        self.bundles[e.bundle()].origin[(e.rotation() >> 1) as usize]
    }

    /// Destination vertex of a primal edge.
    pub fn dest(&self, e: EdgeId) -> Coord<f64> {
        self.orig(e.sym())
    }

    pub fn set_end_points(&mut self, e: EdgeId, org: Coord<f64>, dest: Coord<f64>) {
        let slot = (e.rotation() >> 1) as usize;
        let origin = &mut self.bundles[e.bundle()].origin;
        origin[slot] = org;
        origin[1 - slot] = dest;
    }

    pub fn data(&self, e: EdgeId) -> Option<u32> {
        self.bundles[e.bundle()].data[e.rotation() as usize]
    }

    pub fn set_data(&mut self, e: EdgeId, data: Option<u32>) {
        self.bundles[e.bundle()].data[e.rotation() as usize] = data;
    }

    // ------------------------------------------------------------------------
    // Topology
    // ------------------------------------------------------------------------

    /// Merge or split the origin rings of `a` and `b`, and with them their left faces.
    pub fn splice(&mut self, a: EdgeId, b: EdgeId) {
        let alpha = self.onext(a).rot();
        let beta = self.onext(b).rot();

        let a_next = self.onext(a);
        let b_next = self.onext(b);
        let alpha_next = self.onext(alpha);
        let beta_next = self.onext(beta);

        self.set_next(a, b_next);
        self.set_next(b, a_next);
        self.set_next(alpha, beta_next);
        self.set_next(beta, alpha_next);
    }

    /// Add an edge from `a.dest` to `b.orig` so that `a`, the new edge and `b` share a
    /// left face.
    pub fn connect(&mut self, a: EdgeId, b: EdgeId) -> EdgeId {
        let e = self.make_edge(self.dest(a), self.orig(b));
        let a_lnext = self.lnext(a);
        self.splice(e, a_lnext);
        self.splice(e.sym(), b);
        e
    }

    /// Turn `e` to the other diagonal of the quadrilateral formed by its two faces.
    pub fn swap(&mut self, e: EdgeId) {
        let a = self.oprev(e);
        let b = self.oprev(e.sym());
        self.splice(e, a);
        self.splice(e.sym(), b);
        let a_lnext = self.lnext(a);
        self.splice(e, a_lnext);
        let b_lnext = self.lnext(b);
        self.splice(e.sym(), b_lnext);
        let (org, dest) = (self.dest(a), self.dest(b));
        self.set_end_points(e, org, dest);
    }

    /// Detach `e` from the graph and retire its bundle.
    pub fn delete(&mut self, e: EdgeId) {
        let e_oprev = self.oprev(e);
        self.splice(e, e_oprev);
        let sym = e.sym();
        let sym_oprev = self.oprev(sym);
        self.splice(sym, sym_oprev);

        let idx = e.bundle();
        self.bundles[idx].live = false;
        self.bundles[idx].data = [None; 4];
        self.free.push(idx);
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Edges sharing `e`'s origin, counter-clockwise starting at `e`.
    pub fn origin_ring(&self, e: EdgeId) -> Vec<EdgeId> {
        let mut ring = vec![e];
        let mut cur = self.onext(e);
        while cur != e && ring.len() <= self.bundles.len() * 2 {
            ring.push(cur);
            cur = self.onext(cur);
        }
        ring
    }

    /// Edge leaving `e`'s origin whose destination is `dest`.
    pub fn find_onext_dest(&self, e: EdgeId, dest: Coord<f64>) -> Option<EdgeId> {
        self.origin_ring(e)
            .into_iter()
            .find(|&cur| point_equal(self.dest(cur), dest))
    }

    /// Find the edge leaving `e`'s origin whose wedge `(edge, onext(edge))` contains the
    /// direction towards `target`.
    ///
    /// A target lying on an existing edge's ray reports [`ResolveError::Colinear`] with
    /// that edge rather than picking a side.
    pub fn resolve_edge(&self, e: EdgeId, target: Coord<f64>) -> Result<EdgeId, ResolveError> {
        let origin = self.orig(e);
        if point_equal(origin, target) {
            return Err(ResolveError::SameAsOrigin);
        }
        let d = target - origin;
        let ring = self.origin_ring(e);
        let single = ring.len() == 1;
        for &cur in &ring {
            let next = self.onext(cur);
            let a = self.dest(cur) - origin;
            let b = self.dest(next) - origin;
            match bracket(a, b, d, single) {
                Bracket::Found => return Ok(cur),
                Bracket::Colinear => return Err(ResolveError::Colinear(cur)),
                Bracket::Coincident => return Err(ResolveError::CoincidentEdges),
                Bracket::Next => {}
            }
        }
        Err(ResolveError::NotFound)
    }

    /// Check the ring invariants of every directed edge in `e`'s bundle.
    pub fn validate_bundle(&self, e: EdgeId) -> Result<(), String> {
        if !self.is_live(e) {
            return Err(format!("edge {:?} belongs to a retired bundle", e));
        }
        let base = e.canonical();
        for r in 0..4 {
            let cur = EdgeId::new(base.bundle(), r);
            if cur.rot().rot().rot().rot() != cur || cur.sym().sym() != cur {
                return Err(format!("edge {:?} breaks the rotation algebra", cur));
            }
            if cur.rot().sym() != cur.sym().rot() {
                return Err(format!("edge {:?}: rot∘sym differs from sym∘rot", cur));
            }
            let next = self.onext(cur);
            if !self.is_live(next) {
                return Err(format!("edge {:?} points to retired edge {:?}", cur, next));
            }
            if next.is_primal() != cur.is_primal() {
                return Err(format!("edge {:?} ring mixes primal and dual edges", cur));
            }
            if self.oprev(next) != cur {
                return Err(format!("edge {:?}: onext/oprev are not inverse", cur));
            }
            if self.onext(self.onext(cur.rot()).rot()) != cur {
                return Err(format!("edge {:?}: rot/onext cycle is broken", cur));
            }
            if cur.is_primal() && !point_equal(self.orig(next), self.orig(cur)) {
                return Err(format!(
                    "edge {:?}: ring member {:?} has a different origin",
                    cur, next
                ));
            }
        }
        Ok(())
    }
}
