//! Constrained edge insertion.
//!
//! A constraint `a → b` between two existing vertices is forced into the subdivision:
//! the triangles it crosses are removed and the two cavities on either side are
//! retriangulated with [`crate::pseudo_polygon`]. A constraint passing through a vertex,
//! or crossing an earlier constraint, is split there and each piece inserted in turn.

use geo::{Coord, Line};

use crate::cancel::CancellationToken;
use crate::primitives::{
    classify, distance_squared, on_edge, point_equal, segment_intersect, Side,
};
use crate::pseudo_polygon;
use crate::quadedge::{EdgeId, ResolveError};
use crate::subdivision::Subdivision;
use crate::{Error, Result};

/// Outcome of one attempt at inserting a constraint piece.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    /// The piece is in the graph.
    Done,
    /// `a → mid` is in the graph; `mid → b` remains.
    Continue(Coord<f64>),
    /// Nothing changed; insert `a → mid` and `mid → b` instead.
    Split(Coord<f64>),
}

/// Append `pt` unless it repeats the last point.
fn push_unique(pts: &mut Vec<Coord<f64>>, pt: Coord<f64>) {
    if pts.last().map_or(true, |last| !point_equal(*last, pt)) {
        pts.push(pt);
    }
}

impl Subdivision {
    /// Insert every segment as a constraint.
    ///
    /// A segment that resolves to coincident edges is skipped with a warning; the
    /// triangulation stays valid without it. Any other error ends the run.
    pub fn insert_constraints(
        &mut self,
        cancel: &CancellationToken,
        lines: &[Line<f64>],
    ) -> Result<()> {
        let mut skipped = 0;
        for line in lines {
            cancel.check()?;
            match self.insert_constraint(cancel, line.start, line.end) {
                Ok(()) => {}
                Err(Error::CoincidentalEdges) => {
                    log::warn!(
                        "skipping constraint {:?} -> {:?}: coincidental edges",
                        line.start,
                        line.end
                    );
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        log::debug!(
            "inserted {} constraints ({} skipped), {} constraint edges",
            lines.len() - skipped,
            skipped,
            self.constraint_count()
        );
        Ok(())
    }

    /// Force the segment `a → b` into the triangulation as a constraint.
    ///
    /// Both end points must already be vertices.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidStartingVertex`] / [`Error::InvalidEndVertex`] for a missing end point
    /// - [`Error::CoincidentalEdges`] when the segment runs along an edge it cannot follow
    /// - [`Error::NoIntersectingTriangle`] when the crossing walk does not reach `b`
    pub fn insert_constraint(
        &mut self,
        cancel: &CancellationToken,
        a: Coord<f64>,
        b: Coord<f64>,
    ) -> Result<()> {
        let limit = 4 * self.graph.edge_count() + 64;
        let mut pending = vec![(a, b)];
        let mut steps = 0;

        while let Some((a, b)) = pending.pop() {
            cancel.check()?;
            steps += 1;
            if steps > limit {
                return Err(Error::InvariantViolation(format!(
                    "constraint {:?} -> {:?} kept splitting",
                    a, b
                )));
            }
            match self.insert_constraint_piece(a, b)? {
                Step::Done => {}
                Step::Continue(mid) => pending.push((mid, b)),
                Step::Split(mid) => {
                    log::trace!("splitting constraint {:?} -> {:?} at {:?}", a, b, mid);
                    pending.push((mid, b));
                    pending.push((a, mid));
                }
            }
        }

        if self.validate_mutations {
            self.validate()?;
        }
        Ok(())
    }

    fn insert_constraint_piece(&mut self, a: Coord<f64>, b: Coord<f64>) -> Result<Step> {
        let ea = self.vertex_edge(a).ok_or(Error::InvalidStartingVertex(a))?;
        let eb = self.vertex_edge(b).ok_or(Error::InvalidEndVertex(b))?;
        let (a, b) = (self.graph.orig(ea), self.graph.orig(eb));
        if point_equal(a, b) {
            return Ok(Step::Done);
        }

        if let Some(e) = self.graph.find_onext_dest(ea, b) {
            self.mark_constraint(e);
            return Ok(Step::Done);
        }

        let start = match self.graph.resolve_edge(ea, b) {
            Ok(e) => e,
            Err(ResolveError::Colinear(e)) => {
                let mid = self.graph.dest(e);
                if distance_squared(a, mid) < distance_squared(a, b) {
                    self.mark_constraint(e);
                    return Ok(Step::Continue(mid));
                }
                return Err(Error::CoincidentalEdges);
            }
            Err(ResolveError::CoincidentEdges) => return Err(Error::CoincidentalEdges),
            Err(err) => {
                return Err(Error::InvariantViolation(format!(
                    "cannot resolve {:?} -> {:?}: {:?}",
                    a, b, err
                )))
            }
        };

        let crossing = match self.find_intersecting_edges(start, a, b)? {
            Walk::Crossed(crossing) => crossing,
            Walk::Redirect(step) => return Ok(step),
        };

        for e in &crossing.edges {
            if !self.is_frame_edge(*e) {
                self.delete_edge(*e);
            }
        }

        // The cavity is open from here on; nothing may be skipped.
        self.fill_cavity(a, b, &crossing)
            .map_err(|err| cavity_error(err, a, b))?;

        log::trace!(
            "constraint {:?} -> {:?} replaced {} edges",
            a,
            b,
            crossing.edges.len()
        );
        Ok(Step::Done)
    }

    /// Walk from the triangle at `a` containing the direction of `b` to the one at `b`,
    /// collecting the crossed edges and the vertices on each side.
    ///
    /// Redirects when the segment passes through a vertex, or crosses a constraint
    /// (which is split at the crossing first).
    fn find_intersecting_edges(
        &mut self,
        start: EdgeId,
        a: Coord<f64>,
        b: Coord<f64>,
    ) -> Result<Walk> {
        let g = &self.graph;
        let right = g.dest(start);
        let left = g.dest(g.onext(start));
        for v in [right, left] {
            if on_edge(v, a, b) {
                return Ok(Walk::Redirect(Step::Split(v)));
            }
        }

        let mut crossing = Crossing::default();
        let mut c = g.lnext(start);
        let limit = g.edge_count();

        loop {
            if self.is_constraint(c) {
                return self.split_crossed_constraint(c, a, b).map(Walk::Redirect);
            }
            let g = &self.graph;
            crossing.edges.push(c);
            push_unique(&mut crossing.upper, g.orig(c));
            push_unique(&mut crossing.lower, g.dest(c));
            if crossing.edges.len() > limit {
                return Err(Error::NoIntersectingTriangle { start: a, end: b });
            }

            let s = c.sym();
            let v = g.dest(g.lnext(s));
            if point_equal(v, b) {
                break;
            }
            if on_edge(v, a, b) {
                return Ok(Walk::Redirect(Step::Split(v)));
            }
            c = if classify(v, a, b) == Side::Right {
                g.lprev(s)
            } else {
                g.lnext(s)
            };
        }
        Ok(Walk::Crossed(crossing))
    }

    /// Split constraint `c` where `a → b` crosses it.
    fn split_crossed_constraint(
        &mut self,
        c: EdgeId,
        a: Coord<f64>,
        b: Coord<f64>,
    ) -> Result<Step> {
        let (p, q) = (self.graph.orig(c), self.graph.dest(c));
        let x = segment_intersect(Line::new(a, b), Line::new(p, q)).ok_or_else(|| {
            Error::InvariantViolation(format!(
                "crossed constraint {:?} -> {:?} does not meet {:?} -> {:?}",
                p, q, a, b
            ))
        })?;
        if point_equal(x, a) || point_equal(x, b) {
            return Err(Error::CoincidentalEdges);
        }
        for end in [p, q] {
            if point_equal(x, end) {
                return Ok(Step::Split(end));
            }
        }
        log::trace!("constraint {:?} -> {:?} crosses {:?} -> {:?} at {:?}", a, b, p, q, x);
        self.split_edge(c, x)?;
        let x = self
            .vertex_edge(x)
            .map(|e| self.graph.orig(e))
            .ok_or_else(|| Error::InvariantViolation(format!("split vertex {:?} missing", x)))?;
        Ok(Step::Split(x))
    }

    /// Insert `a → b` into the cleared cavity and retriangulate both sides of it.
    fn fill_cavity(&mut self, a: Coord<f64>, b: Coord<f64>, crossing: &Crossing) -> Result<()> {
        let ab = self.add_edge(a, b)?;
        self.mark_constraint(ab);

        for chain in [&crossing.upper, &crossing.lower] {
            let mut pts = Vec::with_capacity(chain.len() + 2);
            pts.push(a);
            pts.extend_from_slice(chain);
            pts.push(b);
            for tri in pseudo_polygon::triangulate(&pts)? {
                let [p, q, r] = tri.points();
                for (s, t) in [(p, q), (q, r), (r, p)] {
                    self.add_edge(s, t)?;
                }
            }
        }
        Ok(())
    }

    /// Connect vertices `p` and `q` through the face both open onto.
    fn add_edge(&mut self, p: Coord<f64>, q: Coord<f64>) -> Result<EdgeId> {
        let ep = self.vertex_edge(p).ok_or(Error::InvalidStartingVertex(p))?;
        if let Some(e) = self.graph.find_onext_dest(ep, q) {
            return Ok(e);
        }
        let eq = self.vertex_edge(q).ok_or(Error::InvalidEndVertex(q))?;
        let rp = self.resolve(ep, q)?;
        let rq = self.resolve(eq, p)?;
        let from = self.graph.lprev(rp);
        Ok(self.graph.connect(from, rq))
    }

    fn resolve(&self, e: EdgeId, target: Coord<f64>) -> Result<EdgeId> {
        match self.graph.resolve_edge(e, target) {
            Ok(e) => Ok(e),
            Err(ResolveError::Colinear(_)) | Err(ResolveError::CoincidentEdges) => {
                Err(Error::CoincidentalEdges)
            }
            Err(err) => Err(Error::InvariantViolation(format!(
                "cannot resolve {:?} -> {:?}: {:?}",
                self.graph.orig(e),
                target,
                err
            ))),
        }
    }
}

/// A recoverable failure after crossed edges are gone would leave a hole in the
/// triangulation, so it becomes terminal.
fn cavity_error(err: Error, a: Coord<f64>, b: Coord<f64>) -> Error {
    match err {
        Error::CoincidentalEdges => Error::InvariantViolation(format!(
            "coincidental edges while filling the cavity of {:?} -> {:?}",
            a, b
        )),
        other => other,
    }
}

/// Edges crossed by a constraint and the vertices right (`upper`) and left (`lower`) of it,
/// both in walk order from `a` to `b`.
#[derive(Debug, Default)]
struct Crossing {
    edges: Vec<EdgeId>,
    upper: Vec<Coord<f64>>,
    lower: Vec<Coord<f64>>,
}

#[derive(Debug)]
enum Walk {
    Crossed(Crossing),
    Redirect(Step),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RepairConfig;
    use geo::coord;

    fn c(x: f64, y: f64) -> Coord<f64> {
        coord! { x: x, y: y }
    }

    fn build(points: &[Coord<f64>]) -> Subdivision {
        let config = RepairConfig::default().with_validate_mutations(true);
        Subdivision::new_for_points(&CancellationToken::never(), points, &config).unwrap()
    }

    fn assert_constraint(sd: &Subdivision, a: Coord<f64>, b: Coord<f64>) {
        let e = sd
            .find_edge(a, b)
            .unwrap_or_else(|| panic!("missing edge {:?} -> {:?}", a, b));
        assert!(sd.is_constraint(e), "{:?} -> {:?} not a constraint", a, b);
    }

    fn no_edge_crosses(sd: &Subdivision, a: Coord<f64>, b: Coord<f64>) {
        for line in sd.edges(true) {
            if let Some(pt) = segment_intersect(line, Line::new(a, b)) {
                let shared = [a, b].iter().any(|p| point_equal(*p, pt));
                assert!(shared, "{:?} crosses the constraint at {:?}", line, pt);
            }
        }
    }

    // ========== Basic Insertion Tests ==========

    #[test]
    fn test_existing_edge_is_marked() {
        let pts = [c(0.0, 0.0), c(10.0, 0.0), c(5.0, 8.0)];
        let mut sd = build(&pts);
        sd.insert_constraint(&CancellationToken::never(), pts[0], pts[1])
            .unwrap();
        assert_constraint(&sd, pts[0], pts[1]);
        assert_eq!(sd.constraint_count(), 1);
    }

    #[test]
    fn test_constraint_flips_delaunay_diagonal() {
        let pts = [c(0.0, 0.0), c(10.0, -2.0), c(20.0, 0.0), c(10.0, 2.0)];
        let mut sd = build(&pts);
        assert!(sd.find_edge(c(10.0, -2.0), c(10.0, 2.0)).is_some());

        sd.insert_constraint(&CancellationToken::never(), pts[0], pts[2])
            .unwrap();
        assert_constraint(&sd, pts[0], pts[2]);
        assert!(sd.find_edge(c(10.0, -2.0), c(10.0, 2.0)).is_none());
        assert_eq!(sd.triangles(false).len(), 2);
        assert!(sd.validate().is_ok());
    }

    #[test]
    fn test_constraint_crossing_many_edges() {
        let mut pts = vec![c(0.0, 5.0), c(20.0, 5.0)];
        for x in [4.0, 8.0, 12.0, 16.0] {
            pts.push(c(x, 4.0));
            pts.push(c(x, 6.0));
        }
        let mut sd = build(&pts);
        let (a, b) = (c(0.0, 5.0), c(20.0, 5.0));
        sd.insert_constraint(&CancellationToken::never(), a, b).unwrap();
        assert_constraint(&sd, a, b);
        no_edge_crosses(&sd, a, b);
        assert!(sd.validate().is_ok());
    }

    #[test]
    fn test_constraint_through_vertex_is_split() {
        let pts = [
            c(0.0, 0.0),
            c(5.0, 0.0),
            c(10.0, 0.0),
            c(5.0, 5.0),
            c(5.0, -5.0),
        ];
        let mut sd = build(&pts);
        sd.insert_constraint(&CancellationToken::never(), c(0.0, 0.0), c(10.0, 0.0))
            .unwrap();
        assert_constraint(&sd, c(0.0, 0.0), c(5.0, 0.0));
        assert_constraint(&sd, c(5.0, 0.0), c(10.0, 0.0));
        assert_eq!(sd.constraint_count(), 2);
    }

    #[test]
    fn test_crossing_constraints_split_each_other() {
        let pts = [c(0.0, 0.0), c(10.0, 0.0), c(10.0, 10.0), c(0.0, 10.0)];
        let mut sd = build(&pts);
        let cancel = CancellationToken::never();
        sd.insert_constraint(&cancel, c(0.0, 0.0), c(10.0, 10.0)).unwrap();
        sd.insert_constraint(&cancel, c(10.0, 0.0), c(0.0, 10.0)).unwrap();

        let mid = c(5.0, 5.0);
        for corner in pts {
            assert_constraint(&sd, corner, mid);
        }
        assert_eq!(sd.constraint_count(), 4);
        assert_eq!(sd.triangles(false).len(), 4);
        assert!(sd.validate().is_ok());
    }

    #[test]
    fn test_constraint_survives_later_sites() {
        let pts = [c(0.0, 0.0), c(10.0, -2.0), c(20.0, 0.0), c(10.0, 2.0)];
        let mut sd = build(&pts);
        sd.insert_constraint(&CancellationToken::never(), pts[0], pts[2])
            .unwrap();
        sd.insert_site(c(10.0, 1.0)).unwrap();
        assert_constraint(&sd, pts[0], pts[2]);
        assert!(sd.validate().is_ok());
    }

    // ========== Error Tests ==========

    #[test]
    fn test_missing_end_points() {
        let pts = [c(0.0, 0.0), c(10.0, 0.0), c(5.0, 8.0)];
        let mut sd = build(&pts);
        let cancel = CancellationToken::never();
        assert_eq!(
            sd.insert_constraint(&cancel, c(1.0, 1.0), pts[1]),
            Err(Error::InvalidStartingVertex(c(1.0, 1.0)))
        );
        assert_eq!(
            sd.insert_constraint(&cancel, pts[0], c(2.0, 2.0)),
            Err(Error::InvalidEndVertex(c(2.0, 2.0)))
        );
    }

    #[test]
    fn test_degenerate_constraint_is_noop() {
        let pts = [c(0.0, 0.0), c(10.0, 0.0), c(5.0, 8.0)];
        let mut sd = build(&pts);
        sd.insert_constraint(&CancellationToken::never(), pts[0], pts[0])
            .unwrap();
        assert_eq!(sd.constraint_count(), 0);
    }

    #[test]
    fn test_cancelled_constraint() {
        let pts = [c(0.0, 0.0), c(10.0, 0.0), c(5.0, 8.0)];
        let mut sd = build(&pts);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let lines = [Line::new(pts[0], pts[1])];
        assert_eq!(sd.insert_constraints(&cancel, &lines), Err(Error::Cancelled));
    }

    #[test]
    fn test_coincidence_inside_cavity_is_terminal() {
        let (a, b) = (c(0.0, 0.0), c(10.0, 0.0));
        let err = cavity_error(Error::CoincidentalEdges, a, b);
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert_eq!(cavity_error(Error::Cancelled, a, b), Error::Cancelled);
        assert_eq!(
            cavity_error(Error::AllPointsColinear, a, b),
            Error::AllPointsColinear
        );
    }
}
