//! Segment arrangement.
//!
//! Turns a multipolygon (plus an optional clip extent) into a de-duplicated set of
//! direction-normalized segments that only meet at shared end points. Every
//! crossing in the input becomes a vertex in the output.
//!
//! # Algorithm
//!
//! 1. Flatten every ring into its boundary segments; when a clip extent does not
//!    already contain the geometry, its four edges are prepended.
//! 2. Sweep the segments with an [`EventQueue`], recording every intersection point
//!    against both participating segments.
//! 3. Split each segment at its recorded points, dropping sub-segments outside the
//!    clip extent.
//! 4. Normalize, sort and de-duplicate.

use std::collections::{BTreeSet, HashMap};

use geo::{Coord, Line, MultiPolygon};

use crate::cancel::CancellationToken;
use crate::extent::Extent;
use crate::primitives::{normalize_line, point_cmp, point_equal, segment_intersect};
use crate::Result;

// ============================================================================
// Event queue
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy)]
struct Event {
    edge: usize,
    kind: EventKind,
    point: Coord<f64>,
}

/// Sweep-line queue over a set of segments.
///
/// Each segment contributes a left (lexicographically smaller) and a right end point
/// event, ordered by x, then event kind (left before right), then y.
pub struct EventQueue<'a> {
    segments: &'a [Line<f64>],
    events: Vec<Event>,
}

impl<'a> EventQueue<'a> {
    pub fn new(segments: &'a [Line<f64>]) -> Self {
        let mut events = Vec::with_capacity(segments.len() * 2);
        for (edge, seg) in segments.iter().enumerate() {
            let (left, right) = if point_cmp(seg.start, seg.end).is_le() {
                (seg.start, seg.end)
            } else {
                (seg.end, seg.start)
            };
            events.push(Event {
                edge,
                kind: EventKind::Left,
                point: left,
            });
            events.push(Event {
                edge,
                kind: EventKind::Right,
                point: right,
            });
        }
        events.sort_by(|a, b| {
            a.point
                .x
                .total_cmp(&b.point.x)
                .then(a.kind.cmp(&b.kind))
                .then(a.point.y.total_cmp(&b.point.y))
        });
        Self { segments, events }
    }

    /// Call `found(src, dest, point)` for every pair of intersecting segments.
    ///
    /// With `connected` set, pairs sharing an end point are skipped: they are
    /// neighbours along a ring and meet at that point by construction.
    ///
    /// Colinear overlapping pairs are not reported, since [`segment_intersect`] has no
    /// single point for them. Constraint insertion splits such overlaps at the shared
    /// vertices instead.
    pub fn find_intersects<F>(
        &self,
        cancel: &CancellationToken,
        connected: bool,
        mut found: F,
    ) -> Result<()>
    where
        F: FnMut(usize, usize, Coord<f64>) -> Result<()>,
    {
        let mut open: BTreeSet<usize> = BTreeSet::new();
        for event in &self.events {
            cancel.check()?;
            match event.kind {
                EventKind::Left => {
                    open.insert(event.edge);
                }
                EventKind::Right => {
                    open.remove(&event.edge);
                    let closing = self.segments[event.edge];
                    for &other in &open {
                        let seg = self.segments[other];
                        if connected && shares_end_point(closing, seg) {
                            continue;
                        }
                        if let Some(pt) = segment_intersect(closing, seg) {
                            found(event.edge, other, pt)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn shares_end_point(a: Line<f64>, b: Line<f64>) -> bool {
    a.start == b.start || a.start == b.end || a.end == b.start || a.end == b.end
}

/// Replace a computed intersection with a segment end point it (nearly) equals.
fn snap_to_end_points(pt: Coord<f64>, segs: [Line<f64>; 2]) -> Coord<f64> {
    for seg in segs {
        for end in [seg.start, seg.end] {
            if point_equal(pt, end) {
                return end;
            }
        }
    }
    pt
}

// ============================================================================
// Destructure
// ============================================================================

/// All boundary segments of every ring, including each closing segment.
pub fn ring_segments(multipolygon: &MultiPolygon<f64>) -> Vec<Line<f64>> {
    let mut segments = Vec::new();
    for polygon in &multipolygon.0 {
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            segments.extend(ring.lines().filter(|l| l.start != l.end));
        }
    }
    segments
}

/// Split the multipolygon's rings (and the clip extent's edges) into non-crossing,
/// normalized, de-duplicated segments.
///
/// Sub-segments outside `clip` are dropped. When `clip` already contains the whole
/// geometry it is ignored.
pub fn destructure(
    cancel: &CancellationToken,
    clip: Option<&Extent>,
    multipolygon: &MultiPolygon<f64>,
) -> Result<Vec<Line<f64>>> {
    let mut segments = ring_segments(multipolygon);
    let extent = Extent::from_points(segments.iter().flat_map(|l| [l.start, l.end]));

    let clip = clip.filter(|c| !c.is_universe() && !c.contains(&extent));
    if let Some(clip) = clip {
        let mut with_edges = clip.edges().to_vec();
        with_edges.append(&mut segments);
        segments = with_edges;
    }

    let mut points: HashMap<usize, Vec<Coord<f64>>> = HashMap::new();
    EventQueue::new(&segments).find_intersects(cancel, true, |src, dest, pt| {
        let pt = snap_to_end_points(pt, [segments[src], segments[dest]]);
        points.entry(src).or_default().push(pt);
        points.entry(dest).or_default().push(pt);
        Ok(())
    })?;
    log::trace!(
        "arrangement: {} segments, {} with intersections",
        segments.len(),
        points.len()
    );

    let mut out = Vec::with_capacity(segments.len());
    for (i, seg) in segments.iter().enumerate() {
        cancel.check()?;
        let mut pts = vec![seg.start, seg.end];
        if let Some(extra) = points.get(&i) {
            pts.extend_from_slice(extra);
        }
        pts.sort_by(|a, b| point_cmp(*a, *b));

        for pair in pts.windows(2) {
            if point_equal(pair[0], pair[1]) {
                continue;
            }
            let sub = Line::new(pair[0], pair[1]);
            if let Some(clip) = clip {
                if !clip.contains_line(&sub) {
                    continue;
                }
            }
            out.push(sub);
        }
    }

    Ok(unique(out))
}

/// Normalize direction, sort, and collapse exact duplicates.
fn unique(segments: Vec<Line<f64>>) -> Vec<Line<f64>> {
    let mut segments: Vec<Line<f64>> = segments.into_iter().map(normalize_line).collect();
    segments.sort_by(|a, b| point_cmp(a.start, b.start).then(point_cmp(a.end, b.end)));
    segments.dedup_by(|a, b| a.start == b.start && a.end == b.end);
    segments
}
