//! Geometric predicates shared by every stage of the repair pipeline.
//!
//! All predicates work on 64-bit floats with one tolerance policy:
//!
//! - [`EPSILON`] for point/point and float/float comparisons
//! - [`EDGE_TOLERANCE`] (relative, scaled by edge length) for "does this point sit on that edge"
//!
//! Orientation tests ([`orient`], [`right_of`], [`in_circle`]) use exact signs; they are
//! evaluated in mathematical (y-up) orientation. The caller-facing winding convention
//! lives in [`crate::winding`] and only affects how rings are labelled.

use std::cmp::Ordering;

use geo::{Coord, Line};

/// Absolute tolerance for comparing coordinates.
pub const EPSILON: f64 = 1e-6;

/// Relative tolerance for deciding that a point lies on an edge.
pub const EDGE_TOLERANCE: f64 = EPSILON / 1000.0;

/// Sine of the smallest angle two segments may make before they count as parallel.
pub const PARALLEL_TOLERANCE: f64 = 1e-12;

/// Frame vertices are rounded to `1 / ROUNDING_FACTOR`.
pub const ROUNDING_FACTOR: f64 = 1000.0;

// ============================================================================
// Comparison
// ============================================================================

/// Compare two floats within [`EPSILON`]. Equal infinities compare equal.
pub fn float_equal(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() < EPSILON
}

/// Compare two points within [`EPSILON`] on each axis.
pub fn point_equal(a: Coord<f64>, b: Coord<f64>) -> bool {
    float_equal(a.x, b.x) && float_equal(a.y, b.y)
}

/// Exact lexicographic order: x first, then y.
pub fn point_cmp(a: Coord<f64>, b: Coord<f64>) -> Ordering {
    a.x.total_cmp(&b.x).then_with(|| a.y.total_cmp(&b.y))
}

pub fn point_less(a: Coord<f64>, b: Coord<f64>) -> bool {
    point_cmp(a, b) == Ordering::Less
}

/// Round a point to `1 / ROUNDING_FACTOR`.
pub fn round_point(pt: Coord<f64>) -> Coord<f64> {
    Coord {
        x: (pt.x * ROUNDING_FACTOR).round() / ROUNDING_FACTOR,
        y: (pt.y * ROUNDING_FACTOR).round() / ROUNDING_FACTOR,
    }
}

/// Replace `-0.0` with `0.0` so exact comparisons and hashing agree.
pub fn normalize_zero(pt: Coord<f64>) -> Coord<f64> {
    Coord {
        x: if pt.x == 0.0 { 0.0 } else { pt.x },
        y: if pt.y == 0.0 { 0.0 } else { pt.y },
    }
}

/// Normalized (lexicographically smaller point first) copy of a segment.
pub fn normalize_line(line: Line<f64>) -> Line<f64> {
    if point_less(line.end, line.start) {
        Line::new(line.end, line.start)
    } else {
        line
    }
}

/// Index of the lexicographically smallest point of `pts`.
pub fn lowest_point_index(pts: &[Coord<f64>]) -> usize {
    let mut idx = 0;
    for (i, pt) in pts.iter().enumerate().skip(1) {
        if point_less(*pt, pts[idx]) {
            idx = i;
        }
    }
    idx
}

/// Rotate a ring in place so it starts at its lexicographically smallest point.
pub fn rotate_to_lowest_point(pts: &mut [Coord<f64>]) {
    if pts.is_empty() {
        return;
    }
    let idx = lowest_point_index(pts);
    pts.rotate_left(idx);
}

// ============================================================================
// Orientation
// ============================================================================

/// Two-dimensional cross product of two vectors.
pub fn cross(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Twice the signed area of the triangle `abc`. Positive when `abc` turns counter-clockwise
/// in y-up coordinates.
pub fn orient(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

pub fn is_ccw(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> bool {
    orient(a, b, c) > 0.0
}

/// Whether `x` lies strictly right of the directed line `org → dest`.
pub fn right_of(x: Coord<f64>, org: Coord<f64>, dest: Coord<f64>) -> bool {
    is_ccw(x, dest, org)
}

/// Whether `x` lies strictly left of the directed line `org → dest`.
pub fn left_of(x: Coord<f64>, org: Coord<f64>, dest: Coord<f64>) -> bool {
    is_ccw(x, org, dest)
}

/// Where a point lies relative to a directed segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
    /// Colinear, before the segment's origin
    Behind,
    /// Colinear, past the segment's destination
    Beyond,
    Origin,
    Destination,
    /// Colinear, strictly inside the segment
    Between,
}

impl Side {
    pub fn is_colinear(self) -> bool {
        !matches!(self, Side::Left | Side::Right)
    }
}

/// Classify `p` against the directed segment `p0 → p1`.
///
/// The sign of the cross product decides left/right; for colinear points the tie is
/// broken by the relative direction and magnitude of the two vectors.
pub fn classify(p: Coord<f64>, p0: Coord<f64>, p1: Coord<f64>) -> Side {
    let a = p1 - p0;
    let b = p - p0;
    let sa = cross(a, b);
    if sa > 0.0 {
        return Side::Left;
    }
    if sa < 0.0 {
        return Side::Right;
    }
    if a.x * b.x < 0.0 || a.y * b.y < 0.0 {
        return Side::Behind;
    }
    if magnitude(a) < magnitude(b) {
        return Side::Beyond;
    }
    if p0 == p {
        return Side::Origin;
    }
    if p1 == p {
        return Side::Destination;
    }
    Side::Between
}

// ============================================================================
// Distances
// ============================================================================

fn magnitude(v: Coord<f64>) -> f64 {
    (v.x * v.x + v.y * v.y).sqrt()
}

pub fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    magnitude(b - a)
}

pub fn distance_squared(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let d = b - a;
    d.x * d.x + d.y * d.y
}

pub fn midpoint(a: Coord<f64>, b: Coord<f64>) -> Coord<f64> {
    Coord {
        x: (a.x + b.x) / 2.0,
        y: (a.y + b.y) / 2.0,
    }
}

// ============================================================================
// Segments
// ============================================================================

/// Intersection point of two segments, if they meet at a single point lying on both.
///
/// Parallel and colinear segments report `None`. Directions within rounding noise of
/// parallel count as parallel. The point is taken along `l1` from its parameter, so it
/// always lies on `l1`.
pub fn segment_intersect(l1: Line<f64>, l2: Line<f64>) -> Option<Coord<f64>> {
    let d1 = l1.end - l1.start;
    let d2 = l2.end - l2.start;
    let d13 = l2.start - l1.start;

    let denom = cross(d1, d2);
    if denom.abs() <= PARALLEL_TOLERANCE * magnitude(d1) * magnitude(d2) {
        return None;
    }

    let t = cross(d13, d2) / denom;
    let u = cross(d13, d1) / denom;
    if !(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&u) {
        return None;
    }

    let mut pt = match t {
        t if t == 0.0 => l1.start,
        t if t == 1.0 => l1.end,
        t => l1.start + d1 * t,
    };
    // Axis-aligned segments pin one coordinate exactly.
    for (start, d) in [(l1.start, d1), (l2.start, d2)] {
        if d.x == 0.0 {
            pt.x = start.x;
        }
        if d.y == 0.0 {
            pt.y = start.y;
        }
    }
    Some(normalize_zero(pt))
}

/// Whether the two segments lie on the same line and overlap in at least one end point's
/// bounding box.
pub fn are_lines_colinear(l1: Line<f64>, l2: Line<f64>) -> bool {
    let denom = (l1.start.x - l1.end.x) * (l2.start.y - l2.end.y)
        - (l1.start.y - l1.end.y) * (l2.start.x - l2.end.x);
    if denom != 0.0 {
        return false;
    }
    let (min_x, max_x) = min_max(l1.start.x, l1.end.x);
    let (min_y, max_y) = min_max(l1.start.y, l1.end.y);
    let within =
        |pt: Coord<f64>| min_x <= pt.x && pt.x <= max_x && min_y <= pt.y && pt.y <= max_y;
    within(l2.start) || within(l2.end)
}

fn min_max(a: f64, b: f64) -> (f64, f64) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}

/// Whether `pt` lies on the infinite line through `a` and `b`, within [`EPSILON`].
pub fn is_point_on_line(pt: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> bool {
    let dx = b.x - a.x;
    if dx == 0.0 {
        return float_equal(pt.x, a.x);
    }
    let m = (b.y - a.y) / dx;
    if m == 0.0 {
        return float_equal(pt.y, a.y);
    }
    let intercept = a.y - m * a.x;
    float_equal(pt.y, m * pt.x + intercept)
}

/// Whether `pt` lies on the segment: inside its bounding box and on its line.
pub fn is_point_on_segment(pt: Coord<f64>, seg: Line<f64>) -> bool {
    let (min_x, max_x) = min_max(seg.start.x, seg.end.x);
    let (min_y, max_y) = min_max(seg.start.y, seg.end.y);
    if pt.x < min_x || pt.x > max_x || pt.y < min_y || pt.y > max_y {
        return false;
    }
    is_point_on_line(pt, seg.start, seg.end)
}

/// Whether `x` lies on the edge `org → dest` within the edge-coincidence tolerance.
///
/// Points within [`EPSILON`] of either end point count as on the edge.
pub fn on_edge(x: Coord<f64>, org: Coord<f64>, dest: Coord<f64>) -> bool {
    let t1 = distance(x, org);
    let t2 = distance(x, dest);
    if t1 < EPSILON || t2 < EPSILON {
        return true;
    }
    let t3 = distance(org, dest);
    if t1 > t3 || t2 > t3 {
        return false;
    }
    let offset = orient(org, dest, x).abs() / t3;
    offset <= EDGE_TOLERANCE * t3.max(1.0)
}

// ============================================================================
// Circles and triangles
// ============================================================================

/// Whether `d` lies strictly inside the circle through `a`, `b` and `c`.
///
/// Works for either orientation of `abc`; a degenerate (colinear) `abc` has no
/// circle and reports `false`.
pub fn in_circle(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>, d: Coord<f64>) -> bool {
    let adx = a.x - d.x;
    let ady = a.y - d.y;
    let bdx = b.x - d.x;
    let bdy = b.y - d.y;
    let cdx = c.x - d.x;
    let cdy = c.y - d.y;

    let det = (adx * adx + ady * ady) * (bdx * cdy - cdx * bdy)
        + (bdx * bdx + bdy * bdy) * (cdx * ady - adx * cdy)
        + (cdx * cdx + cdy * cdy) * (adx * bdy - bdx * ady);

    let o = orient(a, b, c);
    if o > 0.0 {
        det > 0.0
    } else if o < 0.0 {
        det < 0.0
    } else {
        false
    }
}

/// Centroid of the triangle `abc`.
pub fn centroid(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> Coord<f64> {
    Coord {
        x: (a.x + b.x + c.x) / 3.0,
        y: (a.y + b.y + c.y) / 3.0,
    }
}
