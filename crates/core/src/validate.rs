//! Validity checks for repair input and output.
//!
//! Input rings are checked before any triangulation is attempted: a ring with fewer
//! than three distinct points cannot bound an area and is rejected with
//! [`Error::InvalidLineString`]. Repaired output can be checked for the two properties
//! the walker guarantees:
//!
//! - no two ring segments cross except at shared vertices
//! - every shell and its holes are wound opposite ways under the configured order
//!
//! # Usage
//!
//! ```
//! use geo::{polygon, MultiPolygon};
//! use tilerepair_core::validate::validate_repaired;
//! use tilerepair_core::{CancellationToken, WindingOrder};
//!
//! let square = polygon![
//!     (x: 0.0, y: 0.0),
//!     (x: 10.0, y: 0.0),
//!     (x: 10.0, y: 10.0),
//!     (x: 0.0, y: 10.0),
//! ];
//! let result = validate_repaired(
//!     &CancellationToken::never(),
//!     &MultiPolygon::new(vec![square]),
//!     WindingOrder::y_down(),
//! )
//! .unwrap();
//! assert!(result.is_valid());
//! ```

use geo::{Coord, Line, LineString, MultiPolygon};

use crate::arrangement::{ring_segments, EventQueue};
use crate::cancel::CancellationToken;
use crate::primitives::{point_cmp, point_equal};
use crate::winding::{Winding, WindingOrder};
use crate::{Error, Result};

/// Minimum number of distinct points for a ring to bound an area
pub const MIN_RING_POINTS: usize = 3;

/// Result of validating a repaired geometry
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    /// Geometry satisfies every checked property
    Valid,
    /// Geometry breaks at least one property; the first one found is reported
    Invalid(InvalidReason),
}

/// Reason why a repaired geometry is invalid
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidReason {
    /// A ring has fewer than three distinct points
    RingTooFewPoints {
        polygon_index: usize,
        ring_index: usize,
        point_count: usize,
    },
    /// Two ring segments meet somewhere other than a shared vertex
    SegmentsCross {
        first: Line<f64>,
        second: Line<f64>,
        point: Coord<f64>,
    },
    /// A shell or hole is wound the wrong way
    WrongWinding {
        polygon_index: usize,
        ring_index: usize,
        found: Winding,
    },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, ValidationResult::Invalid(_))
    }
}

/// Number of distinct points of a ring, ignoring the closing point.
pub fn distinct_point_count(ring: &LineString<f64>) -> usize {
    let mut pts = ring.0.clone();
    pts.sort_by(|a, b| point_cmp(*a, *b));
    pts.dedup_by(|a, b| point_equal(*a, *b));
    pts.len()
}

/// Reject input whose rings cannot bound an area.
///
/// Empty rings are ignored; they are dropped later.
///
/// # Errors
///
/// [`Error::InvalidLineString`] when a non-empty ring has fewer than
/// [`MIN_RING_POINTS`] distinct points, or a NaN or infinite coordinate.
pub fn check_input_rings(multipolygon: &MultiPolygon<f64>) -> Result<()> {
    for (polygon_index, ring_index, ring) in rings(multipolygon) {
        if ring.0.is_empty() {
            continue;
        }
        if let Some(pt) = ring.0.iter().find(|c| !(c.x.is_finite() && c.y.is_finite())) {
            log::debug!("polygon {polygon_index} ring {ring_index} has non-finite point {pt:?}");
            return Err(Error::InvalidLineString);
        }
        let count = distinct_point_count(ring);
        if count < MIN_RING_POINTS {
            log::debug!(
                "polygon {polygon_index} ring {ring_index} has only {count} distinct points"
            );
            return Err(Error::InvalidLineString);
        }
    }
    Ok(())
}

/// Every pair of ring segments meeting at a point that is not a vertex of both.
///
/// # Returns
///
/// `(first, second, point)` for each offending pair.
pub fn residual_crossings(
    cancel: &CancellationToken,
    multipolygon: &MultiPolygon<f64>,
) -> Result<Vec<(Line<f64>, Line<f64>, Coord<f64>)>> {
    let segments = ring_segments(multipolygon);
    let mut out = Vec::new();
    EventQueue::new(&segments).find_intersects(cancel, false, |a, b, pt| {
        let (first, second) = (segments[a], segments[b]);
        let at_first = point_equal(pt, first.start) || point_equal(pt, first.end);
        let at_second = point_equal(pt, second.start) || point_equal(pt, second.end);
        if !(at_first && at_second) {
            out.push((first, second, pt));
        }
        Ok(())
    })?;
    Ok(out)
}

/// Check that shells and holes carry the orientation `order` asks for.
pub fn check_winding(multipolygon: &MultiPolygon<f64>, order: WindingOrder) -> ValidationResult {
    for (polygon_index, ring_index, ring) in rings(multipolygon) {
        let found = order.of_points(&ring.0);
        let want = if ring_index == 0 {
            order.shell()
        } else {
            order.hole()
        };
        if found != want {
            return ValidationResult::Invalid(InvalidReason::WrongWinding {
                polygon_index,
                ring_index,
                found,
            });
        }
    }
    ValidationResult::Valid
}

/// Full check of a repaired multipolygon: ring sizes, crossings, then winding.
pub fn validate_repaired(
    cancel: &CancellationToken,
    multipolygon: &MultiPolygon<f64>,
    order: WindingOrder,
) -> Result<ValidationResult> {
    for (polygon_index, ring_index, ring) in rings(multipolygon) {
        let point_count = distinct_point_count(ring);
        if point_count < MIN_RING_POINTS {
            return Ok(ValidationResult::Invalid(InvalidReason::RingTooFewPoints {
                polygon_index,
                ring_index,
                point_count,
            }));
        }
    }

    if let Some((first, second, point)) = residual_crossings(cancel, multipolygon)?
        .into_iter()
        .next()
    {
        return Ok(ValidationResult::Invalid(InvalidReason::SegmentsCross {
            first,
            second,
            point,
        }));
    }

    Ok(check_winding(multipolygon, order))
}

fn rings(
    multipolygon: &MultiPolygon<f64>,
) -> impl Iterator<Item = (usize, usize, &LineString<f64>)> + '_ {
    multipolygon.0.iter().enumerate().flat_map(|(p, polygon)| {
        std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .enumerate()
            .map(move |(r, ring)| (p, r, ring))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, line_string, polygon, Polygon};

    fn square_with_hole() -> Polygon<f64> {
        polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [[(x: 2.0, y: 2.0), (x: 2.0, y: 4.0), (x: 4.0, y: 4.0), (x: 4.0, y: 2.0)]]
        )
    }

    // ========== Input Tests ==========

    #[test]
    fn test_distinct_point_count() {
        let ring = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 0.0, y: 0.0)];
        assert_eq!(distinct_point_count(&ring), 2);
    }

    #[test]
    fn test_two_point_ring_is_rejected() {
        let degenerate = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)];
        let mp = MultiPolygon::new(vec![degenerate]);
        assert_eq!(check_input_rings(&mp), Err(Error::InvalidLineString));
    }

    #[test]
    fn test_non_finite_ring_is_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let ring = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: bad), (x: 10.0, y: 10.0)];
            let mp = MultiPolygon::new(vec![ring]);
            assert_eq!(check_input_rings(&mp), Err(Error::InvalidLineString));
        }
    }

    #[test]
    fn test_good_rings_pass() {
        let mp = MultiPolygon::new(vec![square_with_hole()]);
        assert_eq!(check_input_rings(&mp), Ok(()));
        assert_eq!(check_input_rings(&MultiPolygon::new(vec![])), Ok(()));
    }

    // ========== Output Tests ==========

    #[test]
    fn test_valid_output() {
        let mp = MultiPolygon::new(vec![square_with_hole()]);
        let result = validate_repaired(&CancellationToken::never(), &mp, WindingOrder::y_down());
        assert_eq!(result, Ok(ValidationResult::Valid));
    }

    #[test]
    fn test_bowtie_has_residual_crossing() {
        let bowtie = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 10.0, y: 0.0),
            (x: 0.0, y: 10.0),
        ];
        let mp = MultiPolygon::new(vec![bowtie]);
        let crossings = residual_crossings(&CancellationToken::never(), &mp).unwrap();
        assert_eq!(crossings.len(), 1);
        assert_eq!(crossings[0].2, coord! { x: 5.0, y: 5.0 });

        let result = validate_repaired(&CancellationToken::never(), &mp, WindingOrder::y_down())
            .unwrap();
        assert!(matches!(
            result,
            ValidationResult::Invalid(InvalidReason::SegmentsCross { .. })
        ));
    }

    #[test]
    fn test_touching_triangles_do_not_cross() {
        let left = polygon![(x: 0.0, y: 0.0), (x: 5.0, y: 5.0), (x: 0.0, y: 10.0)];
        let right = polygon![(x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 5.0, y: 5.0)];
        let mp = MultiPolygon::new(vec![left, right]);
        assert!(residual_crossings(&CancellationToken::never(), &mp)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_wrong_hole_winding() {
        let order = WindingOrder::y_down();
        let polygon = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [[(x: 2.0, y: 2.0), (x: 4.0, y: 2.0), (x: 4.0, y: 4.0), (x: 2.0, y: 4.0)]]
        );
        let result = check_winding(&MultiPolygon::new(vec![polygon]), order);
        assert_eq!(
            result,
            ValidationResult::Invalid(InvalidReason::WrongWinding {
                polygon_index: 0,
                ring_index: 1,
                found: Winding::Clockwise,
            })
        );
        assert!(result.is_invalid());
    }
}
