//! Winding-order policy.
//!
//! Whether a ring is "clockwise" depends on which way the y axis points. Tile
//! coordinates grow downward, so the default [`WindingOrder`] treats y as
//! positive-down; callers working in projected space flip it with
//! [`WindingOrder::y_up`]. The same policy decides the orientation of shells and
//! holes in the repaired output.

use std::fmt;

use geo::Coord;

use crate::primitives::cross;

/// Orientation of a ring under a [`WindingOrder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winding {
    Clockwise,
    CounterClockwise,
    Colinear,
}

impl Winding {
    pub fn is_clockwise(self) -> bool {
        self == Winding::Clockwise
    }

    pub fn is_counter_clockwise(self) -> bool {
        self == Winding::CounterClockwise
    }

    pub fn is_colinear(self) -> bool {
        self == Winding::Colinear
    }

    /// The opposite orientation; colinear stays colinear.
    pub fn not(self) -> Winding {
        match self {
            Winding::Clockwise => Winding::CounterClockwise,
            Winding::CounterClockwise => Winding::Clockwise,
            Winding::Colinear => Winding::Colinear,
        }
    }
}

impl fmt::Display for Winding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winding::Clockwise => write!(f, "clockwise"),
            Winding::CounterClockwise => write!(f, "counter clockwise"),
            Winding::Colinear => write!(f, "colinear"),
        }
    }
}

/// Which way the y axis points when naming an orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindingOrder {
    pub y_positive_down: bool,
}

impl Default for WindingOrder {
    fn default() -> Self {
        Self::y_down()
    }
}

impl WindingOrder {
    /// Tile/screen space: y grows downward.
    pub fn y_down() -> Self {
        Self {
            y_positive_down: true,
        }
    }

    /// Cartesian space: y grows upward.
    pub fn y_up() -> Self {
        Self {
            y_positive_down: false,
        }
    }

    /// Orientation of the implicitly closed ring `pts`.
    ///
    /// Fewer than three points, or a zero signed area, is [`Winding::Colinear`].
    pub fn of_points(&self, pts: &[Coord<f64>]) -> Winding {
        if pts.len() < 3 {
            return Winding::Colinear;
        }
        // Shift to the first point to keep the products small.
        let origin = pts[0];
        let mut sum = 0.0;
        let mut last = pts[pts.len() - 1] - origin;
        for pt in pts {
            let cur = *pt - origin;
            sum += cross(last, cur);
            last = cur;
        }
        if sum == 0.0 {
            return Winding::Colinear;
        }
        let ccw_in_y_up = sum > 0.0;
        if ccw_in_y_up != self.y_positive_down {
            Winding::CounterClockwise
        } else {
            Winding::Clockwise
        }
    }

    /// Orientation required for a polygon's shell: clockwise.
    pub fn shell(&self) -> Winding {
        Winding::Clockwise
    }

    /// Orientation required for a polygon's holes: counter-clockwise.
    pub fn hole(&self) -> Winding {
        Winding::CounterClockwise
    }

    /// Bring a polygon's rings into this order's convention.
    ///
    /// Colinear rings are dropped; a colinear shell drops the whole polygon and `None`
    /// is returned. The shell ends up clockwise, every hole counter-clockwise. Reversed
    /// rings keep their first point.
    pub fn rectify_polygon(&self, rings: Vec<Vec<Coord<f64>>>) -> Option<Vec<Vec<Coord<f64>>>> {
        let mut out = Vec::with_capacity(rings.len());
        for (i, mut ring) in rings.into_iter().enumerate() {
            let winding = self.of_points(&ring);
            if winding.is_colinear() {
                if i == 0 {
                    return None;
                }
                continue;
            }
            let want = if i == 0 { self.shell() } else { self.hole() };
            if winding != want {
                reverse_ring(&mut ring);
            }
            out.push(ring);
        }
        Some(out)
    }
}

/// Reverse the direction of an implicitly closed ring, keeping its first point.
pub fn reverse_ring(ring: &mut [Coord<f64>]) {
    if ring.len() > 1 {
        ring[1..].reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    fn square() -> Vec<Coord<f64>> {
        vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 10.0, y: 0.0 },
            coord! { x: 10.0, y: 10.0 },
            coord! { x: 0.0, y: 10.0 },
        ]
    }

    #[test]
    fn test_of_points_y_up() {
        let order = WindingOrder::y_up();
        assert_eq!(order.of_points(&square()), Winding::CounterClockwise);
        let mut rev = square();
        rev.reverse();
        assert_eq!(order.of_points(&rev), Winding::Clockwise);
    }

    #[test]
    fn test_of_points_y_down_flips() {
        let order = WindingOrder::y_down();
        assert_eq!(order.of_points(&square()), Winding::Clockwise);
    }

    #[test]
    fn test_of_points_colinear() {
        let order = WindingOrder::default();
        let line = vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 5.0, y: 5.0 },
            coord! { x: 10.0, y: 10.0 },
        ];
        assert_eq!(order.of_points(&line), Winding::Colinear);
        assert_eq!(order.of_points(&line[..2]), Winding::Colinear);
    }

    #[test]
    fn test_not() {
        assert_eq!(Winding::Clockwise.not(), Winding::CounterClockwise);
        assert_eq!(Winding::Colinear.not(), Winding::Colinear);
    }

    #[test]
    fn test_rectify_polygon() {
        let order = WindingOrder::y_up();
        let hole = vec![
            coord! { x: 2.0, y: 2.0 },
            coord! { x: 4.0, y: 2.0 },
            coord! { x: 4.0, y: 4.0 },
            coord! { x: 2.0, y: 4.0 },
        ];
        let rings = order.rectify_polygon(vec![square(), hole]).unwrap();
        assert_eq!(rings.len(), 2);
        assert_eq!(order.of_points(&rings[0]), Winding::Clockwise);
        assert_eq!(order.of_points(&rings[1]), Winding::CounterClockwise);
        assert_eq!(rings[0][0], coord! { x: 0.0, y: 0.0 });
        assert_eq!(rings[0][1], coord! { x: 0.0, y: 10.0 });
    }

    #[test]
    fn test_rectify_drops_colinear_rings() {
        let order = WindingOrder::default();
        let flat = vec![
            coord! { x: 1.0, y: 1.0 },
            coord! { x: 2.0, y: 1.0 },
            coord! { x: 3.0, y: 1.0 },
        ];
        let rings = order.rectify_polygon(vec![square(), flat.clone()]).unwrap();
        assert_eq!(rings.len(), 1);
        assert!(order.rectify_polygon(vec![flat, square()]).is_none());
    }
}
