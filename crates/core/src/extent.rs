//! Axis-aligned extents.
//!
//! An [`Extent`] plays two roles in the repair pipeline: it is the clip boundary a
//! caller hands in alongside the geometry, and it is the basis the subdivision
//! expands into its enclosing frame triangle.

use geo::{Coord, Line};

/// Axis-aligned bounding box `(min_x, min_y, max_x, max_y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    /// Create a new extent
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Create an empty/invalid extent that any point will expand
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    /// The extent containing every point of the plane
    pub fn universe() -> Self {
        Self {
            min_x: f64::NEG_INFINITY,
            min_y: f64::NEG_INFINITY,
            max_x: f64::INFINITY,
            max_y: f64::INFINITY,
        }
    }

    /// Smallest extent containing all the given points.
    ///
    /// Returns an [`Extent::empty`] extent when the iterator yields nothing.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Coord<f64>>,
    {
        let mut extent = Self::empty();
        for pt in points {
            extent.add_point(pt);
        }
        extent
    }

    /// Check if this is a valid extent
    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    pub fn is_universe(&self) -> bool {
        self.min_x == f64::NEG_INFINITY
            && self.min_y == f64::NEG_INFINITY
            && self.max_x == f64::INFINITY
            && self.max_y == f64::INFINITY
    }

    /// Expand this extent to include another
    pub fn expand(&mut self, other: &Self) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Expand this extent to include a point
    pub fn add_point(&mut self, pt: Coord<f64>) {
        self.min_x = self.min_x.min(pt.x);
        self.min_y = self.min_y.min(pt.y);
        self.max_x = self.max_x.max(pt.x);
        self.max_y = self.max_y.max(pt.y);
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Area of the box; zero for an invalid extent.
    pub fn area(&self) -> f64 {
        if !self.is_valid() {
            return 0.0;
        }
        self.width() * self.height()
    }

    /// Whether the point lies inside or on the border of the extent.
    pub fn contains_point(&self, pt: Coord<f64>) -> bool {
        self.min_x <= pt.x && pt.x <= self.max_x && self.min_y <= pt.y && pt.y <= self.max_y
    }

    /// Whether `other` lies completely inside (or on the border of) this extent.
    pub fn contains(&self, other: &Extent) -> bool {
        self.min_x <= other.min_x
            && other.max_x <= self.max_x
            && self.min_y <= other.min_y
            && other.max_y <= self.max_y
    }

    /// Whether both end points of the line lie in the extent.
    ///
    /// The extent is convex, so this is the same as the whole segment being contained.
    pub fn contains_line(&self, line: &Line<f64>) -> bool {
        self.contains_point(line.start) && self.contains_point(line.end)
    }

    /// Check if this extent overlaps `other` (touching counts)
    pub fn intersects(&self, other: &Extent) -> bool {
        self.max_x >= other.min_x
            && self.min_x <= other.max_x
            && self.max_y >= other.min_y
            && self.min_y <= other.max_y
    }

    /// The four corners, starting at the minimum corner and walking
    /// `(min,min) → (max,min) → (max,max) → (min,max)`.
    pub fn vertices(&self) -> [Coord<f64>; 4] {
        [
            Coord {
                x: self.min_x,
                y: self.min_y,
            },
            Coord {
                x: self.max_x,
                y: self.min_y,
            },
            Coord {
                x: self.max_x,
                y: self.max_y,
            },
            Coord {
                x: self.min_x,
                y: self.max_y,
            },
        ]
    }

    /// The four border segments in [`Extent::vertices`] order.
    pub fn edges(&self) -> [Line<f64>; 4] {
        let v = self.vertices();
        [
            Line::new(v[0], v[1]),
            Line::new(v[1], v[2]),
            Line::new(v[2], v[3]),
            Line::new(v[3], v[0]),
        ]
    }
}

impl From<geo::Rect<f64>> for Extent {
    fn from(rect: geo::Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}
