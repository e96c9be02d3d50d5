//! Planar validity repair for vector-tile geometry.
//!
//! Given an arbitrary polygon or multipolygon (self-intersecting, wrongly wound,
//! degenerate) and an optional clip extent, this library produces a topologically
//! valid multipolygon ready to be encoded into a vector tile. Lines and points are
//! clipped to the extent instead.
//!
//! The repair runs in four stages:
//!
//! 1. [`arrangement`] splits every ring segment at every crossing
//! 2. [`subdivision`] triangulates all resulting points (incremental Delaunay over a
//!    [`quadedge`] graph) and forces the segments in as constraints
//! 3. [`hitmap`] labels every triangle inside/outside against the original rings
//! 4. [`walker`] stitches the inside triangles back into rings
//!
//! # Examples
//!
//! ```
//! use geo::{polygon, Geometry};
//! use tilerepair_core::{CancellationToken, Extent, MakeValid, RepairConfig};
//!
//! let square = polygon![
//!     (x: 0.0, y: 0.0),
//!     (x: 10.0, y: 0.0),
//!     (x: 10.0, y: 10.0),
//!     (x: 0.0, y: 10.0),
//! ];
//!
//! let repair = MakeValid::new(RepairConfig::default());
//! let clip = Extent::new(2.0, 2.0, 9.0, 9.0);
//! let repaired = repair
//!     .make_valid(&CancellationToken::never(), &Geometry::Polygon(square), Some(&clip))
//!     .unwrap();
//! assert!(matches!(repaired, Some(Geometry::MultiPolygon(_))));
//! ```

use geo::Coord;
use thiserror::Error;

pub mod arrangement;
pub mod cancel;
pub mod clip;
mod constrained;
pub mod extent;
pub mod hitmap;
pub mod makevalid;
pub mod primitives;
pub mod pseudo_polygon;
pub mod quadedge;
pub mod subdivision;
pub mod validate;
pub mod walker;
pub mod winding;

pub use cancel::CancellationToken;
pub use extent::Extent;
pub use makevalid::MakeValid;
pub use subdivision::Subdivision;
pub use winding::{Winding, WindingOrder};

/// Errors surfaced by the repair engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid linestring: a ring needs 3 distinct points and a line needs 2")]
    InvalidLineString,

    #[error("unknown geometry: {0}")]
    UnknownGeometry(String),

    #[error("invalid starting vertex {0:?}: not present in the subdivision")]
    InvalidStartingVertex(Coord<f64>),

    #[error("invalid end vertex {0:?}: not present in the subdivision")]
    InvalidEndVertex(Coord<f64>),

    #[error("coincidental edges")]
    CoincidentalEdges,

    #[error("all points are colinear")]
    AllPointsColinear,

    #[error("unable to locate {0:?} in the subdivision")]
    LocateFailed(Coord<f64>),

    #[error("no intersecting triangle found between {start:?} and {end:?}")]
    NoIntersectingTriangle { start: Coord<f64>, end: Coord<f64> },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this is the cancellation signal rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Configuration for a repair run
#[derive(Debug, Clone)]
pub struct RepairConfig {
    /// Convention used for naming and rectifying ring orientation
    pub winding_order: WindingOrder,
    /// Margin multiplier used when growing the frame triangle around the input
    pub frame_buffer: f64,
    /// Re-check every graph invariant after each mutation (slow, for debugging)
    pub validate_mutations: bool,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            winding_order: WindingOrder::default(),
            frame_buffer: 10.0,
            validate_mutations: false,
        }
    }
}

impl RepairConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the winding convention for output rings
    pub fn with_winding_order(mut self, order: WindingOrder) -> Self {
        self.winding_order = order;
        self
    }

    /// Set the frame-triangle margin multiplier
    pub fn with_frame_buffer(mut self, buffer: f64) -> Self {
        self.frame_buffer = buffer;
        self
    }

    /// Enable or disable the per-mutation invariant checks
    pub fn with_validate_mutations(mut self, validate: bool) -> Self {
        self.validate_mutations = validate;
        self
    }
}
