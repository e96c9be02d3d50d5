//! Top-level repair entry point.
//!
//! [`MakeValid`] runs the whole pipeline on a polygon or multipolygon:
//!
//! 1. reject rings that cannot bound an area
//! 2. label the original rings in a [`HitMap`]
//! 3. split the rings (and clip box) into non-crossing segments
//! 4. triangulate the segment end points and force the segments in as constraints
//! 5. keep the triangles whose centroid the hit-map labels inside
//! 6. walk those triangles back into polygons
//!
//! Lines and points skip the triangulation and are only clipped.

use geo::{Coord, Geometry, MultiPolygon};

use crate::arrangement::destructure;
use crate::cancel::CancellationToken;
use crate::clip::{clip_geometry, geometry_name};
use crate::extent::Extent;
use crate::hitmap::{HitMap, Label};
use crate::subdivision::{Subdivision, Triangle};
use crate::validate::check_input_rings;
use crate::walker::Walker;
use crate::{Error, RepairConfig, Result};

/// Repairs geometries under one [`RepairConfig`].
///
/// Holds no per-call state; one instance can serve any number of threads.
#[derive(Debug, Clone, Default)]
pub struct MakeValid {
    config: RepairConfig,
}

impl MakeValid {
    pub fn new(config: RepairConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    /// Repair `geom`, clipping it to `clip` when one is given.
    ///
    /// # Returns
    ///
    /// Polygonal input comes back as a `MultiPolygon`; lines and points come back clipped.
    /// `None` when nothing is left.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidLineString`] for a ring with fewer than three distinct points or a
    ///   one-point linestring
    /// - [`Error::UnknownGeometry`] for geometry collections
    /// - [`Error::Cancelled`] when `cancel` fires
    /// - any triangulation failure, unchanged
    pub fn make_valid(
        &self,
        cancel: &CancellationToken,
        geom: &Geometry<f64>,
        clip: Option<&Extent>,
    ) -> Result<Option<Geometry<f64>>> {
        let polygons = match geom {
            Geometry::Polygon(p) => MultiPolygon::new(vec![p.clone()]),
            Geometry::MultiPolygon(mp) => mp.clone(),
            Geometry::Rect(r) => MultiPolygon::new(vec![r.to_polygon()]),
            Geometry::Triangle(t) => MultiPolygon::new(vec![t.to_polygon()]),
            Geometry::GeometryCollection(_) => {
                return Err(Error::UnknownGeometry(geometry_name(geom).to_string()))
            }
            _ => {
                let universe = Extent::universe();
                return clip_geometry(cancel, geom, clip.unwrap_or(&universe));
            }
        };

        let repaired = self.repair(cancel, &polygons, clip)?;
        Ok((!repaired.0.is_empty()).then_some(Geometry::MultiPolygon(repaired)))
    }

    /// Repair a multipolygon.
    pub fn repair(
        &self,
        cancel: &CancellationToken,
        polygons: &MultiPolygon<f64>,
        clip: Option<&Extent>,
    ) -> Result<MultiPolygon<f64>> {
        let inside = self.inside_triangles(cancel, polygons, clip)?;
        Walker::new(inside, self.config.winding_order).multi_polygon(cancel)
    }

    /// The constrained triangulation of `polygons`, reduced to the triangles labelled
    /// inside the original rings.
    pub fn inside_triangles(
        &self,
        cancel: &CancellationToken,
        polygons: &MultiPolygon<f64>,
        clip: Option<&Extent>,
    ) -> Result<Vec<Triangle>> {
        check_input_rings(polygons)?;
        let clip = clip.filter(|c| !c.is_universe());

        let hitmap = HitMap::from_polygons(clip, polygons)?;
        if hitmap.rings().is_empty() {
            return Ok(Vec::new());
        }

        let segments = destructure(cancel, clip, polygons)?;
        log::debug!("destructured into {} segments", segments.len());
        if segments.is_empty() {
            return Ok(Vec::new());
        }

        let points: Vec<Coord<f64>> = segments.iter().flat_map(|l| [l.start, l.end]).collect();
        let mut subdivision = Subdivision::new_for_points(cancel, &points, &self.config)?;
        subdivision.insert_constraints(cancel, &segments)?;

        let triangles = subdivision.triangles(false);
        let total = triangles.len();
        let mut inside = Vec::with_capacity(total);
        for tri in triangles {
            cancel.check()?;
            if hitmap.label_for(tri.centroid()) == Label::Inside {
                inside.push(tri);
            }
        }
        log::debug!("{} of {} triangles inside", inside.len(), total);
        Ok(inside)
    }
}
