//! Inside/outside labelling against the original rings.
//!
//! A [`HitMap`] answers "is this point inside the geometry as the caller drew it?".
//! Outer rings are labelled [`Label::Inside`] and count their border as inside; holes
//! are labelled [`Label::Outside`]. Rings are tested smallest bounding box first and the
//! first ring containing the point decides its label.
//!
//! Rings with many segments carry an R-tree over their segments so a ray cast only
//! touches the segments whose boxes it crosses.

use geo::{Coord, Line, MultiPolygon};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use crate::extent::Extent;
use crate::primitives::{are_lines_colinear, is_point_on_segment, point_equal, segment_intersect};
use crate::{Error, Result};

/// Rings with more segments than this get an R-tree.
const INDEX_THRESHOLD: usize = 16;

type SegmentBox = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Which side of the original geometry a point falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Inside,
    Outside,
}

/// One labelled ring of the hit-map.
#[derive(Debug, Clone)]
pub struct Ring {
    segments: Vec<Line<f64>>,
    bbox: Extent,
    index: Option<RTree<SegmentBox>>,
    include_border: bool,
    label: Label,
}

impl Ring {
    /// Build a ring from its points; a repeated closing point is ignored.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidLineString`] for fewer than two points.
    pub fn new(points: &[Coord<f64>], label: Label) -> Result<Self> {
        let mut pts = points;
        if pts.len() > 1 && pts[0] == pts[pts.len() - 1] {
            pts = &pts[..pts.len() - 1];
        }
        if pts.len() < 2 {
            return Err(Error::InvalidLineString);
        }

        let segments: Vec<Line<f64>> = (0..pts.len())
            .map(|i| Line::new(pts[i], pts[(i + 1) % pts.len()]))
            .collect();
        let bbox = Extent::from_points(pts.iter().copied());

        let index = (segments.len() > INDEX_THRESHOLD).then(|| {
            let boxes = segments
                .iter()
                .enumerate()
                .map(|(i, seg)| {
                    let rect = Rectangle::from_corners(
                        [seg.start.x, seg.start.y],
                        [seg.end.x, seg.end.y],
                    );
                    GeomWithData::new(rect, i)
                })
                .collect();
            RTree::bulk_load(boxes)
        });

        Ok(Self {
            segments,
            bbox,
            index,
            include_border: label == Label::Inside,
            label,
        })
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn extent(&self) -> &Extent {
        &self.bbox
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    /// Ray-cast containment test.
    ///
    /// A point on the border reports the ring's `include_border` setting. A ray passing
    /// through a segment end point counts that segment only when its other end point is
    /// not above the ray.
    pub fn contains_point(&self, pt: Coord<f64>) -> bool {
        if !self.bbox.contains_point(pt) {
            return false;
        }
        let ray = Line::new(
            Coord {
                x: self.bbox.min_x - 1.0,
                y: pt.y,
            },
            pt,
        );

        let candidates: Vec<usize> = match &self.index {
            Some(tree) => {
                let envelope = AABB::from_corners([ray.start.x, pt.y], [pt.x, pt.y]);
                tree.locate_in_envelope_intersecting(&envelope)
                    .map(|entry| entry.data)
                    .collect()
            }
            None => (0..self.segments.len()).collect(),
        };

        let mut count = 0;
        for idx in candidates {
            let seg = self.segments[idx];
            if are_lines_colinear(ray, seg) {
                if is_point_on_segment(pt, seg) {
                    return self.include_border;
                }
                continue;
            }
            let Some(ipt) = segment_intersect(ray, seg) else {
                continue;
            };
            if point_equal(ipt, pt) {
                return self.include_border;
            }
            if point_equal(seg.start, ipt) {
                if seg.end.y > pt.y {
                    continue;
                }
            } else if point_equal(seg.end, ipt) && seg.start.y > pt.y {
                continue;
            }
            count += 1;
        }
        count % 2 == 1
    }
}

/// Labelled rings of one input geometry.
#[derive(Debug, Clone)]
pub struct HitMap {
    clip_box: Extent,
    rings: Vec<Ring>,
}

impl HitMap {
    /// Build from polygons: shells inside, holes outside.
    ///
    /// Without a `clip` the clip box is the union of the ring extents. Empty rings are
    /// skipped.
    pub fn from_polygons(clip: Option<&Extent>, polygons: &MultiPolygon<f64>) -> Result<Self> {
        let mut rings = Vec::new();
        let mut bounds = Extent::empty();

        for polygon in polygons {
            let exterior = polygon.exterior();
            if exterior.0.is_empty() {
                continue;
            }
            rings.push(Ring::new(&exterior.0, Label::Inside)?);
            for hole in polygon.interiors() {
                if hole.0.is_empty() {
                    continue;
                }
                rings.push(Ring::new(&hole.0, Label::Outside)?);
            }
        }
        for ring in &rings {
            bounds.expand(ring.extent());
        }

        rings.sort_by(|a, b| {
            a.extent()
                .area()
                .total_cmp(&b.extent().area())
                .then_with(|| (a.label == Label::Inside).cmp(&(b.label == Label::Inside)))
        });

        log::debug!(
            "hit-map over {} rings ({} indexed)",
            rings.len(),
            rings.iter().filter(|r| r.is_indexed()).count()
        );

        Ok(Self {
            clip_box: clip.copied().unwrap_or(bounds),
            rings,
        })
    }

    /// Label of `pt`: outside the clip box is always [`Label::Outside`]; otherwise the
    /// label of the smallest ring containing it, or [`Label::Outside`] if none does.
    pub fn label_for(&self, pt: Coord<f64>) -> Label {
        if !self.clip_box.contains_point(pt) {
            return Label::Outside;
        }
        self.rings
            .iter()
            .find(|ring| ring.contains_point(pt))
            .map_or(Label::Outside, |ring| ring.label)
    }

    pub fn extent(&self) -> Extent {
        self.clip_box
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }
}
