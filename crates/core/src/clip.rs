//! Clipping lines and points to an extent.
//!
//! Polygons are clipped as part of the repair in [`crate::makevalid`]; everything
//! else only needs cutting to the clip box. The border of the extent counts as inside.
//!
//! # Lines
//!
//! A linestring is walked segment by segment keeping track of whether the last point
//! was inside. Every transition computes the (at most two) points where the segment
//! crosses the extent border, ordered along the segment, and either closes the current
//! output line or starts a new one. Output lines shorter than two points are dropped.

use geo::{Coord, Geometry, Line, LineString, MultiLineString, MultiPoint, Point};

use crate::cancel::CancellationToken;
use crate::extent::Extent;
use crate::primitives::{distance_squared, point_equal, segment_intersect};
use crate::{Error, Result};

/// Clip a lineal or puntal geometry to `clip`.
///
/// # Returns
///
/// `None` when nothing of the geometry is left. A linestring cut into several pieces
/// comes back as a `MultiLineString`.
///
/// # Errors
///
/// [`Error::InvalidLineString`] for a one-point linestring and
/// [`Error::UnknownGeometry`] for polygonal or collection input.
pub fn clip_geometry(
    cancel: &CancellationToken,
    geom: &Geometry<f64>,
    clip: &Extent,
) -> Result<Option<Geometry<f64>>> {
    match geom {
        Geometry::Point(pt) => Ok(clip_point(pt, clip).map(Geometry::Point)),
        Geometry::MultiPoint(mp) => {
            let clipped = clip_multipoint(mp, clip);
            Ok((!clipped.0.is_empty()).then_some(Geometry::MultiPoint(clipped)))
        }
        Geometry::Line(line) => {
            let ls = LineString::from(vec![line.start, line.end]);
            lineal(clip_linestring(cancel, &ls, clip)?)
        }
        Geometry::LineString(ls) => lineal(clip_linestring(cancel, ls, clip)?),
        Geometry::MultiLineString(mls) => {
            let clipped = clip_multilinestring(cancel, mls, clip)?;
            Ok((!clipped.0.is_empty()).then_some(Geometry::MultiLineString(clipped)))
        }
        other => Err(Error::UnknownGeometry(geometry_name(other).to_string())),
    }
}

fn lineal(mut mls: MultiLineString<f64>) -> Result<Option<Geometry<f64>>> {
    Ok(match mls.0.len() {
        0 => None,
        1 => mls.0.pop().map(Geometry::LineString),
        _ => Some(Geometry::MultiLineString(mls)),
    })
}

pub(crate) fn geometry_name(geom: &Geometry<f64>) -> &'static str {
    match geom {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

pub fn clip_point(point: &Point<f64>, clip: &Extent) -> Option<Point<f64>> {
    clip.contains_point(point.0).then_some(*point)
}

/// Keep the points inside `clip`.
pub fn clip_multipoint(points: &MultiPoint<f64>, clip: &Extent) -> MultiPoint<f64> {
    if clip.is_universe() {
        return points.clone();
    }
    points
        .iter()
        .filter(|pt| clip.contains_point(pt.0))
        .copied()
        .collect()
}

/// Clip every line of `lines` and concatenate the pieces.
pub fn clip_multilinestring(
    cancel: &CancellationToken,
    lines: &MultiLineString<f64>,
    clip: &Extent,
) -> Result<MultiLineString<f64>> {
    if clip.is_universe() {
        return Ok(lines.clone());
    }
    let mut out = Vec::new();
    for ls in lines {
        out.extend(clip_linestring(cancel, ls, clip)?);
    }
    Ok(MultiLineString::new(out))
}

/// Cut a linestring to `clip`, breaking it into several lines where it leaves the extent.
///
/// # Errors
///
/// [`Error::InvalidLineString`] for a linestring of a single point; an empty linestring
/// clips to nothing.
pub fn clip_linestring(
    cancel: &CancellationToken,
    ls: &LineString<f64>,
    clip: &Extent,
) -> Result<MultiLineString<f64>> {
    let pts = &ls.0;
    match pts.len() {
        0 => return Ok(MultiLineString::new(vec![])),
        1 => return Err(Error::InvalidLineString),
        _ => {}
    }
    if clip.is_universe() || pts.iter().all(|pt| clip.contains_point(*pt)) {
        return Ok(MultiLineString::new(vec![ls.clone()]));
    }

    let mut out: Vec<LineString<f64>> = Vec::new();
    let mut current: Vec<Coord<f64>> = Vec::new();
    let mut last_in = clip.contains_point(pts[0]);
    if last_in {
        current.push(pts[0]);
    }

    for pair in pts.windows(2) {
        cancel.check()?;
        let seg = Line::new(pair[0], pair[1]);
        let cur_in = clip.contains_point(seg.end);

        match (last_in, cur_in) {
            (true, true) => current.push(seg.end),
            (false, true) => {
                if let Some(entry) = border_crossings(clip, seg).first() {
                    if !point_equal(*entry, seg.end) {
                        current.push(*entry);
                    }
                }
                current.push(seg.end);
            }
            (true, false) => {
                for ipt in border_crossings(clip, seg) {
                    if current.last().map_or(true, |last| !point_equal(*last, ipt)) {
                        current.push(ipt);
                    }
                }
                flush(&mut out, &mut current);
            }
            (false, false) => {
                // Both ends outside; the segment may still pass through.
                let crossings = border_crossings(clip, seg);
                if let [first, second] = crossings.as_slice() {
                    out.push(LineString::from(vec![*first, *second]));
                }
            }
        }
        last_in = cur_in;
    }
    flush(&mut out, &mut current);

    log::trace!("clipped {} points into {} lines", pts.len(), out.len());
    Ok(MultiLineString::new(out))
}

fn flush(out: &mut Vec<LineString<f64>>, current: &mut Vec<Coord<f64>>) {
    let pts = std::mem::take(current);
    if pts.len() > 1 {
        out.push(LineString::from(pts));
    }
}

/// Up to two distinct points where `seg` meets the border of `clip`, ordered from the
/// segment's start.
fn border_crossings(clip: &Extent, seg: Line<f64>) -> Vec<Coord<f64>> {
    if clip.is_universe() {
        return Vec::new();
    }
    let mut pts: Vec<Coord<f64>> = Vec::with_capacity(2);
    for edge in clip.edges() {
        let Some(pt) = segment_intersect(edge, seg) else {
            continue;
        };
        if pts.iter().any(|p| point_equal(*p, pt)) {
            continue;
        }
        pts.push(pt);
        if pts.len() == 2 {
            break;
        }
    }
    pts.sort_by(|a, b| {
        distance_squared(seg.start, *a).total_cmp(&distance_squared(seg.start, *b))
    });
    pts
}
