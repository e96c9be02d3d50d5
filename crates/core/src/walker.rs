//! Stitch labelled triangles back into polygons.
//!
//! The walker is handed the triangles classified inside. It walks them depth first
//! across shared edges, so each walk covers one edge-connected patch. The edges seen
//! by exactly one triangle of the patch are its boundary; they are chained into rings
//! with the patch on the left, and every ring that visits a point twice is cut there:
//!
//! - `a, b, …, b, a` spikes vanish,
//! - `a, b, …, b, c` sub-loops become rings of their own.
//!
//! Loops wound like the patch boundary are shells; loops wound the other way are holes
//! and go to the smallest shell around them. Rings are rotated to their lowest point
//! and rectified under the configured [`WindingOrder`].

use std::collections::HashMap;
use std::f64::consts::TAU;

use geo::{Contains, Coord, LineString, MultiPolygon, Polygon};

use crate::cancel::CancellationToken;
use crate::primitives::{cross, is_ccw, midpoint, point_cmp, rotate_to_lowest_point};
use crate::subdivision::{vertex_key, Triangle, VertexKey};
use crate::winding::WindingOrder;
use crate::{Error, Result};

type EdgeKey = (VertexKey, VertexKey);

fn edge_key(a: Coord<f64>, b: Coord<f64>) -> EdgeKey {
    if point_cmp(a, b).is_le() {
        (vertex_key(a), vertex_key(b))
    } else {
        (vertex_key(b), vertex_key(a))
    }
}

/// Builds polygons out of a set of triangles.
#[derive(Debug, Clone)]
pub struct Walker {
    triangles: Vec<Triangle>,
    edge_map: HashMap<EdgeKey, Vec<usize>>,
    order: WindingOrder,
}

impl Walker {
    pub fn new(triangles: Vec<Triangle>, order: WindingOrder) -> Self {
        let mut edge_map: HashMap<EdgeKey, Vec<usize>> =
            HashMap::with_capacity(triangles.len() * 2);
        for (i, tri) in triangles.iter().enumerate() {
            for edge in tri.edges() {
                edge_map
                    .entry(edge_key(edge.start, edge.end))
                    .or_default()
                    .push(i);
            }
        }
        Self {
            triangles,
            edge_map,
            order,
        }
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Triangles sharing an edge with triangle `idx`.
    pub fn neighbors(&self, idx: usize) -> Vec<usize> {
        let mut out = Vec::with_capacity(3);
        for edge in self.triangles[idx].edges() {
            if let Some(owners) = self.edge_map.get(&edge_key(edge.start, edge.end)) {
                out.extend(owners.iter().copied().filter(|&o| o != idx));
            }
        }
        out
    }

    /// Walk every triangle and collect the resulting polygons.
    pub fn multi_polygon(&self, cancel: &CancellationToken) -> Result<MultiPolygon<f64>> {
        let mut seen = vec![false; self.triangles.len()];
        let mut polygons = Vec::new();
        for idx in 0..self.triangles.len() {
            cancel.check()?;
            if seen[idx] {
                continue;
            }
            polygons.extend(self.polygons_for_triangle(cancel, idx, &mut seen)?);
        }
        log::debug!(
            "walked {} triangles into {} polygons",
            self.triangles.len(),
            polygons.len()
        );
        Ok(MultiPolygon::new(polygons))
    }

    /// Polygons of the patch containing triangle `idx`. Every triangle of the patch is
    /// marked in `seen`.
    pub fn polygons_for_triangle(
        &self,
        cancel: &CancellationToken,
        idx: usize,
        seen: &mut [bool],
    ) -> Result<Vec<Polygon<f64>>> {
        let patch = self.walk_patch(idx, seen);
        let boundary = self.boundary_edges(&patch)?;
        let mut shells: Vec<Vec<Coord<f64>>> = Vec::new();
        let mut holes: Vec<Vec<Coord<f64>>> = Vec::new();

        for ring in trace_rings(&boundary)? {
            cancel.check()?;
            for piece in cut_bubbles(&ring) {
                let area = signed_area(&piece);
                if area > 0.0 {
                    shells.push(piece);
                } else if area < 0.0 {
                    holes.push(piece);
                } else {
                    log::warn!("dropping degenerate ring of {} points", piece.len());
                }
            }
        }

        let mut rings: Vec<Vec<Vec<Coord<f64>>>> = shells.into_iter().map(|s| vec![s]).collect();
        for hole in holes {
            let owner = owning_shell(&rings, &hole).ok_or_else(|| {
                Error::InvariantViolation(format!("hole at {:?} lies outside every shell", hole[0]))
            })?;
            rings[owner].push(hole);
        }

        let mut polygons = Vec::with_capacity(rings.len());
        for mut polygon in rings {
            for ring in polygon.iter_mut() {
                rotate_to_lowest_point(ring);
            }
            if let Some(mut rectified) = self.order.rectify_polygon(polygon) {
                let exterior = LineString::from(rectified.remove(0));
                let interiors = rectified.into_iter().map(LineString::from).collect();
                polygons.push(Polygon::new(exterior, interiors));
            }
        }
        Ok(polygons)
    }

    /// Depth-first walk over shared edges.
    fn walk_patch(&self, idx: usize, seen: &mut [bool]) -> Vec<usize> {
        let mut patch = Vec::new();
        let mut stack = vec![idx];
        seen[idx] = true;
        while let Some(cur) = stack.pop() {
            patch.push(cur);
            for next in self.neighbors(cur) {
                if !seen[next] {
                    seen[next] = true;
                    stack.push(next);
                }
            }
        }
        patch
    }

    /// Directed boundary edges of a patch, patch on the left.
    fn boundary_edges(&self, patch: &[usize]) -> Result<Vec<(Coord<f64>, Coord<f64>)>> {
        let mut out = Vec::new();
        for &idx in patch {
            let tri = self.triangles[idx];
            let [a, b, c] = tri.points();
            let ordered = if is_ccw(a, b, c) { [a, b, c] } else { [a, c, b] };
            for i in 0..3 {
                let (p, q) = (ordered[i], ordered[(i + 1) % 3]);
                match self.edge_map.get(&edge_key(p, q)).map(Vec::len) {
                    Some(1) => out.push((p, q)),
                    Some(2) => {}
                    n => {
                        return Err(Error::InvariantViolation(format!(
                            "edge {p:?} {q:?} shared by {} triangles",
                            n.unwrap_or(0)
                        )))
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Chain directed boundary edges into closed rings.
///
/// Arriving at a point with several ways out, the walk takes the first edge clockwise
/// from the one it came in on, which keeps it hugging the same corner of the patch.
fn trace_rings(edges: &[(Coord<f64>, Coord<f64>)]) -> Result<Vec<Vec<Coord<f64>>>> {
    let mut outgoing: HashMap<VertexKey, Vec<usize>> = HashMap::new();
    for (i, (p, _)) in edges.iter().enumerate() {
        outgoing.entry(vertex_key(*p)).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();
    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut ring = vec![edges[start].0];
        let mut current = start;
        loop {
            if ring.len() > edges.len() {
                return Err(Error::InvariantViolation(
                    "boundary walk did not close".to_string(),
                ));
            }
            let (from, at) = edges[current];
            let next = outgoing
                .get(&vertex_key(at))
                .into_iter()
                .flatten()
                .copied()
                .filter(|&i| !used[i] || i == start)
                .min_by(|&i, &j| {
                    clockwise_turn(at, from, edges[i].1)
                        .total_cmp(&clockwise_turn(at, from, edges[j].1))
                })
                .ok_or_else(|| {
                    Error::InvariantViolation(format!("boundary walk stuck at {at:?}"))
                })?;
            if next == start {
                break;
            }
            used[next] = true;
            ring.push(at);
            current = next;
        }
        rings.push(ring);
    }
    Ok(rings)
}

/// Clockwise angle at `at` from the direction of `from` to the direction of `to`, in
/// `(0, 2π]`.
fn clockwise_turn(at: Coord<f64>, from: Coord<f64>, to: Coord<f64>) -> f64 {
    let back = (from.y - at.y).atan2(from.x - at.x);
    let out = (to.y - at.y).atan2(to.x - at.x);
    let mut turn = back - out;
    while turn <= 0.0 {
        turn += TAU;
    }
    while turn > TAU {
        turn -= TAU;
    }
    turn
}

/// Cut an implicitly closed ring at every repeated point.
///
/// Returns the remaining main ring first (when it keeps three points) followed by the
/// sub-loops cut from it. Pieces shorter than three points are spikes and are dropped.
pub fn cut_bubbles(ring: &[Coord<f64>]) -> Vec<Vec<Coord<f64>>> {
    let mut stack: Vec<Coord<f64>> = Vec::with_capacity(ring.len());
    let mut position: HashMap<VertexKey, usize> = HashMap::with_capacity(ring.len());
    let mut bubbles = Vec::new();

    for &pt in ring {
        let key = vertex_key(pt);
        match position.get(&key) {
            Some(&pos) => {
                let bubble: Vec<Coord<f64>> = stack.drain(pos..).collect();
                for p in &bubble[1..] {
                    position.remove(&vertex_key(*p));
                }
                stack.push(pt);
                if bubble.len() >= 3 {
                    bubbles.push(bubble);
                }
            }
            None => {
                position.insert(key, stack.len());
                stack.push(pt);
            }
        }
    }

    std::iter::once(stack)
        .chain(bubbles)
        .filter(|piece| piece.len() >= 3)
        .collect()
}

/// Shoelace area, positive for counter-clockwise rings in y-up coordinates.
fn signed_area(ring: &[Coord<f64>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let origin = ring[0];
    let mut sum = 0.0;
    for i in 1..ring.len() - 1 {
        sum += cross(ring[i] - origin, ring[i + 1] - origin);
    }
    sum / 2.0
}

/// Index of the smallest shell containing `hole`.
fn owning_shell(polygons: &[Vec<Vec<Coord<f64>>>], hole: &[Coord<f64>]) -> Option<usize> {
    // Boundary edges are never shared, so the middle of a hole edge is strictly inside
    // its shell.
    let probe = midpoint(hole[0], hole[1]);
    polygons
        .iter()
        .enumerate()
        .filter(|(_, rings)| {
            Polygon::new(LineString::from(rings[0].clone()), vec![]).contains(&probe)
        })
        .min_by(|(_, a), (_, b)| signed_area(&a[0]).total_cmp(&signed_area(&b[0])))
        .map(|(i, _)| i)
}
