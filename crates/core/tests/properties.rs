//! Property tests for the repair pipeline over generated rectangles and arbitrary
//! (often self-intersecting) rings.

use geo::{Area, Coord, MultiPolygon, Polygon};
use proptest::prelude::*;
use tilerepair_core::hitmap::{HitMap, Label};
use tilerepair_core::subdivision::Triangle;
use tilerepair_core::validate::{distinct_point_count, validate_repaired};
use tilerepair_core::{CancellationToken, MakeValid, RepairConfig, WindingOrder};

#[derive(Debug, Clone, Copy)]
struct Rect {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Rect {
    fn area(&self) -> f64 {
        (self.max_x - self.min_x) * (self.max_y - self.min_y)
    }

    fn corners(&self) -> Vec<(f64, f64)> {
        vec![
            (self.min_x, self.min_y),
            (self.max_x, self.min_y),
            (self.max_x, self.max_y),
            (self.min_x, self.max_y),
            (self.min_x, self.min_y),
        ]
    }

    fn polygon(&self) -> Polygon<f64> {
        Polygon::new(self.corners().into(), vec![])
    }

    fn overlap(&self, other: &Rect) -> f64 {
        let w = (self.max_x.min(other.max_x) - self.min_x.max(other.min_x)).max(0.0);
        let h = (self.max_y.min(other.max_y) - self.min_y.max(other.min_y)).max(0.0);
        w * h
    }
}

/// Integer-cornered rectangle, offset by `shift`.
fn rect(shift: f64) -> impl Strategy<Value = Rect> {
    (0..40i32, 0..40i32, 1..30i32, 1..30i32).prop_map(move |(x, y, w, h)| Rect {
        min_x: x as f64 + shift,
        min_y: y as f64 + shift,
        max_x: (x + w) as f64 + shift,
        max_y: (y + h) as f64 + shift,
    })
}

/// Rectangle with a hole strictly inside it.
fn rect_with_hole() -> impl Strategy<Value = (Rect, Rect)> {
    (rect(0.0), 0.1..0.4f64, 0.6..0.9f64, 0.1..0.4f64, 0.6..0.9f64).prop_map(
        |(outer, fx0, fx1, fy0, fy1)| {
            let w = outer.max_x - outer.min_x;
            let h = outer.max_y - outer.min_y;
            let hole = Rect {
                min_x: outer.min_x + w * fx0,
                min_y: outer.min_y + h * fy0,
                max_x: outer.min_x + w * fx1,
                max_y: outer.min_y + h * fy1,
            };
            (outer, hole)
        },
    )
}

/// Closed ring through 3 to 10 integer vertices.
fn integer_ring() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((0..20i32, 0..20i32), 3..10)
        .prop_map(|pts| pts.into_iter().map(|(x, y)| (x as f64, y as f64)).collect())
}

/// Closed ring through 3 to 10 arbitrary float vertices.
fn float_ring() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((0.0..20.0f64, 0.0..20.0f64), 3..10)
}

fn ring_polygon(pts: Vec<(f64, f64)>) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![Polygon::new(pts.into(), vec![])])
}

fn triangle_area(tris: &[Triangle]) -> f64 {
    tris.iter()
        .map(|t| {
            let [p, q, r] = t.points();
            ((q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x)).abs() / 2.0
        })
        .sum()
}

/// Repair `input` and check the output: valid, covering exactly the inside triangles,
/// each labelled inside by the original rings, and stable under a second repair.
fn check_general(input: &MultiPolygon<f64>) -> Result<(), TestCaseError> {
    let cancel = CancellationToken::never();
    let repair = MakeValid::default();

    let triangles = repair
        .inside_triangles(&cancel, input, None)
        .map_err(|e| TestCaseError::fail(e.to_string()))?;
    let hitmap =
        HitMap::from_polygons(None, input).map_err(|e| TestCaseError::fail(e.to_string()))?;
    for tri in &triangles {
        prop_assert_eq!(hitmap.label_for(tri.centroid()), Label::Inside);
    }

    let once = repair
        .repair(&cancel, input, None)
        .map_err(|e| TestCaseError::fail(e.to_string()))?;
    assert_valid(&once)?;
    let area = once.unsigned_area();
    prop_assert!((area - triangle_area(&triangles)).abs() < 1e-6 * area.max(1.0));

    let twice = repair
        .repair(&cancel, &once, None)
        .map_err(|e| TestCaseError::fail(e.to_string()))?;
    assert_valid(&twice)?;
    prop_assert!((twice.unsigned_area() - area).abs() < 1e-6 * area.max(1.0));
    Ok(())
}

fn repair(mp: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    MakeValid::new(RepairConfig::default())
        .repair(&CancellationToken::never(), mp, None)
        .expect("repair succeeds")
}

/// Every ring as a sorted list of its distinct points.
fn ring_sets(mp: &MultiPolygon<f64>) -> Vec<Vec<(u64, u64)>> {
    let mut sets: Vec<Vec<(u64, u64)>> = mp
        .0
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
        .map(|ring| {
            let mut pts: Vec<(u64, u64)> = ring
                .0
                .iter()
                .map(|c: &Coord<f64>| (c.x.to_bits(), c.y.to_bits()))
                .collect();
            pts.sort_unstable();
            pts.dedup();
            pts
        })
        .collect();
    sets.sort();
    sets
}

fn assert_valid(mp: &MultiPolygon<f64>) -> Result<(), TestCaseError> {
    let result = validate_repaired(&CancellationToken::never(), mp, WindingOrder::default())
        .map_err(|e| TestCaseError::fail(e.to_string()))?;
    prop_assert!(result.is_valid(), "invalid output: {:?}", result);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_rectangle_round_trips(r in rect(0.0)) {
        let input = MultiPolygon::new(vec![r.polygon()]);
        let out = repair(&input);
        prop_assert!((out.unsigned_area() - r.area()).abs() < 1e-9);
        prop_assert_eq!(ring_sets(&out), ring_sets(&input));
        assert_valid(&out)?;
    }

    #[test]
    fn test_hole_round_trips((outer, hole) in rect_with_hole()) {
        let polygon = Polygon::new(outer.corners().into(), vec![hole.corners().into()]);
        let input = MultiPolygon::new(vec![polygon]);
        let out = repair(&input);
        prop_assert_eq!(out.0.len(), 1);
        prop_assert_eq!(out.0[0].interiors().len(), 1);
        prop_assert!((out.unsigned_area() - (outer.area() - hole.area())).abs() < 1e-6);
        prop_assert_eq!(ring_sets(&out), ring_sets(&input));
        assert_valid(&out)?;
    }

    #[test]
    fn test_repair_is_idempotent((outer, hole) in rect_with_hole()) {
        let polygon = Polygon::new(outer.corners().into(), vec![hole.corners().into()]);
        let once = repair(&MultiPolygon::new(vec![polygon]));
        let twice = repair(&once);
        prop_assert!((once.unsigned_area() - twice.unsigned_area()).abs() < 1e-6);
        prop_assert_eq!(ring_sets(&once), ring_sets(&twice));
    }

    #[test]
    fn test_overlapping_pair_is_valid(a in rect(0.0), b in rect(0.5)) {
        let input = MultiPolygon::new(vec![a.polygon(), b.polygon()]);
        let out = repair(&input);
        let union = a.area() + b.area() - a.overlap(&b);
        prop_assert!((out.unsigned_area() - union).abs() < 1e-6);
        assert_valid(&out)?;
    }

    #[test]
    fn test_inside_triangles_match_hitmap(a in rect(0.0), b in rect(0.5)) {
        let input = MultiPolygon::new(vec![a.polygon(), b.polygon()]);
        let triangles = MakeValid::default()
            .inside_triangles(&CancellationToken::never(), &input, None)
            .expect("triangulation succeeds");
        let hitmap = HitMap::from_polygons(None, &input).expect("hit-map builds");
        for tri in &triangles {
            prop_assert_eq!(hitmap.label_for(tri.centroid()), Label::Inside);
        }
        let area = triangle_area(&triangles);
        prop_assert!((area - (a.area() + b.area() - a.overlap(&b))).abs() < 1e-6);
    }

    #[test]
    fn test_integer_ring_repairs_cleanly(pts in integer_ring()) {
        let input = ring_polygon(pts);
        prop_assume!(distinct_point_count(input.0[0].exterior()) >= 3);
        check_general(&input)?;
    }

    #[test]
    fn test_float_ring_repairs_cleanly(pts in float_ring()) {
        let input = ring_polygon(pts);
        prop_assume!(distinct_point_count(input.0[0].exterior()) >= 3);
        check_general(&input)?;
    }
}
