//! End-to-end repair scenarios driven from GeoJSON input.
//!
//! Each test parses an inline GeoJSON geometry, runs it through [`MakeValid`] (or the
//! subdivision directly) and checks the shape of the result.

use std::collections::HashSet;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use geo::{Area, Coord, Geometry, MultiPolygon, Polygon};
use geojson::GeoJson;
use tilerepair_core::validate::{check_winding, validate_repaired};
use tilerepair_core::{
    CancellationToken, Error, Extent, MakeValid, RepairConfig, Subdivision, WindingOrder,
};

/// Parse an inline GeoJSON geometry or feature into a geo::Geometry
fn parse_geojson(text: &str) -> Geometry<f64> {
    let geojson: GeoJson = text.parse().expect("valid GeoJSON");
    let geometry = match geojson {
        GeoJson::Geometry(g) => g,
        GeoJson::Feature(f) => f.geometry.expect("feature with geometry"),
        GeoJson::FeatureCollection(_) => panic!("FeatureCollection not supported here"),
    };
    geometry.try_into().expect("convertible geometry")
}

fn repair(text: &str, clip: Option<&Extent>) -> Result<Option<Geometry<f64>>, Error> {
    MakeValid::new(RepairConfig::default()).make_valid(
        &CancellationToken::never(),
        &parse_geojson(text),
        clip,
    )
}

fn expect_multipolygon(geom: Option<Geometry<f64>>) -> MultiPolygon<f64> {
    match geom {
        Some(Geometry::MultiPolygon(mp)) => mp,
        other => panic!("expected a multipolygon, got {other:?}"),
    }
}

fn open_exterior(polygon: &Polygon<f64>) -> Vec<Coord<f64>> {
    let mut pts = polygon.exterior().0.clone();
    pts.pop();
    pts
}

fn edge_set(polygon: &Polygon<f64>) -> HashSet<[(u64, u64); 2]> {
    polygon
        .exterior()
        .lines()
        .map(|l| {
            let a = (l.start.x.to_bits(), l.start.y.to_bits());
            let b = (l.end.x.to_bits(), l.end.y.to_bits());
            if a <= b {
                [a, b]
            } else {
                [b, a]
            }
        })
        .collect()
}

fn assert_valid(mp: &MultiPolygon<f64>) {
    let result = validate_repaired(&CancellationToken::never(), mp, WindingOrder::default())
        .expect("validation runs");
    assert!(result.is_valid(), "repaired output invalid: {result:?}");
}

// ========== Clipping Scenarios ==========

#[test]
fn test_square_clipped_to_extent() {
    let square = r#"{"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]}"#;
    let clip = Extent::new(2.0, 2.0, 9.0, 9.0);
    let mp = expect_multipolygon(repair(square, Some(&clip)).unwrap());

    assert_eq!(mp.0.len(), 1);
    assert_eq!(
        open_exterior(&mp.0[0]),
        vec![
            Coord { x: 2.0, y: 2.0 },
            Coord { x: 9.0, y: 2.0 },
            Coord { x: 9.0, y: 9.0 },
            Coord { x: 2.0, y: 9.0 },
        ]
    );
    assert_valid(&mp);
}

#[test]
fn test_square_partly_outside_extent() {
    let square = r#"{"type": "Polygon", "coordinates": [[[5,5],[15,5],[15,15],[5,15],[5,5]]]}"#;
    let clip = Extent::new(0.0, 0.0, 10.0, 10.0);
    let mp = expect_multipolygon(repair(square, Some(&clip)).unwrap());

    assert_eq!(mp.0.len(), 1);
    assert!((mp.unsigned_area() - 25.0).abs() < 1e-9);
    assert_valid(&mp);
}

#[test]
fn test_linestring_feature_is_clipped() {
    let feature = r#"{
        "type": "Feature",
        "properties": {},
        "geometry": {"type": "LineString", "coordinates": [[-5,5],[5,5],[15,5]]}
    }"#;
    let clip = Extent::new(0.0, 0.0, 10.0, 10.0);
    let out = repair(feature, Some(&clip)).unwrap();
    match out {
        Some(Geometry::LineString(ls)) => assert_eq!(ls.0.len(), 3),
        other => panic!("expected a linestring, got {other:?}"),
    }
}

// ========== Repair Scenarios ==========

#[test]
fn test_bowtie_becomes_two_triangles() {
    let bowtie = r#"{"type": "Polygon", "coordinates": [[[0,0],[10,10],[10,0],[0,10],[0,0]]]}"#;
    let mp = expect_multipolygon(repair(bowtie, None).unwrap());

    assert_eq!(mp.0.len(), 2);
    for polygon in &mp.0 {
        assert_eq!(open_exterior(polygon).len(), 3);
    }
    let shared: Vec<_> = edge_set(&mp.0[0])
        .intersection(&edge_set(&mp.0[1]))
        .copied()
        .collect();
    assert!(shared.is_empty(), "triangles share an edge: {shared:?}");

    let first: HashSet<_> = open_exterior(&mp.0[0])
        .iter()
        .map(|c| (c.x.to_bits(), c.y.to_bits()))
        .collect();
    let second: HashSet<_> = open_exterior(&mp.0[1])
        .iter()
        .map(|c| (c.x.to_bits(), c.y.to_bits()))
        .collect();
    let common: Vec<_> = first.intersection(&second).copied().collect();
    assert_eq!(common, vec![(5.0f64.to_bits(), 5.0f64.to_bits())]);
    assert_valid(&mp);
}

#[test]
fn test_reversed_hole_is_reoriented() {
    // The hole is wound the same way as the shell.
    let polygon = r#"{"type": "Polygon", "coordinates": [
        [[0,0],[10,0],[10,10],[0,10],[0,0]],
        [[2,2],[4,2],[4,4],[2,4],[2,2]]
    ]}"#;
    let mp = expect_multipolygon(repair(polygon, None).unwrap());

    assert_eq!(mp.0.len(), 1);
    assert_eq!(mp.0[0].interiors().len(), 1);
    assert!((mp.unsigned_area() - 96.0).abs() < 1e-9);
    assert!(check_winding(&mp, WindingOrder::default()).is_valid());
    assert_valid(&mp);
}

#[test]
fn test_y_up_winding() {
    let polygon = r#"{"type": "Polygon", "coordinates": [
        [[0,0],[10,0],[10,10],[0,10],[0,0]],
        [[2,2],[2,4],[4,4],[4,2],[2,2]]
    ]}"#;
    let repair = MakeValid::new(RepairConfig::new().with_winding_order(WindingOrder::y_up()));
    let out = repair
        .make_valid(&CancellationToken::never(), &parse_geojson(polygon), None)
        .unwrap();
    let mp = expect_multipolygon(out);
    assert!(check_winding(&mp, WindingOrder::y_up()).is_valid());
    assert!(check_winding(&mp, WindingOrder::y_down()).is_invalid());
}

#[test]
fn test_two_point_ring_is_rejected() {
    let degenerate = r#"{"type": "Polygon", "coordinates": [[[0,0],[10,0],[0,0]]]}"#;
    assert_eq!(repair(degenerate, None), Err(Error::InvalidLineString));
}

#[test]
fn test_overlapping_multipolygon_merges() {
    let mp = r#"{"type": "MultiPolygon", "coordinates": [
        [[[0,0],[10,0],[10,10],[0,10],[0,0]]],
        [[[5,5],[15,5],[15,15],[5,15],[5,5]]]
    ]}"#;
    let out = expect_multipolygon(repair(mp, None).unwrap());
    assert_eq!(out.0.len(), 1);
    assert!((out.unsigned_area() - 175.0).abs() < 1e-9);
    assert_valid(&out);
}

#[test]
fn test_star_with_nearly_colinear_pieces_is_valid() {
    let star = r#"{"type": "Polygon", "coordinates": [[
        [2,17],[12,14],[9,11],[6,7],[19,19],[14,8],[16,2],[7,18],[8,11],[8,6],[16,11],[2,17]
    ]]}"#;
    let mp = expect_multipolygon(repair(star, None).unwrap());
    assert!(!mp.0.is_empty());
    assert_valid(&mp);
}

#[test]
fn test_non_finite_coordinate_is_rejected() {
    let polygon = Geometry::Polygon(Polygon::new(
        vec![(0.0, 0.0), (10.0, f64::NAN), (10.0, 10.0), (0.0, 0.0)].into(),
        vec![],
    ));
    let result =
        MakeValid::default().make_valid(&CancellationToken::never(), &polygon, None);
    assert_eq!(result, Err(Error::InvalidLineString));
}

// ========== Constraint Scenarios ==========

#[test]
fn test_crossing_constraint_splits_both() {
    let a = [Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 10.0 }];
    let b = [Coord { x: 10.0, y: 0.0 }, Coord { x: 0.0, y: 10.0 }];
    let pts = [a[0], a[1], b[0], b[1]];
    let cancel = CancellationToken::never();
    let config = RepairConfig::new().with_validate_mutations(true);

    let mut sd = Subdivision::new_for_points(&cancel, &pts, &config).unwrap();
    sd.insert_constraint(&cancel, a[0], a[1]).unwrap();
    assert_eq!(sd.constraint_count(), 1);
    sd.insert_constraint(&cancel, b[0], b[1]).unwrap();
    assert_eq!(sd.constraint_count(), 4);

    let mid = Coord { x: 5.0, y: 5.0 };
    for end in pts {
        let e = sd.find_edge(end, mid).expect("split half present");
        assert!(sd.is_constraint(e));
    }
    assert!(sd.validate().is_ok());
}

// ========== Cancellation Scenarios ==========

fn grid(n: usize) -> Vec<Coord<f64>> {
    let mut pts = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            // Slight shear keeps rows from being exactly cocircular.
            pts.push(Coord {
                x: i as f64 + j as f64 * 1e-3,
                y: j as f64 + i as f64 * 1e-4,
            });
        }
    }
    pts
}

#[test]
fn test_cancelled_triangulation() {
    let token = CancellationToken::new();
    token.cancel();
    let result = Subdivision::new_for_points(&token, &grid(100), &RepairConfig::default());
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[test]
fn test_cancel_from_another_thread() {
    let token = CancellationToken::new();
    let worker_token = token.clone();
    let (tx, rx) = mpsc::channel();

    let handle = thread::spawn(move || {
        let result =
            Subdivision::new_for_points(&worker_token, &grid(120), &RepairConfig::default());
        tx.send(()).ok();
        result.map(|sd| sd.points(false).len())
    });

    // Either the worker finishes first or it sees the flag; it never hands back a
    // half-built subdivision.
    let _ = rx.recv_timeout(Duration::from_millis(5));
    token.cancel();
    match handle.join().expect("worker thread") {
        Ok(count) => assert_eq!(count, 120 * 120),
        Err(e) => assert_eq!(e, Error::Cancelled),
    }
}
