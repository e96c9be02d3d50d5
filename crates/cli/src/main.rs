//! CLI for tilerepair - repair GeoJSON geometry for vector tiles
//!
//! This is a thin wrapper around the tilerepair-core library.

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use geojson::{Feature, FeatureCollection, GeoJson};
use tilerepair_core::validate::validate_repaired;
use tilerepair_core::{CancellationToken, Extent, MakeValid, RepairConfig, WindingOrder};

#[derive(Parser, Debug)]
#[command(
    name = "tilerepair",
    about = "Repair polygon validity and clip geometry for vector tiles",
    version
)]
struct Args {
    /// Input GeoJSON file (Geometry, Feature or FeatureCollection); `-` reads stdin
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output GeoJSON file; stdout when omitted
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Clip extent as minx,miny,maxx,maxy
    #[arg(long, value_name = "MINX,MINY,MAXX,MAXY")]
    extent: Option<String>,

    /// Treat y as growing upward when orienting output rings
    #[arg(long)]
    y_up: bool,

    /// Check every repaired polygon for crossings and winding
    #[arg(long)]
    validate: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_extent(s: &str) -> Result<Extent> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("Invalid extent: {s}"))?;
    let &[min_x, min_y, max_x, max_y] = parts.as_slice() else {
        bail!("Extent needs 4 values, got {}", parts.len());
    };
    if min_x > max_x || min_y > max_y {
        bail!("Extent minimum exceeds maximum: {s}");
    }
    Ok(Extent::new(min_x, min_y, max_x, max_y))
}

fn read_input(path: &PathBuf) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn into_features(geojson: GeoJson) -> Vec<Feature> {
    match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![Feature {
            bbox: None,
            geometry: Some(g),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    }
}

/// Repair every feature's geometry; features left without geometry are dropped.
fn repair_features(
    features: Vec<Feature>,
    repair: &MakeValid,
    clip: Option<&Extent>,
    validate: bool,
) -> Result<Vec<Feature>> {
    let cancel = CancellationToken::never();
    let mut out = Vec::with_capacity(features.len());

    for (i, mut feature) in features.into_iter().enumerate() {
        let Some(geometry) = feature.geometry.take() else {
            log::warn!("feature {i} has no geometry, skipping");
            continue;
        };
        let geom: geo::Geometry<f64> = geometry
            .try_into()
            .with_context(|| format!("Feature {i} has an unsupported geometry"))?;

        let repaired = repair
            .make_valid(&cancel, &geom, clip)
            .with_context(|| format!("Failed to repair feature {i}"))?;
        let Some(repaired) = repaired else {
            log::debug!("feature {i} repaired to nothing, dropping");
            continue;
        };

        if validate {
            if let geo::Geometry::MultiPolygon(mp) = &repaired {
                let result = validate_repaired(&cancel, mp, repair.config().winding_order)?;
                if result.is_invalid() {
                    log::warn!("feature {i} failed validation: {result:?}");
                }
            }
        }

        feature.geometry = Some(geojson::Geometry::new(geojson::Value::from(&repaired)));
        out.push(feature);
    }
    Ok(out)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .init();

    let clip = args
        .extent
        .as_deref()
        .map(parse_extent)
        .transpose()
        .context("Failed to parse --extent")?;

    let order = if args.y_up {
        WindingOrder::y_up()
    } else {
        WindingOrder::y_down()
    };
    let repair = MakeValid::new(RepairConfig::new().with_winding_order(order));

    let text = read_input(&args.input)?;
    let geojson: GeoJson = text.parse().context("Failed to parse GeoJSON input")?;
    let features = into_features(geojson);
    let total = features.len();

    let repaired = repair_features(features, &repair, clip.as_ref(), args.validate)?;
    let kept = repaired.len();
    let collection = FeatureCollection {
        bbox: None,
        features: repaired,
        foreign_members: None,
    };
    let json = serde_json::to_string_pretty(&collection).context("Failed to encode GeoJSON")?;

    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✓ Repaired {kept} of {total} features into {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{json}").context("Failed to write output")?;
            log::info!("repaired {kept} of {total} features");
        }
    }

    Ok(())
}
