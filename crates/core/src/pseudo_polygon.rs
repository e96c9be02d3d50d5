//! Pseudo-polygon retriangulation.
//!
//! Removing the edges crossed by a new constraint `a → b` leaves a cavity on each
//! side of the constraint. Each cavity is a chain `[a, v1, …, vk, b]` whose every
//! vertex sees the base `a–b`. It is retriangulated by picking a pivot `c` whose
//! circle through `a`, `c` and `b` holds no other chain vertex, emitting `(a, c, b)`
//! and recursing on `[a … c]` and `[c … b]`.

use geo::Coord;

use crate::primitives::{distance_squared, in_circle, midpoint, orient};
use crate::subdivision::Triangle;
use crate::{Error, Result};

/// Triangulate the pseudo-polygon closed by `chain`'s first and last points.
///
/// # Returns
///
/// `chain.len() - 2` triangles. Chains of one or two points produce none.
///
/// # Errors
///
/// [`Error::AllPointsColinear`] when every inner vertex lies on the base line.
pub fn triangulate(chain: &[Coord<f64>]) -> Result<Vec<Triangle>> {
    let mut out = Vec::with_capacity(chain.len().saturating_sub(2));
    triangulate_into(chain, &mut out)?;
    Ok(out)
}

fn triangulate_into(chain: &[Coord<f64>], out: &mut Vec<Triangle>) -> Result<()> {
    if chain.len() <= 2 {
        return Ok(());
    }
    let a = chain[0];
    let b = chain[chain.len() - 1];
    let inner = &chain[1..chain.len() - 1];

    let ci = pivot(a, b, inner).ok_or(Error::AllPointsColinear)? + 1;
    out.push(Triangle::new(a, chain[ci], b));

    triangulate_into(&chain[..=ci], out)?;
    triangulate_into(&chain[ci..], out)
}

/// Index into `inner` of the vertex whose circle through `a` and `b` is empty.
///
/// Starts from the vertex nearest the base midpoint and moves to any vertex found
/// inside the current candidate's circumcircle until none is left.
fn pivot(a: Coord<f64>, b: Coord<f64>, inner: &[Coord<f64>]) -> Option<usize> {
    let mid = midpoint(a, b);
    let candidates: Vec<usize> = (0..inner.len())
        .filter(|&i| orient(a, b, inner[i]) != 0.0)
        .collect();

    let mut best = *candidates.iter().min_by(|&&i, &&j| {
        distance_squared(inner[i], mid).total_cmp(&distance_squared(inner[j], mid))
    })?;

    // Circles through a and b on one side nest, so each move shrinks the candidate
    // circle and the loop ends within one pass per candidate.
    for _ in 0..candidates.len() {
        let moved = candidates
            .iter()
            .copied()
            .find(|&i| i != best && in_circle(a, inner[best], b, inner[i]));
        match moved {
            Some(i) => best = i,
            None => break,
        }
    }
    Some(best)
}
