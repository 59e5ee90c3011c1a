//! Front quality indicators, the Pareto archive and the plateau detector.
//!
//! All objectives are minimised. A point contributes to the hypervolume
//! only if it strictly dominates the reference point.

pub mod archive;
pub mod plateau;

use serde::Serialize;

use crate::error::IndicatorComputationError;

pub use archive::Archive;
pub use plateau::PlateauDetector;

/// `a` is no worse than `b` everywhere and better somewhere.
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    let mut strictly = false;
    for (x, y) in a.iter().zip(b) {
        if x > y {
            return false;
        }
        if x < y {
            strictly = true;
        }
    }
    strictly
}

fn check_dimensions(points: &[Vec<f64>], dim: usize) -> Result<(), IndicatorComputationError> {
    match points.iter().find(|p| p.len() != dim) {
        Some(p) => Err(IndicatorComputationError::DimensionMismatch {
            expected: dim,
            actual: p.len(),
        }),
        None => Ok(()),
    }
}

/// Hypervolume dominated by `points` and bounded by `reference`.
pub fn hypervolume(points: &[Vec<f64>], reference: &[f64]) -> Result<f64, IndicatorComputationError> {
    if points.is_empty() {
        return Err(IndicatorComputationError::EmptyFront);
    }
    if let Some(k) = reference.iter().position(|r| !r.is_finite()) {
        return Err(IndicatorComputationError::DegenerateReference(k));
    }
    check_dimensions(points, reference.len())?;

    let inside: Vec<Vec<f64>> = points
        .iter()
        .filter(|p| p.iter().zip(reference).all(|(x, r)| x < r))
        .cloned()
        .collect();
    Ok(match reference.len() {
        0 => 0.0,
        1 => volume_1d(&inside, reference),
        2 => sweep_2d(inside, reference),
        _ => slice_nd(inside, reference),
    })
}

fn volume_1d(points: &[Vec<f64>], reference: &[f64]) -> f64 {
    points
        .iter()
        .map(|p| reference[0] - p[0])
        .fold(0.0, f64::max)
}

fn sweep_2d(mut points: Vec<Vec<f64>>, reference: &[f64]) -> f64 {
    points.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
    let mut volume = 0.0;
    let mut ceiling = reference[1];
    for p in &points {
        if p[1] < ceiling {
            volume += (reference[0] - p[0]) * (ceiling - p[1]);
            ceiling = p[1];
        }
    }
    volume
}

/// Slice along the last objective: between consecutive levels the covered
/// region is the (d-1)-dimensional volume of every point at or below the
/// level.
fn slice_nd(mut points: Vec<Vec<f64>>, reference: &[f64]) -> f64 {
    let d = reference.len();
    if d == 2 {
        return sweep_2d(points, reference);
    }
    let last = d - 1;
    points.sort_by(|a, b| a[last].total_cmp(&b[last]));
    let lower = &reference[..last];
    let mut volume = 0.0;
    for i in 0..points.len() {
        let top = points.get(i + 1).map_or(reference[last], |p| p[last]);
        let depth = top - points[i][last];
        if depth <= 0.0 {
            continue;
        }
        let projected: Vec<Vec<f64>> = points[..=i].iter().map(|p| p[..last].to_vec()).collect();
        volume += depth * slice_nd(projected, lower);
    }
    volume
}

/// Exclusive hypervolume contribution of each point.
pub fn contributions(points: &[Vec<f64>], reference: &[f64]) -> Result<Vec<f64>, IndicatorComputationError> {
    let total = hypervolume(points, reference)?;
    let mut out = Vec::with_capacity(points.len());
    for i in 0..points.len() {
        let rest: Vec<Vec<f64>> = points
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, p)| p.clone())
            .collect();
        let without = if rest.is_empty() {
            0.0
        } else {
            hypervolume(&rest, reference)?
        };
        out.push((total - without).max(0.0));
    }
    Ok(out)
}

/// IGD+ of `approximation` against `reference_front`: the mean over
/// reference points of the distance to the nearest approximation point,
/// counting only the objectives where the approximation is worse.
pub fn igd_plus(approximation: &[Vec<f64>], reference_front: &[Vec<f64>]) -> Result<f64, IndicatorComputationError> {
    if approximation.is_empty() || reference_front.is_empty() {
        return Err(IndicatorComputationError::EmptyFront);
    }
    let dim = reference_front[0].len();
    check_dimensions(reference_front, dim)?;
    check_dimensions(approximation, dim)?;

    let total: f64 = reference_front
        .iter()
        .map(|z| {
            approximation
                .iter()
                .map(|a| {
                    a.iter()
                        .zip(z)
                        .map(|(ak, zk)| (ak - zk).max(0.0).powi(2))
                        .sum::<f64>()
                        .sqrt()
                })
                .fold(f64::INFINITY, f64::min)
        })
        .sum();
    Ok(total / reference_front.len() as f64)
}

/// One row of the per-generation indicator trace. `NaN` marks a value
/// that could not be computed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TraceEntry {
    pub generation: usize,
    pub hypervolume: f64,
    pub igd_plus: f64,
}
