//! Bounded variation operators.

use rand::prelude::*;

use super::{Bounds, DecisionVector};

pub const SBX_ETA: f64 = 15.0;
/// Probability that SBX touches a given variable.
pub const SBX_VARIABLE_PROB: f64 = 0.5;
pub const MUTATION_ETA: f64 = 20.0;

/// Simulated binary crossover with bound-aware spread (Deb 1995).
pub fn sbx_crossover(
    p1: &[f64],
    p2: &[f64],
    bounds: &Bounds,
    eta: f64,
    rng: &mut dyn RngCore,
) -> (DecisionVector, DecisionVector) {
    assert_eq!(p1.len(), p2.len(), "parent size mismatch");
    let mut c1 = p1.to_vec();
    let mut c2 = p2.to_vec();

    for i in 0..p1.len() {
        if rng.gen::<f64>() > SBX_VARIABLE_PROB {
            continue;
        }
        let (lo, hi) = (bounds.lo[i], bounds.hi[i]);
        let x1 = p1[i].min(p2[i]);
        let x2 = p1[i].max(p2[i]);
        if (x2 - x1).abs() <= 1e-14 {
            continue;
        }

        let u: f64 = rng.gen();
        let spread = |beta: f64| -> f64 {
            let alpha = 2.0 - beta.powf(-(eta + 1.0));
            if u <= 1.0 / alpha {
                (u * alpha).powf(1.0 / (eta + 1.0))
            } else {
                (1.0 / (2.0 - u * alpha)).powf(1.0 / (eta + 1.0))
            }
        };
        let beta_lo = spread(1.0 + 2.0 * (x1 - lo) / (x2 - x1));
        let beta_hi = spread(1.0 + 2.0 * (hi - x2) / (x2 - x1));
        let y1 = (0.5 * (x1 + x2 - beta_lo * (x2 - x1))).clamp(lo, hi);
        let y2 = (0.5 * (x1 + x2 + beta_hi * (x2 - x1))).clamp(lo, hi);

        if rng.gen_bool(0.5) {
            c1[i] = y2;
            c2[i] = y1;
        } else {
            c1[i] = y1;
            c2[i] = y2;
        }
    }
    (c1, c2)
}

/// Swap each variable between the parents with probability one half.
pub fn uniform_crossover(p1: &[f64], p2: &[f64], rng: &mut dyn RngCore) -> (DecisionVector, DecisionVector) {
    assert_eq!(p1.len(), p2.len(), "parent size mismatch");
    let mut c1 = p1.to_vec();
    let mut c2 = p2.to_vec();
    for i in 0..p1.len() {
        if rng.gen_bool(0.5) {
            std::mem::swap(&mut c1[i], &mut c2[i]);
        }
    }
    (c1, c2)
}

/// Bounded polynomial mutation; each variable mutates with probability
/// `indpb`.
pub fn polynomial_mutation(x: &mut [f64], bounds: &Bounds, eta: f64, indpb: f64, rng: &mut dyn RngCore) {
    let power = 1.0 / (eta + 1.0);
    for (i, v) in x.iter_mut().enumerate() {
        let width = bounds.width(i);
        if width <= 0.0 || rng.gen::<f64>() > indpb {
            continue;
        }
        let d1 = (*v - bounds.lo[i]) / width;
        let d2 = (bounds.hi[i] - *v) / width;
        let u: f64 = rng.gen();
        let dq = if u < 0.5 {
            let val = 2.0 * u + (1.0 - 2.0 * u) * (1.0 - d1).powf(eta + 1.0);
            val.powf(power) - 1.0
        } else {
            let val = 2.0 * (1.0 - u) + 2.0 * (u - 0.5) * (1.0 - d2).powf(eta + 1.0);
            1.0 - val.powf(power)
        };
        *v = (*v + dq * width).clamp(bounds.lo[i], bounds.hi[i]);
    }
}

/// Resample each variable uniformly within bounds with probability `indpb`.
pub fn uniform_mutation(x: &mut [f64], bounds: &Bounds, indpb: f64, rng: &mut dyn RngCore) {
    for (i, v) in x.iter_mut().enumerate() {
        if rng.gen::<f64>() < indpb {
            *v = bounds.lo[i] + rng.gen::<f64>() * bounds.width(i);
        }
    }
}

/// Default per-variable mutation probability, `1/n`.
pub fn default_indpb(dimension: usize) -> f64 {
    1.0 / dimension.max(1) as f64
}
