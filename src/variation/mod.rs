//! Decision-space representation: bounds, repair and sampling.

pub mod operators;

use rand::prelude::*;

use crate::model::{OptimisationSpec, VariableKind};

pub use operators::{polynomial_mutation, sbx_crossover, uniform_crossover, uniform_mutation};

/// A point in decision space, one value per variable.
pub type DecisionVector = Vec<f64>;

#[derive(Clone, Debug, PartialEq)]
pub struct Bounds {
    pub lo: Vec<f64>,
    pub hi: Vec<f64>,
    pub kinds: Vec<VariableKind>,
}

impl Bounds {
    pub fn new(lo: Vec<f64>, hi: Vec<f64>, kinds: Vec<VariableKind>) -> Self {
        assert_eq!(lo.len(), hi.len(), "bound size mismatch");
        assert_eq!(lo.len(), kinds.len(), "bound size mismatch");
        Self { lo, hi, kinds }
    }

    pub fn from_spec(spec: &OptimisationSpec) -> Self {
        Self {
            lo: spec.variables.iter().map(|v| v.lo).collect(),
            hi: spec.variables.iter().map(|v| v.hi).collect(),
            kinds: spec.variables.iter().map(|v| v.kind()).collect(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.lo.len()
    }

    pub fn width(&self, i: usize) -> f64 {
        self.hi[i] - self.lo[i]
    }

    pub fn clamp(&self, x: &mut [f64]) {
        for (i, v) in x.iter_mut().enumerate() {
            if !v.is_finite() {
                *v = self.lo[i];
            }
            *v = v.clamp(self.lo[i], self.hi[i]);
        }
    }

    /// Clamp, then round to the model resolution. Durations are whole
    /// milliseconds and priorities whole numbers, so both kinds round.
    pub fn repair(&self, x: &mut [f64]) {
        self.clamp(x);
        for (i, v) in x.iter_mut().enumerate() {
            *v = v.round().clamp(self.lo[i], self.hi[i]);
        }
    }

    pub fn uniform(&self, rng: &mut dyn RngCore) -> DecisionVector {
        (0..self.dimension())
            .map(|i| self.lo[i] + rng.gen::<f64>() * self.width(i))
            .collect()
    }

    /// `n` points, one per stratum in every dimension, strata shuffled
    /// independently per dimension.
    pub fn latin_hypercube(&self, n: usize, rng: &mut dyn RngCore) -> Vec<DecisionVector> {
        let mut points = vec![vec![0.0; self.dimension()]; n];
        if n == 0 {
            return points;
        }
        let mut strata: Vec<usize> = (0..n).collect();
        for i in 0..self.dimension() {
            strata.shuffle(rng);
            for (point, &s) in points.iter_mut().zip(&strata) {
                let u = (s as f64 + rng.gen::<f64>()) / n as f64;
                point[i] = self.lo[i] + u * self.width(i);
            }
        }
        points
    }

    /// Map into the unit cube; fixed dimensions map to 0.
    pub fn to_unit(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .enumerate()
            .map(|(i, v)| {
                let w = self.width(i);
                if w > 0.0 {
                    (v - self.lo[i]) / w
                } else {
                    0.0
                }
            })
            .collect()
    }

    pub fn from_unit(&self, u: &[f64]) -> DecisionVector {
        u.iter()
            .enumerate()
            .map(|(i, v)| self.lo[i] + v.clamp(0.0, 1.0) * self.width(i))
            .collect()
    }
}
