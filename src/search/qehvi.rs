use rand::prelude::*;
use rand_distr::StandardNormal;
use statrs::function::erf::erfc;
use tracing::debug;

use super::gp::GaussianProcess;
use super::{Individual, PopulationUpdate, SearchContext};
use crate::indicator::{dominates, hypervolume};
use crate::variation::DecisionVector;

/// Violations that never verified are modelled as this large finite value.
const UNVERIFIED_VIOLATION: f64 = 1e8;
/// Perturbation width, in unit-cube coordinates, around archived points.
const PERTURBATION: f64 = 0.1;

/// Batch Bayesian optimisation: Monte-Carlo expected hypervolume
/// improvement weighted by the probability of feasibility.
#[derive(Debug, Default)]
pub struct Qehvi {
    designed: bool,
}

impl Qehvi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ask(&mut self, ctx: &mut SearchContext) -> Vec<DecisionVector> {
        let q = ctx.settings.batch.max(1);
        if !self.designed {
            let n = (2 * ctx.bounds.dimension()).max(q);
            return ctx.bounds.latin_hypercube(n, &mut ctx.rng);
        }
        match Surrogate::fit(ctx) {
            Some(surrogate) => surrogate.select(ctx, q),
            None => (0..q).map(|_| ctx.bounds.uniform(&mut ctx.rng)).collect(),
        }
    }

    pub fn tell(&mut self, _ctx: &mut SearchContext, batch: Vec<Individual>) -> PopulationUpdate {
        let advanced = self.designed;
        self.designed = true;
        PopulationUpdate::feasible_of(&batch, advanced)
    }
}

pub(super) struct Surrogate {
    pub(super) objectives: Option<Vec<GaussianProcess>>,
    violation: Option<GaussianProcess>,
    pub(super) front: Vec<Vec<f64>>,
    reference: Vec<f64>,
    archived: Vec<Vec<f64>>,
}

impl Surrogate {
    pub(super) fn fit(ctx: &SearchContext) -> Option<Self> {
        if ctx.history.is_empty() {
            return None;
        }
        let inputs: Vec<Vec<f64>> = ctx.history.iter().map(|i| ctx.bounds.to_unit(&i.vector)).collect();
        let log_violation: Vec<f64> = ctx
            .history
            .iter()
            .map(|i| i.violation.min(UNVERIFIED_VIOLATION).ln_1p())
            .collect();
        let violation = GaussianProcess::fit(&inputs, &log_violation);

        let feasible: Vec<usize> = (0..ctx.history.len())
            .filter(|&k| {
                let ind = &ctx.history[k];
                ind.is_feasible() && ind.objectives.iter().all(|o| o.is_finite())
            })
            .collect();
        let m = ctx.objective_count;
        let (objectives, front, reference, archived) = if feasible.is_empty() {
            (None, Vec::new(), Vec::new(), Vec::new())
        } else {
            let x: Vec<Vec<f64>> = feasible.iter().map(|&k| inputs[k].clone()).collect();
            let gps: Option<Vec<GaussianProcess>> = (0..m)
                .map(|j| {
                    let y: Vec<f64> = feasible.iter().map(|&k| ctx.history[k].objectives[j]).collect();
                    GaussianProcess::fit(&x, &y)
                })
                .collect();
            let points: Vec<Vec<f64>> = feasible.iter().map(|&k| ctx.history[k].objectives.clone()).collect();
            let front = non_dominated(&points);
            let reference = (0..m)
                .map(|j| points.iter().map(|p| p[j]).fold(f64::NEG_INFINITY, f64::max) + ctx.settings.qehvi.ref_slack)
                .collect();
            let archived = feasible
                .iter()
                .filter(|&&k| front.contains(&ctx.history[k].objectives))
                .map(|&k| inputs[k].clone())
                .collect();
            (gps, front, reference, archived)
        };

        if objectives.is_none() && violation.is_none() {
            return None;
        }
        Some(Self {
            objectives,
            violation,
            front,
            reference,
            archived,
        })
    }

    /// Greedy batch: take the best candidate, pretend its posterior mean
    /// was observed, and repeat.
    pub(super) fn select(mut self, ctx: &mut SearchContext, q: usize) -> Vec<DecisionVector> {
        let dim = ctx.bounds.dimension();
        let mut pool: Vec<Vec<f64>> = (0..ctx.settings.qehvi.candidates.max(1))
            .map(|_| (0..dim).map(|_| ctx.rng.gen::<f64>()).collect())
            .collect();
        for centre in &self.archived {
            let perturbed = centre
                .iter()
                .map(|c| (c + PERTURBATION * ctx.rng.sample::<f64, _>(StandardNormal)).clamp(0.0, 1.0))
                .collect();
            pool.push(perturbed);
        }

        let samples = ctx.settings.qehvi.mc_samples.max(1);
        let mut chosen = Vec::with_capacity(q);
        while chosen.len() < q && !pool.is_empty() {
            let mut best = (f64::NEG_INFINITY, 0usize);
            for (k, u) in pool.iter().enumerate() {
                let score = self.acquisition(u, samples, &mut ctx.rng);
                if score > best.0 {
                    best = (score, k);
                }
            }
            let pick = pool.swap_remove(best.1);
            debug!(acquisition = best.0, "qehvi pick");
            self.believe(&pick);
            chosen.push(ctx.bounds.from_unit(&pick));
        }
        chosen
    }

    pub(super) fn acquisition(&self, u: &[f64], samples: usize, rng: &mut dyn RngCore) -> f64 {
        let feasibility = match &self.violation {
            Some(gp) => {
                let (mu, sigma) = gp.predict(u);
                standard_normal_cdf(-mu / sigma)
            }
            None => 1.0,
        };
        match &self.objectives {
            Some(gps) => self.expected_improvement(gps, u, samples, rng) * feasibility,
            None => feasibility,
        }
    }

    fn expected_improvement(&self, gps: &[GaussianProcess], u: &[f64], samples: usize, rng: &mut dyn RngCore) -> f64 {
        let posterior: Vec<(f64, f64)> = gps.iter().map(|gp| gp.predict(u)).collect();
        let base = hypervolume(&self.front, &self.reference).unwrap_or(0.0);
        let mut total = 0.0;
        let mut extended = self.front.clone();
        extended.push(Vec::new());
        let last = extended.len() - 1;
        for _ in 0..samples {
            let y: Vec<f64> = posterior
                .iter()
                .map(|(mu, sigma)| mu + sigma * rng.sample::<f64, _>(StandardNormal))
                .collect();
            if !y.iter().zip(&self.reference).all(|(v, r)| v < r) {
                continue;
            }
            extended[last] = y;
            if let Ok(hv) = hypervolume(&extended, &self.reference) {
                total += (hv - base).max(0.0);
            }
        }
        total / samples as f64
    }

    /// Kriging believer: add the posterior mean at `u` as an observation.
    pub(super) fn believe(&mut self, u: &[f64]) {
        let Some(gps) = &self.objectives else {
            return;
        };
        let mean: Vec<f64> = gps.iter().map(|gp| gp.predict(u).0).collect();
        let updated: Option<Vec<GaussianProcess>> = gps
            .iter()
            .zip(&mean)
            .map(|(gp, y)| gp.with_observation(u, *y))
            .collect();
        if let Some(updated) = updated {
            self.objectives = Some(updated);
        }
        if !self.front.iter().any(|p| dominates(p, &mean) || *p == mean) {
            self.front.retain(|p| !dominates(&mean, p));
            self.front.push(mean);
        }
    }
}

fn standard_normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

fn non_dominated(points: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let mut front: Vec<Vec<f64>> = Vec::new();
    for p in points {
        if front.iter().any(|f| dominates(f, p) || f == p) {
            continue;
        }
        front.retain(|f| !dominates(p, f));
        front.push(p.clone());
    }
    front
}
