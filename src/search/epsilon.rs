//! Epsilon-constraint search.
//!
//! The first objective is minimised while every other objective is held
//! under a threshold. Thresholds tighten level by level; each level runs a
//! diagonal Gaussian search seeded from the best point already feasible
//! under that level, then polishes integer variables one step at a time.
//! Each level contributes at most one champion to the archive.

use std::collections::{HashSet, VecDeque};

use rand::prelude::*;
use rand_distr::StandardNormal;
use tracing::info;

use super::{Individual, PopulationUpdate, SearchContext};
use crate::model::VariableKind;
use crate::variation::DecisionVector;

/// Penalty base for candidates that violate the model constraints.
const INFEASIBLE_PENALTY: f64 = 1e8;
const CONSTRAINT_TOLERANCE: f64 = 1e-6;
const SIGMA_FLOOR: f64 = 1e-3;
const SUCCESS_WINDOW: usize = 8;
/// Improving steps taken per integer variable while polishing.
const POLISH_STEPS: usize = 2;

#[derive(Debug)]
enum Phase {
    Warmup,
    /// Between levels; the next `ask` opens one.
    Between,
    Gaussian(GaussianLevel),
    Polish(PolishLevel),
    Finished,
}

#[derive(Debug)]
struct GaussianLevel {
    epsilons: Vec<f64>,
    mean: Vec<f64>,
    sigma: Vec<f64>,
    iterations_left: usize,
    successes: VecDeque<bool>,
    best: Individual,
}

#[derive(Debug)]
struct PolishLevel {
    epsilons: Vec<f64>,
    best: Individual,
    /// Position in the list of integer variables.
    cursor: usize,
    steps: usize,
    pending: Vec<DecisionVector>,
}

#[derive(Debug)]
pub struct EpsilonConstraint {
    phase: Phase,
    schedule: Vec<Vec<f64>>,
    level: usize,
    /// The current level is being retried under the previous thresholds.
    relaxed: bool,
    penalty_scale: f64,
    smoothing: Vec<f64>,
    feasible: Vec<Individual>,
    seen: HashSet<Vec<i64>>,
    last_feasible: Option<Individual>,
    warm_sigma: Option<Vec<f64>>,
    champions: Vec<Individual>,
}

impl Default for EpsilonConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl EpsilonConstraint {
    pub fn new() -> Self {
        Self {
            phase: Phase::Warmup,
            schedule: Vec::new(),
            level: 0,
            relaxed: false,
            penalty_scale: 1.0,
            smoothing: Vec::new(),
            feasible: Vec::new(),
            seen: HashSet::new(),
            last_feasible: None,
            warm_sigma: None,
            champions: Vec::new(),
        }
    }

    /// Threshold vectors, loosest first. Empty until the warm-up is told.
    pub fn schedule(&self) -> &[Vec<f64>] {
        &self.schedule
    }

    /// Level champions, in level order.
    pub fn champions(&self) -> &[Individual] {
        &self.champions
    }

    pub fn is_done(&self, ctx: &SearchContext) -> bool {
        match self.phase {
            Phase::Finished => true,
            Phase::Between => ctx.remaining_generations() == 0 || self.level >= self.schedule.len(),
            _ => false,
        }
    }

    pub fn ask(&mut self, ctx: &mut SearchContext) -> Vec<DecisionVector> {
        if let Phase::Between = self.phase {
            self.open_level(ctx);
        }
        match &mut self.phase {
            Phase::Warmup => {
                let n = ctx.population_size().max(5 * ctx.bounds.dimension());
                let midpoint: Vec<f64> = (0..ctx.bounds.dimension())
                    .map(|i| 0.5 * (ctx.bounds.lo[i] + ctx.bounds.hi[i]))
                    .collect();
                let mut batch = vec![midpoint];
                batch.extend((0..n).map(|_| ctx.bounds.uniform(&mut ctx.rng)));
                batch
            }
            Phase::Gaussian(level) => {
                let n = ctx.population_size();
                (0..n)
                    .map(|_| {
                        let mut x: Vec<f64> = level
                            .mean
                            .iter()
                            .zip(&level.sigma)
                            .map(|(m, s)| m + s * ctx.rng.sample::<f64, _>(StandardNormal))
                            .collect();
                        ctx.bounds.clamp(&mut x);
                        x
                    })
                    .collect()
            }
            Phase::Polish(polish) => polish.pending.clone(),
            Phase::Between | Phase::Finished => Vec::new(),
        }
    }

    pub fn tell(&mut self, ctx: &mut SearchContext, batch: Vec<Individual>) -> PopulationUpdate {
        for ind in &batch {
            self.register(ind);
        }
        let phase = std::mem::replace(&mut self.phase, Phase::Between);
        match phase {
            Phase::Warmup => {
                self.calibrate(&batch, ctx.objective_count, ctx.settings.epsilon_levels);
                info!(levels = self.schedule.len(), "epsilon schedule ready");
                PopulationUpdate::default()
            }
            Phase::Gaussian(level) => self.step_gaussian(ctx, level, batch),
            Phase::Polish(polish) => {
                let update = self.step_polish(ctx, polish, &batch);
                PopulationUpdate {
                    archive_candidates: update,
                    advanced: false,
                }
            }
            other => {
                self.phase = other;
                PopulationUpdate::default()
            }
        }
    }

    // ─── Warm-up ───────────────────────────────────────────────────

    fn calibrate(&mut self, samples: &[Individual], objective_count: usize, levels: usize) {
        let valid: Vec<&[f64]> = samples
            .iter()
            .filter(|s| s.is_feasible() && s.objectives.iter().all(|o| o.is_finite()))
            .map(|s| s.objectives.as_slice())
            .collect();
        self.schedule = build_schedule(&valid, objective_count, levels);
        let (scale, smoothing) = penalty_parameters(&valid, objective_count);
        self.penalty_scale = scale;
        self.smoothing = smoothing;
    }

    fn register(&mut self, ind: &Individual) {
        if !ind.is_feasible() || ind.objectives.iter().any(|o| !o.is_finite()) {
            return;
        }
        let key: Vec<i64> = ind.objectives.iter().map(|o| (o * 1e9).round() as i64).collect();
        if !self.seen.insert(key) {
            return;
        }
        self.feasible.push(ind.clone());
        self.last_feasible = Some(ind.clone());
    }

    // ─── Levels ────────────────────────────────────────────────────

    fn open_level(&mut self, ctx: &SearchContext) {
        loop {
            let remaining = ctx.remaining_generations();
            if self.level >= self.schedule.len() || remaining == 0 {
                self.phase = Phase::Finished;
                return;
            }
            let epsilons = if self.relaxed {
                self.schedule[self.level - 1].clone()
            } else {
                self.schedule[self.level].clone()
            };

            let Some(seed) = self.seed_for(&epsilons) else {
                if self.level == 0 || self.relaxed {
                    self.level += 1;
                    self.relaxed = false;
                } else {
                    self.relaxed = true;
                }
                continue;
            };

            let levels_left = self.schedule.len() - self.level;
            let iterations = (remaining / levels_left).max(1).min(remaining);
            let sigma = self.warm_sigma.clone().unwrap_or_else(|| default_sigma(ctx));
            let mut mean = seed.vector.clone();
            ctx.bounds.clamp(&mut mean);
            info!(level = self.level, iterations, ?epsilons, "epsilon level");
            self.phase = Phase::Gaussian(GaussianLevel {
                epsilons,
                mean,
                sigma,
                iterations_left: iterations,
                successes: VecDeque::with_capacity(SUCCESS_WINDOW),
                best: seed,
            });
            return;
        }
    }

    /// Most recent feasible point if it meets `epsilons`, else the one with
    /// the lowest first objective that does.
    fn seed_for(&self, epsilons: &[f64]) -> Option<Individual> {
        if let Some(last) = &self.last_feasible {
            if within(last, epsilons) {
                return Some(last.clone());
            }
        }
        self.feasible
            .iter()
            .filter(|ind| within(ind, epsilons))
            .min_by(|a, b| a.objectives[0].total_cmp(&b.objectives[0]))
            .cloned()
    }

    fn step_gaussian(&mut self, ctx: &SearchContext, mut level: GaussianLevel, batch: Vec<Individual>) -> PopulationUpdate {
        let mut scored: Vec<(f64, bool, &Individual)> = batch
            .iter()
            .map(|ind| (self.score(ind, &level.epsilons), within(ind, &level.epsilons), ind))
            .collect();
        for &(_, ok, ind) in &scored {
            if ok && ind.objectives[0] < level.best.objectives[0] {
                level.best = ind.clone();
            }
        }
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        if !scored.is_empty() {
            let mu = (ctx.population_size() / 2).max(1).min(scored.len());
            let top: Vec<&[f64]> = scored[..mu].iter().map(|(_, _, ind)| ind.vector.as_slice()).collect();
            let dim = level.mean.len();
            for d in 0..dim {
                let mean = top.iter().map(|x| x[d]).sum::<f64>() / mu as f64;
                let var = top.iter().map(|x| (x[d] - mean).powi(2)).sum::<f64>() / mu as f64;
                level.mean[d] = mean;
                level.sigma[d] = (0.5 * level.sigma[d] + 0.5 * var.sqrt()).max(SIGMA_FLOOR);
            }

            if level.successes.len() == SUCCESS_WINDOW {
                level.successes.pop_front();
            }
            level.successes.push_back(scored[0].1);
            let rate = level.successes.iter().filter(|s| **s).count() as f64 / level.successes.len() as f64;
            let factor = if rate > 0.25 {
                1.2
            } else if rate < 0.15 {
                0.82
            } else {
                1.0
            };
            for s in &mut level.sigma {
                *s *= factor;
            }
        }

        level.iterations_left = level.iterations_left.saturating_sub(1);
        let mut update = PopulationUpdate {
            archive_candidates: Vec::new(),
            advanced: true,
        };
        if level.iterations_left > 0 {
            self.phase = Phase::Gaussian(level);
            return update;
        }

        self.warm_sigma = Some(default_sigma(ctx).iter().map(|s| (s / 2.0).max(SIGMA_FLOOR)).collect());
        let polish = PolishLevel {
            epsilons: level.epsilons,
            best: level.best,
            cursor: 0,
            steps: 0,
            pending: Vec::new(),
        };
        update.archive_candidates = self.advance_polish(ctx, polish);
        update
    }

    fn step_polish(&mut self, ctx: &SearchContext, mut polish: PolishLevel, batch: &[Individual]) -> Vec<Individual> {
        let improved = batch
            .iter()
            .find(|ind| within(ind, &polish.epsilons) && ind.objectives[0] + 1e-9 < polish.best.objectives[0]);
        match improved {
            Some(ind) => {
                polish.best = ind.clone();
                polish.steps += 1;
                if polish.steps >= POLISH_STEPS {
                    polish.cursor += 1;
                    polish.steps = 0;
                }
            }
            None => {
                polish.cursor += 1;
                polish.steps = 0;
            }
        }
        self.advance_polish(ctx, polish)
    }

    /// Queue the next integer neighbours, or close the level and return
    /// its champion.
    fn advance_polish(&mut self, ctx: &SearchContext, mut polish: PolishLevel) -> Vec<Individual> {
        let integers: Vec<usize> = (0..ctx.bounds.dimension())
            .filter(|&i| ctx.bounds.kinds[i] == VariableKind::Integer)
            .collect();
        while polish.cursor < integers.len() {
            let d = integers[polish.cursor];
            let current = polish.best.vector[d];
            let pending: Vec<DecisionVector> = [-1.0, 1.0]
                .iter()
                .map(|step| (current + step).clamp(ctx.bounds.lo[d], ctx.bounds.hi[d]))
                .filter(|v| (v - current).abs() > f64::EPSILON)
                .map(|v| {
                    let mut x = polish.best.vector.clone();
                    x[d] = v;
                    x
                })
                .collect();
            if !pending.is_empty() {
                polish.pending = pending;
                self.phase = Phase::Polish(polish);
                return Vec::new();
            }
            polish.cursor += 1;
            polish.steps = 0;
        }

        self.phase = Phase::Between;
        self.level += 1;
        self.relaxed = false;
        if within(&polish.best, &polish.epsilons) {
            self.register(&polish.best);
            self.champions.push(polish.best.clone());
            vec![polish.best]
        } else {
            Vec::new()
        }
    }

    // ─── Scoring ───────────────────────────────────────────────────

    /// First objective plus a smoothed penalty for exceeding thresholds.
    fn score(&self, ind: &Individual, epsilons: &[f64]) -> f64 {
        if !ind.is_feasible() {
            return if ind.violation.is_finite() {
                INFEASIBLE_PENALTY * (1.0 + ind.violation)
            } else {
                f64::INFINITY
            };
        }
        let primary = ind.objectives[0];
        if !primary.is_finite() {
            return f64::INFINITY;
        }
        let mut penalty = 0.0;
        for (k, bound) in epsilons.iter().enumerate() {
            if !bound.is_finite() {
                continue;
            }
            let excess = (ind.objectives[k + 1] - bound).max(0.0);
            if excess <= 0.0 {
                continue;
            }
            let smooth = self.smoothing.get(k).copied().unwrap_or(0.0);
            penalty += if smooth <= 0.0 {
                excess
            } else if excess <= smooth {
                excess * excess / (2.0 * smooth)
            } else {
                excess - smooth / 2.0
            };
        }
        primary + self.penalty_scale * penalty
    }
}

/// Feasible under the model constraints and every finite threshold.
fn within(ind: &Individual, epsilons: &[f64]) -> bool {
    if !ind.is_feasible() || ind.objectives.iter().any(|o| !o.is_finite()) {
        return false;
    }
    epsilons
        .iter()
        .enumerate()
        .all(|(k, bound)| !bound.is_finite() || ind.objectives[k + 1] <= bound + CONSTRAINT_TOLERANCE)
}

fn default_sigma(ctx: &SearchContext) -> Vec<f64> {
    (0..ctx.bounds.dimension())
        .map(|i| (ctx.bounds.width(i) / 3.0).max(SIGMA_FLOOR))
        .collect()
}

/// Per secondary objective: `+∞` followed by `levels` thresholds from the
/// 80th down to the 20th percentile of the feasible warm-up values (the
/// max and min when fewer than three exist). Rows pad with their last
/// value when the secondaries have different lengths.
pub(super) fn build_schedule(feasible: &[&[f64]], objective_count: usize, levels: usize) -> Vec<Vec<f64>> {
    if objective_count <= 1 {
        return vec![Vec::new()];
    }
    let levels = levels.max(1);
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(objective_count - 1);
    for k in 1..objective_count {
        let mut values: Vec<f64> = feasible.iter().map(|o| o[k]).collect();
        if values.is_empty() {
            columns.push(vec![f64::INFINITY]);
            continue;
        }
        values.sort_by(f64::total_cmp);
        let (low, high) = if values.len() >= 3 {
            (quantile(&values, 0.2), quantile(&values, 0.8))
        } else {
            (values[0], values[values.len() - 1])
        };
        if close(low, high) {
            columns.push(vec![f64::INFINITY, high]);
            continue;
        }
        let mut column = vec![f64::INFINITY];
        for i in 0..levels {
            let t = if levels == 1 { 0.0 } else { i as f64 / (levels - 1) as f64 };
            let value = high + t * (low - high);
            if column.len() == 1 || !close(value, column[column.len() - 1]) {
                column.push(value);
            }
        }
        columns.push(column);
    }

    let rows = columns.iter().map(Vec::len).max().unwrap_or(1);
    (0..rows)
        .map(|r| columns.iter().map(|c| c[r.min(c.len() - 1)]).collect())
        .collect()
}

/// Penalty scale from the spread of the first objective, and a Huber
/// smoothing width per secondary objective.
pub(super) fn penalty_parameters(feasible: &[&[f64]], objective_count: usize) -> (f64, Vec<f64>) {
    let primary: Vec<f64> = feasible.iter().map(|o| o[0]).collect();
    let scale = match span(&primary) {
        Some((min, width)) => {
            let source = if width > 1e-9 { width } else { min.abs().max(1.0) };
            (3.0 * source).max(5.0)
        }
        None => 50.0,
    };

    let smoothing = (1..objective_count)
        .map(|k| {
            let values: Vec<f64> = feasible.iter().map(|o| o[k]).collect();
            let smooth = match (values.len(), span(&values)) {
                (n, Some((min, width))) if n >= 3 => (0.1 * width).max(0.05 * min.abs().max(1.0)),
                (2, Some((_, width))) => (0.5 * width).max(1.0),
                (1, _) => 0.1 * values[0].abs().max(1.0),
                _ => 1.0,
            };
            smooth.max(1e-6)
        })
        .collect();
    (scale, smoothing)
}

/// `(min, max - min)` of a non-empty slice.
fn span(values: &[f64]) -> Option<(f64, f64)> {
    let min = values.iter().copied().reduce(f64::min)?;
    let max = values.iter().copied().reduce(f64::max)?;
    Some((min, max - min))
}

/// Linear-interpolated quantile of sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}
