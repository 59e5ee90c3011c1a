//! Multi-objective search over decision vectors.
//!
//! Every strategy follows the same ask/tell cycle: `ask` proposes a batch
//! of vectors, the driver evaluates them through the oracle, and `tell`
//! feeds the scored batch back. Strategies never touch the oracle
//! themselves, so evaluation stays parallel while the strategies stay
//! single-threaded.

pub mod dominance;
pub mod driver;
mod epsilon;
mod gp;
mod moead;
mod nsga2;
mod qehvi;
mod random;
mod sms_emoa;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::indicator::plateau;
use crate::oracle::EvaluationResult;
use crate::variation::{Bounds, DecisionVector};

pub use driver::{run, RunReport, RunStatus};
pub use epsilon::EpsilonConstraint;
pub use moead::Moead;
pub use nsga2::Nsga2;
pub use qehvi::Qehvi;
pub use random::RandomSearch;
pub use sms_emoa::SmsEmoa;

// ─── Individuals ───────────────────────────────────────────────────

/// A scored decision vector. Objectives are in minimisation space.
#[derive(Clone, Debug, PartialEq)]
pub struct Individual {
    pub vector: DecisionVector,
    pub objectives: Vec<f64>,
    /// Summed constraint excess; 0 when feasible, `+∞` when unverifiable.
    pub violation: f64,
    /// Non-domination rank, 0 for the first front.
    pub rank: usize,
    pub crowding: f64,
}

impl Individual {
    pub fn evaluated(vector: DecisionVector, objectives: Vec<f64>, violation: f64) -> Self {
        Self {
            vector,
            objectives,
            violation,
            rank: usize::MAX,
            crowding: 0.0,
        }
    }

    pub fn from_result(vector: DecisionVector, result: &EvaluationResult) -> Self {
        Self::evaluated(vector, result.objectives.clone(), result.violation)
    }

    pub fn is_feasible(&self) -> bool {
        self.violation == 0.0
    }
}

// ─── Settings ──────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Algorithm {
    #[default]
    Nsga2,
    SmsEmoa,
    Moead,
    Epsilon,
    Qehvi,
    Random,
}

impl Algorithm {
    pub const ALL: [Algorithm; 6] = [
        Algorithm::Nsga2,
        Algorithm::SmsEmoa,
        Algorithm::Moead,
        Algorithm::Epsilon,
        Algorithm::Qehvi,
        Algorithm::Random,
    ];
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::Nsga2 => "nsga2",
            Algorithm::SmsEmoa => "sms-emoa",
            Algorithm::Moead => "moead",
            Algorithm::Epsilon => "epsilon",
            Algorithm::Qehvi => "qehvi",
            Algorithm::Random => "random",
        };
        f.write_str(name)
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalised.as_str() {
            "nsga2" | "nsgaii" => Ok(Algorithm::Nsga2),
            "smsemoa" | "sms" => Ok(Algorithm::SmsEmoa),
            "moead" => Ok(Algorithm::Moead),
            "epsilon" | "epsilonconstraint" | "eps" => Ok(Algorithm::Epsilon),
            "qehvi" | "ehvi" => Ok(Algorithm::Qehvi),
            "random" => Ok(Algorithm::Random),
            _ => Err(format!(
                "unknown algorithm '{}' (expected one of: nsga2, sms-emoa, moead, epsilon, qehvi, random)",
                s
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct QehviSettings {
    /// Random candidates scored per acquisition round.
    pub candidates: usize,
    pub mc_samples: usize,
    /// Offset added to the worst feasible objectives for the reference.
    pub ref_slack: f64,
}

impl Default for QehviSettings {
    fn default() -> Self {
        Self {
            candidates: 128,
            mc_samples: 64,
            ref_slack: 1.0,
        }
    }
}

/// Everything a run needs besides the model and the verifier.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchSettings {
    pub algorithm: Algorithm,
    pub population: usize,
    pub generations: usize,
    /// Points per acquisition round (qEHVI).
    pub batch: usize,
    pub seed: u64,
    pub max_evaluations: Option<usize>,
    pub timeout: Option<Duration>,
    /// 0 disables plateau detection.
    pub plateau_window: usize,
    pub plateau_epsilon: f64,
    pub epsilon_levels: usize,
    pub qehvi: QehviSettings,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            population: 20,
            generations: 10,
            batch: 4,
            seed: 0,
            max_evaluations: None,
            timeout: None,
            plateau_window: plateau::DEFAULT_WINDOW,
            plateau_epsilon: plateau::DEFAULT_EPSILON,
            epsilon_levels: 10,
            qehvi: QehviSettings::default(),
        }
    }
}

// ─── Shared state ──────────────────────────────────────────────────

/// Mutable state shared by the driver and the active strategy.
pub struct SearchContext {
    pub bounds: Bounds,
    pub objective_count: usize,
    pub settings: SearchSettings,
    pub rng: StdRng,
    /// Completed generations.
    pub generation: usize,
    pub evaluations: usize,
    /// Every evaluated individual, in evaluation order.
    pub history: Vec<Individual>,
}

impl SearchContext {
    pub fn new(bounds: Bounds, objective_count: usize, settings: SearchSettings) -> Self {
        let rng = StdRng::seed_from_u64(settings.seed);
        Self {
            bounds,
            objective_count,
            settings,
            rng,
            generation: 0,
            evaluations: 0,
            history: Vec::new(),
        }
    }

    pub fn population_size(&self) -> usize {
        self.settings.population.max(2)
    }

    /// Generations the strategy may still start.
    pub fn remaining_generations(&self) -> usize {
        self.settings.generations.saturating_sub(self.generation)
    }
}

/// What a strategy reports back after digesting a batch.
#[derive(Clone, Debug, Default)]
pub struct PopulationUpdate {
    /// Individuals the driver should offer to the Pareto archive.
    pub archive_candidates: Vec<Individual>,
    /// The batch closed a generation.
    pub advanced: bool,
}

impl PopulationUpdate {
    /// Offer every feasible individual of `batch`.
    pub(crate) fn feasible_of(batch: &[Individual], advanced: bool) -> Self {
        Self {
            archive_candidates: batch.iter().filter(|i| i.is_feasible()).cloned().collect(),
            advanced,
        }
    }
}

// ─── Strategy dispatch ─────────────────────────────────────────────

pub enum Strategy {
    Nsga2(Nsga2),
    SmsEmoa(SmsEmoa),
    Moead(Moead),
    Epsilon(EpsilonConstraint),
    Qehvi(Qehvi),
    Random(RandomSearch),
}

impl Strategy {
    pub fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Nsga2 => Strategy::Nsga2(Nsga2::new()),
            Algorithm::SmsEmoa => Strategy::SmsEmoa(SmsEmoa::new()),
            Algorithm::Moead => Strategy::Moead(Moead::new()),
            Algorithm::Epsilon => Strategy::Epsilon(EpsilonConstraint::new()),
            Algorithm::Qehvi => Strategy::Qehvi(Qehvi::new()),
            Algorithm::Random => Strategy::Random(RandomSearch),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Strategy::Nsga2(_) => Algorithm::Nsga2,
            Strategy::SmsEmoa(_) => Algorithm::SmsEmoa,
            Strategy::Moead(_) => Algorithm::Moead,
            Strategy::Epsilon(_) => Algorithm::Epsilon,
            Strategy::Qehvi(_) => Algorithm::Qehvi,
            Strategy::Random(_) => Algorithm::Random,
        }
    }

    /// Vectors to evaluate next, already repaired to the model resolution.
    pub fn ask(&mut self, ctx: &mut SearchContext) -> Vec<DecisionVector> {
        let mut batch = match self {
            Strategy::Nsga2(s) => s.ask(ctx),
            Strategy::SmsEmoa(s) => s.ask(ctx),
            Strategy::Moead(s) => s.ask(ctx),
            Strategy::Epsilon(s) => s.ask(ctx),
            Strategy::Qehvi(s) => s.ask(ctx),
            Strategy::Random(s) => s.ask(ctx),
        };
        for x in &mut batch {
            ctx.bounds.repair(x);
        }
        batch
    }

    pub fn tell(&mut self, ctx: &mut SearchContext, batch: Vec<Individual>) -> PopulationUpdate {
        match self {
            Strategy::Nsga2(s) => s.tell(ctx, batch),
            Strategy::SmsEmoa(s) => s.tell(ctx, batch),
            Strategy::Moead(s) => s.tell(ctx, batch),
            Strategy::Epsilon(s) => s.tell(ctx, batch),
            Strategy::Qehvi(s) => s.tell(ctx, batch),
            Strategy::Random(s) => s.tell(ctx, batch),
        }
    }

    pub fn is_done(&self, ctx: &SearchContext) -> bool {
        match self {
            Strategy::Nsga2(_) | Strategy::SmsEmoa(_) | Strategy::Moead(_) | Strategy::Qehvi(_) | Strategy::Random(_) => {
                ctx.generation >= ctx.settings.generations
            }
            Strategy::Epsilon(s) => s.is_done(ctx),
        }
    }
}

#[cfg(test)]
mod tests;
