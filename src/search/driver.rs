//! The ask/evaluate/tell loop.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use super::{Algorithm, Individual, SearchContext, SearchSettings, Strategy};
use crate::error::{Error, InvalidModelError};
use crate::indicator::{igd_plus, Archive, PlateauDetector, TraceEntry};
use crate::oracle::{Oracle, StatsSnapshot};
use crate::variation::Bounds;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Completed,
    BudgetExhausted,
    TimedOut,
    Plateaued,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Completed => "completed",
            RunStatus::BudgetExhausted => "budget exhausted",
            RunStatus::TimedOut => "timed out",
            RunStatus::Plateaued => "plateaued",
        };
        f.write_str(s)
    }
}

/// Outcome of one search run. Always produced, even when nothing feasible
/// was found.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub algorithm: Algorithm,
    pub status: RunStatus,
    pub generations: usize,
    pub evaluations: usize,
    pub evaluation_failures: usize,
    pub archive: Archive,
    pub trace: Vec<TraceEntry>,
    pub stats: StatsSnapshot,
    pub elapsed: Duration,
}

impl RunReport {
    /// Archive member with the best first objective.
    pub fn selected(&self) -> Option<&Individual> {
        self.archive.best(0)
    }
}

/// Drive `settings.algorithm` against `oracle` until the strategy is done,
/// the evaluation budget or timeout is spent, or the hypervolume plateaus.
pub fn run(oracle: &Oracle, settings: SearchSettings) -> Result<RunReport, Error> {
    let spec = oracle.model().optimisation();
    if spec.dimension() == 0 {
        return Err(InvalidModelError::new("model declares no decision variables").into());
    }
    if spec.objective_count() == 0 {
        return Err(InvalidModelError::new("model declares no objectives").into());
    }

    let bounds = Bounds::from_spec(spec);
    let mut ctx = SearchContext::new(bounds, spec.objective_count(), settings);
    let mut strategy = Strategy::new(ctx.settings.algorithm);
    let mut plateau = match ctx.settings.plateau_window {
        0 => None,
        window => Some(PlateauDetector::new(window, ctx.settings.plateau_epsilon)),
    };

    let mut archive = Archive::new();
    let mut trace: Vec<TraceEntry> = Vec::new();
    let mut fronts: Vec<Vec<Vec<f64>>> = Vec::new();
    let mut failures = 0usize;
    let started = Instant::now();

    info!(
        algorithm = %ctx.settings.algorithm,
        population = ctx.settings.population,
        generations = ctx.settings.generations,
        workers = oracle.workers(),
        "search started"
    );

    let status = loop {
        if strategy.is_done(&ctx) {
            break RunStatus::Completed;
        }
        if ctx.settings.timeout.is_some_and(|limit| started.elapsed() >= limit) {
            break RunStatus::TimedOut;
        }
        let budget = ctx.settings.max_evaluations.map(|max| max.saturating_sub(ctx.evaluations));
        if budget == Some(0) {
            break RunStatus::BudgetExhausted;
        }

        let mut batch = strategy.ask(&mut ctx);
        if let Some(budget) = budget {
            batch.truncate(budget);
        }
        if batch.is_empty() {
            break RunStatus::Completed;
        }

        let results = oracle.evaluate_batch(&batch)?;
        let individuals: Vec<Individual> = batch
            .into_iter()
            .zip(&results)
            .map(|(vector, result)| Individual::from_result(vector, result))
            .collect();
        failures += results.iter().filter(|r| r.error.is_some()).count();
        ctx.evaluations += individuals.len();
        ctx.history.extend(individuals.iter().cloned());

        let update = strategy.tell(&mut ctx, individuals);
        for candidate in &update.archive_candidates {
            archive.offer(candidate);
        }
        archive.fix_reference();

        if !update.advanced {
            continue;
        }
        ctx.generation += 1;
        let hv = match archive.hypervolume() {
            Ok(hv) => hv,
            Err(e) => {
                debug!(generation = ctx.generation, error = %e, "hypervolume unavailable");
                f64::NAN
            }
        };
        debug!(
            generation = ctx.generation,
            hypervolume = hv,
            archive = archive.len(),
            evaluations = ctx.evaluations,
            "generation"
        );
        trace.push(TraceEntry {
            generation: ctx.generation,
            hypervolume: hv,
            igd_plus: f64::NAN,
        });
        fronts.push(archive.front());

        if let Some(detector) = plateau.as_mut() {
            if detector.update(hv, ctx.generation) {
                break RunStatus::Plateaued;
            }
        }
    };

    let final_front = archive.front();
    for (entry, front) in trace.iter_mut().zip(&fronts) {
        entry.igd_plus = igd_plus(front, &final_front).unwrap_or(f64::NAN);
    }

    let report = RunReport {
        algorithm: ctx.settings.algorithm,
        status,
        generations: ctx.generation,
        evaluations: ctx.evaluations,
        evaluation_failures: failures,
        archive,
        trace,
        stats: oracle.stats(),
        elapsed: started.elapsed(),
    };
    info!(
        status = %report.status,
        generations = report.generations,
        evaluations = report.evaluations,
        archived = report.archive.len(),
        failures = report.evaluation_failures,
        "search finished"
    );
    Ok(report)
}
