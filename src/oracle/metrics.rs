//! Analytic metrics of an evaluated candidate.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::analysis::{property_bound, slack, TaskSet};
use crate::compile::{NetworkDescription, QueryKind, Role};
use crate::model::{Millis, Metric, TimingModel};
use crate::verifier::VerifierResponse;

/// How `max_core_utilisation` is measured.
pub trait UtilisationMetric: Send + Sync {
    fn name(&self) -> &str;
    fn measure(&self, model: &TimingModel, tasks: &TaskSet) -> f64;
}

/// Largest per-core Σ wcet/period.
#[derive(Clone, Copy, Debug, Default)]
pub struct UtilisationSum;

impl UtilisationMetric for UtilisationSum {
    fn name(&self) -> &str {
        "utilisation_sum"
    }

    fn measure(&self, _model: &TimingModel, tasks: &TaskSet) -> f64 {
        tasks.core_utilisation().into_iter().fold(0.0, f64::max)
    }
}

/// Largest response-time to deadline ratio over all tasks; unbounded tasks
/// count as infinite.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResponseTimeRatio;

impl UtilisationMetric for ResponseTimeRatio {
    fn name(&self) -> &str {
        "response_time_ratio"
    }

    fn measure(&self, model: &TimingModel, tasks: &TaskSet) -> f64 {
        (0..tasks.len())
            .map(|id| {
                let deadline = model
                    .component(id)
                    .effective_deadline()
                    .map(Millis::as_f64)
                    .or(tasks.activation_period(id));
                match (tasks.response_time(id), deadline) {
                    (Some(r), Some(d)) if d > 0.0 => r / d,
                    (Some(_), _) => 0.0,
                    (None, _) => f64::INFINITY,
                }
            })
            .fold(0.0, f64::max)
    }
}

/// Configurable choice of `UtilisationMetric`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Utilisation {
    #[default]
    Sum,
    ResponseRatio,
}

impl Utilisation {
    pub fn build(self) -> Box<dyn UtilisationMetric> {
        match self {
            Utilisation::Sum => Box::new(UtilisationSum),
            Utilisation::ResponseRatio => Box::new(ResponseTimeRatio),
        }
    }
}

impl fmt::Display for Utilisation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Utilisation::Sum => write!(f, "sum"),
            Utilisation::ResponseRatio => write!(f, "response-ratio"),
        }
    }
}

impl FromStr for Utilisation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(Utilisation::Sum),
            "response-ratio" | "response_ratio" => Ok(Utilisation::ResponseRatio),
            other => Err(format!("unknown utilisation metric '{}' (expected sum or response-ratio)", other)),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub max_core_utilisation: f64,
    pub total_utilisation: f64,
    pub worst_end2end_latency: f64,
    pub deadline_misses: usize,
    pub latency_violations: usize,
    pub property_violations: usize,
    pub sum_wcet: f64,
    pub min_slack: f64,
}

impl Metrics {
    pub fn compute(
        net: &NetworkDescription,
        response: &VerifierResponse,
        utilisation: &dyn UtilisationMetric,
    ) -> Self {
        let model = net.model();
        let tasks = TaskSet::new(model);

        let mut metrics = Metrics {
            max_core_utilisation: utilisation.measure(model, &tasks),
            total_utilisation: (0..tasks.len()).map(|id| tasks.utilisation(id)).sum(),
            sum_wcet: model.components().iter().map(|c| c.wcet.as_f64()).sum(),
            min_slack: (0..tasks.len())
                .map(|id| slack(model, &tasks, id))
                .fold(f64::INFINITY, f64::min),
            ..Metrics::default()
        };

        // A query the verifier did not answer counts as violated.
        // Slowest satisfied observer; when none is satisfied, the slowest
        // violated one, so a candidate never scores 0 by failing them all.
        let mut satisfied_worst: Option<f64> = None;
        let mut violated_worst: Option<f64> = None;
        for query in &net.queries {
            let result = response.get(&query.name);
            let violated = !result.is_some_and(|r| r.satisfied);
            match query.kind {
                QueryKind::DeadlineMiss => metrics.deadline_misses += violated as usize,
                QueryKind::Latency => metrics.latency_violations += violated as usize,
                QueryKind::Property => {
                    metrics.property_violations += violated as usize;
                    let latency = result.and_then(|r| r.witness).unwrap_or_else(|| {
                        match &net.automata[query.automaton].role {
                            Role::Response { property, path } => {
                                let prop = &model.properties()[*property];
                                property_bound(model, &tasks, path.as_deref(), prop).latency
                            }
                            _ => f64::INFINITY,
                        }
                    });
                    let slot = if violated {
                        &mut violated_worst
                    } else {
                        &mut satisfied_worst
                    };
                    *slot = Some(slot.map_or(latency, |w: f64| w.max(latency)));
                }
            }
        }
        metrics.worst_end2end_latency = satisfied_worst.or(violated_worst).unwrap_or(0.0);
        metrics
    }

    /// Raw (not direction-adjusted) value of `metric`; NaN when an
    /// attribute is unset.
    pub fn value(&self, metric: &Metric, model: &TimingModel) -> f64 {
        match metric {
            Metric::MaxCoreUtilisation => self.max_core_utilisation,
            Metric::TotalUtilisation => self.total_utilisation,
            Metric::WorstEnd2EndLatency => self.worst_end2end_latency,
            Metric::DeadlineMisses => self.deadline_misses as f64,
            Metric::LatencyViolations => self.latency_violations as f64,
            Metric::PropertyViolations => self.property_violations as f64,
            Metric::SumWcet => self.sum_wcet,
            Metric::MinSlack => self.min_slack,
            Metric::Attribute(attr) => attr.get(model).unwrap_or(f64::NAN),
        }
    }
}
