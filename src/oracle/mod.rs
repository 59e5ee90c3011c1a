//! Evaluation oracle: decision vector → objectives and feasibility.
//!
//! decode → fingerprint → cache lookup → (miss) compile → verify → score.
//! Batches run on the oracle's own rayon pool and come back in input order.

pub mod cache;
pub mod decode;
pub mod fingerprint;
pub mod metrics;

use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::compile::compile;
use crate::error::{EncodingError, Error};
use crate::model::expr::{Env, Value};
use crate::model::{AttributeRef, Metric, TimingModel};
use crate::verifier::{Verifier, VerifierResponse};

pub use cache::{EvaluationCache, StatsSnapshot};
pub use decode::{decode, encode};
pub use fingerprint::Fingerprint;
pub use metrics::{Metrics, ResponseTimeRatio, Utilisation, UtilisationMetric, UtilisationSum};

/// Score of one candidate. Objectives are in minimisation space.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub objectives: Vec<f64>,
    /// Summed constraint excess; `+∞` when verification failed.
    pub violation: f64,
    pub feasible: bool,
    pub error: Option<String>,
    pub metrics: Option<Metrics>,
}

impl EvaluationResult {
    /// Result of a candidate whose verification could not complete.
    pub fn unavailable(objective_count: usize, reason: String) -> Self {
        Self {
            objectives: vec![f64::INFINITY; objective_count],
            violation: f64::INFINITY,
            feasible: false,
            error: Some(reason),
            metrics: None,
        }
    }
}

pub struct Oracle {
    base: TimingModel,
    verifier: Box<dyn Verifier>,
    utilisation: Box<dyn UtilisationMetric>,
    cache: EvaluationCache,
    pool: rayon::ThreadPool,
}

impl Oracle {
    /// `workers == 0` lets rayon pick the thread count.
    pub fn new(base: TimingModel, verifier: Box<dyn Verifier>, workers: usize) -> Result<Self, Error> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tempora-eval-{}", i))
            .build()?;
        Ok(Self {
            base,
            verifier,
            utilisation: Box::new(UtilisationSum),
            cache: EvaluationCache::new(),
            pool,
        })
    }

    pub fn with_utilisation(mut self, metric: Box<dyn UtilisationMetric>) -> Self {
        self.utilisation = metric;
        self
    }

    pub fn model(&self) -> &TimingModel {
        &self.base
    }

    pub fn verifier(&self) -> &dyn Verifier {
        self.verifier.as_ref()
    }

    pub fn dimension(&self) -> usize {
        self.base.optimisation().dimension()
    }

    pub fn objective_count(&self) -> usize {
        self.base.optimisation().objective_count()
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn cache(&self) -> &EvaluationCache {
        &self.cache
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.cache.snapshot()
    }

    pub fn decode(&self, vector: &[f64]) -> Result<TimingModel, EncodingError> {
        decode(&self.base, vector)
    }

    pub fn evaluate(&self, vector: &[f64]) -> Result<EvaluationResult, EncodingError> {
        let model = self.decode(vector)?;
        Ok(self.evaluate_model(&model))
    }

    /// Evaluate an already-decoded candidate through the cache.
    pub fn evaluate_model(&self, model: &TimingModel) -> EvaluationResult {
        let fingerprint = Fingerprint::of(model);
        self.cache
            .get_or_evaluate(fingerprint, || self.score(model, fingerprint))
    }

    /// Evaluate every vector on the pool. Lengths are checked up front, so
    /// an encoding error never leaves work running.
    pub fn evaluate_batch(&self, vectors: &[Vec<f64>]) -> Result<Vec<EvaluationResult>, EncodingError> {
        let models = vectors
            .iter()
            .map(|v| self.decode(v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self
            .pool
            .install(|| models.par_iter().map(|m| self.evaluate_model(m)).collect()))
    }

    fn score(&self, model: &TimingModel, fingerprint: Fingerprint) -> EvaluationResult {
        let started = Instant::now();
        let result = match compile(model) {
            Err(e) => EvaluationResult::unavailable(self.objective_count(), e.to_string()),
            Ok(net) => {
                let verify_started = Instant::now();
                let response = self.verifier.verify(&net);
                self.cache.stats().record_invocation(verify_started.elapsed());
                match response {
                    Ok(response) => {
                        let metrics = Metrics::compute(&net, &response, self.utilisation.as_ref());
                        self.combine(model, &response, metrics)
                    }
                    Err(e) => {
                        warn!(candidate = %fingerprint, error = %e, "verification unavailable");
                        EvaluationResult::unavailable(self.objective_count(), e.to_string())
                    }
                }
            }
        };
        debug!(
            candidate = %fingerprint,
            feasible = result.feasible,
            violation = result.violation,
            "evaluated"
        );
        self.cache.stats().record_outcome(&result, started.elapsed());
        result
    }

    fn combine(&self, model: &TimingModel, response: &VerifierResponse, metrics: Metrics) -> EvaluationResult {
        let spec = model.optimisation();
        let objectives = spec
            .objectives
            .iter()
            .map(|obj| {
                let raw = metrics.value(&obj.metric, model);
                if raw.is_nan() {
                    f64::INFINITY
                } else {
                    obj.to_minimised(raw)
                }
            })
            .collect();

        let env = ConstraintEnv {
            model,
            response,
            metrics: &metrics,
        };
        let mut violation = 0.0;
        for constraint in &spec.constraints {
            violation += match constraint.expr.violation(&env) {
                Ok(v) => v,
                Err(e) => {
                    warn!(constraint = %constraint.text, error = %e, "constraint cannot be evaluated");
                    f64::INFINITY
                }
            };
        }

        EvaluationResult {
            objectives,
            violation,
            feasible: violation == 0.0,
            error: None,
            metrics: Some(metrics),
        }
    }
}

/// Binds constraint names to query verdicts, metrics and attributes.
struct ConstraintEnv<'a> {
    model: &'a TimingModel,
    response: &'a VerifierResponse,
    metrics: &'a Metrics,
}

impl Env for ConstraintEnv<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(metric) = Metric::builtin(name) {
            return Some(Value::Number(self.metrics.value(&metric, self.model)));
        }
        if self.model.property_by_id(name).is_some() {
            let query = format!("property.{}", name);
            return self.response.get(&query).map(|r| Value::Bool(r.satisfied));
        }
        if let Some(r) = self.response.get(name) {
            return Some(Value::Bool(r.satisfied));
        }
        AttributeRef::parse(name, self.model)
            .ok()
            .and_then(|attr| attr.get(self.model))
            .map(Value::Number)
    }
}

#[cfg(test)]
mod tests;
