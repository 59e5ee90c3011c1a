//! In-process backend: response-time analysis over the compiled roles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::{QueryResult, Verifier, VerifierResponse};
use crate::analysis::{property_bound, TaskSet};
use crate::compile::{NetworkDescription, Role};
use crate::error::VerificationUnavailableError;
use crate::model::{Millis, TimingModel};

/// Decides deadline, latency and response queries from worst-case
/// response times of the model the network was compiled from.
#[derive(Debug, Default)]
pub struct AnalyticVerifier {
    delay: Option<Duration>,
    invocations: AtomicUsize,
}

impl AnalyticVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long per call, to make evaluations overlap in tests.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Number of `verify` calls so far.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl Verifier for AnalyticVerifier {
    fn name(&self) -> &str {
        "analytic"
    }

    fn verify(&self, net: &NetworkDescription) -> Result<VerifierResponse, VerificationUnavailableError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let model = net.model();
        let tasks = TaskSet::new(model);
        let mut results = Vec::with_capacity(net.queries.len());
        for query in &net.queries {
            let started = Instant::now();
            let automaton = net.automata.get(query.automaton).ok_or_else(|| {
                VerificationUnavailableError::new(
                    self.name(),
                    format!("query '{}' watches a missing automaton", query.name),
                )
            })?;
            let (satisfied, witness) = decide(model, &tasks, &automaton.role);
            results.push(QueryResult {
                name: query.name.clone(),
                satisfied,
                elapsed: started.elapsed(),
                witness: witness.filter(|w| w.is_finite()),
            });
        }
        Ok(VerifierResponse { results })
    }
}

fn decide(model: &TimingModel, tasks: &TaskSet, role: &Role) -> (bool, Option<f64>) {
    match role {
        Role::Task { component } => {
            let deadline = model.component(*component).deadline.map_or(f64::INFINITY, Millis::as_f64);
            match tasks.response_time(*component) {
                Some(r) => (r <= deadline, Some(r)),
                None => (false, None),
            }
        }
        Role::Latency { connection } => {
            let conn = &model.connections()[*connection];
            let budget = conn.latency_budget.map_or(f64::INFINITY, Millis::as_f64);
            let wait = tasks.handoff_wait(conn.target.component);
            (wait <= budget, Some(wait))
        }
        Role::Response { property, path } => {
            let prop = &model.properties()[*property];
            let bound = property_bound(model, tasks, path.as_deref(), prop);
            let hops_ok = bound.hops.iter().all(|&(cid, wait)| {
                model.connections()[cid]
                    .latency_budget
                    .map_or(true, |b| wait <= b.as_f64())
            });
            (bound.latency <= prop.bound().as_f64() && hops_ok, Some(bound.latency))
        }
    }
}
