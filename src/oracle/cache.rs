//! Run-scoped evaluation cache with one in-flight evaluation per
//! fingerprint.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use serde::Serialize;

use super::fingerprint::Fingerprint;
use super::EvaluationResult;

type Slot = Arc<OnceLock<EvaluationResult>>;

/// Fingerprint → result. The map lock is only held to find or insert a
/// slot; callers then block on the slot itself, so concurrent requests for
/// the same fingerprint run the evaluation exactly once.
#[derive(Default)]
pub struct EvaluationCache {
    slots: Mutex<HashMap<Fingerprint, Slot>>,
    stats: CacheStats,
}

impl EvaluationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_evaluate(
        &self,
        fingerprint: Fingerprint,
        evaluate: impl FnOnce() -> EvaluationResult,
    ) -> EvaluationResult {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(slots.entry(fingerprint).or_default())
        };
        let mut computed = false;
        let result = slot.get_or_init(|| {
            computed = true;
            evaluate()
        });
        let counter = if computed {
            &self.stats.misses
        } else {
            &self.stats.hits
        };
        counter.fetch_add(1, Ordering::Relaxed);
        result.clone()
    }

    /// Finished result for `fingerprint`, if any.
    pub fn peek(&self, fingerprint: &Fingerprint) -> Option<EvaluationResult> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(fingerprint).and_then(|slot| slot.get().cloned())
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot(self.len())
    }
}

// ─── Statistics ────────────────────────────────────────────────────

/// Counters updated from the evaluation pool.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    feasible: AtomicU64,
    infeasible: AtomicU64,
    failures: AtomicU64,
    adapter_invocations: AtomicU64,
    evaluate_nanos: AtomicU64,
    verifier_nanos: AtomicU64,
}

impl CacheStats {
    pub(crate) fn record_invocation(&self, verifier_time: Duration) {
        self.adapter_invocations.fetch_add(1, Ordering::Relaxed);
        self.verifier_nanos
            .fetch_add(verifier_time.as_nanos() as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_outcome(&self, result: &EvaluationResult, elapsed: Duration) {
        let counter = if result.error.is_some() {
            &self.failures
        } else if result.feasible {
            &self.feasible
        } else {
            &self.infeasible
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.evaluate_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self, entries: usize) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            hits: load(&self.hits),
            misses: load(&self.misses),
            entries: entries as u64,
            feasible_calls: load(&self.feasible),
            infeasible_calls: load(&self.infeasible),
            failures: load(&self.failures),
            adapter_invocations: load(&self.adapter_invocations),
            evaluate_secs: load(&self.evaluate_nanos) as f64 * 1e-9,
            verifier_secs: load(&self.verifier_nanos) as f64 * 1e-9,
        }
    }
}

/// Point-in-time copy of the counters, as exported in run reports.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
    pub feasible_calls: u64,
    pub infeasible_calls: u64,
    pub failures: u64,
    pub adapter_invocations: u64,
    pub evaluate_secs: f64,
    pub verifier_secs: f64,
}

impl StatsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        ratio(self.hits, self.hits + self.misses)
    }

    /// Feasible verdicts over all answered adapter calls.
    pub fn feasibility_rate(&self) -> f64 {
        ratio(self.feasible_calls, self.feasible_calls + self.infeasible_calls)
    }

    /// Fraction of evaluation time spent inside the verifier.
    pub fn verifier_share(&self) -> f64 {
        if self.evaluate_secs > 0.0 {
            self.verifier_secs / self.evaluate_secs
        } else {
            0.0
        }
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "cache:       {} hits, {} misses, {} entries ({:.1}% hit rate)",
            self.hits,
            self.misses,
            self.entries,
            self.hit_rate() * 100.0
        )?;
        writeln!(
            f,
            "verifier:    {} calls, {} feasible, {} infeasible, {} failed ({:.1}% feasible)",
            self.adapter_invocations,
            self.feasible_calls,
            self.infeasible_calls,
            self.failures,
            self.feasibility_rate() * 100.0
        )?;
        write!(
            f,
            "time:        {:.3}s evaluating, {:.3}s verifying ({:.1}% share)",
            self.evaluate_secs,
            self.verifier_secs,
            self.verifier_share() * 100.0
        )
    }
}
