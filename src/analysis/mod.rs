//! Fixed-priority schedulability analysis over a timing model.
//!
//! The compiled automata release a periodic task every `period`, release an
//! event-triggered task on the completion of an upstream task (dropping the
//! activation if the task is still busy), and dispatch the ready task with
//! the lowest `(priority, declaration index)` on each core. The functions
//! here compute worst-case bounds for exactly that behaviour: they back the
//! in-process verifier and the analytic objective metrics.

pub mod graph;

use crate::model::{ComponentId, ConnectionId, Millis, Property, Scheduler, TimingModel};

pub use graph::ConnectionGraph;

/// Fixed-point iterations stop once a response time exceeds this many
/// milliseconds; the task is then reported as unbounded.
const RESPONSE_HORIZON_MS: f64 = 1.0e9;
const MAX_ITERATIONS: usize = 100_000;

/// Per-model scheduling view: core placement, activation rates and
/// worst-case response times.
#[derive(Clone, Debug)]
pub struct TaskSet {
    cores: Vec<u32>,
    activation: Vec<Option<f64>>,
    wcet: Vec<f64>,
    order: Vec<(i64, usize)>,
    core_count: u32,
    scheduler: Scheduler,
    periodic: Vec<bool>,
    response: Vec<Option<f64>>,
}

impl TaskSet {
    pub fn new(model: &TimingModel) -> Self {
        let n = model.components().len();
        let activation = activation_periods(model);
        let wcet: Vec<f64> = model.components().iter().map(|c| c.wcet.as_f64()).collect();
        let cores = assign_cores(model, &activation);
        let order = model
            .components()
            .iter()
            .enumerate()
            .map(|(i, c)| (c.priority, i))
            .collect();
        let periodic = model.components().iter().map(|c| c.is_periodic()).collect();

        let mut set = TaskSet {
            cores,
            activation,
            wcet,
            order,
            core_count: model.cpu().cores,
            scheduler: model.cpu().scheduler,
            periodic,
            response: vec![None; n],
        };
        let response = (0..n).map(|i| set.compute_response(i)).collect();
        set.response = response;
        set
    }

    pub fn len(&self) -> usize {
        self.wcet.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wcet.is_empty()
    }

    pub fn core_of(&self, id: ComponentId) -> u32 {
        self.cores[id]
    }

    pub fn core_count(&self) -> u32 {
        self.core_count
    }

    /// Minimum inter-activation time; `None` for one-shot tasks.
    pub fn activation_period(&self, id: ComponentId) -> Option<f64> {
        self.activation[id]
    }

    pub fn utilisation(&self, id: ComponentId) -> f64 {
        match self.activation[id] {
            Some(t) if t > 0.0 => self.wcet[id] / t,
            _ => 0.0,
        }
    }

    /// Σ wcet/period per core.
    pub fn core_utilisation(&self) -> Vec<f64> {
        let mut per_core = vec![0.0; self.core_count as usize];
        for id in 0..self.len() {
            per_core[self.cores[id] as usize] += self.utilisation(id);
        }
        per_core
    }

    /// Worst-case response time from release; `None` when unbounded.
    pub fn response_time(&self, id: ComponentId) -> Option<f64> {
        self.response[id]
    }

    /// Tasks sharing `id`'s core that are dispatched before it.
    pub fn higher_priority(&self, id: ComponentId) -> impl Iterator<Item = ComponentId> + '_ {
        let core = self.cores[id];
        let key = self.order[id];
        (0..self.len()).filter(move |&j| j != id && self.cores[j] == core && self.order[j] < key)
    }

    fn lower_priority(&self, id: ComponentId) -> impl Iterator<Item = ComponentId> + '_ {
        let core = self.cores[id];
        let key = self.order[id];
        (0..self.len()).filter(move |&j| j != id && self.cores[j] == core && self.order[j] > key)
    }

    fn compute_response(&self, id: ComponentId) -> Option<f64> {
        let hp: Vec<ComponentId> = self.higher_priority(id).collect();
        let hp_load: f64 = hp.iter().map(|&j| self.utilisation(j)).sum();
        if hp_load >= 1.0 {
            return None;
        }
        let c = self.wcet[id];
        match self.scheduler {
            Scheduler::PreemptiveFp => {
                let interference = |w: f64| -> f64 {
                    hp.iter()
                        .map(|&j| match self.activation[j] {
                            Some(t) => (w / t).ceil() * self.wcet[j],
                            None => self.wcet[j],
                        })
                        .sum()
                };
                fixed_point(c, |w| c + interference(w))
            }
            Scheduler::NonPreemptiveFp => {
                let blocking = self
                    .lower_priority(id)
                    .map(|j| self.wcet[j])
                    .fold(0.0, f64::max);
                let interference = |s: f64| -> f64 {
                    hp.iter()
                        .map(|&j| match self.activation[j] {
                            Some(t) => ((s / t).floor() + 1.0) * self.wcet[j],
                            None => self.wcet[j],
                        })
                        .sum()
                };
                let start = fixed_point(blocking, |s| blocking + interference(s))?;
                Some(start + c)
            }
        }
    }

    /// Worst wait between an upstream completion and the next start of
    /// `target`.
    ///
    /// A periodic target that overruns re-arms only on completion, so the
    /// wait is `max(T, R)`. An event-triggered target drops every upstream
    /// completion that arrives while it is busy; the next accepted one comes
    /// `ceil(R / T_src)` source periods later.
    pub fn handoff_wait(&self, target: ComponentId) -> f64 {
        let Some(r) = self.response[target] else {
            return f64::INFINITY;
        };
        if self.periodic[target] {
            return self.activation[target].map_or(f64::INFINITY, |t| t.max(r));
        }
        match self.activation[target] {
            Some(t) if r > t => (r / t).ceil() * t,
            _ => 0.0,
        }
    }
}

/// Iterate `w ← f(w)` from `start` until it stabilises.
fn fixed_point(start: f64, f: impl Fn(f64) -> f64) -> Option<f64> {
    let mut w = start;
    for _ in 0..MAX_ITERATIONS {
        let next = f(w);
        if next > RESPONSE_HORIZON_MS || !next.is_finite() {
            return None;
        }
        if (next - w).abs() < 1e-9 {
            return Some(next);
        }
        w = next;
    }
    None
}

/// Periodic tasks use their period; event-triggered tasks inherit the
/// fastest activation among their upstream tasks. Source-less event tasks
/// (and cycles without a periodic source) fire once: `None`.
pub fn activation_periods(model: &TimingModel) -> Vec<Option<f64>> {
    let n = model.components().len();
    let mut memo: Vec<Option<Option<f64>>> = vec![None; n];
    let mut visiting = vec![false; n];

    fn visit(
        id: ComponentId,
        model: &TimingModel,
        memo: &mut [Option<Option<f64>>],
        visiting: &mut [bool],
    ) -> Option<f64> {
        if let Some(known) = memo[id] {
            return known;
        }
        if let Some(p) = model.component(id).period {
            memo[id] = Some(Some(p.as_f64()));
            return Some(p.as_f64());
        }
        if visiting[id] {
            return None;
        }
        visiting[id] = true;
        let mut fastest: Option<f64> = None;
        for up in model.upstream(id) {
            if let Some(t) = visit(up, model, memo, visiting) {
                fastest = Some(fastest.map_or(t, |f: f64| f.min(t)));
            }
        }
        visiting[id] = false;
        memo[id] = Some(fastest);
        fastest
    }

    (0..n)
        .map(|id| visit(id, model, &mut memo, &mut visiting))
        .collect()
}

/// Pinned components keep their core; the rest go worst-fit-decreasing by
/// utilisation, ties broken by declaration order and then lowest core.
pub fn assign_cores(model: &TimingModel, activation: &[Option<f64>]) -> Vec<u32> {
    let cores = model.cpu().cores.max(1);
    let n = model.components().len();
    let util = |i: usize| match activation[i] {
        Some(t) if t > 0.0 => model.component(i).wcet.as_f64() / t,
        _ => 0.0,
    };

    let mut load = vec![0.0; cores as usize];
    let mut placement = vec![0u32; n];
    let mut free = Vec::new();
    for (i, c) in model.components().iter().enumerate() {
        match c.core {
            Some(core) => {
                let core = core.min(cores - 1);
                placement[i] = core;
                load[core as usize] += util(i);
            }
            None => free.push(i),
        }
    }

    free.sort_by(|&a, &b| util(b).total_cmp(&util(a)).then(a.cmp(&b)));
    for i in free {
        let mut best = 0usize;
        for k in 1..load.len() {
            if load[k] < load[best] {
                best = k;
            }
        }
        placement[i] = best as u32;
        load[best] += util(i);
    }
    placement
}

// ─── Latency bounds ────────────────────────────────────────────────

/// Worst-case bounds for one response property.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyBound {
    /// Stimulus start to response completion.
    pub latency: f64,
    /// Per folded connection: (connection, worst handoff wait).
    pub hops: Vec<(ConnectionId, f64)>,
}

/// The connection path a property observer follows.
pub fn property_path(graph: &ConnectionGraph, prop: &Property) -> Option<Vec<ConnectionId>> {
    match prop.chain() {
        Some(chain) => graph.chain(chain),
        None => graph.path(prop.stimulus(), prop.response()),
    }
}

pub fn property_bound(model: &TimingModel, tasks: &TaskSet, path: Option<&[ConnectionId]>, prop: &Property) -> PropertyBound {
    let stim = prop.stimulus();
    let resp = prop.response();
    let rt = |id| tasks.response_time(id).unwrap_or(f64::INFINITY);

    match path {
        Some(path) => {
            let mut latency = rt(stim);
            let mut hops = Vec::with_capacity(path.len());
            for &cid in path {
                let target = model.connections()[cid].target.component;
                let wait = tasks.handoff_wait(target);
                latency += wait + rt(target);
                hops.push((cid, wait));
            }
            PropertyBound { latency, hops }
        }
        None => {
            // Not causally linked: the observer closes on the next
            // completion of the response task.
            let latency = match tasks.activation_period(resp) {
                Some(t) => t + rt(resp),
                None => f64::INFINITY,
            };
            PropertyBound {
                latency,
                hops: Vec::new(),
            }
        }
    }
}

/// Slack of `id` against its effective deadline (negative when missed).
pub fn slack(model: &TimingModel, tasks: &TaskSet, id: ComponentId) -> f64 {
    let deadline = model
        .component(id)
        .effective_deadline()
        .map(Millis::as_f64)
        .or(tasks.activation_period(id))
        .unwrap_or(f64::INFINITY);
    match tasks.response_time(id) {
        Some(r) => deadline - r,
        None => f64::NEG_INFINITY,
    }
}

#[cfg(test)]
mod tests;
