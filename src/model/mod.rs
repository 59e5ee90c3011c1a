//! Timing model: components, connections, properties, CPU policy and the
//! optimisation specification.
//!
//! Storage is arena-style. Components live in one `Vec` and everything
//! else refers to them by `ComponentId` (their declaration index), so a
//! `TimingModel` has a single owner and can be cloned cheaply per candidate.

pub mod attr;
pub mod expr;
pub mod load;
pub mod spec;

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

pub use attr::{AttributeRef, ComponentAttr};
pub use load::{load_model, parse_model};
pub use spec::{Constraint, Direction, Metric, Objective, OptimisationSpec, Variable, VariableKind};

/// Index of a component in its model's arena.
pub type ComponentId = usize;

/// Index of a connection in its model's arena.
pub type ConnectionId = usize;

// ─── Durations ─────────────────────────────────────────────────────

/// A duration at the model's resolution: whole milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Millis(pub u64);

impl Millis {
    pub const ZERO: Millis = Millis(0);

    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }

    /// Round a real-valued millisecond count to the model resolution.
    /// Negative and non-finite inputs saturate to zero.
    pub fn from_f64(value: f64) -> Millis {
        if !value.is_finite() || value <= 0.0 {
            return Millis::ZERO;
        }
        Millis(value.round() as u64)
    }

    /// Parse `"33ms"`, `"1.5s"`, `"1500us"` or a bare millisecond count.
    pub fn parse(text: &str) -> Option<Millis> {
        let text = text.trim();
        let split = text
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(text.len());
        let (number, unit) = text.split_at(split);
        let value: f64 = number.parse().ok()?;
        let scale = unit_scale(unit.trim())?;
        Some(Millis::from_f64(value * scale))
    }
}

/// Milliseconds per unit for the suffixes accepted in model files and
/// constraint expressions.
pub(crate) fn unit_scale(unit: &str) -> Option<f64> {
    match unit {
        "" | "ms" => Some(1.0),
        "s" => Some(1000.0),
        "us" => Some(0.001),
        "ns" => Some(0.000_001),
        "min" => Some(60_000.0),
        _ => None,
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// ─── Components and connections ────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Component {
    pub id: String,
    pub period: Option<Millis>,
    pub deadline: Option<Millis>,
    pub wcet: Millis,
    /// Lower value means higher priority.
    pub priority: i64,
    pub core: Option<u32>,
}

impl Component {
    pub fn is_periodic(&self) -> bool {
        self.period.is_some()
    }

    /// Deadline used for analysis: the declared one, else the period.
    pub fn effective_deadline(&self) -> Option<Millis> {
        self.deadline.or(self.period)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub component: ComponentId,
    pub port: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Connection {
    pub id: String,
    pub source: Endpoint,
    pub target: Endpoint,
    pub latency_budget: Option<Millis>,
}

// ─── Properties ────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum PropertyKind {
    /// "response completes within `bound` of stimulus start".
    BoundedResponse {
        stimulus: ComponentId,
        response: ComponentId,
        bound: Millis,
    },
    /// Textual pipeline form `A -> B -> C within 100ms`, resolved to a chain.
    LatencyString {
        text: String,
        chain: Vec<ComponentId>,
        bound: Millis,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Property {
    pub id: String,
    pub kind: PropertyKind,
}

impl Property {
    pub fn stimulus(&self) -> ComponentId {
        match &self.kind {
            PropertyKind::BoundedResponse { stimulus, .. } => *stimulus,
            PropertyKind::LatencyString { chain, .. } => chain[0],
        }
    }

    pub fn response(&self) -> ComponentId {
        match &self.kind {
            PropertyKind::BoundedResponse { response, .. } => *response,
            PropertyKind::LatencyString { chain, .. } => chain[chain.len() - 1],
        }
    }

    pub fn bound(&self) -> Millis {
        match &self.kind {
            PropertyKind::BoundedResponse { bound, .. }
            | PropertyKind::LatencyString { bound, .. } => *bound,
        }
    }

    /// Explicit chain for latency strings; `None` means "use the shortest
    /// connection path".
    pub fn chain(&self) -> Option<&[ComponentId]> {
        match &self.kind {
            PropertyKind::BoundedResponse { .. } => None,
            PropertyKind::LatencyString { chain, .. } => Some(chain),
        }
    }
}

// ─── CPU policy ────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Scheduler {
    #[default]
    PreemptiveFp,
    NonPreemptiveFp,
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheduler::PreemptiveFp => write!(f, "PREEMPTIVE_FP"),
            Scheduler::NonPreemptiveFp => write!(f, "NON_PREEMPTIVE_FP"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CpuPolicy {
    pub cores: u32,
    pub scheduler: Scheduler,
}

impl Default for CpuPolicy {
    fn default() -> Self {
        Self {
            cores: 1,
            scheduler: Scheduler::PreemptiveFp,
        }
    }
}

// ─── Timing model ──────────────────────────────────────────────────

/// Validated timing model. Construct through [`parse_model`] /
/// [`load_model`]; candidates are produced by cloning and overwriting
/// variable targets.
#[derive(Clone, Debug, PartialEq)]
pub struct TimingModel {
    pub(crate) components: Vec<Component>,
    pub(crate) connections: Vec<Connection>,
    pub(crate) properties: Vec<Property>,
    pub(crate) cpu: CpuPolicy,
    pub(crate) optimisation: OptimisationSpec,
    pub(crate) index: HashMap<String, ComponentId>,
}

impl TimingModel {
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, id: ComponentId) -> &Component {
        &self.components[id]
    }

    pub(crate) fn component_mut(&mut self, id: ComponentId) -> &mut Component {
        &mut self.components[id]
    }

    pub fn lookup(&self, name: &str) -> Option<ComponentId> {
        self.index.get(name).copied()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub(crate) fn connection_mut(&mut self, id: ConnectionId) -> &mut Connection {
        &mut self.connections[id]
    }

    pub fn connection_by_id(&self, id: &str) -> Option<ConnectionId> {
        self.connections.iter().position(|c| c.id == id)
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property_by_id(&self, id: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.id == id)
    }

    pub fn cpu(&self) -> CpuPolicy {
        self.cpu
    }

    pub fn optimisation(&self) -> &OptimisationSpec {
        &self.optimisation
    }

    /// Components whose completion triggers `id` (incoming connections).
    pub fn upstream(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut ups: Vec<ComponentId> = self
            .connections
            .iter()
            .filter(|c| c.target.component == id)
            .map(|c| c.source.component)
            .collect();
        ups.sort_unstable();
        ups.dedup();
        ups
    }

    pub fn name_of(&self, id: ComponentId) -> &str {
        &self.components[id].id
    }
}

#[cfg(test)]
mod tests;
