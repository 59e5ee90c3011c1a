//! Timing model → timed-automata network.
//!
//! One task automaton per component, one latency observer per budgeted
//! connection that no property path covers, and one response observer per
//! property. Every `Bad`/`DeadlineMiss` location gets a safety query
//! `A[] not <Automaton>.<Location>`.
//!
//! Scheduling is expressed in the global declarations rather than in a
//! scheduler automaton: each core dispatches the ready task with the
//! lowest `(priority, index)` rank and each task's execution clock is a
//! stopwatch that only runs while `is_running(i)` holds.

mod observer;
mod task;
pub mod xml;

use std::collections::HashSet;
use std::fmt;

use crate::analysis::{assign_cores, activation_periods, property_path, ConnectionGraph};
use crate::error::InvalidModelError;
use crate::model::{AttributeRef, ComponentId, ConnectionId, Scheduler, TimingModel};

pub use xml::{render_queries, render_xml};

// ─── Network description ───────────────────────────────────────────

/// What an automaton watches, with the resolved subject.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Task { component: ComponentId },
    Latency { connection: ConnectionId },
    /// `path` is the connection chain the observer follows; `None` when
    /// the response is not reachable from the stimulus.
    Response {
        property: usize,
        path: Option<Vec<ConnectionId>>,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LocationKind {
    #[default]
    Normal,
    Committed,
    Urgent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub name: String,
    pub invariant: Option<String>,
    pub kind: LocationKind,
}

impl Location {
    pub(crate) fn normal(name: &str) -> Self {
        Self {
            name: name.to_string(),
            invariant: None,
            kind: LocationKind::Normal,
        }
    }

    pub(crate) fn committed(name: &str) -> Self {
        Self {
            kind: LocationKind::Committed,
            ..Self::normal(name)
        }
    }

    pub(crate) fn with_invariant(mut self, invariant: String) -> Self {
        self.invariant = Some(invariant);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
    pub guard: Option<String>,
    pub sync: Option<String>,
    pub update: Option<String>,
}

impl Edge {
    pub(crate) fn new(from: usize, to: usize) -> Self {
        Self {
            from,
            to,
            ..Self::default()
        }
    }

    pub(crate) fn guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    pub(crate) fn sync(mut self, sync: impl Into<String>) -> Self {
        self.sync = Some(sync.into());
        self
    }

    pub(crate) fn update(mut self, update: impl Into<String>) -> Self {
        self.update = Some(update.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Automaton {
    pub name: String,
    pub role: Role,
    pub clocks: Vec<String>,
    pub locations: Vec<Location>,
    pub edges: Vec<Edge>,
    pub init: usize,
}

impl Automaton {
    pub fn location(&self, name: &str) -> Option<usize> {
        self.locations.iter().position(|l| l.name == name)
    }

    /// Add a location and return its index.
    pub(crate) fn add(&mut self, location: Location) -> usize {
        self.locations.push(location);
        self.locations.len() - 1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryKind {
    DeadlineMiss,
    Latency,
    Property,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKind::DeadlineMiss => write!(f, "deadline"),
            QueryKind::Latency => write!(f, "latency"),
            QueryKind::Property => write!(f, "property"),
        }
    }
}

/// A safety query: the named location is never reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    /// `deadline.<component>`, `latency.<connection>` or `property.<id>`.
    pub name: String,
    pub formula: String,
    pub kind: QueryKind,
    /// Component, connection or property id the query is about.
    pub subject: String,
    /// Index of the automaton holding the watched location.
    pub automaton: usize,
}

/// Compiler output for one candidate model.
#[derive(Clone, Debug)]
pub struct NetworkDescription {
    pub automata: Vec<Automaton>,
    /// Global UPPAAL declarations: channels, dispatch tables and the
    /// scheduling predicates.
    pub declarations: String,
    pub queries: Vec<Query>,
    model: TimingModel,
}

impl NetworkDescription {
    /// The model this network was compiled from.
    pub fn model(&self) -> &TimingModel {
        &self.model
    }

    pub fn query(&self, name: &str) -> Option<&Query> {
        self.queries.iter().find(|q| q.name == name)
    }

    pub fn automaton(&self, name: &str) -> Option<&Automaton> {
        self.automata.iter().find(|a| a.name == name)
    }
}

// ─── Compilation ───────────────────────────────────────────────────

/// Per-task names and dispatch data shared by all automata builders.
pub(crate) struct Symbols {
    /// Sanitised, unique per component; used for channels and templates.
    pub(crate) base: Vec<String>,
    /// Dispatch rank: position in `(priority, index)` order.
    pub(crate) rank: Vec<usize>,
    pub(crate) core: Vec<u32>,
    pub(crate) scheduler: Scheduler,
}

impl Symbols {
    pub(crate) fn start(&self, id: ComponentId) -> String {
        format!("start_{}", self.base[id])
    }

    pub(crate) fn done(&self, id: ComponentId) -> String {
        format!("done_{}", self.base[id])
    }
}

/// Translate `model` into an automata network and its queries.
pub fn compile(model: &TimingModel) -> Result<NetworkDescription, InvalidModelError> {
    check_references(model)?;

    let n = model.components().len();
    let mut task_names = Namer::default();
    let base: Vec<String> = model
        .components()
        .iter()
        .map(|c| task_names.fresh(&c.id))
        .collect();

    let mut order: Vec<ComponentId> = (0..n).collect();
    order.sort_by_key(|&i| (model.component(i).priority, i));
    let mut rank = vec![0; n];
    for (r, &i) in order.iter().enumerate() {
        rank[i] = r;
    }

    let activation = activation_periods(model);
    let symbols = Symbols {
        base,
        rank,
        core: assign_cores(model, &activation),
        scheduler: model.cpu().scheduler,
    };

    let mut automata = Vec::new();
    let mut queries = Vec::new();

    for id in 0..n {
        let automaton = task::build(model, &symbols, id);
        if model.component(id).deadline.is_some() {
            queries.push(safety_query(
                &automaton,
                automata.len(),
                "DeadlineMiss",
                QueryKind::DeadlineMiss,
                &model.component(id).id,
            ));
        }
        automata.push(automaton);
    }

    // Property paths first: budgeted connections they cover are checked
    // inside the response observer instead of a standalone one.
    let graph = ConnectionGraph::new(model);
    let mut paths = Vec::with_capacity(model.properties().len());
    for prop in model.properties() {
        let path = property_path(&graph, prop);
        if prop.chain().is_some() && path.is_none() {
            return Err(InvalidModelError::new(format!(
                "property '{}' names a chain with an unconnected hop",
                prop.id
            )));
        }
        paths.push(path);
    }
    let covered: HashSet<ConnectionId> = paths.iter().flatten().flatten().copied().collect();

    let mut observer_names = Namer::default();
    for (cid, conn) in model.connections().iter().enumerate() {
        if conn.latency_budget.is_none() || covered.contains(&cid) {
            continue;
        }
        let name = format!("Latency_{}", observer_names.fresh(&conn.id));
        let automaton = observer::latency(model, &symbols, cid, name);
        queries.push(safety_query(
            &automaton,
            automata.len(),
            "Bad",
            QueryKind::Latency,
            &conn.id,
        ));
        automata.push(automaton);
    }

    let mut response_names = Namer::default();
    for (pidx, (prop, path)) in model.properties().iter().zip(paths).enumerate() {
        let name = format!("Response_{}", response_names.fresh(&prop.id));
        let automaton = observer::response(model, &symbols, pidx, path, name);
        queries.push(safety_query(
            &automaton,
            automata.len(),
            "Bad",
            QueryKind::Property,
            &prop.id,
        ));
        automata.push(automaton);
    }

    let declarations = task::declarations(model, &symbols);
    Ok(NetworkDescription {
        automata,
        declarations,
        queries,
        model: model.clone(),
    })
}

fn safety_query(
    automaton: &Automaton,
    index: usize,
    location: &str,
    kind: QueryKind,
    subject: &str,
) -> Query {
    Query {
        name: format!("{}.{}", kind, subject),
        formula: format!("A[] not {}.{}", automaton.name, location),
        kind,
        subject: subject.to_string(),
        automaton: index,
    }
}

/// Everything the automata refer to must exist and be well formed. Models
/// from the loader always pass; decoded candidates are checked again.
fn check_references(model: &TimingModel) -> Result<(), InvalidModelError> {
    let n = model.components().len();
    if n == 0 {
        return Err(InvalidModelError::new("model has no components"));
    }
    for c in model.components() {
        if c.wcet.0 == 0 {
            return Err(InvalidModelError::new(format!("component '{}' has zero wcet", c.id)));
        }
        if c.period.is_some_and(|p| p.0 == 0) {
            return Err(InvalidModelError::new(format!("component '{}' has zero period", c.id)));
        }
    }
    for conn in model.connections() {
        if conn.source.component >= n || conn.target.component >= n {
            return Err(InvalidModelError::new(format!(
                "connection '{}' refers to a missing component",
                conn.id
            )));
        }
    }
    for prop in model.properties() {
        let ends = [prop.stimulus(), prop.response()];
        let chain = prop.chain().unwrap_or(&ends);
        if chain.iter().any(|&c| c >= n) {
            return Err(InvalidModelError::new(format!(
                "property '{}' refers to a missing component",
                prop.id
            )));
        }
    }
    for var in &model.optimisation().variables {
        let resolves = match var.target {
            AttributeRef::Component { component, .. } => component < n,
            AttributeRef::ConnectionBudget { connection } => connection < model.connections().len(),
        };
        if !resolves {
            return Err(InvalidModelError::new(format!(
                "variable '{}' does not resolve",
                var.name
            )));
        }
    }
    Ok(())
}

// ─── Naming ────────────────────────────────────────────────────────

/// Sanitise an identifier to `[A-Za-z0-9_]`, never starting with a digit.
pub fn sanitise(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Hands out sanitised names, suffixing `_2`, `_3`, … on collision in
/// request order.
#[derive(Default)]
struct Namer {
    used: HashSet<String>,
}

impl Namer {
    fn fresh(&mut self, raw: &str) -> String {
        let base = sanitise(raw);
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut k = 2;
        loop {
            let candidate = format!("{}_{}", base, k);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            k += 1;
        }
    }
}
