//! JSON export of a finished run.

use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::indicator::TraceEntry;
use crate::model::{Component, Connection, CpuPolicy, Endpoint, Millis, TimingModel};
use crate::oracle::{Oracle, StatsSnapshot};
use crate::search::{Individual, RunReport, RunStatus};

#[derive(Debug, Serialize)]
pub struct RunExport<'a> {
    pub algorithm: String,
    pub status: RunStatus,
    pub generations: usize,
    pub evaluations: usize,
    pub evaluation_failures: usize,
    pub elapsed_secs: f64,
    /// `None` when the archive is empty.
    pub selected: Option<SelectedModel>,
    pub archive: Vec<ArchivedPoint<'a>>,
    pub trace: &'a [TraceEntry],
    pub stats: &'a StatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct SelectedModel {
    pub decision_vector: Vec<f64>,
    pub variables: Vec<NamedValue>,
    /// In the direction the model declares, not minimisation space.
    pub objectives: Vec<NamedValue>,
    pub cpu: CpuPolicy,
    pub components: Vec<Component>,
    pub connections: Vec<ExportedConnection>,
}

/// A connection with its endpoints written as `Component.port`.
#[derive(Debug, Serialize)]
pub struct ExportedConnection {
    pub id: String,
    pub source: String,
    pub target: String,
    pub latency_budget: Option<Millis>,
}

impl ExportedConnection {
    fn new(conn: &Connection, model: &TimingModel) -> Self {
        let endpoint = |e: &Endpoint| format!("{}.{}", model.component(e.component).id, e.port);
        Self {
            id: conn.id.clone(),
            source: endpoint(&conn.source),
            target: endpoint(&conn.target),
            latency_budget: conn.latency_budget,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NamedValue {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct ArchivedPoint<'a> {
    pub decision_vector: &'a [f64],
    /// Same direction as `SelectedModel::objectives`.
    pub objectives: Vec<f64>,
    pub feasible: bool,
}

impl<'a> RunExport<'a> {
    pub fn new(report: &'a RunReport, oracle: &Oracle) -> Result<Self> {
        let selected = match report.selected() {
            Some(ind) => Some(selected_model(oracle, ind)?),
            None => None,
        };
        let objectives = &oracle.model().optimisation().objectives;
        let archive = report
            .archive
            .members()
            .iter()
            .map(|m| ArchivedPoint {
                decision_vector: &m.vector,
                objectives: objectives
                    .iter()
                    .zip(&m.objectives)
                    .map(|(obj, &y)| obj.from_minimised(y))
                    .collect(),
                feasible: m.is_feasible(),
            })
            .collect();
        Ok(Self {
            algorithm: report.algorithm.to_string(),
            status: report.status,
            generations: report.generations,
            evaluations: report.evaluations,
            evaluation_failures: report.evaluation_failures,
            elapsed_secs: report.elapsed.as_secs_f64(),
            selected,
            archive,
            trace: &report.trace,
            stats: &report.stats,
        })
    }

    /// Non-finite numbers (an unmeasurable trace entry) become `null`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?).map_err(|e| Error::io(path, e))
    }
}

fn selected_model(oracle: &Oracle, ind: &Individual) -> Result<SelectedModel> {
    let model = oracle.decode(&ind.vector)?;
    let spec = model.optimisation();
    let variables = spec
        .variables
        .iter()
        .zip(&ind.vector)
        .map(|(var, &x)| NamedValue {
            name: var.name.clone(),
            value: var.quantise(x),
        })
        .collect();
    let objectives = spec
        .objectives
        .iter()
        .zip(&ind.objectives)
        .map(|(obj, &y)| NamedValue {
            name: obj.name.clone(),
            value: obj.from_minimised(y),
        })
        .collect();
    Ok(SelectedModel {
        decision_vector: ind.vector.clone(),
        variables,
        objectives,
        cpu: model.cpu(),
        components: model.components().to_vec(),
        connections: model
            .connections()
            .iter()
            .map(|c| ExportedConnection::new(c, &model))
            .collect(),
    })
}
