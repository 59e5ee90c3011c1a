//! Optimisation specification: variables, objectives and constraints.

use std::fmt;

use super::attr::AttributeRef;
use super::expr::Expr;

/// Resolution a variable is rounded to before it reaches the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariableKind {
    /// Whole milliseconds.
    Duration,
    /// Whole numbers (priorities).
    Integer,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    /// Reference text as written in the model, used for reports.
    pub name: String,
    pub target: AttributeRef,
    pub lo: f64,
    pub hi: f64,
}

impl Variable {
    pub fn kind(&self) -> VariableKind {
        self.target.kind()
    }

    /// Round to the variable's resolution, then clamp into `[lo, hi]`.
    pub fn quantise(&self, value: f64) -> f64 {
        let v = if value.is_finite() {
            value.round()
        } else {
            self.lo
        };
        v.clamp(self.lo, self.hi)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Minimize,
    Maximize,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Minimize => write!(f, "min"),
            Direction::Maximize => write!(f, "max"),
        }
    }
}

/// Quantities an objective (or a constraint name) can refer to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
    MaxCoreUtilisation,
    TotalUtilisation,
    WorstEnd2EndLatency,
    DeadlineMisses,
    LatencyViolations,
    PropertyViolations,
    SumWcet,
    MinSlack,
    Attribute(AttributeRef),
}

impl Metric {
    pub const BUILTIN: [(&'static str, Metric); 8] = [
        ("max_core_utilisation", Metric::MaxCoreUtilisation),
        ("total_utilisation", Metric::TotalUtilisation),
        ("worst_end2end_latency", Metric::WorstEnd2EndLatency),
        ("deadline_misses", Metric::DeadlineMisses),
        ("latency_violations", Metric::LatencyViolations),
        ("property_violations", Metric::PropertyViolations),
        ("sum_wcet", Metric::SumWcet),
        ("min_slack", Metric::MinSlack),
    ];

    /// Built-in metric by name. `max_core_utilization` is accepted too.
    pub fn builtin(name: &str) -> Option<Metric> {
        let name = match name {
            "max_core_utilization" => "max_core_utilisation",
            "total_utilization" => "total_utilisation",
            other => other,
        };
        Self::BUILTIN
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, m)| *m)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Objective {
    pub name: String,
    pub direction: Direction,
    pub metric: Metric,
}

impl Objective {
    /// Map a raw metric value into the internal minimisation space.
    pub fn to_minimised(&self, value: f64) -> f64 {
        match self.direction {
            Direction::Minimize => value,
            Direction::Maximize => -value,
        }
    }

    /// Inverse of [`Objective::to_minimised`].
    pub fn from_minimised(&self, value: f64) -> f64 {
        self.to_minimised(value)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub text: String,
    pub expr: Expr,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptimisationSpec {
    pub variables: Vec<Variable>,
    pub objectives: Vec<Objective>,
    pub constraints: Vec<Constraint>,
}

impl OptimisationSpec {
    pub fn dimension(&self) -> usize {
        self.variables.len()
    }

    pub fn objective_count(&self) -> usize {
        self.objectives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
