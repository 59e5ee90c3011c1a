//! Attribute references: the handles optimisation variables and attribute
//! metrics use to read and overwrite one field of a model.
//!
//! Accepted forms:
//! - `Component.period` / `.deadline` / `.wcet` / `.priority`
//! - `<connection-id>.latency_budget`
//! - `(Src.port->Dst.port).latency_budget` or `(Src->Dst).latency_budget`

use std::fmt;

use super::{ComponentId, ConnectionId, Millis, TimingModel, VariableKind};
use crate::error::InvalidModelError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentAttr {
    Period,
    Deadline,
    Wcet,
    Priority,
}

impl ComponentAttr {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "period" => Some(Self::Period),
            "deadline" => Some(Self::Deadline),
            "wcet" => Some(Self::Wcet),
            "priority" => Some(Self::Priority),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Period => "period",
            Self::Deadline => "deadline",
            Self::Wcet => "wcet",
            Self::Priority => "priority",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeRef {
    Component {
        component: ComponentId,
        attr: ComponentAttr,
    },
    ConnectionBudget {
        connection: ConnectionId,
    },
}

impl AttributeRef {
    /// Resolve `text` against `model`.
    pub fn parse(text: &str, model: &TimingModel) -> Result<Self, InvalidModelError> {
        let text = text.trim();
        let (head, attr) = text.rsplit_once('.').ok_or_else(|| {
            InvalidModelError::new(format!(
                "attribute reference '{}' must have the form <target>.<attribute>",
                text
            ))
        })?;

        if attr == "latency_budget" {
            let connection = resolve_connection(head, model).ok_or_else(|| {
                InvalidModelError::new(format!(
                    "attribute reference '{}' names an unknown connection '{}'",
                    text, head
                ))
            })?;
            return Ok(AttributeRef::ConnectionBudget { connection });
        }

        let attr = ComponentAttr::parse(attr).ok_or_else(|| {
            InvalidModelError::new(format!(
                "unknown attribute '{}' in '{}' (expected period, deadline, wcet, priority or latency_budget)",
                attr, text
            ))
        })?;
        let component = model.lookup(head).ok_or_else(|| {
            InvalidModelError::new(format!(
                "attribute reference '{}' names an unknown component '{}'",
                text, head
            ))
        })?;
        Ok(AttributeRef::Component { component, attr })
    }

    pub fn kind(&self) -> VariableKind {
        match self {
            AttributeRef::Component {
                attr: ComponentAttr::Priority,
                ..
            } => VariableKind::Integer,
            _ => VariableKind::Duration,
        }
    }

    /// Current value; `None` when the attribute is unset (e.g. no deadline).
    pub fn get(&self, model: &TimingModel) -> Option<f64> {
        match *self {
            AttributeRef::Component { component, attr } => {
                let c = model.component(component);
                match attr {
                    ComponentAttr::Period => c.period.map(Millis::as_f64),
                    ComponentAttr::Deadline => c.deadline.map(Millis::as_f64),
                    ComponentAttr::Wcet => Some(c.wcet.as_f64()),
                    ComponentAttr::Priority => Some(c.priority as f64),
                }
            }
            AttributeRef::ConnectionBudget { connection } => model.connections()[connection]
                .latency_budget
                .map(Millis::as_f64),
        }
    }

    /// Overwrite the attribute with an already-rounded value.
    pub fn set(&self, model: &mut TimingModel, value: f64) {
        match *self {
            AttributeRef::Component { component, attr } => {
                let c = model.component_mut(component);
                match attr {
                    ComponentAttr::Period => c.period = Some(Millis::from_f64(value)),
                    ComponentAttr::Deadline => c.deadline = Some(Millis::from_f64(value)),
                    ComponentAttr::Wcet => c.wcet = Millis::from_f64(value),
                    ComponentAttr::Priority => c.priority = value.round() as i64,
                }
            }
            AttributeRef::ConnectionBudget { connection } => {
                model.connection_mut(connection).latency_budget = Some(Millis::from_f64(value));
            }
        }
    }

    /// Canonical textual form against `model`.
    pub fn display<'a>(&'a self, model: &'a TimingModel) -> impl fmt::Display + 'a {
        DisplayRef { attr: self, model }
    }
}

struct DisplayRef<'a> {
    attr: &'a AttributeRef,
    model: &'a TimingModel,
}

impl fmt::Display for DisplayRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self.attr {
            AttributeRef::Component { component, attr } => {
                write!(f, "{}.{}", self.model.name_of(component), attr.as_str())
            }
            AttributeRef::ConnectionBudget { connection } => {
                write!(f, "({}).latency_budget", self.model.connections()[connection].id)
            }
        }
    }
}

/// Find a connection by id, or by its `Src[.port]->Dst[.port]` endpoints.
fn resolve_connection(head: &str, model: &TimingModel) -> Option<ConnectionId> {
    let head = head
        .strip_prefix('(')
        .and_then(|h| h.strip_suffix(')'))
        .unwrap_or(head)
        .trim();
    if let Some(idx) = model.connection_by_id(head) {
        return Some(idx);
    }

    let (src, dst) = head.split_once("->")?;
    let (src_comp, src_port) = split_endpoint(src.trim());
    let (dst_comp, dst_port) = split_endpoint(dst.trim());
    let src_id = model.lookup(src_comp)?;
    let dst_id = model.lookup(dst_comp)?;

    model.connections().iter().position(|c| {
        c.source.component == src_id
            && c.target.component == dst_id
            && src_port.map_or(true, |p| p == c.source.port)
            && dst_port.map_or(true, |p| p == c.target.port)
    })
}

fn split_endpoint(text: &str) -> (&str, Option<&str>) {
    match text.split_once('.') {
        Some((comp, port)) => (comp, Some(port)),
        None => (text, None),
    }
}
