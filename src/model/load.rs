//! JSON model loading and validation.
//!
//! The upstream DSL tooling hands over a structured document; this module
//! checks every cross-reference and invariant and produces a `TimingModel`.
//! Errors carry a span pointing at the offending entry when it can be
//! located in the source text.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::expr::{self, Expr};
use super::spec::{Constraint, Direction, Metric, Objective, OptimisationSpec, Variable, VariableKind};
use super::{
    AttributeRef, Component, ComponentAttr, ComponentId, Connection, CpuPolicy, Endpoint, Millis,
    Property, PropertyKind, Scheduler, TimingModel,
};
use crate::diagnostic::Diagnostic;
use crate::error::{Error, InvalidModelError};
use crate::span::Span;

/// Priority assigned to components that do not declare one.
const DEFAULT_PRIORITY_BASE: i64 = 1000;

// ─── Raw document ──────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModel {
    components: Vec<RawComponent>,
    #[serde(default)]
    connections: Vec<RawConnection>,
    #[serde(default)]
    properties: Vec<RawProperty>,
    #[serde(default)]
    cpu: Option<RawCpu>,
    #[serde(default, alias = "optimization")]
    optimisation: Option<RawOptimisation>,
}

#[derive(Deserialize, Clone)]
#[serde(untagged)]
enum RawDuration {
    Millis(f64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawComponent {
    id: String,
    #[serde(default)]
    period: Option<RawDuration>,
    #[serde(default)]
    deadline: Option<RawDuration>,
    wcet: RawDuration,
    #[serde(default)]
    priority: Option<i64>,
    #[serde(default)]
    core: Option<u32>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConnection {
    #[serde(default)]
    id: Option<String>,
    source: String,
    target: String,
    #[serde(default)]
    latency_budget: Option<RawDuration>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawProperty {
    Bounded {
        id: String,
        stimulus: String,
        response: String,
        within: RawDuration,
    },
    Latency {
        id: String,
        latency: String,
    },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCpu {
    #[serde(default = "one")]
    cores: u32,
    #[serde(default)]
    scheduler: Option<String>,
}

fn one() -> u32 {
    1
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOptimisation {
    #[serde(default)]
    variables: Vec<RawVariable>,
    #[serde(default)]
    objectives: Vec<RawObjective>,
    #[serde(default)]
    constraints: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVariable {
    target: String,
    lo: RawDuration,
    hi: RawDuration,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawObjective {
    direction: RawDirection,
    metric: String,
}

#[derive(Deserialize)]
enum RawDirection {
    #[serde(alias = "min", alias = "minimize", alias = "minimise")]
    Min,
    #[serde(alias = "max", alias = "maximize", alias = "maximise")]
    Max,
}

// ─── Entry points ──────────────────────────────────────────────────

/// Read and validate a model file.
pub fn load_model(path: &Path) -> Result<TimingModel, Error> {
    let source = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(parse_model(&source)?)
}

/// Parse and validate a model document.
pub fn parse_model(source: &str) -> Result<TimingModel, InvalidModelError> {
    let raw: RawModel = serde_json::from_str(source).map_err(|e| {
        let span = Span::at_line_col(source, e.line(), e.column());
        InvalidModelError(Diagnostic::error(format!("malformed model: {}", e), span))
    })?;
    Validator { source }.build(raw).map_err(InvalidModelError)
}

// ─── Validation ────────────────────────────────────────────────────

struct Validator<'src> {
    source: &'src str,
}

impl Validator<'_> {
    fn build(&self, raw: RawModel) -> Result<TimingModel, Diagnostic> {
        if raw.components.is_empty() {
            return Err(self.error("model declares no components", "components"));
        }

        let mut components = Vec::with_capacity(raw.components.len());
        let mut index = HashMap::new();
        for (idx, rc) in raw.components.into_iter().enumerate() {
            let comp = self.component(rc, idx)?;
            if index.insert(comp.id.clone(), idx).is_some() {
                return Err(self.error(&format!("duplicate component '{}'", comp.id), &comp.id));
            }
            components.push(comp);
        }

        let cpu = self.cpu(raw.cpu)?;
        for c in &components {
            if let Some(core) = c.core {
                if core >= cpu.cores {
                    return Err(self
                        .error(
                            &format!("component '{}' is pinned to core {}", c.id, core),
                            &c.id,
                        )
                        .with_note(format!("the CPU policy declares {} core(s)", cpu.cores)));
                }
            }
        }

        let mut model = TimingModel {
            components,
            connections: Vec::new(),
            properties: Vec::new(),
            cpu,
            optimisation: OptimisationSpec::default(),
            index,
        };

        for rc in raw.connections {
            let conn = self.connection(rc, &model)?;
            if model.connections.iter().any(|c| c.id == conn.id) {
                return Err(self.error(&format!("duplicate connection '{}'", conn.id), &conn.id));
            }
            model.connections.push(conn);
        }

        for rp in raw.properties {
            let prop = self.property(rp, &model)?;
            if model.properties.iter().any(|p| p.id == prop.id)
                || model.index.contains_key(&prop.id)
            {
                return Err(self.error(&format!("duplicate name '{}'", prop.id), &prop.id));
            }
            model.properties.push(prop);
        }

        if let Some(ro) = raw.optimisation {
            model.optimisation = self.optimisation(ro, &model)?;
        }
        Ok(model)
    }

    fn component(&self, rc: RawComponent, idx: usize) -> Result<Component, Diagnostic> {
        let period = rc
            .period
            .map(|d| self.duration(&d, &rc.id, "period"))
            .transpose()?;
        let deadline = rc
            .deadline
            .map(|d| self.duration(&d, &rc.id, "deadline"))
            .transpose()?;
        let wcet = self.duration(&rc.wcet, &rc.id, "wcet")?;

        if wcet == Millis::ZERO {
            return Err(self.error(&format!("component '{}' has a zero wcet", rc.id), &rc.id));
        }
        if period == Some(Millis::ZERO) {
            return Err(self.error(&format!("component '{}' has a zero period", rc.id), &rc.id));
        }
        if let Some(d) = deadline {
            if wcet > d {
                return Err(self
                    .error(
                        &format!("component '{}' has wcet {} above its deadline {}", rc.id, wcet, d),
                        &rc.id,
                    )
                    .with_help("a task can never meet a deadline shorter than its wcet".into()));
            }
        }

        Ok(Component {
            id: rc.id,
            period,
            deadline,
            wcet,
            priority: rc
                .priority
                .unwrap_or(DEFAULT_PRIORITY_BASE + idx as i64),
            core: rc.core,
        })
    }

    fn connection(&self, rc: RawConnection, model: &TimingModel) -> Result<Connection, Diagnostic> {
        let source = self.endpoint(&rc.source, "out", model)?;
        let target = self.endpoint(&rc.target, "in", model)?;
        let id = rc.id.unwrap_or_else(|| {
            format!(
                "{}.{}->{}.{}",
                model.name_of(source.component),
                source.port,
                model.name_of(target.component),
                target.port
            )
        });
        let latency_budget = rc
            .latency_budget
            .map(|d| self.duration(&d, &id, "latency_budget"))
            .transpose()?;
        Ok(Connection {
            id,
            source,
            target,
            latency_budget,
        })
    }

    fn endpoint(&self, text: &str, default_port: &str, model: &TimingModel) -> Result<Endpoint, Diagnostic> {
        let (comp, port) = match text.split_once('.') {
            Some((c, p)) => (c.trim(), p.trim()),
            None => (text.trim(), default_port),
        };
        let component = model
            .lookup(comp)
            .ok_or_else(|| self.error(&format!("connection endpoint '{}' names an unknown component", text), text))?;
        Ok(Endpoint {
            component,
            port: port.to_string(),
        })
    }

    fn property(&self, rp: RawProperty, model: &TimingModel) -> Result<Property, Diagnostic> {
        match rp {
            RawProperty::Bounded {
                id,
                stimulus,
                response,
                within,
            } => {
                let stim = self.component_ref(&stimulus, &id, model)?;
                let resp = self.component_ref(&response, &id, model)?;
                let bound = self.duration(&within, &id, "within")?;
                Ok(Property {
                    id,
                    kind: PropertyKind::BoundedResponse {
                        stimulus: stim,
                        response: resp,
                        bound,
                    },
                })
            }
            RawProperty::Latency { id, latency } => {
                let (names, bound) = expr::parse_latency_chain(&latency).map_err(|diags| {
                    let first = diags.into_iter().next().map(|d| d.message).unwrap_or_default();
                    self.error(&format!("property '{}': {}", id, first), &latency)
                        .with_note(format!("in `{}`", latency))
                })?;
                let mut chain = Vec::with_capacity(names.len());
                for name in &names {
                    chain.push(self.component_ref(&name.node, &id, model)?);
                }
                for pair in chain.windows(2) {
                    let linked = model
                        .connections
                        .iter()
                        .any(|c| c.source.component == pair[0] && c.target.component == pair[1]);
                    if !linked {
                        return Err(self.error(
                            &format!(
                                "property '{}': no connection from '{}' to '{}'",
                                id,
                                model.name_of(pair[0]),
                                model.name_of(pair[1])
                            ),
                            &latency,
                        ));
                    }
                }
                Ok(Property {
                    id,
                    kind: PropertyKind::LatencyString {
                        text: latency,
                        chain,
                        bound: Millis::from_f64(bound),
                    },
                })
            }
        }
    }

    fn component_ref(&self, name: &str, owner: &str, model: &TimingModel) -> Result<ComponentId, Diagnostic> {
        model.lookup(name).ok_or_else(|| {
            self.error(
                &format!("property '{}' refers to unknown component '{}'", owner, name),
                owner,
            )
        })
    }

    fn cpu(&self, raw: Option<RawCpu>) -> Result<CpuPolicy, Diagnostic> {
        let Some(raw) = raw else {
            return Ok(CpuPolicy::default());
        };
        if raw.cores == 0 {
            return Err(self.error("CPU policy must declare at least one core", "cores"));
        }
        let scheduler = match raw.scheduler.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("preemptive_fp") | Some("fp") => Scheduler::PreemptiveFp,
            Some("non_preemptive_fp") | Some("npfp") => Scheduler::NonPreemptiveFp,
            Some(other) => {
                return Err(self
                    .error(&format!("unknown scheduler '{}'", other), "scheduler")
                    .with_help("expected PREEMPTIVE_FP or NON_PREEMPTIVE_FP".into()))
            }
        };
        Ok(CpuPolicy {
            cores: raw.cores,
            scheduler,
        })
    }

    fn optimisation(&self, ro: RawOptimisation, model: &TimingModel) -> Result<OptimisationSpec, Diagnostic> {
        let mut spec = OptimisationSpec::default();

        for rv in ro.variables {
            let target = AttributeRef::parse(&rv.target, model)
                .map_err(|e| self.relocate(e, &rv.target))?;
            let lo = self.bound_value(&rv.lo, &rv.target, target.kind())?;
            let hi = self.bound_value(&rv.hi, &rv.target, target.kind())?;
            if lo > hi {
                return Err(self
                    .error(&format!("variable '{}' has lo > hi", rv.target), &rv.target)
                    .with_note(format!("lo = {}, hi = {}", lo, hi)));
            }
            let needs_positive = matches!(
                target,
                AttributeRef::Component {
                    attr: ComponentAttr::Period | ComponentAttr::Wcet | ComponentAttr::Deadline,
                    ..
                }
            );
            if needs_positive && lo < 1.0 {
                return Err(self.error(
                    &format!("variable '{}' must stay at or above 1ms", rv.target),
                    &rv.target,
                ));
            }
            spec.variables.push(Variable {
                name: rv.target,
                target,
                lo,
                hi,
            });
        }

        for obj in ro.objectives {
            let metric = match Metric::builtin(&obj.metric) {
                Some(m) => m,
                None => Metric::Attribute(
                    AttributeRef::parse(&obj.metric, model).map_err(|e| self.relocate(e, &obj.metric))?,
                ),
            };
            spec.objectives.push(Objective {
                name: obj.metric,
                direction: match obj.direction {
                    RawDirection::Min => Direction::Minimize,
                    RawDirection::Max => Direction::Maximize,
                },
                metric,
            });
        }

        for text in ro.constraints {
            let expr = expr::parse(&text).map_err(|diags| {
                let first = diags.into_iter().next().map(|d| d.message).unwrap_or_default();
                self.error(&format!("cannot parse constraint: {}", first), &text)
                    .with_note(format!("in `{}`", text))
            })?;
            self.check_names(&expr, &text, model)?;
            spec.constraints.push(Constraint { text, expr });
        }

        Ok(spec)
    }

    /// Reject constraint names that no evaluation could ever bind.
    fn check_names(&self, expr: &Expr, text: &str, model: &TimingModel) -> Result<(), Diagnostic> {
        for name in expr.names() {
            if !is_bindable(&name.node, model) {
                return Err(self
                    .error(&format!("constraint refers to unknown name '{}'", name.node), text)
                    .with_note(format!("in `{}`", text))
                    .with_help(
                        "use a property id, a metric, deadline.<component>, latency.<connection> or <component>.<attribute>"
                            .into(),
                    ));
            }
        }
        Ok(())
    }

    fn duration(&self, raw: &RawDuration, owner: &str, field: &str) -> Result<Millis, Diagnostic> {
        match raw {
            RawDuration::Millis(v) if *v >= 0.0 && v.is_finite() => Ok(Millis::from_f64(*v)),
            RawDuration::Text(t) => Millis::parse(t).ok_or_else(|| {
                self.error(&format!("'{}' of '{}' is not a duration: '{}'", field, owner, t), owner)
            }),
            RawDuration::Millis(v) => Err(self.error(
                &format!("'{}' of '{}' must be a non-negative duration, got {}", field, owner, v),
                owner,
            )),
        }
    }

    fn bound_value(&self, raw: &RawDuration, owner: &str, kind: VariableKind) -> Result<f64, Diagnostic> {
        match (raw, kind) {
            (RawDuration::Millis(v), VariableKind::Integer) => Ok(v.round()),
            (RawDuration::Text(t), VariableKind::Integer) => t.trim().parse::<f64>().map(f64::round).map_err(|_| {
                self.error(&format!("bound '{}' of '{}' is not an integer", t, owner), owner)
            }),
            (raw, VariableKind::Duration) => self.duration(raw, owner, "bound").map(Millis::as_f64),
        }
    }

    fn error(&self, message: &str, needle: &str) -> Diagnostic {
        Diagnostic::error(message.to_string(), self.locate(needle))
    }

    fn relocate(&self, err: InvalidModelError, needle: &str) -> Diagnostic {
        let mut diag = err.0;
        diag.span = self.locate(needle);
        diag
    }

    /// Span of the first quoted occurrence of `needle` in the source.
    fn locate(&self, needle: &str) -> Span {
        let quoted = format!("\"{}\"", needle);
        match self.source.find(&quoted) {
            Some(at) => Span::new(at as u32, (at + quoted.len()) as u32),
            None => Span::dummy(),
        }
    }
}

/// Names a constraint may reference.
pub(crate) fn is_bindable(name: &str, model: &TimingModel) -> bool {
    if Metric::builtin(name).is_some() || model.property_by_id(name).is_some() {
        return true;
    }
    if let Some(comp) = name.strip_prefix("deadline.") {
        return model
            .lookup(comp)
            .is_some_and(|c| model.component(c).deadline.is_some());
    }
    if let Some(conn) = name.strip_prefix("latency.") {
        return model.connection_by_id(conn).is_some();
    }
    if let Some(prop) = name.strip_prefix("property.") {
        return model.property_by_id(prop).is_some();
    }
    AttributeRef::parse(name, model).is_ok()
}
