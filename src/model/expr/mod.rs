//! Constraint expressions.
//!
//! Constraints are boolean/arithmetic trees over property names, query
//! names, aggregate counters and metrics, e.g.
//! `deadline_misses == 0 && (EndToEndLatency || worst_end2end_latency <= 120ms)`.
//! Durations written with a unit are converted to milliseconds when lexed.

mod lexer;
mod parser;

use std::fmt;

use crate::diagnostic::Diagnostic;
use crate::span::Spanned;

use lexer::Lexer;
use parser::Parser;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }

    fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Bool(bool),
    Number(f64),
    Name(Spanned<String>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Number(f64),
}

impl Value {
    fn type_name(self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
        }
    }
}

/// Name resolution for evaluation.
pub trait Env {
    fn lookup(&self, name: &str) -> Option<Value>;
}

impl<F> Env for F
where
    F: Fn(&str) -> Option<Value>,
{
    fn lookup(&self, name: &str) -> Option<Value> {
        self(name)
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("unknown name '{0}'")]
    UnknownName(String),
    #[error("expected {expected}, found {found} in '{context}'")]
    Type {
        expected: &'static str,
        found: &'static str,
        context: String,
    },
}

/// Parse a constraint expression.
pub fn parse(source: &str) -> Result<Expr, Vec<Diagnostic>> {
    let (tokens, errors) = Lexer::new(source).tokenize();
    if !errors.is_empty() {
        return Err(errors);
    }
    Parser::new(tokens).parse_expression().map_err(|d| vec![d])
}

/// Parse `A -> B -> C within 100ms` into the component names and the bound
/// in milliseconds.
pub fn parse_latency_chain(source: &str) -> Result<(Vec<Spanned<String>>, f64), Vec<Diagnostic>> {
    let (tokens, errors) = Lexer::new(source).tokenize();
    if !errors.is_empty() {
        return Err(errors);
    }
    Parser::new(tokens).parse_latency_chain().map_err(|d| vec![d])
}

impl Expr {
    pub(crate) fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Every name referenced, in source order.
    pub fn names(&self) -> Vec<&Spanned<String>> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a Spanned<String>>) {
        match self {
            Expr::Bool(_) | Expr::Number(_) => {}
            Expr::Name(n) => out.push(n),
            Expr::Not(e) | Expr::Neg(e) => e.collect_names(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_names(out);
                rhs.collect_names(out);
            }
        }
    }

    /// Evaluate. `&&` and `||` short-circuit left to right: the right
    /// operand is not looked at when the left decides the result.
    pub fn eval(&self, env: &dyn Env) -> Result<Value, EvalError> {
        match self {
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Name(name) => env
                .lookup(&name.node)
                .ok_or_else(|| EvalError::UnknownName(name.node.clone())),
            Expr::Not(e) => Ok(Value::Bool(!self.expect_bool(e, env)?)),
            Expr::Neg(e) => Ok(Value::Number(-self.expect_number(e, env)?)),
            Expr::Binary { op, lhs, rhs } => match op {
                BinOp::And => {
                    if !self.expect_bool(lhs, env)? {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(self.expect_bool(rhs, env)?))
                }
                BinOp::Or => {
                    if self.expect_bool(lhs, env)? {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(self.expect_bool(rhs, env)?))
                }
                BinOp::Eq | BinOp::Ne => {
                    let l = lhs.eval(env)?;
                    let r = rhs.eval(env)?;
                    let equal = match (l, r) {
                        (Value::Number(a), Value::Number(b)) => a == b,
                        (Value::Bool(a), Value::Bool(b)) => a == b,
                        (a, b) => {
                            return Err(EvalError::Type {
                                expected: a.type_name(),
                                found: b.type_name(),
                                context: self.to_string(),
                            })
                        }
                    };
                    Ok(Value::Bool(if *op == BinOp::Eq { equal } else { !equal }))
                }
                BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                    let l = self.expect_number(lhs, env)?;
                    let r = self.expect_number(rhs, env)?;
                    Ok(Value::Bool(match op {
                        BinOp::Lt => l < r,
                        BinOp::Le => l <= r,
                        BinOp::Gt => l > r,
                        _ => l >= r,
                    }))
                }
                BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                    let l = self.expect_number(lhs, env)?;
                    let r = self.expect_number(rhs, env)?;
                    Ok(Value::Number(match op {
                        BinOp::Add => l + r,
                        BinOp::Sub => l - r,
                        BinOp::Mul => l * r,
                        _ => l / r,
                    }))
                }
            },
        }
    }

    /// Non-negative violation of this expression read as a constraint.
    ///
    /// Satisfied constraints give 0. A failed numeric comparison gives
    /// its excess (`|l - r|` for `==`, `l - r` for `<=`, ...), floored at 1
    /// when the excess is zero but the comparison still fails (strict
    /// bounds, `!=`). A failed conjunction sums its failed operands, a
    /// failed disjunction takes its cheapest operand, and any other false
    /// boolean costs 1.
    pub fn violation(&self, env: &dyn Env) -> Result<f64, EvalError> {
        if self.expect_bool(self, env)? {
            return Ok(0.0);
        }
        match self {
            Expr::Binary { op: BinOp::And, lhs, rhs } => Ok(lhs.violation(env)? + rhs.violation(env)?),
            Expr::Binary { op: BinOp::Or, lhs, rhs } => Ok(lhs.violation(env)?.min(rhs.violation(env)?)),
            Expr::Binary { op, lhs, rhs } if op.is_comparison() => {
                let (l, r) = match (lhs.eval(env)?, rhs.eval(env)?) {
                    (Value::Number(l), Value::Number(r)) => (l, r),
                    _ => return Ok(1.0),
                };
                let excess = match op {
                    BinOp::Eq => (l - r).abs(),
                    BinOp::Lt | BinOp::Le => l - r,
                    BinOp::Gt | BinOp::Ge => r - l,
                    _ => 0.0,
                };
                if excess.is_nan() {
                    return Ok(f64::INFINITY);
                }
                Ok(if excess > 0.0 { excess } else { 1.0 })
            }
            _ => Ok(1.0),
        }
    }

    fn expect_bool(&self, e: &Expr, env: &dyn Env) -> Result<bool, EvalError> {
        match e.eval(env)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvalError::Type {
                expected: "boolean",
                found: other.type_name(),
                context: self.to_string(),
            }),
        }
    }

    fn expect_number(&self, e: &Expr, env: &dyn Env) -> Result<f64, EvalError> {
        match e.eval(env)? {
            Value::Number(n) => Ok(n),
            Value::Bool(b) => Err(EvalError::Type {
                expected: "number",
                found: Value::Bool(b).type_name(),
                context: self.to_string(),
            }),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Name(n) => write!(f, "{}", n.node),
            Expr::Not(e) => write!(f, "!{}", e),
            Expr::Neg(e) => write!(f, "-{}", e),
            Expr::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
        }
    }
}
