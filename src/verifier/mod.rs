//! Verifier adapters: answer every safety query of a compiled network.

pub mod analytic;
pub mod uppaal;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::compile::NetworkDescription;
use crate::error::VerificationUnavailableError;

pub use analytic::AnalyticVerifier;
pub use uppaal::UppaalVerifier;

/// Outcome of one query.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResult {
    pub name: String,
    /// The watched location is unreachable.
    pub satisfied: bool,
    pub elapsed: Duration,
    /// Worst latency or response time behind the verdict, when known.
    pub witness: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VerifierResponse {
    /// One entry per query, in query order.
    pub results: Vec<QueryResult>,
}

impl VerifierResponse {
    pub fn get(&self, name: &str) -> Option<&QueryResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn all_satisfied(&self) -> bool {
        self.results.iter().all(|r| r.satisfied)
    }

    pub fn elapsed(&self) -> Duration {
        self.results.iter().map(|r| r.elapsed).sum()
    }
}

/// A backend that decides the queries of a network.
///
/// Implementations are shared across the evaluation pool, so `verify`
/// takes `&self` and must be safe to call concurrently.
pub trait Verifier: Send + Sync {
    fn name(&self) -> &str;
    fn verify(&self, net: &NetworkDescription) -> Result<VerifierResponse, VerificationUnavailableError>;
}

impl<V: Verifier + ?Sized> Verifier for Arc<V> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn verify(&self, net: &NetworkDescription) -> Result<VerifierResponse, VerificationUnavailableError> {
        (**self).verify(net)
    }
}

// ─── Backend selection ─────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backend {
    #[default]
    Analytic,
    Uppaal,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Analytic => write!(f, "analytic"),
            Backend::Uppaal => write!(f, "uppaal"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analytic" | "rta" => Ok(Backend::Analytic),
            "uppaal" | "verifyta" => Ok(Backend::Uppaal),
            other => Err(format!("unknown verifier backend '{}' (expected analytic or uppaal)", other)),
        }
    }
}

/// Verifier section of the run configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct VerifierSettings {
    pub backend: Backend,
    /// `verifyta` binary; falls back to `$TEMPORA_VERIFYTA`, then `PATH`.
    pub path: Option<PathBuf>,
    pub timeout: Duration,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Analytic,
            path: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl VerifierSettings {
    pub fn build(&self) -> Box<dyn Verifier> {
        match self.backend {
            Backend::Analytic => Box::new(AnalyticVerifier::new()),
            Backend::Uppaal => Box::new(UppaalVerifier::new(self.path.clone(), self.timeout)),
        }
    }
}
