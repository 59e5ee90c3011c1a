//! Error taxonomy.
//!
//! Structural errors (`InvalidModelError`, `EncodingError`) abort a run
//! before or during search. Per-candidate failures
//! (`VerificationUnavailableError`) are absorbed into the feasibility score,
//! and `IndicatorComputationError` only blanks one trace entry.

use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostic::Diagnostic;

/// Unresolved reference, malformed range or otherwise unusable model.
#[derive(Debug, Clone, Error)]
#[error("invalid model: {0}")]
pub struct InvalidModelError(pub Diagnostic);

impl InvalidModelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(Diagnostic::error(message.into(), crate::span::Span::dummy()))
    }

    pub fn diagnostic(&self) -> &Diagnostic {
        &self.0
    }
}

impl From<Diagnostic> for InvalidModelError {
    fn from(diag: Diagnostic) -> Self {
        Self(diag)
    }
}

/// The verifier could not produce an answer (timeout, crash, garbage output).
#[derive(Debug, Clone, Error)]
#[error("{verifier} unavailable: {reason}")]
pub struct VerificationUnavailableError {
    pub verifier: String,
    pub reason: String,
}

impl VerificationUnavailableError {
    pub fn new(verifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            verifier: verifier.into(),
            reason: reason.into(),
        }
    }
}

/// A decision vector does not match the declared variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("decision vector has {actual} values, model declares {expected} variables")]
pub struct EncodingError {
    pub expected: usize,
    pub actual: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorComputationError {
    #[error("no feasible points to measure")]
    EmptyFront,
    #[error("reference point does not bound the front in objective {0}")]
    DegenerateReference(usize),
    #[error("point has {actual} objectives, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    InvalidModel(#[from] InvalidModelError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Verification(#[from] VerificationUnavailableError),
    #[error(transparent)]
    Indicator(#[from] IndicatorComputationError),
    #[error("cannot access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot render UPPAAL XML: {0}")]
    Xml(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot start evaluation pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
