//! Timing-model compiler and multi-objective parameter search.
//!
//! A JSON timing model (components, connections, end-to-end properties and
//! an optimisation block) is compiled into a network of timed automata with
//! safety queries. The search strategies in [`search`] explore the declared
//! variables through an [`oracle::Oracle`] that memoises verdicts per model
//! fingerprint.

pub mod analysis;
pub mod compile;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod export;
pub mod indicator;
pub mod model;
pub mod oracle;
pub mod search;
pub mod span;
pub mod variation;
pub mod verifier;

#[cfg(test)]
pub(crate) mod fixtures;

pub use compile::{compile, NetworkDescription};
pub use config::SearchConfig;
pub use error::{Error, Result};
pub use model::{load_model, parse_model, TimingModel};
pub use oracle::{EvaluationResult, Oracle};
pub use search::{run, Algorithm, RunReport, RunStatus, SearchSettings};
pub use verifier::{Backend, Verifier, VerifierSettings};
