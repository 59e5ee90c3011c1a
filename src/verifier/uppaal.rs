//! External backend: runs `verifyta` on the rendered network.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::debug;

use super::{QueryResult, Verifier, VerifierResponse};
use crate::compile::{render_queries, render_xml, NetworkDescription};
use crate::error::VerificationUnavailableError;

pub const VERIFYTA_ENV: &str = "TEMPORA_VERIFYTA";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct UppaalVerifier {
    binary: PathBuf,
    timeout: Duration,
}

impl UppaalVerifier {
    /// `binary` wins over `$TEMPORA_VERIFYTA`, which wins over `verifyta`
    /// on `PATH`.
    pub fn new(binary: Option<PathBuf>, timeout: Duration) -> Self {
        let binary = binary
            .or_else(|| std::env::var_os(VERIFYTA_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("verifyta"));
        Self { binary, timeout }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn unavailable(&self, reason: impl Into<String>) -> VerificationUnavailableError {
        VerificationUnavailableError::new("verifyta", reason)
    }

    /// Spawn `verifyta` with stdout going to a file, polling until it exits
    /// or the timeout passes.
    fn run(&self, dir: &Path) -> Result<String, VerificationUnavailableError> {
        let out_path = dir.join("verifyta.out");
        let stdout = File::create(&out_path)
            .map_err(|e| self.unavailable(format!("cannot create output file: {}", e)))?;

        let start = Instant::now();
        let mut child = Command::new(&self.binary)
            .arg("-q")
            .arg(dir.join("model.xml"))
            .arg(dir.join("model.q"))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| self.unavailable(format!("failed to spawn {}: {}", self.binary.display(), e)))?;

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if !status.success() {
                        return Err(self.unavailable(format!("exited with {}", status)));
                    }
                    break;
                }
                Ok(None) => {
                    if start.elapsed() > self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(self.unavailable(format!(
                            "timed out after {:.1}s",
                            self.timeout.as_secs_f64()
                        )));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(self.unavailable(format!("wait error: {}", e))),
            }
        }

        std::fs::read_to_string(&out_path)
            .map_err(|e| self.unavailable(format!("cannot read output: {}", e)))
    }
}

impl Verifier for UppaalVerifier {
    fn name(&self) -> &str {
        "verifyta"
    }

    fn verify(&self, net: &NetworkDescription) -> Result<VerifierResponse, VerificationUnavailableError> {
        let dir = tempfile::tempdir().map_err(|e| self.unavailable(format!("cannot create tempdir: {}", e)))?;
        let xml = render_xml(net).map_err(|e| self.unavailable(e.to_string()))?;
        std::fs::write(dir.path().join("model.xml"), xml)
            .and_then(|_| std::fs::write(dir.path().join("model.q"), render_queries(net)))
            .map_err(|e| self.unavailable(format!("cannot write model: {}", e)))?;

        let start = Instant::now();
        let output = self.run(dir.path())?;
        let elapsed = start.elapsed();
        debug!(queries = net.queries.len(), ms = elapsed.as_millis() as u64, "verifyta finished");

        let verdicts = parse_verdicts(&output, net.queries.len()).map_err(|r| self.unavailable(r))?;
        let share = elapsed / net.queries.len().max(1) as u32;
        let results = net
            .queries
            .iter()
            .zip(verdicts)
            .map(|(q, satisfied)| QueryResult {
                name: q.name.clone(),
                satisfied,
                elapsed: share,
                witness: None,
            })
            .collect();
        Ok(VerifierResponse { results })
    }
}

/// Extract one verdict per formula, in order. The count must match.
pub(crate) fn parse_verdicts(output: &str, expected: usize) -> Result<Vec<bool>, String> {
    let verdicts: Vec<bool> = output
        .lines()
        .filter_map(|line| {
            if line.contains("Formula is NOT satisfied") {
                Some(false)
            } else if line.contains("Formula is satisfied") {
                Some(true)
            } else {
                None
            }
        })
        .collect();
    if verdicts.len() != expected {
        return Err(format!(
            "expected {} verdicts, output contained {}",
            expected,
            verdicts.len()
        ));
    }
    Ok(verdicts)
}
