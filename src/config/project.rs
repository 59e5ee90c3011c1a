use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::diagnostic::Diagnostic;
use crate::oracle::Utilisation;
use crate::search::{Algorithm, SearchSettings};
use crate::span::Span;
use crate::verifier::{Backend, VerifierSettings};

pub const CONFIG_FILE: &str = "tempora.toml";

/// Run configuration from tempora.toml.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchConfig {
    /// File the configuration was read from; `None` for defaults.
    pub source: Option<PathBuf>,
    pub search: SearchSettings,
    /// Evaluation threads; 0 lets rayon decide.
    pub workers: usize,
    /// Measure behind `max_core_utilisation`.
    pub utilisation: Utilisation,
    pub verifier: VerifierSettings,
}

impl SearchConfig {
    /// Load a configuration file. Keys that are not set keep their defaults.
    pub fn load(toml_path: &Path) -> Result<SearchConfig, Diagnostic> {
        let content = std::fs::read_to_string(toml_path).map_err(|e| {
            Diagnostic::error(
                format!("cannot read '{}': {}", toml_path.display(), e),
                Span::dummy(),
            )
        })?;
        let mut config = Self::parse(&content)?;
        config.source = Some(toml_path.to_path_buf());
        if let (Some(binary), Some(root)) = (&config.verifier.path, toml_path.parent()) {
            if binary.is_relative() && binary.components().count() > 1 {
                config.verifier.path = Some(root.join(binary));
            }
        }
        Ok(config)
    }

    /// Parse configuration text. Spans point into `content`.
    pub fn parse(content: &str) -> Result<SearchConfig, Diagnostic> {
        let mut config = SearchConfig::default();
        let mut section = String::new();
        let mut offset = 0usize;

        for line in content.split_inclusive('\n') {
            let start = offset;
            offset += line.len();
            let trimmed = line.trim();
            if trimmed.starts_with('#') || trimmed.is_empty() {
                continue;
            }
            let span = Span::new(start as u32, (start + line.trim_end().len()) as u32);
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                section = trimmed[1..trimmed.len() - 1].trim().to_string();
                if !matches!(section.as_str(), "search" | "verifier" | "epsilon" | "qehvi") {
                    return Err(Diagnostic::error(format!("unknown section [{}]", section), span)
                        .with_help("expected one of [search], [verifier], [epsilon], [qehvi]".to_string()));
                }
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(Diagnostic::error(format!("expected 'key = value', found '{}'", trimmed), span));
            };
            let key = key.trim().trim_matches('"');
            let value = strip_comment(value).trim_matches('"');
            let entry = Entry {
                section: &section,
                key,
                value,
                span,
            };
            config.apply(&entry)?;
        }
        Ok(config)
    }

    fn apply(&mut self, e: &Entry<'_>) -> Result<(), Diagnostic> {
        let search = &mut self.search;
        match (e.section, e.key) {
            ("search", "algorithm") => {
                search.algorithm = Algorithm::from_str(e.value).map_err(|msg| e.invalid(&msg))?;
            }
            ("search", "generations") => search.generations = e.number()?,
            ("search", "population") => search.population = e.number()?,
            ("search", "batch") => search.batch = e.number()?,
            ("search", "seed") => search.seed = e.number()?,
            ("search", "workers") => self.workers = e.number()?,
            ("search", "max_evaluations") => search.max_evaluations = Some(e.number()?),
            ("search", "timeout_secs") => search.timeout = Some(e.seconds()?),
            ("search", "utilisation") => {
                self.utilisation = Utilisation::from_str(e.value).map_err(|msg| e.invalid(&msg))?;
            }
            ("search", "plateau_window") => search.plateau_window = e.number()?,
            ("search", "plateau_epsilon") => search.plateau_epsilon = e.real()?,
            ("verifier", "backend") => {
                self.verifier.backend = Backend::from_str(e.value).map_err(|msg| e.invalid(&msg))?;
            }
            ("verifier", "path") => self.verifier.path = Some(PathBuf::from(e.value)),
            ("verifier", "timeout_ms") => self.verifier.timeout = Duration::from_millis(e.number()?),
            ("epsilon", "levels") => search.epsilon_levels = e.number()?,
            ("qehvi", "candidates") => search.qehvi.candidates = e.number()?,
            ("qehvi", "mc_samples") => search.qehvi.mc_samples = e.number()?,
            ("qehvi", "ref_slack") => search.qehvi.ref_slack = e.real()?,
            ("", key) => {
                return Err(Diagnostic::error(format!("key '{}' outside of any section", key), e.span));
            }
            (section, key) => {
                return Err(Diagnostic::error(format!("unknown key '{}' in [{}]", key, section), e.span));
            }
        }
        Ok(())
    }

    /// Try to find a tempora.toml in the given directory or its ancestors.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }
}

struct Entry<'a> {
    section: &'a str,
    key: &'a str,
    value: &'a str,
    span: Span,
}

impl Entry<'_> {
    fn invalid(&self, reason: &str) -> Diagnostic {
        Diagnostic::error(format!("invalid value for '{}' in [{}]", self.key, self.section), self.span)
            .with_note(reason.to_string())
    }

    fn number<T: FromStr>(&self) -> Result<T, Diagnostic> {
        self.value
            .replace('_', "")
            .parse()
            .map_err(|_| self.invalid(&format!("expected a non-negative integer, found '{}'", self.value)))
    }

    fn real(&self) -> Result<f64, Diagnostic> {
        match self.value.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
            _ => Err(self.invalid(&format!("expected a non-negative number, found '{}'", self.value))),
        }
    }

    fn seconds(&self) -> Result<Duration, Diagnostic> {
        Duration::try_from_secs_f64(self.real()?).map_err(|err| self.invalid(&err.to_string()))
    }
}

/// Drop a trailing `# comment` outside of a quoted string.
fn strip_comment(value: &str) -> &str {
    let mut quoted = false;
    for (i, c) in value.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '#' if !quoted => return value[..i].trim(),
            _ => {}
        }
    }
    value.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join(CONFIG_FILE);
        fs::write(
            &toml_path,
            r#"# pipeline tuning
[search]
algorithm = "sms-emoa"
generations = 40
population = 32
batch = 8
seed = 11
workers = 4
max_evaluations = 2_000
timeout_secs = 90
utilisation = "response-ratio"
plateau_window = 0
plateau_epsilon = 0.001

[verifier]
backend = "uppaal"
path = "/opt/uppaal/bin/verifyta"  # local install
timeout_ms = 5000

[epsilon]
levels = 6

[qehvi]
candidates = 256
mc_samples = 32
ref_slack = 2.5
"#,
        )
        .unwrap();

        let config = SearchConfig::load(&toml_path).unwrap();
        assert_eq!(config.source.as_deref(), Some(toml_path.as_path()));
        assert_eq!(config.search.algorithm, Algorithm::SmsEmoa);
        assert_eq!(config.search.generations, 40);
        assert_eq!(config.search.population, 32);
        assert_eq!(config.search.batch, 8);
        assert_eq!(config.search.seed, 11);
        assert_eq!(config.workers, 4);
        assert_eq!(config.search.max_evaluations, Some(2000));
        assert_eq!(config.search.timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.utilisation, Utilisation::ResponseRatio);
        assert_eq!(config.search.plateau_window, 0);
        assert_eq!(config.search.plateau_epsilon, 0.001);
        assert_eq!(config.verifier.backend, Backend::Uppaal);
        assert_eq!(config.verifier.path, Some(PathBuf::from("/opt/uppaal/bin/verifyta")));
        assert_eq!(config.verifier.timeout, Duration::from_millis(5000));
        assert_eq!(config.search.epsilon_levels, 6);
        assert_eq!(config.search.qehvi.candidates, 256);
        assert_eq!(config.search.qehvi.mc_samples, 32);
        assert_eq!(config.search.qehvi.ref_slack, 2.5);
    }

    #[test]
    fn test_missing_keys_keep_defaults() {
        let config = SearchConfig::parse("[search]\ngenerations = 3\n").unwrap();
        let defaults = SearchSettings::default();
        assert_eq!(config.search.generations, 3);
        assert_eq!(config.search.population, defaults.population);
        assert_eq!(config.search.algorithm, Algorithm::Nsga2);
        assert_eq!(config.verifier, VerifierSettings::default());
        assert!(config.source.is_none());
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(SearchConfig::parse("").unwrap(), SearchConfig::default());
    }

    #[test]
    fn test_relative_verifier_path_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join(CONFIG_FILE);
        fs::write(&toml_path, "[verifier]\npath = \"tools/verifyta\"\n").unwrap();
        let config = SearchConfig::load(&toml_path).unwrap();
        assert_eq!(config.verifier.path, Some(dir.path().join("tools/verifyta")));

        fs::write(&toml_path, "[verifier]\npath = \"verifyta\"\n").unwrap();
        let config = SearchConfig::load(&toml_path).unwrap();
        assert_eq!(config.verifier.path, Some(PathBuf::from("verifyta")));
    }

    #[test]
    fn test_unknown_algorithm_is_reported_with_span() {
        let source = "[search]\nalgorithm = \"annealing\"\n";
        let err = SearchConfig::parse(source).unwrap_err();
        assert!(err.message.contains("'algorithm'"), "{}", err.message);
        let flagged = &source[err.span.start as usize..err.span.end as usize];
        assert_eq!(flagged, "algorithm = \"annealing\"");
    }

    #[test]
    fn test_bad_number_rejected() {
        let err = SearchConfig::parse("[search]\npopulation = -4\n").unwrap_err();
        assert!(err.notes.iter().any(|n| n.contains("-4")));
        assert!(SearchConfig::parse("[qehvi]\nref_slack = nan\n").is_err());
    }

    #[test]
    fn test_unrepresentable_timeout_rejected() {
        let source = "[search]\ntimeout_secs = 1e300\n";
        let err = SearchConfig::parse(source).unwrap_err();
        assert!(err.message.contains("'timeout_secs'"), "{}", err.message);
        assert_eq!(&source[err.span.start as usize..err.span.end as usize], "timeout_secs = 1e300");
        assert!(SearchConfig::parse("[search]\ntimeout_secs = -1\n").is_err());
        assert!(SearchConfig::parse("[search]\ntimeout_secs = inf\n").is_err());
    }

    #[test]
    fn test_unknown_utilisation_rejected() {
        let err = SearchConfig::parse("[search]\nutilisation = \"peak\"\n").unwrap_err();
        assert!(err.notes.iter().any(|n| n.contains("response-ratio")));
        assert_eq!(SearchConfig::parse("").unwrap().utilisation, Utilisation::Sum);
    }

    #[test]
    fn test_unknown_section_and_key_rejected() {
        assert!(SearchConfig::parse("[project]\nname = \"x\"\n").is_err());
        let err = SearchConfig::parse("[search]\ngenerashuns = 3\n").unwrap_err();
        assert_eq!(err.message, "unknown key 'generashuns' in [search]");
        assert!(SearchConfig::parse("seed = 1\n").is_err());
    }

    #[test]
    fn test_find_config_in_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("models").join("drone");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[search]\n").unwrap();

        let found = SearchConfig::find(&nested).unwrap();
        assert_eq!(found, dir.path().join(CONFIG_FILE));
    }

    #[test]
    fn test_find_config_missing() {
        let dir = tempfile::tempdir().unwrap();
        // The tempdir's ancestors are outside our control; only assert that a
        // hit, if any, is never inside the empty directory.
        if let Some(found) = SearchConfig::find(dir.path()) {
            assert!(!found.starts_with(dir.path()));
        }
    }
}
