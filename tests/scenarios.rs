//! End-to-end workflows through the public API: model file on disk,
//! tempora.toml next to it, compile, verify, search and export.

use std::fs;
use std::path::Path;

use tempora::compile::{render_queries, render_xml};
use tempora::export::RunExport;
use tempora::model::AttributeRef;
use tempora::oracle::Fingerprint;
use tempora::search::{Algorithm, RunStatus};
use tempora::verifier::{AnalyticVerifier, Backend, Verifier};
use tempora::{compile, load_model, run, Error, Oracle, SearchConfig};

const PIPELINE: &str = r#"{
  "components": [
    { "id": "CameraProcessing", "period": "33ms", "wcet": "20ms" },
    { "id": "PathPlanning", "period": "60ms", "deadline": "90ms", "wcet": "30ms" }
  ],
  "connections": [
    { "source": "CameraProcessing.image", "target": "PathPlanning.image", "latency_budget": "90ms" }
  ],
  "properties": [
    { "id": "EndToEndLatency", "stimulus": "CameraProcessing", "response": "PathPlanning", "within": "100ms" }
  ],
  "optimisation": {
    "variables": [
      { "target": "CameraProcessing.period", "lo": "25ms", "hi": "80ms" },
      { "target": "PathPlanning.period", "lo": "40ms", "hi": "160ms" }
    ],
    "objectives": [
      { "direction": "min", "metric": "max_core_utilisation" },
      { "direction": "min", "metric": "worst_end2end_latency" }
    ],
    "constraints": ["deadline_misses == 0"]
  }
}"#;

fn write_project(dir: &Path, config: &str) -> std::path::PathBuf {
    let models = dir.join("models");
    fs::create_dir_all(&models).unwrap();
    let model_path = models.join("pipeline.json");
    fs::write(&model_path, PIPELINE).unwrap();
    fs::write(dir.join("tempora.toml"), config).unwrap();
    model_path
}

#[test]
fn test_scenario_compiles_to_three_automata_and_two_queries() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = write_project(dir.path(), "");
    let model = load_model(&model_path).unwrap();
    let net = compile(&model).unwrap();

    assert_eq!(net.automata.len(), 3);
    assert_eq!(net.queries.len(), 2);
    let xml = render_xml(&net).unwrap();
    assert!(xml.contains("<nta>"));
    assert_eq!(xml.matches("<template>").count(), 3);
    assert_eq!(render_queries(&net).lines().filter(|l| l.starts_with("A[]")).count(), 2);
}

#[test]
fn test_deadline_at_50ms_flips_the_deadline_query() {
    let dir = tempfile::tempdir().unwrap();
    let mut model = load_model(&write_project(dir.path(), "")).unwrap();
    let verifier = AnalyticVerifier::new();

    let before = verifier.verify(&compile(&model).unwrap()).unwrap();
    assert!(before.get("deadline.PathPlanning").unwrap().satisfied);

    AttributeRef::parse("PathPlanning.deadline", &model)
        .unwrap()
        .set(&mut model, 50.0);
    let after = verifier.verify(&compile(&model).unwrap()).unwrap();
    assert!(!after.get("deadline.PathPlanning").unwrap().satisfied);
    assert_ne!(Fingerprint::of(&model), Fingerprint::of(&load_model(&dir.path().join("models/pipeline.json")).unwrap()));
}

#[test]
fn test_missing_model_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    match load_model(&dir.path().join("absent.json")) {
        Err(Error::Io { path, .. }) => assert!(path.ends_with("absent.json")),
        other => panic!("expected io error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_config_drives_a_full_run_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = write_project(
        dir.path(),
        "[search]\nalgorithm = \"sms-emoa\"\npopulation = 6\ngenerations = 3\nseed = 21\nworkers = 2\nplateau_window = 0\n\n[verifier]\nbackend = \"analytic\"\n",
    );

    let config_path = SearchConfig::find(model_path.parent().unwrap()).unwrap();
    let config = SearchConfig::load(&config_path).unwrap();
    assert_eq!(config.search.algorithm, Algorithm::SmsEmoa);
    assert_eq!(config.verifier.backend, Backend::Analytic);

    let model = load_model(&model_path).unwrap();
    let oracle = Oracle::new(model, config.verifier.build(), config.workers).unwrap();
    let report = run(&oracle, config.search.clone()).unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.generations, 3);
    assert_eq!(report.evaluations, 6 * 4);
    assert_eq!(report.evaluation_failures, 0);
    assert!(!report.archive.is_empty());

    let out = dir.path().join("report.json");
    RunExport::new(&report, &oracle).unwrap().save_json(&out).unwrap();
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(value["algorithm"], "sms-emoa");
    assert_eq!(value["trace"].as_array().unwrap().len(), 3);
    assert!(value["selected"]["decision_vector"].is_array());
}

#[test]
fn test_invalid_model_stops_before_search() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(
        &path,
        r#"{ "components": [ { "id": "A", "period": 10, "wcet": 2 } ],
             "connections": [ { "source": "A.out", "target": "Ghost.in" } ] }"#,
    )
    .unwrap();
    match load_model(&path) {
        Err(Error::InvalidModel(e)) => assert!(e.diagnostic().message.contains("Ghost")),
        other => panic!("expected invalid model, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_model_without_variables_cannot_be_searched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixed.json");
    fs::write(&path, r#"{ "components": [ { "id": "A", "period": 10, "wcet": 2 } ] }"#).unwrap();
    let oracle = Oracle::new(load_model(&path).unwrap(), Box::new(AnalyticVerifier::new()), 1).unwrap();
    let result = run(&oracle, Default::default());
    assert!(matches!(result, Err(Error::InvalidModel(_))));
    assert_eq!(oracle.stats().adapter_invocations, 0);
}
