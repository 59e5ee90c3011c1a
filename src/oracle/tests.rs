use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::error::VerificationUnavailableError;
use crate::compile::NetworkDescription;
use crate::fixtures::camera_pipeline;
use crate::verifier::AnalyticVerifier;

fn oracle_with(verifier: Arc<AnalyticVerifier>, workers: usize) -> Oracle {
    Oracle::new(camera_pipeline(), Box::new(verifier), workers).unwrap()
}

struct Broken;

impl Verifier for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn verify(&self, _net: &NetworkDescription) -> Result<VerifierResponse, VerificationUnavailableError> {
        Err(VerificationUnavailableError::new("broken", "no answer"))
    }
}

/// Answers like the analytic verifier, in reverse query order and without
/// the queries named in `drop`.
struct Shuffled {
    drop: Vec<&'static str>,
}

impl Verifier for Shuffled {
    fn name(&self) -> &str {
        "shuffled"
    }

    fn verify(&self, net: &NetworkDescription) -> Result<VerifierResponse, VerificationUnavailableError> {
        let mut response = AnalyticVerifier::new().verify(net)?;
        response.results.reverse();
        response.results.retain(|r| !self.drop.contains(&r.name.as_str()));
        Ok(response)
    }
}

#[test]
fn test_decode_rounds_and_clamps() {
    let base = camera_pipeline();
    let model = decode(&base, &[32.6, 500.0]).unwrap();
    assert_eq!(model.component(0).period.map(|p| p.0), Some(33));
    assert_eq!(model.component(1).period.map(|p| p.0), Some(160));
    assert_eq!(encode(&model), vec![33.0, 160.0]);
}

#[test]
fn test_decode_rejects_wrong_length() {
    let err = decode(&camera_pipeline(), &[33.0]).unwrap_err();
    assert_eq!(err, EncodingError { expected: 2, actual: 1 });
}

#[test]
fn test_fingerprint_is_idempotent() {
    let base = camera_pipeline();
    let a = decode(&base, &[33.0, 60.0]).unwrap();
    let b = decode(&base, &[33.2, 59.9]).unwrap();
    assert_eq!(Fingerprint::of(&a), Fingerprint::of(&a));
    assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    assert_eq!(Fingerprint::of(&a).to_hex().len(), 64);
    assert_eq!(Fingerprint::of(&a).to_short().len(), 8);
}

#[test]
fn test_fingerprint_separates_models() {
    let base = camera_pipeline();
    let mut seen = std::collections::HashSet::new();
    for cam in 25..=80 {
        for plan in [40.0, 60.0, 90.0, 160.0] {
            let model = decode(&base, &[cam as f64, plan]).unwrap();
            assert!(seen.insert(Fingerprint::of(&model)));
        }
    }
}

#[test]
fn test_scenario_evaluation() {
    let oracle = oracle_with(Arc::new(AnalyticVerifier::new()), 2);
    let result = oracle.evaluate(&[33.0, 60.0]).unwrap();
    assert!(result.feasible);
    assert_eq!(result.violation, 0.0);
    assert!((result.objectives[0] - (20.0 / 33.0 + 0.5)).abs() < 1e-12);
    // the only property is violated, so its latency is reported
    assert_eq!(result.objectives[1], 200.0);
    let metrics = result.metrics.unwrap();
    assert_eq!(metrics.property_violations, 1);
    assert_eq!(metrics.deadline_misses, 0);
}

#[test]
fn test_constraint_violation_is_graded() {
    let oracle = oracle_with(Arc::new(AnalyticVerifier::new()), 1);
    // camera at 25ms: PathPlanning response settles at 150 > 90
    let result = oracle.evaluate(&[25.0, 60.0]).unwrap();
    assert!(!result.feasible);
    assert_eq!(result.violation, 1.0);
}

#[test]
fn test_parallel_duplicates_verify_once() {
    let verifier = Arc::new(AnalyticVerifier::with_delay(Duration::from_millis(50)));
    let oracle = oracle_with(Arc::clone(&verifier), 8);
    let batch = vec![vec![40.0, 80.0]; 16];
    let results = oracle.evaluate_batch(&batch).unwrap();

    assert_eq!(verifier.invocations(), 1);
    assert_eq!(results.len(), 16);
    assert!(results.iter().all(|r| *r == results[0]));
    let stats = oracle.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 15);
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.adapter_invocations, 1);
}

#[test]
fn test_batch_preserves_order() {
    let oracle = oracle_with(Arc::new(AnalyticVerifier::new()), 4);
    let batch: Vec<Vec<f64>> = (25..45).map(|p| vec![p as f64, 60.0]).collect();
    let results = oracle.evaluate_batch(&batch).unwrap();
    for (vector, result) in batch.iter().zip(&results) {
        assert_eq!(*result, oracle.evaluate(vector).unwrap());
    }
}

#[test]
fn test_batch_length_error_is_fatal() {
    let oracle = oracle_with(Arc::new(AnalyticVerifier::new()), 2);
    let batch = vec![vec![33.0, 60.0], vec![33.0]];
    assert!(oracle.evaluate_batch(&batch).is_err());
    assert_eq!(oracle.stats().adapter_invocations, 0);
}

#[test]
fn test_unavailable_verifier_is_absorbed() {
    let oracle = Oracle::new(camera_pipeline(), Box::new(Broken), 1).unwrap();
    let result = oracle.evaluate(&[33.0, 60.0]).unwrap();
    assert!(!result.feasible);
    assert_eq!(result.violation, f64::INFINITY);
    assert!(result.objectives.iter().all(|o| *o == f64::INFINITY));
    assert!(result.error.as_deref().unwrap().contains("no answer"));
    assert_eq!(oracle.stats().failures, 1);
}

#[test]
fn test_response_time_ratio_metric() {
    let oracle = oracle_with(Arc::new(AnalyticVerifier::new()), 1)
        .with_utilisation(Utilisation::ResponseRatio.build());
    let result = oracle.evaluate(&[33.0, 60.0]).unwrap();
    // max(20/33, 90/90)
    assert_eq!(result.objectives[0], 1.0);
    assert_eq!("response-ratio".parse::<Utilisation>(), Ok(Utilisation::ResponseRatio));
    assert_eq!(Utilisation::default().build().name(), UtilisationSum.name());
}

#[test]
fn test_metrics_match_results_by_query_name() {
    let reference = oracle_with(Arc::new(AnalyticVerifier::new()), 1)
        .evaluate(&[40.0, 80.0])
        .unwrap();
    let oracle = Oracle::new(camera_pipeline(), Box::new(Shuffled { drop: vec![] }), 1).unwrap();
    let result = oracle.evaluate(&[40.0, 80.0]).unwrap();
    assert_eq!(result.objectives, reference.objectives);
    assert_eq!(result.metrics, reference.metrics);
}

#[test]
fn test_unanswered_query_counts_as_violated() {
    let verifier = Shuffled {
        drop: vec!["deadline.PathPlanning"],
    };
    let oracle = Oracle::new(camera_pipeline(), Box::new(verifier), 1).unwrap();
    let result = oracle.evaluate(&[40.0, 80.0]).unwrap();
    assert_eq!(result.metrics.unwrap().deadline_misses, 1);
    assert!(!result.feasible);
}
