//! Shared model documents for unit tests.

use crate::model::{parse_model, TimingModel};

/// Camera feeding a path planner; the end-to-end property covers the
/// budgeted connection.
pub(crate) const CAMERA_PIPELINE: &str = r#"{
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

/// One periodic task and nothing else.
pub(crate) fn single_task(period: u64, deadline: u64, wcet: u64) -> String {
    format!(
        r#"{{ "components": [ {{ "id": "Solo", "period": {}, "deadline": {}, "wcet": {} }} ] }}"#,
        period, deadline, wcet
    )
}

pub(crate) fn camera_pipeline() -> TimingModel {
    match parse_model(CAMERA_PIPELINE) {
        Ok(m) => m,
        Err(e) => panic!("fixture does not load: {}", e),
    }
}
