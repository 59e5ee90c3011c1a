use super::*;
use crate::fixtures::{camera_pipeline, single_task, CAMERA_PIPELINE};

#[test]
fn test_millis_parse_units() {
    assert_eq!(Millis::parse("33ms"), Some(Millis(33)));
    assert_eq!(Millis::parse("1.5s"), Some(Millis(1500)));
    assert_eq!(Millis::parse("1500us"), Some(Millis(2)));
    assert_eq!(Millis::parse("12"), Some(Millis(12)));
    assert_eq!(Millis::parse("fast"), None);
    assert_eq!(Millis::parse("3 fortnights"), None);
}

#[test]
fn test_millis_from_f64_rounds_and_saturates() {
    assert_eq!(Millis::from_f64(32.5), Millis(33));
    assert_eq!(Millis::from_f64(32.49), Millis(32));
    assert_eq!(Millis::from_f64(-4.0), Millis::ZERO);
    assert_eq!(Millis::from_f64(f64::NAN), Millis::ZERO);
}

#[test]
fn test_load_camera_pipeline() {
    let model = camera_pipeline();
    assert_eq!(model.components().len(), 2);
    let cam = model.lookup("CameraProcessing").unwrap();
    let plan = model.lookup("PathPlanning").unwrap();
    assert_eq!(model.component(cam).period, Some(Millis(33)));
    assert_eq!(model.component(cam).deadline, None);
    assert_eq!(model.component(cam).effective_deadline(), Some(Millis(33)));
    assert_eq!(model.component(plan).deadline, Some(Millis(90)));
    // declaration order decides default priorities
    assert!(model.component(cam).priority < model.component(plan).priority);

    let conn = &model.connections()[0];
    assert_eq!(conn.id, "CameraProcessing.image->PathPlanning.image");
    assert_eq!(conn.latency_budget, Some(Millis(90)));
    assert_eq!(model.upstream(plan), vec![cam]);

    let prop = model.property_by_id("EndToEndLatency").unwrap();
    assert_eq!(prop.stimulus(), cam);
    assert_eq!(prop.response(), plan);
    assert_eq!(prop.bound(), Millis(100));

    let spec = model.optimisation();
    assert_eq!(spec.dimension(), 2);
    assert_eq!(spec.objective_count(), 2);
    assert_eq!(spec.objectives[0].metric, Metric::MaxCoreUtilisation);
    assert_eq!(spec.constraints.len(), 1);
    assert_eq!(spec.variables[0].lo, 25.0);
    assert_eq!(spec.variables[0].hi, 80.0);
}

#[test]
fn test_attribute_ref_roundtrip() {
    let mut model = camera_pipeline();
    let r = AttributeRef::parse("PathPlanning.deadline", &model).unwrap();
    assert_eq!(r.kind(), VariableKind::Duration);
    assert_eq!(r.get(&model), Some(90.0));
    r.set(&mut model, 75.0);
    assert_eq!(r.get(&model), Some(75.0));
    assert_eq!(r.display(&model).to_string(), "PathPlanning.deadline");

    let p = AttributeRef::parse("PathPlanning.priority", &model).unwrap();
    assert_eq!(p.kind(), VariableKind::Integer);
}

#[test]
fn test_connection_ref_forms() {
    let model = camera_pipeline();
    let by_id = AttributeRef::parse(
        "CameraProcessing.image->PathPlanning.image.latency_budget",
        &model,
    )
    .unwrap();
    let by_parens = AttributeRef::parse(
        "(CameraProcessing.image->PathPlanning.image).latency_budget",
        &model,
    )
    .unwrap();
    let by_components =
        AttributeRef::parse("(CameraProcessing->PathPlanning).latency_budget", &model).unwrap();
    assert_eq!(by_id, by_parens);
    assert_eq!(by_id, by_components);
    assert_eq!(by_id.get(&model), Some(90.0));
}

#[test]
fn test_unknown_references_rejected() {
    let model = camera_pipeline();
    assert!(AttributeRef::parse("Lidar.period", &model).is_err());
    assert!(AttributeRef::parse("PathPlanning.jitter", &model).is_err());
    assert!(AttributeRef::parse("(Camera->Lidar).latency_budget", &model).is_err());
    assert!(AttributeRef::parse("period", &model).is_err());
}

#[test]
fn test_wcet_above_deadline_rejected() {
    let err = parse_model(&single_task(100, 10, 20)).unwrap_err();
    assert!(err.0.message.contains("above its deadline"));
}

#[test]
fn test_zero_wcet_rejected() {
    let err = parse_model(&single_task(100, 50, 0)).unwrap_err();
    assert!(err.0.message.contains("zero wcet"));
}

#[test]
fn test_unknown_endpoint_has_span() {
    let src = r#"{
      "components": [ { "id": "A", "period": 10, "wcet": 2 } ],
      "connections": [ { "source": "A.out", "target": "Ghost.in" } ]
    }"#;
    let err = parse_model(src).unwrap_err();
    let span = err.0.span;
    assert_eq!(&src[span.start as usize..span.end as usize], "\"Ghost.in\"");
}

#[test]
fn test_malformed_json_reports_position() {
    let err = parse_model("{ \"components\": [ }").unwrap_err();
    assert!(err.0.message.starts_with("malformed model"));
    assert!(err.0.span.start > 0);
}

#[test]
fn test_bad_range_rejected() {
    let src = CAMERA_PIPELINE.replace("\"lo\": \"25ms\", \"hi\": \"80ms\"", "\"lo\": \"90ms\", \"hi\": \"80ms\"");
    let err = parse_model(&src).unwrap_err();
    assert!(err.0.message.contains("lo > hi"));
}

#[test]
fn test_unknown_constraint_name_rejected() {
    let src = CAMERA_PIPELINE.replace("deadline_misses == 0", "overheat == 0");
    let err = parse_model(&src).unwrap_err();
    assert!(err.0.message.contains("overheat"));
}

#[test]
fn test_constraint_query_names_bindable() {
    let model = camera_pipeline();
    assert!(load::is_bindable("deadline.PathPlanning", &model));
    // CameraProcessing has no declared deadline, so no deadline query exists
    assert!(!load::is_bindable("deadline.CameraProcessing", &model));
    assert!(load::is_bindable("EndToEndLatency", &model));
    assert!(load::is_bindable("property.EndToEndLatency", &model));
    assert!(load::is_bindable("CameraProcessing.wcet", &model));
    assert!(load::is_bindable("max_core_utilization", &model));
}

#[test]
fn test_latency_string_property() {
    let src = r#"{
      "components": [
        { "id": "A", "period": "10ms", "wcet": "2ms" },
        { "id": "B", "wcet": "3ms" },
        { "id": "C", "wcet": "1ms" }
      ],
      "connections": [
        { "source": "A", "target": "B" },
        { "source": "B", "target": "C", "latency_budget": 0 }
      ],
      "properties": [ { "id": "Pipe", "latency": "A -> B -> C within 40ms" } ]
    }"#;
    let model = parse_model(src).unwrap();
    let prop = model.property_by_id("Pipe").unwrap();
    assert_eq!(prop.chain().map(|c| c.len()), Some(3));
    assert_eq!(prop.bound(), Millis(40));
    assert_eq!(model.connections()[0].id, "A.out->B.in");
    assert_eq!(model.connections()[1].latency_budget, Some(Millis::ZERO));
}

#[test]
fn test_latency_string_requires_connections() {
    let src = r#"{
      "components": [
        { "id": "A", "period": "10ms", "wcet": "2ms" },
        { "id": "B", "wcet": "3ms" }
      ],
      "properties": [ { "id": "Pipe", "latency": "A -> B within 40ms" } ]
    }"#;
    let err = parse_model(src).unwrap_err();
    assert!(err.0.message.contains("no connection"));
}

#[test]
fn test_cpu_policy() {
    let src = r#"{
      "components": [ { "id": "A", "period": 10, "wcet": 2, "core": 1 } ],
      "cpu": { "cores": 2, "scheduler": "NON_PREEMPTIVE_FP" }
    }"#;
    let model = parse_model(src).unwrap();
    assert_eq!(model.cpu().cores, 2);
    assert_eq!(model.cpu().scheduler, Scheduler::NonPreemptiveFp);

    let pinned_out = src.replace("\"cores\": 2", "\"cores\": 1");
    assert!(parse_model(&pinned_out).is_err());
}
