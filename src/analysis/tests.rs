use super::*;
use crate::fixtures::{camera_pipeline, single_task};
use crate::model::{parse_model, AttributeRef};

#[test]
fn test_scenario_response_times() {
    let model = camera_pipeline();
    let tasks = TaskSet::new(&model);
    let cam = model.lookup("CameraProcessing").unwrap();
    let plan = model.lookup("PathPlanning").unwrap();
    assert_eq!(tasks.response_time(cam), Some(20.0));
    // 30 + ceil(90/33) * 20 = 90
    assert_eq!(tasks.response_time(plan), Some(90.0));
    assert_eq!(tasks.higher_priority(plan).collect::<Vec<_>>(), vec![cam]);
}

#[test]
fn test_core_utilisation_single_core() {
    let model = camera_pipeline();
    let tasks = TaskSet::new(&model);
    let util = tasks.core_utilisation();
    assert_eq!(util.len(), 1);
    assert!((util[0] - (20.0 / 33.0 + 30.0 / 60.0)).abs() < 1e-12);
}

#[test]
fn test_overloaded_higher_priority_is_unbounded() {
    let src = r#"{ "components": [
        { "id": "Hog", "period": 10, "wcet": 10, "priority": 1 },
        { "id": "Starved", "period": 100, "wcet": 1, "priority": 2 }
    ] }"#;
    let model = parse_model(src).unwrap();
    let tasks = TaskSet::new(&model);
    assert_eq!(tasks.response_time(0), Some(10.0));
    assert_eq!(tasks.response_time(1), None);
}

#[test]
fn test_non_preemptive_blocking() {
    let src = r#"{ "components": [
        { "id": "Fast", "period": 20, "wcet": 2, "priority": 1 },
        { "id": "Slow", "period": 100, "wcet": 15, "priority": 2 }
    ], "cpu": { "scheduler": "non_preemptive_fp" } }"#;
    let model = parse_model(src).unwrap();
    let tasks = TaskSet::new(&model);
    // blocked by the 15ms job that just started
    assert_eq!(tasks.response_time(0), Some(17.0));
}

#[test]
fn test_event_tasks_inherit_activation() {
    let src = r#"{ "components": [
        { "id": "Sensor", "period": 25, "wcet": 2 },
        { "id": "Filter", "wcet": 3 },
        { "id": "Logger", "wcet": 1 }
    ], "connections": [
        { "source": "Sensor", "target": "Filter" }
    ] }"#;
    let model = parse_model(src).unwrap();
    let tasks = TaskSet::new(&model);
    assert_eq!(tasks.activation_period(1), Some(25.0));
    assert_eq!(tasks.activation_period(2), None);
    assert_eq!(tasks.utilisation(2), 0.0);
    assert_eq!(tasks.handoff_wait(1), 0.0);
}

#[test]
fn test_worst_fit_core_assignment() {
    let src = r#"{ "components": [
        { "id": "A", "period": 10, "wcet": 5 },
        { "id": "B", "period": 10, "wcet": 4 },
        { "id": "C", "period": 10, "wcet": 3 },
        { "id": "D", "period": 10, "wcet": 1, "core": 0 }
    ], "cpu": { "cores": 2 } }"#;
    let model = parse_model(src).unwrap();
    let tasks = TaskSet::new(&model);
    assert_eq!(tasks.core_of(3), 0);
    // D already loads core 0, so the heaviest free task lands on core 1
    assert_eq!(tasks.core_of(0), 1);
    assert_eq!(tasks.core_of(1), 0);
    assert_eq!(tasks.core_of(2), 0);
}

#[test]
fn test_property_bound_follows_path() {
    let model = camera_pipeline();
    let tasks = TaskSet::new(&model);
    let graph = ConnectionGraph::new(&model);
    let prop = &model.properties()[0];
    let path = property_path(&graph, prop).unwrap();
    assert_eq!(path, vec![0]);
    let bound = property_bound(&model, &tasks, Some(&path), prop);
    // PathPlanning overruns its period (R = 90 > 60): R_cam + R_plan + R_plan
    assert_eq!(bound.latency, 20.0 + 90.0 + 90.0);
    assert_eq!(bound.hops, vec![(0, 90.0)]);
}

#[test]
fn test_graph_shortest_path() {
    let src = r#"{ "components": [
        { "id": "A", "period": 10, "wcet": 1 },
        { "id": "B", "wcet": 1 },
        { "id": "C", "wcet": 1 },
        { "id": "D", "wcet": 1 }
    ], "connections": [
        { "source": "A", "target": "B" },
        { "source": "B", "target": "C" },
        { "source": "C", "target": "D" },
        { "source": "A", "target": "D" }
    ] }"#;
    let model = parse_model(src).unwrap();
    let graph = ConnectionGraph::new(&model);
    assert_eq!(graph.path(0, 3), Some(vec![3]));
    assert_eq!(graph.path(0, 0), Some(vec![]));
    assert_eq!(graph.path(3, 0), None);
    assert_eq!(graph.chain(&[0, 1, 2, 3]), Some(vec![0, 1, 2]));
    assert_eq!(graph.chain(&[0, 2]), None);
}

#[test]
fn test_slack_tracks_deadline() {
    let mut model = parse_model(&single_task(100, 50, 20)).unwrap();
    assert_eq!(slack(&model, &TaskSet::new(&model), 0), 30.0);
    AttributeRef::parse("Solo.deadline", &model)
        .unwrap()
        .set(&mut model, 10.0);
    assert_eq!(slack(&model, &TaskSet::new(&model), 0), -10.0);
}

#[test]
fn test_handoff_wait_periodic_target() {
    let src = r#"{ "components": [
        { "id": "A", "period": 10, "wcet": 5, "priority": 0 },
        { "id": "B", "period": 20, "wcet": 2, "priority": 1 },
        { "id": "C", "period": 20, "wcet": 15, "priority": 2 }
    ] }"#;
    let model = parse_model(src).unwrap();
    let tasks = TaskSet::new(&model);
    // B completes within its period: one full period at most
    assert_eq!(tasks.handoff_wait(1), 20.0);
    // C overruns (R = 15 + 4·5 + 2·2 = 39 > 20) and re-arms on completion
    assert_eq!(tasks.response_time(2), Some(39.0));
    assert_eq!(tasks.handoff_wait(2), 39.0);
}

#[test]
fn test_handoff_wait_busy_event_target() {
    let src = r#"{ "components": [
        { "id": "A", "period": 10, "wcet": 1 },
        { "id": "B", "wcet": 25 }
    ], "connections": [
        { "source": "A", "target": "B" }
    ] }"#;
    let model = parse_model(src).unwrap();
    let tasks = TaskSet::new(&model);
    assert_eq!(tasks.response_time(1), Some(28.0));
    // completions of A at +10 and +20 are dropped while B runs
    assert_eq!(tasks.handoff_wait(1), 30.0);
}
