//! Scheduling correctness tests.
//!
//! These tests verify round ordering, readiness and the handling of
//! malformed graphs.

use std::collections::HashSet;

use verdict::core::{TaskGraph, TaskStatus};
use verdict::orchestration::{RunState, SchedulerEvent};
use verdict::{Error, StructuralError};

use crate::fixtures::{chain, diamond, graph_of, test_task, CountingCapability, Harness};

/// Test: Linear chain A -> B -> C
/// Given a three task chain
/// When the orchestrator runs it
/// Then tasks run one per round in dependency order
#[tokio::test]
async fn test_linear_chain_one_task_per_round() {
    let mut harness = Harness::new(CountingCapability::new());
    let (graph, [a, b, c]) = chain(["a", "b", "c"]);

    let run = harness.orchestrator.run(graph).await.unwrap();

    assert_eq!(run.state, RunState::Complete);
    assert_eq!(run.rounds, 3);
    assert_eq!(run.completed, 3);
    assert_eq!(harness.capability.seen(), vec!["a", "b", "c"]);

    let started: Vec<_> = harness
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            SchedulerEvent::TaskStarted { task_id, .. } => Some(task_id),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![a, b, c]);
}

/// Test: Readiness over a linear chain
/// Given A -> B -> C and a growing completed set
/// When ready tasks are queried
/// Then exactly the next task in the chain is ready
#[test]
fn test_ready_tasks_follow_completed_set() {
    let (graph, [a, b, c]) = chain(["a", "b", "c"]);
    let mut completed = HashSet::new();

    let ids = |graph: &TaskGraph, completed: &HashSet<_>| {
        graph
            .get_ready_tasks(completed)
            .iter()
            .map(|t| t.id)
            .collect::<Vec<_>>()
    };

    assert_eq!(ids(&graph, &completed), vec![a]);
    completed.insert(a);
    assert_eq!(ids(&graph, &completed), vec![b]);
    completed.insert(b);
    assert_eq!(ids(&graph, &completed), vec![c]);
    assert!(!graph.is_complete(&completed));
    completed.insert(c);
    assert!(graph.is_complete(&completed));
}

/// Test: Diamond A -> (B, C) -> D
/// Given a diamond graph
/// When the orchestrator runs it
/// Then B and C share a round and D waits for both
#[tokio::test]
async fn test_diamond_runs_branches_together() {
    let harness = Harness::new(CountingCapability::new());
    let (graph, [_, _, _, d]) = diamond(["a", "b", "c", "d"]);

    let run = harness.orchestrator.run(graph).await.unwrap();

    assert_eq!(run.rounds, 3);
    assert!(run.is_complete());
    let seen = harness.capability.seen();
    assert_eq!(seen.first().map(String::as_str), Some("a"));
    assert_eq!(seen.last().map(String::as_str), Some("d"));
    assert!(run.result(&d).unwrap().success);
}

/// Test: Priority ordering within a round
/// Given three independent tasks with different priorities
/// When they are dispatched
/// Then they start highest priority first, ties in insertion order
#[tokio::test]
async fn test_round_starts_by_priority() {
    let mut harness = Harness::new(CountingCapability::new());
    let low = test_task("low").with_priority(1);
    let first_high = test_task("high-1").with_priority(9);
    let second_high = test_task("high-2").with_priority(9);
    let expected = vec![first_high.id, second_high.id, low.id];

    let run = harness
        .orchestrator
        .run(graph_of(vec![low, first_high, second_high]))
        .await
        .unwrap();
    assert_eq!(run.rounds, 1);

    let started: Vec<_> = harness
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            SchedulerEvent::TaskStarted { task_id, .. } => Some(task_id),
            _ => None,
        })
        .collect();
    assert_eq!(started, expected);
}

/// Test: Two-cycle
/// Given A depends on B and B depends on A
/// When the orchestrator runs the graph
/// Then it fails with a structural error and dispatches nothing
#[tokio::test]
async fn test_two_cycle_is_structural_error() {
    let harness = Harness::new(CountingCapability::new());
    let mut a = test_task("a");
    let mut b = test_task("b");
    a.dependencies.push(b.id);
    b.dependencies.push(a.id);
    let graph = graph_of(vec![a, b]);

    assert!(graph.get_ready_tasks(&HashSet::new()).is_empty());

    let err = harness.orchestrator.run(graph).await.unwrap_err();
    assert!(matches!(err, Error::Structural(StructuralError::Cycle(_))));
    assert_eq!(harness.capability.calls(), 0);
}

/// Test: Dangling dependency
/// Given a task that depends on an id outside the graph
/// When the orchestrator runs the graph
/// Then it fails with a structural error
#[tokio::test]
async fn test_dangling_dependency_is_structural_error() {
    let harness = Harness::new(CountingCapability::new());
    let ghost = test_task("ghost");
    let orphan = test_task("orphan").depends_on(ghost.id);

    let err = harness
        .orchestrator
        .run(graph_of(vec![orphan]))
        .await
        .unwrap_err();
    assert!(err.is_structural());
    assert!(matches!(
        err,
        Error::Structural(StructuralError::DanglingDependency { dependency, .. }) if dependency == ghost.id
    ));
    assert_eq!(harness.capability.calls(), 0);
}

/// Test: Final snapshot
/// Given a completed run
/// When the run report is inspected
/// Then the snapshot carries final statuses and serializes to JSON
#[tokio::test]
async fn test_run_report_snapshot() {
    let harness = Harness::new(CountingCapability::new());
    let (graph, _) = chain(["a", "b", "c"]);

    let run = harness.orchestrator.run(graph).await.unwrap();

    assert_eq!(run.graph.tasks.len(), 3);
    assert_eq!(run.graph.edges.len(), 2);
    assert!(run
        .graph
        .tasks
        .iter()
        .all(|t| t.status == TaskStatus::Completed));
    assert_eq!(run.results.len(), 3);

    let json = serde_json::to_string(&run).unwrap();
    assert!(json.contains("\"state\":\"complete\""));
}
