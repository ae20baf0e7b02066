//! Failure handling tests.
//!
//! These tests verify that failures, timeouts, rejected payloads and
//! cancellation reach dependents without stopping independent work.

use std::collections::HashSet;
use std::time::Duration;

use verdict::core::{TaskError, TaskStatus};
use verdict::orchestration::{RunState, SchedulerEvent};

use crate::fixtures::{chain, graph_of, test_task, Behavior, CountingCapability, Harness};

/// Test: Direct dependency failure
/// Given B depends on A and A fails
/// When the graph runs
/// Then B fails with DependencyFailure and is never processed
#[tokio::test]
async fn test_dependent_of_failed_task_is_never_processed() {
    let harness = Harness::new(CountingCapability::new().on("a", Behavior::Fail("boom")));
    let a = test_task("a");
    let b = test_task("b").depends_on(a.id);
    let (id_a, id_b) = (a.id, b.id);

    let run = harness.orchestrator.run(graph_of(vec![a, b])).await.unwrap();

    assert_eq!(run.state, RunState::Finished);
    assert!(!run.result(&id_a).unwrap().success);
    assert!(matches!(
        run.result(&id_a).unwrap().error,
        Some(TaskError::Processing { ref message }) if message.contains("boom")
    ));
    assert_eq!(
        run.result(&id_b).unwrap().error,
        Some(TaskError::DependencyFailure { dependency: id_a })
    );
    assert_eq!(run.result(&id_b).unwrap().agent, "scheduler");
    assert!(!harness.capability.was_called_for("b"));
    assert_eq!(harness.capability.calls(), 1);
}

/// Test: Transitive propagation with an independent branch
/// Given A -> B -> C failing at A, plus an unrelated task
/// When the graph runs
/// Then B and C are unreachable and the unrelated task completes
#[tokio::test]
async fn test_failure_reaches_subtree_only() {
    let harness = Harness::new(CountingCapability::new().on("fail", Behavior::Fail("down")));
    let (mut graph, [a, b, c]) = chain(["fail-a", "b", "c"]);
    let other = test_task("other");
    let other_id = other.id;
    graph.add_task(other).unwrap();

    let run = harness.orchestrator.run(graph).await.unwrap();

    assert_eq!(run.completed, 1);
    assert_eq!(run.failed, 1);
    assert_eq!(run.unreachable, 2);
    assert!(run.result(&other_id).unwrap().success);
    assert_eq!(
        run.result(&c).unwrap().error,
        Some(TaskError::DependencyFailure { dependency: b })
    );
    assert_eq!(run.failures().len(), 1);
    assert_eq!(run.failures()[0].task_id, a);
    assert_eq!(harness.capability.calls(), 2);
}

/// Test: Timeout
/// Given a task that sleeps past the registry timeout
/// When the graph runs
/// Then the task fails with Timeout and its dependent is unreachable
#[tokio::test(start_paused = true)]
async fn test_timeout_fails_task_and_dependents() {
    let harness = Harness::with_timeout(
        CountingCapability::new().on("slow", Behavior::Sleep(Duration::from_secs(60))),
        Duration::from_millis(50),
    );
    let slow = test_task("slow");
    let after = test_task("after").depends_on(slow.id);
    let (slow_id, after_id) = (slow.id, after.id);

    let run = harness
        .orchestrator
        .run(graph_of(vec![slow, after]))
        .await
        .unwrap();

    assert_eq!(
        run.result(&slow_id).unwrap().error,
        Some(TaskError::Timeout { after_ms: 50 })
    );
    assert!(run.result(&after_id).unwrap().error.as_ref().unwrap().is_propagated());
    assert!(!harness.capability.was_called_for("after"));
}

/// Test: Rejected payload
/// Given a capability that rejects the task payload
/// When the graph runs
/// Then the task fails with InvalidInput without being processed
#[tokio::test]
async fn test_rejected_payload_is_invalid_input() {
    let harness = Harness::new(CountingCapability::new().on("bad", Behavior::Reject));
    let bad = test_task("bad");
    let bad_id = bad.id;

    let run = harness.orchestrator.run(graph_of(vec![bad])).await.unwrap();

    assert!(matches!(
        run.result(&bad_id).unwrap().error,
        Some(TaskError::InvalidInput { .. })
    ));
    assert_eq!(run.result(&bad_id).unwrap().agent, "counting");
    assert_eq!(harness.capability.calls(), 0);
}

/// Test: Cancellation mid-run
/// Given A -> B -> C where A is still running when cancellation arrives
/// When the round finishes
/// Then A keeps its result and B and C are cancelled without running
#[tokio::test]
async fn test_cancellation_between_rounds() {
    let mut harness = Harness::new(
        CountingCapability::new().on("a", Behavior::Sleep(Duration::from_millis(100))),
    );
    let token = harness.orchestrator.cancellation_token();
    let (graph, [a, b, c]) = chain(["a", "b", "c"]);

    let run_future = harness.orchestrator.run(graph);
    let event_rx = &mut harness.event_rx;
    let cancel_on_start = async {
        while let Some(event) = event_rx.recv().await {
            if matches!(event, SchedulerEvent::TaskStarted { .. }) {
                token.cancel();
                break;
            }
        }
    };
    let (run, _) = tokio::join!(run_future, cancel_on_start);
    let run = run.unwrap();

    assert_eq!(run.state, RunState::Cancelled);
    assert!(run.result(&a).unwrap().success);
    assert_eq!(run.result(&b).unwrap().error, Some(TaskError::Cancelled));
    assert_eq!(run.result(&c).unwrap().error, Some(TaskError::Cancelled));
    assert_eq!(run.cancelled, 2);
    assert!(run.failures().is_empty());
    assert_eq!(harness.capability.seen(), vec!["a"]);

    let cancelled: HashSet<_> = harness
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            SchedulerEvent::TaskCancelled { task_id } => Some(task_id),
            _ => None,
        })
        .collect();
    assert_eq!(cancelled, [b, c].into_iter().collect());
}

/// Test: One result per task
/// Given a graph mixing successes, failures and rejections
/// When the graph runs
/// Then every task has exactly one result and a terminal status
#[tokio::test]
async fn test_every_task_gets_one_result() {
    let harness = Harness::new(
        CountingCapability::new()
            .on("fail", Behavior::Fail("nope"))
            .on("bad", Behavior::Reject),
    );
    let root = test_task("fail-root");
    let child = test_task("child").depends_on(root.id);
    let rejected = test_task("bad-input");
    let ok = test_task("ok");
    let grandchild = test_task("grandchild").depends_on(child.id).depends_on(ok.id);
    let tasks = vec![root, child, rejected, ok, grandchild];
    let ids: HashSet<_> = tasks.iter().map(|t| t.id).collect();

    let run = harness.orchestrator.run(graph_of(tasks)).await.unwrap();

    assert_eq!(run.results.len(), ids.len());
    assert!(run.results.keys().all(|id| ids.contains(id)));
    assert!(run
        .graph
        .tasks
        .iter()
        .all(|t| !matches!(t.status, TaskStatus::Pending | TaskStatus::Running)));
    assert_eq!(run.completed + run.failed + run.unreachable + run.cancelled, ids.len());
    assert_eq!(run.completed, 1);
    assert_eq!(run.failed, 2);
    assert_eq!(run.unreachable, 2);
}
