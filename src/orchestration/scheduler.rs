//! Round-based scheduler that drives a task graph to completion.
//!
//! The `Orchestrator` runs a single loop. Each round it asks the
//! [`TaskGraph`] which tasks are ready, feeds each one the outputs of its
//! completed dependencies, spawns all of them at once and waits for the
//! whole batch before recording results. Results and the completed set are
//! only touched by the loop itself, between rounds.

use crate::agents::{AgentRegistry, SCHEDULER_AGENT};
use crate::core::{
    Task, TaskError, TaskGraph, TaskGraphSnapshot, TaskId, TaskResult, TaskStatus,
};
use crate::error::StructuralError;
use crate::orchestration::planner::{DefaultPlanner, Planner};
use crate::report::Report;
use crate::{Error, Result};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Events emitted by the orchestrator as a run progresses.
///
/// Events are sent with `send().await` on a bounded channel, so a receiver
/// that is never drained will eventually block the run.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// A task was handed to its capability.
    TaskStarted {
        /// The task that started.
        task_id: TaskId,
        /// Name of the capability running it.
        agent: String,
    },
    /// A task finished successfully.
    TaskCompleted {
        /// The task that completed.
        task_id: TaskId,
    },
    /// A task failed, either in its capability or by propagation.
    TaskFailed {
        /// The task that failed.
        task_id: TaskId,
        /// Error message describing the failure.
        error: String,
    },
    /// A pending task was cancelled before dispatch.
    TaskCancelled {
        /// The task that was cancelled.
        task_id: TaskId,
    },
    /// Every task in the graph completed.
    AllTasksComplete,
    /// The run ended without a structural error.
    RunFinished {
        /// Terminal state of the run.
        state: RunState,
    },
}

/// Terminal state of a run that did not abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Every task completed.
    Complete,
    /// Every task reached a terminal status, at least one of them failed.
    Finished,
    /// The run was cancelled between rounds.
    Cancelled,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub state: RunState,
    /// The graph with final task statuses.
    pub graph: TaskGraphSnapshot,
    /// One result per task that reached a terminal status.
    pub results: BTreeMap<TaskId, TaskResult>,
    pub completed: usize,
    /// Tasks whose capability failed, timed out or rejected the payload.
    pub failed: usize,
    /// Tasks failed because an upstream dependency failed.
    pub unreachable: usize,
    pub cancelled: usize,
    pub rounds: usize,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.state == RunState::Complete
    }

    pub fn result(&self, id: &TaskId) -> Option<&TaskResult> {
        self.results.get(id)
    }

    /// The report produced by a synthesize task, if any succeeded.
    pub fn report(&self) -> Option<&Report> {
        self.results
            .values()
            .filter_map(|r| r.output.as_ref())
            .find_map(|o| o.as_report())
    }

    /// Results that failed, excluding propagated failures and cancellations.
    pub fn failures(&self) -> Vec<&TaskResult> {
        self.results
            .values()
            .filter(|r| matches!(&r.error, Some(e) if !e.is_propagated() && *e != TaskError::Cancelled))
            .collect()
    }
}

/// Drives task graphs through an [`AgentRegistry`].
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use verdict::orchestration::Orchestrator;
///
/// let orchestrator = Orchestrator::new(Arc::new(registry));
/// let run = orchestrator.run(graph).await?;
/// println!("{} completed, {} failed", run.completed, run.failed);
/// ```
pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    planner: Arc<dyn Planner>,
    event_tx: Option<mpsc::Sender<SchedulerEvent>>,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Create an orchestrator with the default planner and no event channel.
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            planner: Arc::new(DefaultPlanner::default()),
            event_tx: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = planner;
        self
    }

    /// Emit [`SchedulerEvent`]s on `event_tx`.
    pub fn with_events(mut self, event_tx: mpsc::Sender<SchedulerEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels the current run at the next round boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Plan `query`, run the plan and return the synthesized report.
    ///
    /// # Errors
    ///
    /// Structural errors from planning or scheduling, and
    /// [`Error::Synthesis`] when the run produced no report.
    pub async fn process_query(&self, query: &str) -> Result<(Report, RunReport)> {
        let graph = self.planner.plan(query)?;
        info!(query, tasks = graph.task_count(), "Processing query");

        let run = self.run(graph).await?;
        let report = run.report().cloned().ok_or_else(|| {
            let failures: Vec<String> = run
                .failures()
                .iter()
                .map(|r| format!("{}: {}", r.agent, r.error_message()))
                .collect();
            Error::Synthesis(format!(
                "run ended {:?} without a report ({})",
                run.state,
                failures.join("; ")
            ))
        })?;
        Ok((report, run))
    }

    /// Run `graph` until every task reaches a terminal status.
    ///
    /// Failed tasks do not abort the run; their dependents are failed by
    /// propagation and independent branches keep going.
    ///
    /// # Errors
    ///
    /// [`Error::Structural`] if the graph is malformed or stalls with
    /// pending tasks that can never become ready, such as the dependents of
    /// a task left `Running` in a resumed snapshot.
    ///
    /// Tasks already `Completed` count as satisfied dependencies and are not
    /// dispatched again; they get no result in the returned report.
    pub async fn run(&self, mut graph: TaskGraph) -> Result<RunReport> {
        graph.validate()?;

        let started = Instant::now();
        // Tasks that finished in an earlier run are satisfied dependencies.
        let mut completed: HashSet<TaskId> = graph
            .all_tasks()
            .into_iter()
            .filter(|task| task.status == TaskStatus::Completed)
            .map(|task| task.id)
            .collect();
        let mut results: HashMap<TaskId, TaskResult> = HashMap::new();
        let mut rounds = 0;

        info!(
            tasks = graph.task_count(),
            dependencies = graph.dependency_count(),
            "Starting run"
        );

        let state = loop {
            if self.cancel.is_cancelled() {
                self.cancel_pending(&mut graph, &mut results).await;
                break RunState::Cancelled;
            }
            if graph.is_complete(&completed) {
                self.emit(SchedulerEvent::AllTasksComplete).await;
                break RunState::Complete;
            }

            self.propagate_failures(&mut graph, &mut results).await;

            let ready: Vec<Task> = graph
                .get_ready_tasks(&completed)
                .into_iter()
                .cloned()
                .collect();
            if ready.is_empty() {
                let pending = graph.pending_ids().len();
                if pending > 0 {
                    warn!(pending, "No task is ready, run stalled");
                    return Err(StructuralError::Stalled { pending }.into());
                }
                break RunState::Finished;
            }

            rounds += 1;
            debug!(round = rounds, ready = ready.len(), "Dispatching round");

            let batch = self.dispatch_round(&mut graph, ready, &results).await;
            for result in batch {
                self.record(&mut graph, &mut completed, &mut results, result)
                    .await;
            }
        };

        let report = self.finish(graph, results, state, rounds, started.elapsed());
        info!(
            state = ?report.state,
            rounds = report.rounds,
            completed = report.completed,
            failed = report.failed,
            unreachable = report.unreachable,
            cancelled = report.cancelled,
            "Run finished"
        );
        self.emit(SchedulerEvent::RunFinished { state }).await;
        Ok(report)
    }

    /// Spawn every ready task and wait for the whole batch.
    async fn dispatch_round(
        &self,
        graph: &mut TaskGraph,
        ready: Vec<Task>,
        results: &HashMap<TaskId, TaskResult>,
    ) -> Vec<TaskResult> {
        let mut ids = Vec::with_capacity(ready.len());
        let mut handles = Vec::with_capacity(ready.len());

        for mut task in ready {
            for dependency in &task.dependencies {
                if let Some(output) = results
                    .get(dependency)
                    .filter(|r| r.success)
                    .and_then(|r| r.output.as_ref())
                {
                    task.payload.absorb(output);
                }
            }
            task.start();
            if let Some(node) = graph.get_task_mut(&task.id) {
                node.start();
            }

            let agent = self.registry.agent_name(task.task_type());
            debug!(task = %task.id, name = %task.name, agent = %agent, "Task started");
            self.emit(SchedulerEvent::TaskStarted {
                task_id: task.id,
                agent,
            })
            .await;

            let registry = Arc::clone(&self.registry);
            ids.push(task.id);
            handles.push(tokio::spawn(async move { registry.dispatch(&task).await }));
        }

        let started = Instant::now();
        join_all(handles)
            .await
            .into_iter()
            .zip(ids)
            .map(|(joined, task_id)| {
                joined.unwrap_or_else(|e| {
                    TaskResult::failure(
                        task_id,
                        SCHEDULER_AGENT,
                        TaskError::Processing {
                            message: format!("task aborted: {}", e),
                        },
                        started.elapsed(),
                    )
                })
            })
            .collect()
    }

    /// Store a result once and move the task to its terminal status.
    async fn record(
        &self,
        graph: &mut TaskGraph,
        completed: &mut HashSet<TaskId>,
        results: &mut HashMap<TaskId, TaskResult>,
        result: TaskResult,
    ) {
        let task_id = result.task_id;
        if results.contains_key(&task_id) {
            warn!(task = %task_id, "Duplicate result ignored");
            return;
        }

        let event = if result.success {
            if let Some(task) = graph.get_task_mut(&task_id) {
                task.complete();
            }
            completed.insert(task_id);
            debug!(task = %task_id, agent = %result.agent, "Task completed");
            SchedulerEvent::TaskCompleted { task_id }
        } else {
            let error = result.error_message();
            if let Some(task) = graph.get_task_mut(&task_id) {
                task.fail(&error);
            }
            warn!(task = %task_id, agent = %result.agent, error = %error, "Task failed");
            SchedulerEvent::TaskFailed { task_id, error }
        };

        results.insert(task_id, result);
        self.emit(event).await;
    }

    /// Fail every pending task with a failed or cancelled dependency,
    /// repeating until nothing changes so failures reach the whole subtree.
    async fn propagate_failures(
        &self,
        graph: &mut TaskGraph,
        results: &mut HashMap<TaskId, TaskResult>,
    ) {
        loop {
            let blocked: Vec<(TaskId, TaskId)> = graph
                .pending_ids()
                .into_iter()
                .filter_map(|id| {
                    let task = graph.get_task(&id)?;
                    task.dependencies
                        .iter()
                        .find(|dep| {
                            graph.get_task(dep).is_some_and(|d| {
                                matches!(d.status, TaskStatus::Failed { .. } | TaskStatus::Cancelled)
                            })
                        })
                        .map(|dep| (id, *dep))
                })
                .collect();

            if blocked.is_empty() {
                return;
            }

            for (task_id, dependency) in blocked {
                debug!(task = %task_id, dependency = %dependency, "Dependency failed, skipping task");
                let result = TaskResult::failure(
                    task_id,
                    SCHEDULER_AGENT,
                    TaskError::DependencyFailure { dependency },
                    Duration::ZERO,
                );
                let error = result.error_message();
                if let Some(task) = graph.get_task_mut(&task_id) {
                    task.fail(&error);
                }
                results.insert(task_id, result);
                self.emit(SchedulerEvent::TaskFailed { task_id, error }).await;
            }
        }
    }

    async fn cancel_pending(
        &self,
        graph: &mut TaskGraph,
        results: &mut HashMap<TaskId, TaskResult>,
    ) {
        let pending = graph.pending_ids();
        info!(pending = pending.len(), "Run cancelled");
        for task_id in pending {
            if let Some(task) = graph.get_task_mut(&task_id) {
                task.cancel();
            }
            results.insert(
                task_id,
                TaskResult::failure(task_id, SCHEDULER_AGENT, TaskError::Cancelled, Duration::ZERO),
            );
            self.emit(SchedulerEvent::TaskCancelled { task_id }).await;
        }
    }

    fn finish(
        &self,
        graph: TaskGraph,
        results: HashMap<TaskId, TaskResult>,
        state: RunState,
        rounds: usize,
        elapsed: Duration,
    ) -> RunReport {
        let mut completed = 0;
        let mut failed = 0;
        let mut unreachable = 0;
        let mut cancelled = 0;
        for result in results.values() {
            match &result.error {
                None => completed += 1,
                Some(TaskError::Cancelled) => cancelled += 1,
                Some(e) if e.is_propagated() => unreachable += 1,
                Some(_) => failed += 1,
            }
        }

        RunReport {
            state,
            graph: graph.snapshot(),
            results: results.into_iter().collect(),
            completed,
            failed,
            unreachable,
            cancelled,
            rounds,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    async fn emit(&self, event: SchedulerEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("events", &self.event_tx.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
