//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - A configurable counting capability
//! - Predefined task graphs
//! - Record batches with known suspicious patterns

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use tokio::sync::mpsc;

use verdict::agents::{AgentRegistry, Capability};
use verdict::core::{RetrieveInput, Task, TaskGraph, TaskId, TaskOutput, TaskPayload, TaskType};
use verdict::detection::{Record, RecordBatch, RecordKind};
use verdict::orchestration::{Orchestrator, SchedulerEvent};
use verdict::{Error, Result};

/// What a [`CountingCapability`] does when processed.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    Fail(&'static str),
    Sleep(Duration),
    Reject,
}

/// Retrieve-typed capability that counts calls and records the queries it
/// saw. Per-query behavior is looked up by prefix; anything unmatched
/// succeeds.
pub struct CountingCapability {
    rules: Vec<(&'static str, Behavior)>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl CountingCapability {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Use `behavior` for queries starting with `prefix`.
    pub fn on(mut self, prefix: &'static str, behavior: Behavior) -> Self {
        self.rules.push((prefix, behavior));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn was_called_for(&self, query: &str) -> bool {
        self.seen().iter().any(|q| q == query)
    }

    fn behavior(&self, query: &str) -> Behavior {
        self.rules
            .iter()
            .find(|(prefix, _)| query.starts_with(prefix))
            .map(|(_, b)| b.clone())
            .unwrap_or(Behavior::Succeed)
    }

    fn query(task: &Task) -> &str {
        match &task.payload {
            TaskPayload::Retrieve(input) => &input.query,
            _ => "",
        }
    }
}

#[async_trait]
impl Capability for CountingCapability {
    fn name(&self) -> &str {
        "counting"
    }

    fn task_type(&self) -> TaskType {
        TaskType::Retrieve
    }

    fn validate(&self, task: &Task) -> bool {
        !matches!(self.behavior(Self::query(task)), Behavior::Reject)
    }

    async fn process(&self, task: &Task) -> Result<TaskOutput> {
        let query = Self::query(task).to_string();
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(query.clone());

        match self.behavior(&query) {
            Behavior::Succeed | Behavior::Reject => Ok(TaskOutput::Records(
                RecordBatch::default().with_metadata("query", &query),
            )),
            Behavior::Fail(message) => Err(Error::Processing(message.to_string())),
            Behavior::Sleep(duration) => {
                tokio::time::sleep(duration).await;
                Ok(TaskOutput::Records(RecordBatch::default()))
            }
        }
    }
}

/// An orchestrator wired to one counting capability, with an event channel.
pub struct Harness {
    pub capability: Arc<CountingCapability>,
    pub orchestrator: Orchestrator,
    pub event_rx: mpsc::Receiver<SchedulerEvent>,
}

impl Harness {
    pub fn new(capability: CountingCapability) -> Self {
        Self::with_timeout(capability, Duration::from_secs(5))
    }

    pub fn with_timeout(capability: CountingCapability, timeout: Duration) -> Self {
        let capability = Arc::new(capability);
        let mut registry = AgentRegistry::new(timeout);
        registry.register(capability.clone());

        let (event_tx, event_rx) = mpsc::channel(256);
        let orchestrator = Orchestrator::new(Arc::new(registry)).with_events(event_tx);
        Self {
            capability,
            orchestrator,
            event_rx,
        }
    }

    /// Every event emitted so far.
    pub fn drain_events(&mut self) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// A retrieve task whose query is its name.
pub fn test_task(name: &str) -> Task {
    Task::new(name, TaskPayload::Retrieve(RetrieveInput::new(name)))
}

pub fn graph_of(tasks: Vec<Task>) -> TaskGraph {
    let mut graph = TaskGraph::new();
    for task in tasks {
        graph.add_task(task).unwrap();
    }
    graph
}

/// A -> B -> C
pub fn chain(names: [&str; 3]) -> (TaskGraph, [TaskId; 3]) {
    let a = test_task(names[0]);
    let b = test_task(names[1]).depends_on(a.id);
    let c = test_task(names[2]).depends_on(b.id);
    let ids = [a.id, b.id, c.id];
    (graph_of(vec![a, b, c]), ids)
}

/// A -> (B, C) -> D
pub fn diamond(names: [&str; 4]) -> (TaskGraph, [TaskId; 4]) {
    let a = test_task(names[0]);
    let b = test_task(names[1]).depends_on(a.id);
    let c = test_task(names[2]).depends_on(a.id);
    let d = test_task(names[3]).depends_on(b.id).depends_on(c.id);
    let ids = [a.id, b.id, c.id, d.id];
    (graph_of(vec![a, b, c, d]), ids)
}

fn at(base: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    base + ChronoDuration::minutes(minutes)
}

/// A day of ordinary payments plus four planted patterns:
/// - structuring: four 3000 transfers from `acct-struct` on one day
/// - integration: one 75000 deposit into `acct-shell`
/// - layering: `acct-l1 -> acct-l2 -> acct-l3 -> acct-l4` within the hour
/// - rapid movement: two transfers from `acct-fast` a minute apart
pub fn suspicious_batch() -> RecordBatch {
    let base = Utc.with_ymd_and_hms(2024, 4, 15, 8, 0, 0).unwrap();
    let mut records = Vec::new();

    let amounts = [120.0, 85.5, 240.0, 60.0, 310.0, 95.0, 180.0, 45.0, 220.0, 150.0];
    for i in 0..30 {
        records.push(Record::new(
            &format!("pay-{:02}", i),
            at(base, 17 * i as i64),
            amounts[i % amounts.len()],
            RecordKind::Payment,
            &format!("cust-{}", i % 10),
            "merchant",
        ));
    }

    for i in 0..4 {
        records.push(Record::new(
            &format!("struct-{}", i),
            at(base, 90 * i),
            3000.0,
            RecordKind::Transfer,
            "acct-struct",
            &format!("payee-{}", i),
        ));
    }

    records.push(Record::new(
        "deposit-1",
        at(base, 200),
        75_000.0,
        RecordKind::Deposit,
        "cash",
        "acct-shell",
    ));

    let chain = ["acct-l1", "acct-l2", "acct-l3", "acct-l4"];
    for (i, pair) in chain.windows(2).enumerate() {
        records.push(Record::new(
            &format!("layer-{}", i),
            at(base, 300 + 10 * i as i64),
            4500.0 - 100.0 * i as f64,
            RecordKind::Wire,
            pair[0],
            pair[1],
        ));
    }

    records.push(Record::new(
        "fast-0",
        at(base, 400),
        900.0,
        RecordKind::Transfer,
        "acct-fast",
        "x",
    ));
    records.push(Record::new(
        "fast-1",
        at(base, 401),
        880.0,
        RecordKind::Transfer,
        "acct-fast",
        "y",
    ));

    RecordBatch::new(records).with_metadata("bank", "test")
}
