//! End-to-end tests for the default plan.
//!
//! These tests run retrieval, detection, compliance, verification and
//! synthesis through the standard registry.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;

use verdict::agents::{
    AgentRegistry, InMemorySource, JsonFileSource, RecordSource, SynthesisContext,
    TemplateSynthesizer, TextSynthesizer,
};
use verdict::config::Config;
use verdict::core::{TaskError, TaskType};
use verdict::detection::FindingKind;
use verdict::orchestration::{DefaultPlanner, Orchestrator, Planner, RunState};
use verdict::report::ReportStatus;
use verdict::{Error, Result};

use crate::fixtures::suspicious_batch;

const QUERY: &str = "Analyze all transactions for suspicious activity";

fn orchestrator(source: Arc<dyn RecordSource>) -> Orchestrator {
    orchestrator_with(source, Arc::new(TemplateSynthesizer))
}

fn orchestrator_with(
    source: Arc<dyn RecordSource>,
    synthesizer: Arc<dyn TextSynthesizer>,
) -> Orchestrator {
    let registry = AgentRegistry::standard(&Config::default(), source, synthesizer);
    Orchestrator::new(Arc::new(registry))
}

struct Offline;

#[async_trait]
impl TextSynthesizer for Offline {
    async fn synthesize(&self, _context: &SynthesisContext) -> Result<String> {
        Err(Error::Synthesis("model unavailable".to_string()))
    }
}

/// Test: Full pipeline over an in-memory batch
/// Given a batch with planted structuring, integration, layering and rapid movement
/// When a query is processed
/// Then the report carries those findings, each checked and verified
#[tokio::test]
async fn test_pipeline_finds_planted_patterns() {
    let batch = suspicious_batch();
    let expected_records = batch.len();
    let orchestrator = orchestrator(Arc::new(InMemorySource::new(batch)));

    let (report, run) = orchestrator.process_query(QUERY).await.unwrap();

    assert_eq!(run.state, RunState::Complete);
    assert_eq!(run.rounds, 5);
    assert_eq!(run.completed, 5);
    assert!(run.failures().is_empty());

    let count = |kind: FindingKind| report.findings.iter().filter(|f| f.kind == kind).count();
    assert_eq!(count(FindingKind::Structuring), 1);
    assert_eq!(count(FindingKind::Integration), 1);
    assert_eq!(count(FindingKind::Layering), 1);
    assert_eq!(count(FindingKind::RapidMovement), 1);

    assert_eq!(report.records_analyzed, expected_records);
    assert_eq!(report.compliance_checks.len(), report.findings.len());
    assert_eq!(report.verification.len(), report.findings.len());
    assert!(report
        .findings
        .iter()
        .all(|f| report.verification.contains_key(&f.id)));
    assert!(report.description.contains("Executive Summary"));
    assert!(!report.recommendations.is_empty());
}

/// Test: Report status follows review needs
/// Given a pipeline run over the planted batch
/// When the report is assembled
/// Then it is pending review exactly when some finding needs a human
#[tokio::test]
async fn test_report_status_matches_review_count() {
    let orchestrator = orchestrator(Arc::new(InMemorySource::new(suspicious_batch())));

    let (report, _) = orchestrator.process_query(QUERY).await.unwrap();

    let expected = if report.review_count() > 0 {
        ReportStatus::PendingReview
    } else {
        ReportStatus::Draft
    };
    assert_eq!(report.status, expected);
    assert_eq!(report.summary().total_findings, report.findings.len());
}

/// Test: Records from a JSON file
/// Given the planted batch written to a JSON file
/// When the pipeline reads it through the file source
/// Then the findings match the in-memory run
#[tokio::test]
async fn test_pipeline_reads_json_file() {
    let batch = suspicious_batch();
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(serde_json::to_string(&batch).unwrap().as_bytes())
        .unwrap();

    let orchestrator = orchestrator(Arc::new(JsonFileSource::new(file.path())));
    let (report, run) = orchestrator.process_query(QUERY).await.unwrap();

    assert!(run.is_complete());
    assert_eq!(report.records_analyzed, batch.len());
    assert!(report
        .findings
        .iter()
        .any(|f| f.kind == FindingKind::Structuring));
}

/// Test: Text synthesis unavailable
/// Given a synthesizer that always fails
/// When the pipeline runs
/// Then the report still completes with the fallback description
#[tokio::test]
async fn test_synthesis_falls_back_when_collaborator_fails() {
    let batch = suspicious_batch();
    let expected = format!("This report analyzes {} records", batch.len());
    let orchestrator = orchestrator_with(Arc::new(InMemorySource::new(batch)), Arc::new(Offline));

    let (report, run) = orchestrator.process_query(QUERY).await.unwrap();

    assert!(run.is_complete());
    assert!(report.description.starts_with("AML Analysis Report Summary"));
    assert!(report.description.contains(&expected));
}

struct Hanging;

#[async_trait]
impl TextSynthesizer for Hanging {
    async fn synthesize(&self, _context: &SynthesisContext) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("never".to_string())
    }
}

/// Test: Text synthesis hangs
/// Given a synthesizer that never answers and a short task timeout
/// When the pipeline runs
/// Then synthesis gives up inside the task timeout and the report uses the fallback
#[tokio::test]
async fn test_synthesis_falls_back_when_collaborator_hangs() {
    let mut config = Config::default();
    config.orchestrator.task_timeout_secs = 2;
    config.orchestrator.synthesis_timeout_secs = 1;
    let registry = AgentRegistry::standard(
        &config,
        Arc::new(InMemorySource::new(suspicious_batch())),
        Arc::new(Hanging),
    );
    let orchestrator = Orchestrator::new(Arc::new(registry));

    let (report, run) = orchestrator.process_query(QUERY).await.unwrap();

    assert!(run.is_complete());
    assert_eq!(report.description, report.fallback_summary());
}

/// Test: Empty record file
/// Given a JSON file holding no records
/// When a query is processed
/// Then analysis fails, its dependents are unreachable and no report is produced
#[tokio::test]
async fn test_empty_records_fail_analysis() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"[]").unwrap();
    let orchestrator = orchestrator(Arc::new(JsonFileSource::new(file.path())));

    let graph = DefaultPlanner::default().plan(QUERY).unwrap();
    let run = orchestrator.run(graph).await.unwrap();

    assert_eq!(run.state, RunState::Finished);
    assert_eq!(run.completed, 1);
    assert_eq!(run.failed, 1);
    assert_eq!(run.unreachable, 3);
    assert!(run.report().is_none());

    let failure = run.failures()[0];
    assert_eq!(failure.agent, "analysis");
    assert!(matches!(
        failure.error,
        Some(TaskError::Processing { ref message }) if message.contains("no records")
    ));
    let analyze = run
        .graph
        .tasks
        .iter()
        .find(|t| t.task_type() == TaskType::Analyze)
        .unwrap();
    assert_eq!(failure.task_id, analyze.id);

    let err = orchestrator.process_query(QUERY).await.unwrap_err();
    assert!(matches!(err, Error::Synthesis(_)));
}
