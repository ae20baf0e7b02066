//! Retrieval capability and record sources.

use crate::agents::Capability;
use crate::core::{RetrieveInput, Task, TaskOutput, TaskPayload, TaskType};
use crate::detection::{Record, RecordBatch};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Where records come from.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, request: &RetrieveInput) -> Result<RecordBatch>;
}

/// A fixed batch held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    batch: RecordBatch,
}

impl InMemorySource {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }
}

#[async_trait]
impl RecordSource for InMemorySource {
    async fn fetch(&self, _request: &RetrieveInput) -> Result<RecordBatch> {
        Ok(self.batch.clone())
    }
}

/// Reads a JSON file holding either a `{records, metadata}` batch or a bare
/// array of records.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordFile {
    Batch(RecordBatch),
    Records(Vec<Record>),
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    async fn fetch(&self, _request: &RetrieveInput) -> Result<RecordBatch> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::Retrieval(format!("{}: {}", self.path.display(), e)))?;
        let file: RecordFile = serde_json::from_str(&content)
            .map_err(|e| Error::Retrieval(format!("{}: {}", self.path.display(), e)))?;

        let batch = match file {
            RecordFile::Batch(batch) => batch,
            RecordFile::Records(records) => RecordBatch::new(records),
        };
        Ok(batch.with_metadata("source", &self.path.display().to_string()))
    }
}

/// Fetches the record collection for a `retrieve` task.
pub struct RetrievalCapability {
    source: Arc<dyn RecordSource>,
}

impl RetrievalCapability {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Capability for RetrievalCapability {
    fn name(&self) -> &str {
        "retriever"
    }

    fn task_type(&self) -> TaskType {
        TaskType::Retrieve
    }

    fn validate(&self, task: &Task) -> bool {
        matches!(&task.payload, TaskPayload::Retrieve(input) if !input.query.trim().is_empty())
    }

    async fn process(&self, task: &Task) -> Result<TaskOutput> {
        let TaskPayload::Retrieve(input) = &task.payload else {
            return Err(Error::Validation("expected a retrieve payload".to_string()));
        };

        let batch = self
            .source
            .fetch(input)
            .await?
            .with_metadata("query", &input.query);
        info!(
            task = %task.id,
            records = batch.len(),
            total_amount = batch.total_amount(),
            "Records retrieved"
        );
        Ok(TaskOutput::Records(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::RecordKind;
    use chrono::{TimeZone, Utc};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn record(id: &str) -> Record {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Record::new(id, ts, 250.0, RecordKind::Payment, "a", "b")
    }

    fn retrieve(query: &str) -> Task {
        Task::new("fetch", TaskPayload::Retrieve(RetrieveInput::new(query)))
    }

    #[tokio::test]
    async fn test_in_memory_source_tags_query() {
        let capability = RetrievalCapability::new(Arc::new(InMemorySource::new(
            RecordBatch::new(vec![record("r1"), record("r2")]),
        )));
        let output = capability.process(&retrieve("march wires")).await.unwrap();
        let TaskOutput::Records(batch) = output else {
            panic!("expected records");
        };
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.metadata.get("query").map(String::as_str), Some("march wires"));
    }

    #[test]
    fn test_validate_rejects_blank_query() {
        let capability = RetrievalCapability::new(Arc::new(InMemorySource::default()));
        assert!(capability.validate(&retrieve("accounts")));
        assert!(!capability.validate(&retrieve("   ")));
    }

    #[tokio::test]
    async fn test_json_file_source_reads_bare_array() {
        let mut file = NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&vec![record("r1")]).unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let source = JsonFileSource::new(file.path());
        let batch = source.fetch(&RetrieveInput::new("q")).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert!(batch.metadata.contains_key("source"));
    }

    #[tokio::test]
    async fn test_json_file_source_reads_batch_object() {
        let mut file = NamedTempFile::new().unwrap();
        let batch = RecordBatch::new(vec![record("r1"), record("r2")]).with_metadata("bank", "x");
        file.write_all(serde_json::to_string(&batch).unwrap().as_bytes())
            .unwrap();

        let loaded = JsonFileSource::new(file.path())
            .fetch(&RetrieveInput::new("q"))
            .await
            .unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.metadata.get("bank").map(String::as_str), Some("x"));
    }

    #[tokio::test]
    async fn test_json_file_source_missing_file() {
        let source = JsonFileSource::new("/nonexistent/records.json");
        let err = source.fetch(&RetrieveInput::new("q")).await.unwrap_err();
        assert!(matches!(err, Error::Retrieval(_)));
    }
}
