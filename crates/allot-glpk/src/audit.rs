//! Audit sinks for task records.
//!
//! Every task invocation produces one [`AuditRecord`]. Recording is
//! fire-and-forget: sinks never return errors to the solver.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

use allot_core::AllotError;

use crate::task::{TaskData, TaskKind, TaskMetadata};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Succeeded { data: TaskData },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub execution_id: String,
    pub task: TaskKind,
    pub outcome: TaskOutcome,
    pub metadata: TaskMetadata,
}

impl AuditRecord {
    pub fn new(
        execution_id: &str,
        task: TaskKind,
        outcome: &Result<TaskData, AllotError>,
        metadata: &TaskMetadata,
    ) -> Self {
        let outcome = match outcome {
            Ok(data) => TaskOutcome::Succeeded { data: data.clone() },
            Err(e) => TaskOutcome::Failed { error: e.to_string() },
        };
        Self {
            execution_id: execution_id.to_string(),
            task,
            outcome,
            metadata: metadata.clone(),
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Succeeded { .. })
    }
}

/// Receives task records keyed by execution id.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Discards records.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: &AuditRecord) {}
}

/// Logs a one-line summary of each record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        match &record.outcome {
            TaskOutcome::Succeeded { .. } => info!(
                execution_id = %record.execution_id,
                task = %record.task,
                elapsed_ms = record.metadata.elapsed_ms,
                artifacts = record.metadata.artifacts.len(),
                "task succeeded"
            ),
            TaskOutcome::Failed { error } => warn!(
                execution_id = %record.execution_id,
                task = %record.task,
                elapsed_ms = record.metadata.elapsed_ms,
                %error,
                "task failed"
            ),
        }
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn records_for(&self, execution_id: &str) -> Vec<AuditRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.execution_id == execution_id)
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
    }
}

/// Appends each record as one JSON line. Write failures are logged and
/// dropped.
#[derive(Debug)]
pub struct JsonlAuditSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn append(&self, record: &AuditRecord) -> std::io::Result<()> {
        let line = serde_json::to_string(record)?;
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, record: &AuditRecord) {
        if let Err(e) = self.append(record) {
            warn!(path = %self.path.display(), error = %e, "failed to append audit record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use allot_core::UnitId;

    fn record(execution_id: &str, ok: bool) -> AuditRecord {
        let outcome = if ok {
            Ok(TaskData::Distribution {
                distribution: BTreeMap::from([(1, UnitId::Real(10))]),
            })
        } else {
            Err(AllotError::infeasible(TaskKind::UnitDistribution, "no solution"))
        };
        let metadata = TaskMetadata {
            elapsed_ms: 12,
            artifacts: BTreeMap::from([("a.mod".to_string(), "set F;".to_string())]),
            ..TaskMetadata::default()
        };
        AuditRecord::new(execution_id, TaskKind::UnitDistribution, &outcome, &metadata)
    }

    #[test]
    fn test_memory_sink_filters_by_execution() {
        let sink = MemoryAuditSink::new();
        sink.record(&record("run-1", true));
        sink.record(&record("run-2", false));
        sink.record(&record("run-1", false));

        assert_eq!(sink.records().len(), 3);
        let run1 = sink.records_for("run-1");
        assert_eq!(run1.len(), 2);
        assert!(run1[0].succeeded());
        assert!(!run1[1].succeeded());
    }

    #[test]
    fn test_failed_record_keeps_error_text() {
        let rec = record("run-1", false);
        match rec.outcome {
            TaskOutcome::Failed { error } => assert!(error.contains("no solution")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_jsonl_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = JsonlAuditSink::new(&path);
        sink.record(&record("run-1", true));
        sink.record(&record("run-1", false));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["execution_id"], "run-1");
        assert_eq!(lines[0]["task"], "unit_distribution");
        assert_eq!(lines[0]["outcome"]["status"], "succeeded");
        assert_eq!(lines[1]["outcome"]["status"], "failed");
        assert_eq!(lines[0]["metadata"]["artifacts"]["a.mod"], "set F;");
    }

    #[test]
    fn test_jsonl_sink_swallows_write_errors() {
        let sink = JsonlAuditSink::new("/nonexistent/dir/audit.jsonl");
        sink.record(&record("run-1", true));
    }
}
