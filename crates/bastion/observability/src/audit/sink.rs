//! Audit sinks for storing audit records

use super::record::AuditRecord;
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Trait for append-only audit sinks
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append a record
    async fn write(&self, record: AuditRecord) -> Result<()>;

    /// Flush any buffered records
    async fn flush(&self) -> Result<()>;

    /// Number of records written so far
    async fn entry_count(&self) -> Result<u64>;
}

/// In-memory audit sink for testing
#[derive(Default)]
pub struct MemoryAuditSink {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all records
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.read().clone()
    }

    /// Records whose action matches exactly
    pub fn records_for_action(&self, action: &str) -> Vec<AuditRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.action == action)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn write(&self, record: AuditRecord) -> Result<()> {
        self.records.write().push(record);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn entry_count(&self) -> Result<u64> {
        Ok(self.records.read().len() as u64)
    }
}

/// Sink that forwards records to the `bastion::audit` tracing target
#[derive(Default)]
pub struct TracingAuditSink {
    count: AtomicU64,
}

impl TracingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn write(&self, record: AuditRecord) -> Result<()> {
        let metadata = serde_json::to_string(&record.metadata)?;
        tracing::info!(
            target: "bastion::audit",
            audit_id = %record.id,
            tenant_id = record.tenant_id.as_deref().unwrap_or("-"),
            actor_id = %record.actor_id,
            action = %record.action,
            resource_id = %record.resource_id,
            outcome = ?record.outcome,
            severity = ?record.severity,
            correlation_id = record.correlation_id.as_deref().unwrap_or("-"),
            metadata = %metadata,
            "audit"
        );
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn entry_count(&self) -> Result<u64> {
        Ok(self.count.load(Ordering::Relaxed))
    }
}

/// File-based audit sink writing one JSON record per line
pub struct FileAuditSink {
    path: PathBuf,
    count: AtomicU64,
}

impl FileAuditSink {
    /// Create a new file sink, creating parent directories as needed
    pub async fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        Ok(Self {
            path,
            count: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Read every record back from disk
    pub async fn read_all(&self) -> Result<Vec<AuditRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = tokio::fs::read_to_string(&self.path).await?;
        let mut records = Vec::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            records.push(serde_json::from_str(line)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn write(&self, record: AuditRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        // Every write is flushed.
        Ok(())
    }

    async fn entry_count(&self) -> Result<u64> {
        Ok(self.count.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_types::{ComponentId, GuardEvent, GuardEventEnvelope};

    fn sample_record() -> AuditRecord {
        AuditRecord::from_envelope(&GuardEventEnvelope::new(GuardEvent::PolicyConfigured {
            component: ComponentId::Auth,
            changed_fields: vec!["recovery".into()],
        }))
    }

    #[tokio::test]
    async fn test_memory_sink_collects_records() {
        let sink = MemoryAuditSink::new();
        sink.write(sample_record()).await.unwrap();
        sink.write(sample_record()).await.unwrap();

        assert_eq!(sink.entry_count().await.unwrap(), 2);
        assert_eq!(sink.records_for_action("degradation.configure").len(), 2);

        sink.clear();
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileAuditSink::new(dir.path().join("audit/bastion.jsonl"))
            .await
            .unwrap();

        sink.write(sample_record()).await.unwrap();
        sink.write(sample_record()).await.unwrap();

        let records = sink.read_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].resource_id, "AUTH");
        assert_eq!(sink.entry_count().await.unwrap(), 2);
    }
}
