//! Audit logging for executed commands
//!
//! Writes are best-effort: a failing or slow sink produces a warning and never
//! fails the request that triggered it.

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PostgresAuditSink;

use crate::error::{AuthzError, Result};
use crate::metrics::MetricsCollector;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// Audit log entry. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,

    /// Command name, e.g. `AssignRoleCommand`
    pub action: String,

    pub entity_type: String,

    pub user_id: Option<Uuid>,

    pub user_email: Option<String>,

    pub is_success: bool,

    pub timestamp: DateTime<Utc>,

    /// Correlation id of the pipeline invocation
    #[serde(default)]
    pub correlation_id: Option<Uuid>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, entity_type: impl Into<String>, is_success: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.into(),
            entity_type: entity_type.into(),
            user_id: None,
            user_email: None,
            is_success,
            timestamp: Utc::now(),
            correlation_id: None,
        }
    }

    pub fn with_user(mut self, user_id: Option<Uuid>, user_email: Option<String>) -> Self {
        self.user_id = user_id;
        self.user_email = user_email;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// When the audit behavior records a command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditMode {
    /// Record before the handler runs with `is_success = true`. Failures
    /// after the entry is written are not re-recorded.
    #[default]
    Attempt,

    /// Record after the handler with the real outcome
    Outcome,
}

impl std::str::FromStr for AuditMode {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "attempt" => Ok(AuditMode::Attempt),
            "outcome" => Ok(AuditMode::Outcome),
            other => Err(AuthzError::InvalidInput(format!("unknown audit mode: {}", other))),
        }
    }
}

/// Audit configuration
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub mode: AuditMode,

    /// Upper bound on a single sink write
    pub write_timeout: Duration,

    /// In-memory sink capacity
    pub buffer_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            mode: AuditMode::Attempt,
            write_timeout: Duration::from_secs(2),
            buffer_capacity: 10_000,
        }
    }
}

/// Aggregate audit counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStats {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Destination for audit entries
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<()>;

    /// Most recent entries, newest first
    async fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>>;

    /// Entries written on behalf of one user, newest first
    async fn query_by_user(&self, user_id: Uuid, limit: usize) -> Result<Vec<AuditEntry>>;

    async fn stats(&self) -> Result<AuditStats>;
}

/// Bounded in-memory sink
#[derive(Debug)]
pub struct InMemoryAuditSink {
    buffer: RwLock<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl InMemoryAuditSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(VecDeque::with_capacity(capacity.min(1_024))),
            capacity: capacity.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.buffer.read().await.len()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.buffer.read().await.iter().cloned().collect()
    }
}

impl Default for InMemoryAuditSink {
    fn default() -> Self {
        Self::new(AuditConfig::default().buffer_capacity)
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        let mut buffer = self.buffer.write().await;
        buffer.push_back(entry);

        // Drop the oldest tenth once over capacity
        if buffer.len() > self.capacity {
            let len = buffer.len();
            let excess = (self.capacity / 10).max(len - self.capacity);
            buffer.drain(..excess.min(len));
        }

        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let buffer = self.buffer.read().await;
        Ok(buffer.iter().rev().take(limit).cloned().collect())
    }

    async fn query_by_user(&self, user_id: Uuid, limit: usize) -> Result<Vec<AuditEntry>> {
        let buffer = self.buffer.read().await;
        Ok(buffer
            .iter()
            .rev()
            .filter(|entry| entry.user_id == Some(user_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn stats(&self) -> Result<AuditStats> {
        let buffer = self.buffer.read().await;
        let succeeded = buffer.iter().filter(|e| e.is_success).count() as u64;
        Ok(AuditStats {
            total: buffer.len() as u64,
            succeeded,
            failed: buffer.len() as u64 - succeeded,
        })
    }
}

/// Best-effort writer in front of an [`AuditSink`]
pub struct AuditWriter {
    sink: Arc<dyn AuditSink>,
    config: AuditConfig,
    metrics: Option<Arc<MetricsCollector>>,
}

impl AuditWriter {
    pub fn new(sink: Arc<dyn AuditSink>, config: AuditConfig) -> Self {
        Self {
            sink,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn mode(&self) -> AuditMode {
        self.config.mode
    }

    pub fn sink(&self) -> &Arc<dyn AuditSink> {
        &self.sink
    }

    /// Record one command execution. Never fails.
    pub async fn log(
        &self,
        action: &str,
        entity_type: &str,
        user_id: Option<Uuid>,
        user_email: Option<String>,
        is_success: bool,
    ) {
        let entry = AuditEntry::new(action, entity_type, is_success).with_user(user_id, user_email);
        self.write(entry).await;
    }

    /// Append a prepared entry, bounded by the write timeout. Never fails.
    pub async fn write(&self, entry: AuditEntry) {
        let action = entry.action.clone();
        match tokio::time::timeout(self.config.write_timeout, self.sink.append(entry)).await {
            Ok(Ok(())) => debug!(action = %action, "Audit entry written"),
            Ok(Err(e)) => {
                warn!(action = %action, error = %e, "Failed to write audit entry");
                self.note_failure().await;
            }
            Err(_) => {
                warn!(
                    action = %action,
                    timeout_ms = self.config.write_timeout.as_millis() as u64,
                    "Audit write timed out"
                );
                self.note_failure().await;
            }
        }
    }

    async fn note_failure(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.record_audit_failure().await;
        }
    }
}

impl std::fmt::Debug for AuditWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditWriter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
