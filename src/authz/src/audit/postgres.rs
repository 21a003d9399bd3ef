//! PostgreSQL audit sink
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE admin_audit_log (
//!     id UUID PRIMARY KEY,
//!     action VARCHAR(200) NOT NULL,
//!     entity_type VARCHAR(200) NOT NULL,
//!     user_id UUID,
//!     user_email VARCHAR(320),
//!     is_success BOOLEAN NOT NULL,
//!     timestamp TIMESTAMPTZ NOT NULL,
//!     correlation_id UUID
//! );
//! CREATE INDEX idx_admin_audit_user ON admin_audit_log (user_id);
//! CREATE INDEX idx_admin_audit_timestamp ON admin_audit_log (timestamp);
//! ```

use super::{AuditEntry, AuditSink, AuditStats};
use crate::error::{AuthzError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

type AuditRow = (
    Uuid,
    String,
    String,
    Option<Uuid>,
    Option<String>,
    bool,
    DateTime<Utc>,
    Option<Uuid>,
);

fn from_row(row: AuditRow) -> AuditEntry {
    let (id, action, entity_type, user_id, user_email, is_success, timestamp, correlation_id) = row;
    AuditEntry {
        id,
        action,
        entity_type,
        user_id,
        user_email,
        is_success,
        timestamp,
        correlation_id,
    }
}

fn db_error(e: sqlx::Error) -> AuthzError {
    AuthzError::DatabaseError(e.to_string())
}

/// Audit sink writing to `admin_audit_log`
#[derive(Debug, Clone)]
pub struct PostgresAuditSink {
    pool: PgPool,
}

impl PostgresAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using a database URL
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await.map_err(db_error)?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl AuditSink for PostgresAuditSink {
    async fn append(&self, entry: AuditEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_audit_log (
                id, action, entity_type, user_id, user_email,
                is_success, timestamp, correlation_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.user_id)
        .bind(&entry.user_email)
        .bind(entry.is_success)
        .bind(entry.timestamp)
        .bind(entry.correlation_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, action, entity_type, user_id, user_email,
                   is_success, timestamp, correlation_id
            FROM admin_audit_log
            ORDER BY timestamp DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn query_by_user(&self, user_id: Uuid, limit: usize) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, action, entity_type, user_id, user_email,
                   is_success, timestamp, correlation_id
            FROM admin_audit_log
            WHERE user_id = $1
            ORDER BY timestamp DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn stats(&self) -> Result<AuditStats> {
        let (total, succeeded): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE is_success)
            FROM admin_audit_log
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(AuditStats {
            total: total as u64,
            succeeded: succeeded as u64,
            failed: (total - succeeded) as u64,
        })
    }
}
