//! Best-effort audit trail of sync runs.
//!
//! Nothing written here is authoritative. Callers route every audit write
//! through [`best_effort`], so a failing audit table can never abort a sync.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::params;
use std::fmt::Display;
use std::sync::Arc;

use super::database::Database;
use crate::error::DatabaseError;

#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append an outcome payload for `run_id`.
    async fn record_run(&self, run_id: &str, payload: &serde_json::Value)
        -> Result<(), DatabaseError>;

    /// Note that `external_id` was seen by a sync run.
    async fn remember_external_id(&self, external_id: &str) -> Result<(), DatabaseError>;
}

/// Log and discard the result of a best-effort write.
pub fn best_effort<T, E: Display>(what: &str, result: Result<T, E>) {
    if let Err(e) = result {
        tracing::warn!(operation = what, error = %e, "best-effort write failed");
    }
}

pub struct SqliteAuditLog {
    db: Arc<Database>,
}

impl SqliteAuditLog {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Payloads recorded for `run_id`, oldest first.
    pub fn runs_for(&self, run_id: &str) -> Result<Vec<serde_json::Value>, DatabaseError> {
        let conn = self.db.conn()?;
        let mut stmt =
            conn.prepare("SELECT payload FROM sync_logs WHERE run_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![run_id], |row| row.get::<_, String>(0))?;

        let mut payloads = Vec::new();
        for row in rows {
            let raw = row?;
            let value = serde_json::from_str(&raw).map_err(|e| DatabaseError::CorruptRow {
                table: "sync_logs".into(),
                message: e.to_string(),
            })?;
            payloads.push(value);
        }
        Ok(payloads)
    }

    pub fn seen_external_ids(&self) -> Result<Vec<String>, DatabaseError> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare("SELECT external_id FROM contracts ORDER BY external_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}

#[async_trait]
impl AuditLog for SqliteAuditLog {
    async fn record_run(
        &self,
        run_id: &str,
        payload: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        let conn = self.db.conn()?;
        conn.execute(
            "INSERT INTO sync_logs (run_id, payload, created_at) VALUES (?1, ?2, ?3)",
            params![run_id, payload.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn remember_external_id(&self, external_id: &str) -> Result<(), DatabaseError> {
        let conn = self.db.conn()?;
        conn.execute(
            "INSERT INTO contracts (external_id, last_seen_at) VALUES (?1, ?2)
             ON CONFLICT(external_id) DO UPDATE SET last_seen_at = excluded.last_seen_at",
            params![external_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}
