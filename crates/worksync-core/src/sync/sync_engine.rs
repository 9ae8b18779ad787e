//! One sync run: token, listing, then map and upsert each record in order.
//!
//! Records are processed strictly sequentially. A record that fails to map
//! or to upsert stops the run; writes already made are kept.

use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::record_mapper::map_record;
use super::types::{SyncCounts, SyncReport, SyncRunError};
use super::upsert::UpsertEngine;
use crate::clock::Clock;
use crate::error::Result;
use crate::integrations::token_manager::TokenManager;
use crate::integrations::upwork::SourceFetcher;
use crate::storage::{best_effort, AuditLog};

pub struct SyncOrchestrator {
    tokens: Arc<TokenManager>,
    source: Arc<dyn SourceFetcher>,
    upsert: Arc<UpsertEngine>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
}

impl SyncOrchestrator {
    pub fn new(
        tokens: Arc<TokenManager>,
        source: Arc<dyn SourceFetcher>,
        upsert: Arc<UpsertEngine>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tokens,
            source,
            upsert,
            audit,
            clock,
        }
    }

    /// Execute a full run and record its outcome in the audit log.
    ///
    /// # Errors
    /// [`SyncRunError`] wrapping the first failure, with the counts reached
    /// before it.
    pub async fn run_sync(&self) -> std::result::Result<SyncReport, SyncRunError> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = self.clock.now();
        let timer = Instant::now();
        info!(run_id = %run_id, "sync run started");

        let mut counts = SyncCounts::default();
        let result = self.process(&run_id, &mut counts).await;
        let duration_ms = u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX);

        let mut payload = json!({
            "runId": run_id,
            "startedAt": started_at.to_rfc3339(),
            "ok": result.is_ok(),
            "created": counts.created,
            "updated": counts.updated,
            "durationMs": duration_ms,
        });
        if let Err(e) = &result {
            payload["error"] = Value::String(e.to_string());
        }
        best_effort(
            "record sync run",
            self.audit.record_run(&run_id, &payload).await,
        );

        match result {
            Ok(()) => {
                info!(
                    run_id = %run_id,
                    created = counts.created,
                    updated = counts.updated,
                    duration_ms,
                    "sync run finished"
                );
                Ok(SyncReport {
                    run_id,
                    created: counts.created,
                    updated: counts.updated,
                    duration_ms,
                })
            }
            Err(source) => {
                error!(run_id = %run_id, error = %source, "sync run aborted");
                Err(SyncRunError {
                    run_id,
                    counts,
                    source,
                })
            }
        }
    }

    async fn process(&self, run_id: &str, counts: &mut SyncCounts) -> Result<()> {
        let token = self.tokens.require_access_token().await?;
        let raw_items = self.source.fetch_items(&token).await?;
        debug!(run_id = %run_id, count = raw_items.len(), "processing source records");

        for raw in &raw_items {
            let item = map_record(raw)?;
            let outcome = self.upsert.upsert(&item).await?;
            counts.record(outcome);
            best_effort(
                "remember external id",
                self.audit.remember_external_id(&item.external_id).await,
            );
        }
        Ok(())
    }
}
