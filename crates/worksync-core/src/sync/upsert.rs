//! Idempotent destination writes keyed by external identifier.
//!
//! A call to [`UpsertEngine::upsert`] performs exactly one write: an update
//! of the record already carrying the item's external id, or a create when
//! there is none. The indexed lookup can fail when the destination schema
//! lacks the identifier property; the engine then scans the whole listing.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{RecordPage, SyncItem, UpsertOutcome};
use crate::error::Result;

/// Destination database operations needed by the upsert engine.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Indexed lookup by exact external id. `Ok(None)` means no match.
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<String>>;

    /// One page of the unfiltered listing, starting at `cursor`.
    async fn list_records(&self, cursor: Option<&str>) -> Result<RecordPage>;

    /// Replace the tracked properties of `record_id` with those of `item`.
    async fn update_record(&self, record_id: &str, item: &SyncItem) -> Result<()>;

    /// Create a record for `item`, returning its destination id.
    async fn create_record(&self, item: &SyncItem) -> Result<String>;
}

pub struct UpsertEngine {
    destination: Arc<dyn Destination>,
}

impl UpsertEngine {
    pub fn new(destination: Arc<dyn Destination>) -> Self {
        Self { destination }
    }

    pub async fn upsert(&self, item: &SyncItem) -> Result<UpsertOutcome> {
        match self.locate(&item.external_id).await? {
            Some(record_id) => {
                self.destination.update_record(&record_id, item).await?;
                debug!(external_id = %item.external_id, record_id = %record_id, "updated destination record");
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let record_id = self.destination.create_record(item).await?;
                debug!(external_id = %item.external_id, record_id = %record_id, "created destination record");
                Ok(UpsertOutcome::Created)
            }
        }
    }

    /// Destination id of the record for `external_id`, if any.
    pub async fn locate(&self, external_id: &str) -> Result<Option<String>> {
        match self.destination.find_by_external_id(external_id).await {
            Ok(found) => Ok(found),
            Err(e) => {
                warn!(external_id = %external_id, error = %e, "indexed lookup failed, scanning destination");
                self.scan(external_id).await
            }
        }
    }

    /// Walk every page of the listing looking for an exact text match.
    pub async fn scan(&self, external_id: &str) -> Result<Option<String>> {
        let mut cursor: Option<String> = None;
        let mut scanned = 0usize;
        loop {
            let page = self.destination.list_records(cursor.as_deref()).await?;
            scanned += page.records.len();
            if let Some(record) = page
                .records
                .into_iter()
                .find(|r| r.external_id.as_deref() == Some(external_id))
            {
                return Ok(Some(record.id));
            }
            match page.next_cursor {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => break,
            }
        }
        info!(external_id = %external_id, scanned, "scan found no matching record");
        Ok(None)
    }
}
