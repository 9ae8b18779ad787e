//! Core types for Upwork → Notion synchronization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline stage of a source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Applied,
    Viewed,
    Interview,
    Hired,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Applied => "Applied",
            Stage::Viewed => "Viewed",
            Stage::Interview => "Interview",
            Stage::Hired => "Hired",
        }
    }
}

/// Kind of source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Proposal,
    Offer,
    Contract,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Proposal => "Proposal",
            ItemType::Offer => "Offer",
            ItemType::Contract => "Contract",
        }
    }
}

/// A validated source record, keyed by its external identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncItem {
    /// Assigned by Upwork; the only join key into the destination.
    pub external_id: String,
    pub title: String,
    pub stage: Stage,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub client: Option<String>,
    pub value: Option<f64>,
    pub currency: Option<String>,
    pub url: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl SyncItem {
    /// Item with only the required fields set.
    pub fn new(
        external_id: impl Into<String>,
        title: impl Into<String>,
        stage: Stage,
        item_type: ItemType,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            stage,
            item_type,
            client: None,
            value: None,
            currency: None,
            url: None,
            created: None,
            updated: None,
        }
    }
}

/// Which write an upsert performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Destination record as seen for matching purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationRecord {
    pub id: String,
    pub external_id: Option<String>,
}

/// One page of a destination listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPage {
    pub records: Vec<DestinationRecord>,
    pub next_cursor: Option<String>,
}

/// Counters for a sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    pub created: u32,
    pub updated: u32,
}

impl SyncCounts {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
    }
}

/// Result of a successful sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub run_id: String,
    pub created: u32,
    pub updated: u32,
    pub duration_ms: u64,
}

/// A run that stopped early, with the counts reached before the abort.
#[derive(Debug, thiserror::Error)]
#[error("sync run {run_id} aborted: {source}")]
pub struct SyncRunError {
    pub run_id: String,
    pub counts: SyncCounts,
    #[source]
    pub source: crate::error::CoreError,
}
