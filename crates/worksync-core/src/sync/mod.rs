//! Upwork → Notion synchronization.
//!
//! Source records are mapped to [`SyncItem`]s and written to the destination
//! through [`UpsertEngine`], which keeps at most one destination record per
//! external identifier.

pub mod record_mapper;
pub mod sync_engine;
pub mod types;
pub mod upsert;


pub use record_mapper::map_record;
pub use sync_engine::SyncOrchestrator;
pub use types::{
    DestinationRecord, ItemType, RecordPage, Stage, SyncCounts, SyncItem, SyncReport,
    SyncRunError, UpsertOutcome,
};
pub use upsert::{Destination, UpsertEngine};
