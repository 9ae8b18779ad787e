//! # worksync core library
//!
//! Synchronizes Upwork proposals, offers and contracts into a Notion
//! database. Every operation is available through the `worksync` CLI binary,
//! which is a thin layer over [`SyncContext`].
//!
//! ## Architecture
//!
//! - **Credentials**: [`TokenManager`] hands out a valid Upwork access token,
//!   refreshing it through [`ExchangeClient`] shortly before it expires and
//!   persisting the result in SQLite
//! - **Sync**: [`SyncOrchestrator`] fetches the listing, maps each record and
//!   writes it through [`UpsertEngine`], which keeps at most one Notion page
//!   per external identifier
//! - **Storage**: SQLite for credentials and the audit trail, TOML plus
//!   environment variables for [`Settings`]
//!
//! ## Key Components
//!
//! - [`SyncContext`]: per-process wiring and the inbound commands
//! - [`TokenManager`]: credential lifecycle
//! - [`UpsertEngine`]: idempotent destination writes
//! - [`Settings`]: runtime configuration

pub mod clock;
pub mod error;
pub mod integrations;
pub mod service;
pub mod storage;
pub mod sync;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AuthError, ConfigError, CoreError, DatabaseError, ValidationError};
pub use integrations::{ExchangeClient, NotionClient, TokenManager, UpworkClient};
pub use service::{ApiResponse, SyncContext, SyncContextBuilder};
pub use storage::{Database, Settings};
pub use sync::{SyncItem, SyncOrchestrator, SyncReport, UpsertEngine};
