//! Sync subcommand: push Upwork records into the Notion database.

use clap::Subcommand;
use worksync_core::{ApiResponse, SyncContext};

#[derive(Subcommand)]
pub enum SyncAction {
    /// Run one full sync
    Run,
}

pub async fn run(ctx: &SyncContext, action: SyncAction) -> ApiResponse {
    match action {
        SyncAction::Run => ctx.run_sync().await,
    }
}
