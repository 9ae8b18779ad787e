use clap::Args;
use worksync_core::{ApiResponse, SyncContext};

#[derive(Args)]
pub struct FetchArgs {
    /// API path relative to the Upwork API base (default: contracts?limit=10)
    pub path: Option<String>,
}

pub async fn run(ctx: &SyncContext, args: FetchArgs) -> ApiResponse {
    ctx.fetch_upstream(args.path.as_deref()).await
}
