use clap::Args;
use worksync_core::{ApiResponse, SyncContext};

#[derive(Args)]
pub struct SeedArgs {
    /// Number of demo records to upsert
    #[arg(long)]
    pub count: Option<usize>,
}

pub async fn run(ctx: &SyncContext, args: SeedArgs) -> ApiResponse {
    ctx.seed_demo_records(args.count).await
}
