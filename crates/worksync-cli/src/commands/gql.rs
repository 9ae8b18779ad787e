//! GraphQL passthrough to the Upwork API.

use clap::Args;
use worksync_core::{ApiResponse, SyncContext};

#[derive(Args)]
pub struct GqlArgs {
    /// GraphQL document
    #[arg(long)]
    pub query: Option<String>,
    /// Variables as a JSON object
    #[arg(long)]
    pub variables: Option<String>,
}

pub async fn run(ctx: &SyncContext, args: GqlArgs) -> ApiResponse {
    let variables = match args.variables.as_deref().map(serde_json::from_str) {
        Some(Ok(v)) => Some(v),
        Some(Err(e)) => {
            return ApiResponse::new(
                400,
                serde_json::json!({ "ok": false, "error": "invalid_variables", "message": e.to_string() }),
            )
        }
        None => None,
    };
    ctx.graphql(args.query.as_deref(), variables).await
}
