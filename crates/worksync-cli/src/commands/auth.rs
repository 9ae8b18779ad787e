use clap::Subcommand;
use serde_json::json;
use worksync_core::integrations::oauth;
use worksync_core::{ApiResponse, CoreError, SyncContext};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Print the Upwork authorization URL
    Begin,
    /// Exchange an authorization code from the redirect
    Complete {
        /// `code` query parameter of the redirect
        #[arg(long)]
        code: Option<String>,
        /// `error` query parameter of the redirect
        #[arg(long)]
        error: Option<String>,
    },
    /// Open the browser and wait for the redirect on localhost
    Login,
    /// Show the stored credential
    Status,
}

pub async fn run(ctx: &SyncContext, action: AuthAction) -> ApiResponse {
    match action {
        AuthAction::Begin => ctx.begin_authorization(),
        AuthAction::Complete { code, error } => {
            ctx.complete_authorization(code.as_deref(), error.as_deref())
                .await
        }
        AuthAction::Login => login(ctx).await,
        AuthAction::Status => ctx.auth_status().await,
    }
}

async fn login(ctx: &SyncContext) -> ApiResponse {
    let begin = ctx.begin_authorization();
    let (Some(url), Some(expected_state)) = (
        begin.location.clone(),
        begin.body["state"].as_str().map(String::from),
    ) else {
        return begin;
    };

    let port = match ctx.settings().redirect_uri().and_then(oauth::redirect_port) {
        Ok(port) => port,
        Err(e) => return CoreError::from(e).into(),
    };

    eprintln!("Opening browser for Upwork authorization:\n  {url}");
    if let Err(e) = open::that(&url) {
        tracing::warn!(error = %e, "could not open browser, visit the URL manually");
    }

    let params = match tokio::task::spawn_blocking(move || oauth::wait_for_callback(port)).await {
        Ok(Ok(params)) => params,
        Ok(Err(e)) => return e.into(),
        Err(e) => {
            return ApiResponse::new(500, json!({ "ok": false, "error": e.to_string() }));
        }
    };

    if params.error.is_none() && params.state.as_deref() != Some(expected_state.as_str()) {
        return ApiResponse::error(400, "state_mismatch");
    }
    ctx.complete_authorization(params.code.as_deref(), params.error.as_deref())
        .await
}
