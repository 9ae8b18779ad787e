//! Inbound command surface.
//!
//! [`SyncContext`] owns every collaborator for one process: settings, the
//! shared database, a single [`TokenManager`], the Upwork client and the
//! upsert engine. Each command returns an [`ApiResponse`] carrying an
//! HTTP-style status and a JSON body, so a CLI or an HTTP router can expose
//! them unchanged.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, Result};
use crate::integrations::exchange::{
    ExchangeClient, ExchangeOutcome, Grant, HttpTokenTransport, RetryPolicy, TokenTransport,
};
use crate::integrations::notion::NotionClient;
use crate::integrations::oauth::{self, TokenPayload};
use crate::integrations::token_manager::TokenManager;
use crate::integrations::upwork::{SourceFetcher, UpworkClient};
use crate::storage::{
    AuditLog, CredentialStore, Database, Settings, SqliteAuditLog, SqliteCredentialStore,
};
use crate::sync::{
    Destination, ItemType, Stage, SyncItem, SyncOrchestrator, UpsertEngine, UpsertOutcome,
};

pub const DEFAULT_FETCH_PATH: &str = "contracts?limit=10";
pub const DEFAULT_SEED_COUNT: usize = 10;

/// Largest demo batch `seed_demo_records` accepts.
pub const MAX_SEED_COUNT: usize = 100;

/// Status, JSON body and optional redirect target of a command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            location: None,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    pub fn redirect(location: String, body: Value) -> Self {
        Self {
            status: 302,
            body,
            location: Some(location),
        }
    }

    pub fn error(status: u16, error: &str) -> Self {
        Self::new(status, json!({ "ok": false, "error": error }))
    }

    /// 2xx or 3xx.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

impl From<&CoreError> for ApiResponse {
    fn from(err: &CoreError) -> Self {
        Self::new(
            err.http_status(),
            json!({ "ok": false, "error": err.code(), "message": err.to_string() }),
        )
    }
}

impl From<CoreError> for ApiResponse {
    fn from(err: CoreError) -> Self {
        Self::from(&err)
    }
}

/// Builder for [`SyncContext`]. Every collaborator can be replaced, which is
/// how tests run the real commands against fakes or local mock servers.
#[derive(Default)]
pub struct SyncContextBuilder {
    settings: Settings,
    database: Option<Arc<Database>>,
    transport: Option<Arc<dyn TokenTransport>>,
    source: Option<Arc<dyn SourceFetcher>>,
    destination: Option<Arc<dyn Destination>>,
    audit: Option<Arc<dyn AuditLog>>,
    clock: Option<Arc<dyn Clock>>,
    retry: Option<RetryPolicy>,
}

impl SyncContextBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn database(mut self, database: Arc<Database>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn TokenTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn source(mut self, source: Arc<dyn SourceFetcher>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn destination(mut self, destination: Arc<dyn Destination>) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn audit(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Wire every collaborator. Opens the configured database file when no
    /// database was supplied.
    ///
    /// # Errors
    /// Fails when the database cannot be opened or the token endpoint list
    /// is empty. Missing credentials are not checked here.
    pub fn build(self) -> Result<SyncContext> {
        let settings = Arc::new(self.settings);
        let database = match self.database {
            Some(db) => db,
            None => Arc::new(Database::open(&settings.database_path()?)?),
        };
        let http = reqwest::Client::new();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTokenTransport::new(http.clone())));
        let retry = self.retry.unwrap_or(RetryPolicy {
            max_attempts: settings.retry.attempts,
            base_delay: settings.retry_base_delay(),
        });
        let exchange =
            ExchangeClient::new(settings.upwork.token_endpoints.clone(), retry, transport)?;

        let store: Arc<dyn CredentialStore> = Arc::new(SqliteCredentialStore::new(database.clone()));
        let tokens = Arc::new(TokenManager::new(
            settings.clone(),
            store,
            Arc::new(exchange),
            clock.clone(),
        ));

        let upwork = Arc::new(UpworkClient::new(http.clone(), &settings.upwork));
        let source = self.source.unwrap_or_else(|| upwork.clone());
        let destination = self
            .destination
            .unwrap_or_else(|| Arc::new(NotionClient::new(http, &settings.notion)));
        let upsert = Arc::new(UpsertEngine::new(destination));
        let audit = self
            .audit
            .unwrap_or_else(|| Arc::new(SqliteAuditLog::new(database.clone())));

        let orchestrator = SyncOrchestrator::new(
            tokens.clone(),
            source,
            upsert.clone(),
            audit,
            clock.clone(),
        );

        Ok(SyncContext {
            settings,
            tokens,
            upwork,
            upsert,
            orchestrator,
            clock,
        })
    }
}

pub struct SyncContext {
    settings: Arc<Settings>,
    tokens: Arc<TokenManager>,
    upwork: Arc<UpworkClient>,
    upsert: Arc<UpsertEngine>,
    orchestrator: SyncOrchestrator,
    clock: Arc<dyn Clock>,
}

impl SyncContext {
    pub fn builder(settings: Settings) -> SyncContextBuilder {
        SyncContextBuilder::new(settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    /// Run one sync.
    pub async fn run_sync(&self) -> ApiResponse {
        match self.orchestrator.run_sync().await {
            Ok(report) => ApiResponse::ok(json!({
                "ok": true,
                "runId": report.run_id,
                "created": report.created,
                "updated": report.updated,
                "durationMs": report.duration_ms,
            })),
            Err(err) => ApiResponse::new(
                err.source.http_status(),
                json!({
                    "ok": false,
                    "runId": err.run_id,
                    "error": err.source.to_string(),
                    "code": err.source.code(),
                    "created": err.counts.created,
                    "updated": err.counts.updated,
                }),
            ),
        }
    }

    /// Redirect to the Upwork consent screen.
    pub fn begin_authorization(&self) -> ApiResponse {
        match oauth::authorization_request(&self.settings) {
            Ok(request) => ApiResponse::redirect(
                request.url.clone(),
                json!({ "ok": true, "url": request.url, "state": request.state }),
            ),
            Err(e) => CoreError::from(e).into(),
        }
    }

    /// Exchange an authorization code and persist the resulting credential.
    pub async fn complete_authorization(
        &self,
        code: Option<&str>,
        error: Option<&str>,
    ) -> ApiResponse {
        if let Some(error) = error.filter(|e| !e.is_empty()) {
            warn!(error = %error, "authorization denied");
            return ApiResponse::error(400, error);
        }
        let Some(code) = code.filter(|c| !c.is_empty()) else {
            return ApiResponse::error(400, "missing code");
        };

        let credentials = match self.tokens.client_credentials() {
            Ok(c) => c,
            Err(e) => return e.into(),
        };
        let redirect_uri = match self.settings.redirect_uri() {
            Ok(uri) => uri.to_string(),
            Err(e) => return CoreError::from(e).into(),
        };
        let grant = Grant::AuthorizationCode {
            code: code.to_string(),
            redirect_uri,
        };

        let body = match self.tokens.exchange_client().exchange(&credentials, &grant).await {
            ExchangeOutcome::Success { body, .. } => body,
            ExchangeOutcome::Failure(failure) => {
                warn!(endpoint = %failure.endpoint, status = ?failure.status, "authorization code exchange failed");
                return ApiResponse::new(
                    502,
                    json!({
                        "ok": false,
                        "error": "token_exchange_failed",
                        "status": failure.status,
                        "details": failure.body.or(failure.raw_error),
                        "endpoint": failure.endpoint,
                    }),
                );
            }
        };

        let stored = match TokenPayload::from_json(&body) {
            Ok(payload) => self.tokens.store_authorization(payload).await,
            Err(e) => Err(e.into()),
        };
        match stored {
            Ok(credential) => {
                info!(expires_at = credential.expires_at, "authorization completed");
                ApiResponse::ok(json!({ "ok": true, "source": "callback", "saved": true }))
            }
            Err(CoreError::Validation(e)) => ApiResponse::new(
                502,
                json!({ "ok": false, "error": "invalid_token_payload", "message": e.to_string() }),
            ),
            Err(e) => e.into(),
        }
    }

    /// GET an Upwork API path with the current token and return the answer.
    pub async fn fetch_upstream(&self, path: Option<&str>) -> ApiResponse {
        let path = path
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_FETCH_PATH);
        if let Err(e) = self.upwork.resolve(path) {
            return ApiResponse::new(
                400,
                json!({ "ok": false, "error": "invalid_path", "message": e.to_string() }),
            );
        }

        let token = match self.tokens.get_valid_access_token().await {
            Ok(Some(token)) => token,
            Ok(None) => return ApiResponse::error(401, "no_token"),
            Err(e) => return e.into(),
        };

        match self.upwork.get(&token, path).await {
            Ok(reply) if reply.is_success() => ApiResponse::ok(json!({
                "ok": true,
                "url": reply.url,
                "data": reply.json_or_text(),
            })),
            Ok(reply) => ApiResponse::new(
                reply.status,
                json!({
                    "ok": false,
                    "error": "upstream_failed",
                    "status": reply.status,
                    "url": reply.url,
                    "body": reply.json_or_text(),
                }),
            ),
            Err(e) => e.into(),
        }
    }

    /// Forward a GraphQL document to Upwork.
    pub async fn graphql(&self, query: Option<&str>, variables: Option<Value>) -> ApiResponse {
        let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) else {
            return ApiResponse::error(400, "missing_query");
        };
        let token = match self.tokens.get_valid_access_token().await {
            Ok(Some(token)) => token,
            Ok(None) => return ApiResponse::error(401, "no_token"),
            Err(e) => return e.into(),
        };
        let variables = variables.unwrap_or_else(|| json!({}));

        match self.upwork.graphql(&token, query, &variables).await {
            Ok(reply) => ApiResponse::new(
                reply.status,
                json!({
                    "ok": reply.is_success(),
                    "status": reply.status,
                    "contentType": reply.content_type,
                    "data": reply.json_or_text(),
                }),
            ),
            Err(e) => e.into(),
        }
    }

    /// Upsert `count` demo records (`demo-1` ..) into the destination.
    ///
    /// Failures are reported per record and do not stop the remaining ones.
    /// Counts above [`MAX_SEED_COUNT`] are refused with 400.
    pub async fn seed_demo_records(&self, count: Option<usize>) -> ApiResponse {
        let count = count.filter(|n| *n > 0).unwrap_or(DEFAULT_SEED_COUNT);
        if count > MAX_SEED_COUNT {
            return ApiResponse::new(
                400,
                json!({
                    "ok": false,
                    "error": "invalid_count",
                    "message": format!("count must be at most {MAX_SEED_COUNT}"),
                }),
            );
        }
        let now = self.clock.now();

        let mut created = 0usize;
        let mut updated = 0usize;
        let mut results = Vec::new();
        for n in 1..=count {
            let item = demo_item(n, now);
            match self.upsert.upsert(&item).await {
                Ok(outcome) => {
                    match outcome {
                        UpsertOutcome::Created => created += 1,
                        UpsertOutcome::Updated => updated += 1,
                    }
                    results.push(json!({ "ok": true, "externalId": item.external_id, "outcome": outcome }));
                }
                Err(e) => {
                    warn!(external_id = %item.external_id, error = %e, "demo record failed");
                    results.push(json!({ "ok": false, "externalId": item.external_id, "error": e.to_string() }));
                }
            }
        }

        ApiResponse::ok(json!({
            "ok": created + updated == count,
            "created": created,
            "updated": updated,
            "results": results,
        }))
    }

    pub fn ping(&self) -> ApiResponse {
        ApiResponse::ok(json!({
            "ok": true,
            "service": "worksync",
            "version": env!("CARGO_PKG_VERSION"),
        }))
    }

    /// Stored credential summary. Never refreshes.
    pub async fn auth_status(&self) -> ApiResponse {
        match self.tokens.status().await {
            Ok(status) => match serde_json::to_value(status) {
                Ok(body) => ApiResponse::ok(body),
                Err(e) => CoreError::from(e).into(),
            },
            Err(e) => e.into(),
        }
    }
}

const DEMO_STAGES: [Stage; 4] = [Stage::Applied, Stage::Viewed, Stage::Interview, Stage::Hired];
const DEMO_TYPES: [ItemType; 3] = [ItemType::Proposal, ItemType::Offer, ItemType::Contract];

fn demo_item(n: usize, now: DateTime<Utc>) -> SyncItem {
    SyncItem {
        client: Some(format!("Demo Client {}", (n - 1) % 3 + 1)),
        value: Some((n * 250) as f64),
        currency: Some("USD".into()),
        url: Some(format!("https://www.upwork.com/jobs/demo-{n}")),
        created: Some(now),
        updated: Some(now),
        ..SyncItem::new(
            format!("demo-{n}"),
            format!("Demo job #{n}"),
            DEMO_STAGES[(n - 1) % DEMO_STAGES.len()],
            DEMO_TYPES[(n - 1) % DEMO_TYPES.len()],
        )
    }
}
