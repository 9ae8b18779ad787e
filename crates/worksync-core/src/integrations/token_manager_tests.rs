//! Tests for token_manager module.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::exchange::{
    ClientCredentials, ExchangeClient, RetryPolicy, TokenTransport, TransportError, TransportReply,
};
use super::token_manager::{TokenManager, REFRESH_SKEW_MS};
use crate::clock::{Clock, ManualClock};
use crate::error::{AuthError, ConfigError, CoreError};
use crate::storage::{Credential, CredentialStore, Database, Settings, SqliteCredentialStore};

const NOW: i64 = 1_700_000_000_000;

struct CountingTransport {
    calls: AtomicUsize,
    forms: Mutex<Vec<Vec<(&'static str, String)>>>,
    reply: Result<TransportReply, TransportError>,
}

impl CountingTransport {
    fn replying(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            forms: Mutex::new(Vec::new()),
            reply: Ok(TransportReply {
                status,
                body: body.to_string(),
            }),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenTransport for CountingTransport {
    async fn post_form(
        &self,
        _endpoint: &str,
        _credentials: &ClientCredentials,
        form: &[(&'static str, String)],
    ) -> Result<TransportReply, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.forms.lock().unwrap().push(form.to_vec());
        self.reply.clone()
    }
}

struct Fixture {
    manager: TokenManager,
    store: Arc<SqliteCredentialStore>,
    transport: Arc<CountingTransport>,
    clock: Arc<ManualClock>,
}

fn fixture_with(settings: Settings, transport: Arc<CountingTransport>) -> Fixture {
    let store = Arc::new(SqliteCredentialStore::new(Arc::new(
        Database::open_memory().unwrap(),
    )));
    let clock = Arc::new(ManualClock::new(NOW));
    let exchange = ExchangeClient::new(
        vec!["https://token.test/oauth2/token".into()],
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        },
        transport.clone(),
    )
    .unwrap();
    let manager = TokenManager::new(
        Arc::new(settings),
        store.clone(),
        Arc::new(exchange),
        clock.clone(),
    );
    Fixture {
        manager,
        store,
        transport,
        clock,
    }
}

fn configured() -> Settings {
    Settings::from_lookup(|key| match key {
        "UPWORK_CLIENT_ID" => Some("cid".into()),
        "UPWORK_CLIENT_SECRET" => Some("secret".into()),
        _ => None,
    })
    .unwrap()
}

fn fixture(transport: Arc<CountingTransport>) -> Fixture {
    fixture_with(configured(), transport)
}

fn stored(expires_at: i64) -> Credential {
    Credential {
        access_token: "T1".into(),
        refresh_token: "R1".into(),
        expires_at,
        scope: None,
    }
}

#[tokio::test]
async fn no_credential_yields_none_without_network() {
    let f = fixture(CountingTransport::replying(200, "{}"));
    assert_eq!(f.manager.get_valid_access_token().await.unwrap(), None);
    assert_eq!(f.transport.calls(), 0);
}

#[tokio::test]
async fn require_access_token_maps_absence_to_not_authenticated() {
    let f = fixture(CountingTransport::replying(200, "{}"));
    let err = f.manager.require_access_token().await.unwrap_err();
    assert!(matches!(err, CoreError::Auth(AuthError::NotAuthenticated)));
}

#[tokio::test]
async fn fresh_token_is_returned_without_refresh() {
    let f = fixture(CountingTransport::replying(200, "{}"));
    f.store.save(&stored(NOW + REFRESH_SKEW_MS)).await.unwrap();

    let token = f.manager.get_valid_access_token().await.unwrap();
    assert_eq!(token.as_deref(), Some("T1"));
    assert_eq!(f.transport.calls(), 0);
}

#[tokio::test]
async fn token_inside_skew_window_is_refreshed_once_and_persisted() {
    let f = fixture(CountingTransport::replying(
        200,
        r#"{"access_token":"T2","refresh_token":"R2","expires_in":3600}"#,
    ));
    f.store.save(&stored(NOW + REFRESH_SKEW_MS - 1)).await.unwrap();

    let token = f.manager.get_valid_access_token().await.unwrap();
    assert_eq!(token.as_deref(), Some("T2"));
    assert_eq!(f.transport.calls(), 1);

    let saved = f.store.load().await.unwrap().unwrap();
    assert_eq!(saved.access_token, "T2");
    assert_eq!(saved.refresh_token, "R2");
    assert_eq!(saved.expires_at, NOW + 3_600_000);

    let form = f.transport.forms.lock().unwrap()[0].clone();
    assert!(form.contains(&("grant_type", "refresh_token".to_string())));
    assert!(form.contains(&("refresh_token", "R1".to_string())));
}

#[tokio::test]
async fn refresh_without_rotation_keeps_refresh_token() {
    let f = fixture(CountingTransport::replying(
        200,
        r#"{"access_token":"T2","expires_in":60}"#,
    ));
    f.store.save(&stored(NOW)).await.unwrap();

    f.manager.get_valid_access_token().await.unwrap();
    let saved = f.store.load().await.unwrap().unwrap();
    assert_eq!(saved.refresh_token, "R1");
    assert_eq!(saved.expires_at, f.clock.now_ms() + 60_000);
}

#[tokio::test]
async fn rejected_refresh_is_an_authentication_error_and_keeps_store() {
    let f = fixture(CountingTransport::replying(400, r#"{"error":"invalid_grant"}"#));
    f.store.save(&stored(NOW - 1)).await.unwrap();

    let err = f.manager.get_valid_access_token().await.unwrap_err();
    match err {
        CoreError::Auth(AuthError::RefreshFailed { status, body, .. }) => {
            assert_eq!(status, Some(400));
            assert!(body.unwrap().contains("invalid_grant"));
        }
        other => panic!("expected RefreshFailed, got {other:?}"),
    }
    assert_eq!(f.transport.calls(), 1);
    assert_eq!(f.store.load().await.unwrap().unwrap(), stored(NOW - 1));
}

#[tokio::test]
async fn malformed_refresh_payload_is_an_authentication_error() {
    let f = fixture(CountingTransport::replying(200, r#"{"token":"nope"}"#));
    f.store.save(&stored(NOW)).await.unwrap();

    let err = f.manager.get_valid_access_token().await.unwrap_err();
    assert!(matches!(err, CoreError::Auth(AuthError::RefreshFailed { .. })));
}

#[tokio::test]
async fn refresh_without_client_credentials_is_a_config_error() {
    let transport = CountingTransport::replying(200, "{}");
    let f = fixture_with(Settings::default(), transport);
    f.store.save(&stored(NOW)).await.unwrap();

    let err = f.manager.get_valid_access_token().await.unwrap_err();
    assert!(matches!(err, CoreError::Config(ConfigError::MissingKey(_))));
    assert_eq!(f.transport.calls(), 0);
}

#[tokio::test]
async fn status_reports_without_network() {
    let f = fixture(CountingTransport::replying(200, "{}"));
    assert!(!f.manager.status().await.unwrap().authenticated);

    f.store.save(&stored(NOW + 60_000)).await.unwrap();
    let status = f.manager.status().await.unwrap();
    assert!(status.authenticated);
    assert_eq!(status.expires_in_ms, Some(60_000));
    assert!(status.needs_refresh);
    assert_eq!(f.transport.calls(), 0);
}
