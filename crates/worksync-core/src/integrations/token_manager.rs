//! Credential lifecycle: hand out a usable access token, refreshing it first
//! when it is inside the skew window.
//!
//! Every command that needs an Upwork token goes through [`TokenManager`].

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::exchange::{ClientCredentials, ExchangeClient, ExchangeOutcome, Grant};
use super::oauth::TokenPayload;
use crate::clock::Clock;
use crate::error::{AuthError, CoreError, Result};
use crate::storage::{Credential, CredentialStore, Settings};

/// Refresh when less than this many milliseconds of validity remain.
pub const REFRESH_SKEW_MS: i64 = 120_000;

/// Snapshot of the stored credential, without secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    pub authenticated: bool,
    pub expires_at: Option<i64>,
    pub expires_in_ms: Option<i64>,
    pub needs_refresh: bool,
    pub scope: Option<String>,
}

pub struct TokenManager {
    settings: Arc<Settings>,
    store: Arc<dyn CredentialStore>,
    exchange: Arc<ExchangeClient>,
    clock: Arc<dyn Clock>,
}

impl TokenManager {
    pub fn new(
        settings: Arc<Settings>,
        store: Arc<dyn CredentialStore>,
        exchange: Arc<ExchangeClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            store,
            exchange,
            clock,
        }
    }

    pub fn exchange_client(&self) -> &ExchangeClient {
        &self.exchange
    }

    pub(crate) fn client_credentials(&self) -> Result<ClientCredentials> {
        Ok(ClientCredentials {
            client_id: self.settings.client_id()?.to_string(),
            client_secret: self.settings.client_secret()?.to_string(),
        })
    }

    /// A currently valid access token, or `None` if none was ever issued.
    ///
    /// # Errors
    /// `AuthError::RefreshFailed` when a needed refresh is rejected,
    /// `ConfigError` when client credentials are missing at refresh time,
    /// `DatabaseError` when the store cannot be read or written.
    pub async fn get_valid_access_token(&self) -> Result<Option<String>> {
        let Some(credential) = self.store.load().await? else {
            debug!("no stored credential");
            return Ok(None);
        };

        let now = self.clock.now_ms();
        let remaining = credential.remaining_ms(now);
        if remaining >= REFRESH_SKEW_MS {
            return Ok(Some(credential.access_token));
        }

        info!(remaining_ms = remaining, "access token inside skew window, refreshing");
        let refreshed = self.refresh(&credential).await?;
        Ok(Some(refreshed.access_token))
    }

    /// Like [`get_valid_access_token`](Self::get_valid_access_token) but
    /// treats a missing credential as `AuthError::NotAuthenticated`.
    pub async fn require_access_token(&self) -> Result<String> {
        self.get_valid_access_token()
            .await?
            .ok_or_else(|| AuthError::NotAuthenticated.into())
    }

    async fn refresh(&self, current: &Credential) -> Result<Credential> {
        let credentials = self.client_credentials()?;
        let grant = Grant::RefreshToken {
            refresh_token: current.refresh_token.clone(),
        };

        let body = match self.exchange.exchange(&credentials, &grant).await {
            ExchangeOutcome::Success { body, .. } => body,
            ExchangeOutcome::Failure(failure) => {
                warn!(endpoint = %failure.endpoint, status = ?failure.status, "token refresh failed");
                return Err(AuthError::RefreshFailed {
                    message: failure.summary(),
                    status: failure.status,
                    body: failure.body,
                }
                .into());
            }
        };

        let credential = TokenPayload::from_json(&body)
            .and_then(|payload| {
                payload.into_credential(Some(&current.refresh_token), self.clock.now_ms())
            })
            .map_err(|e| AuthError::RefreshFailed {
                status: None,
                body: Some(body.to_string()),
                message: e.to_string(),
            })?;

        self.store.save(&credential).await?;
        info!(expires_at = credential.expires_at, "access token refreshed");
        Ok(credential)
    }

    /// Persist the credential produced by an authorization-code exchange.
    pub async fn store_authorization(&self, payload: TokenPayload) -> Result<Credential> {
        let credential = payload.into_credential(None, self.clock.now_ms())?;
        self.store.save(&credential).await?;
        info!(expires_at = credential.expires_at, "authorization stored");
        Ok(credential)
    }

    /// Report the stored credential without network I/O.
    pub async fn status(&self) -> Result<TokenStatus, CoreError> {
        let now = self.clock.now_ms();
        Ok(match self.store.load().await? {
            Some(c) => TokenStatus {
                authenticated: true,
                expires_at: Some(c.expires_at),
                expires_in_ms: Some(c.remaining_ms(now)),
                needs_refresh: c.remaining_ms(now) < REFRESH_SKEW_MS,
                scope: c.scope,
            },
            None => TokenStatus {
                authenticated: false,
                expires_at: None,
                expires_in_ms: None,
                needs_refresh: false,
                scope: None,
            },
        })
    }
}
