//! OAuth token endpoint client with endpoint fallback and bounded retry.
//!
//! Network-level failures are retried against the same endpoint with a
//! linearly growing delay, then the next endpoint is tried. Any HTTP response
//! that is not a success is a definitive rejection: it is returned at once
//! and no other attempt is made.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ConfigError;

/// Client id and secret sent as HTTP Basic credentials.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Grant parameters for the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    AuthorizationCode { code: String, redirect_uri: String },
    RefreshToken { refresh_token: String },
}

impl Grant {
    pub fn grant_type(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode { .. } => "authorization_code",
            Grant::RefreshToken { .. } => "refresh_token",
        }
    }

    /// Form fields for the request body.
    pub fn form(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("grant_type", self.grant_type().to_string())];
        match self {
            Grant::AuthorizationCode { code, redirect_uri } => {
                fields.push(("code", code.clone()));
                fields.push(("redirect_uri", redirect_uri.clone()));
            }
            Grant::RefreshToken { refresh_token } => {
                fields.push(("refresh_token", refresh_token.clone()));
            }
        }
        fields
    }
}

/// Attempts per endpoint and the unit of linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Raw HTTP answer from the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReply {
    pub status: u16,
    pub body: String,
}

impl TransportReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced an HTTP response.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

#[async_trait]
pub trait TokenTransport: Send + Sync {
    async fn post_form(
        &self,
        endpoint: &str,
        credentials: &ClientCredentials,
        form: &[(&'static str, String)],
    ) -> Result<TransportReply, TransportError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone, Default)]
pub struct HttpTokenTransport {
    client: reqwest::Client,
}

impl HttpTokenTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenTransport for HttpTokenTransport {
    async fn post_form(
        &self,
        endpoint: &str,
        credentials: &ClientCredentials,
        form: &[(&'static str, String)],
    ) -> Result<TransportReply, TransportError> {
        let resp = self
            .client
            .post(endpoint)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(TransportReply { status, body })
    }
}

/// Details of a failed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeFailure {
    pub status: Option<u16>,
    pub body: Option<String>,
    pub raw_error: Option<String>,
    pub endpoint: String,
}

impl ExchangeFailure {
    pub fn summary(&self) -> String {
        match (self.status, &self.raw_error) {
            (Some(status), _) => format!("HTTP {status} from {}", self.endpoint),
            (None, Some(err)) => format!("{err} ({})", self.endpoint),
            (None, None) => format!("exchange failed ({})", self.endpoint),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeOutcome {
    Success {
        status: u16,
        body: Value,
        endpoint: String,
    },
    Failure(ExchangeFailure),
}

pub struct ExchangeClient {
    endpoints: Vec<String>,
    policy: RetryPolicy,
    transport: Arc<dyn TokenTransport>,
}

impl ExchangeClient {
    /// # Errors
    /// Fails when no endpoint is configured.
    pub fn new(
        endpoints: Vec<String>,
        policy: RetryPolicy,
        transport: Arc<dyn TokenTransport>,
    ) -> Result<Self, ConfigError> {
        if endpoints.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "UPWORK_TOKEN_ENDPOINTS".into(),
                message: "at least one endpoint is required".into(),
            });
        }
        Ok(Self {
            endpoints,
            policy: RetryPolicy {
                max_attempts: policy.max_attempts.max(1),
                ..policy
            },
            transport,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Run one grant against the endpoint list. Never returns an error; every
    /// failure mode is an [`ExchangeOutcome::Failure`].
    pub async fn exchange(&self, credentials: &ClientCredentials, grant: &Grant) -> ExchangeOutcome {
        let form = grant.form();
        let mut last_error: Option<String> = None;

        for endpoint in &self.endpoints {
            for attempt in 1..=self.policy.max_attempts {
                debug!(endpoint = %endpoint, attempt, grant = grant.grant_type(), "token exchange attempt");

                match self.transport.post_form(endpoint, credentials, &form).await {
                    Ok(reply) if reply.is_success() => {
                        return match serde_json::from_str::<Value>(&reply.body) {
                            Ok(body) => {
                                info!(endpoint = %endpoint, attempt, "token exchange succeeded");
                                ExchangeOutcome::Success {
                                    status: reply.status,
                                    body,
                                    endpoint: endpoint.clone(),
                                }
                            }
                            Err(e) => ExchangeOutcome::Failure(ExchangeFailure {
                                status: Some(reply.status),
                                body: Some(reply.body),
                                raw_error: Some(format!("invalid JSON body: {e}")),
                                endpoint: endpoint.clone(),
                            }),
                        };
                    }
                    Ok(reply) => {
                        warn!(endpoint = %endpoint, status = reply.status, "token exchange rejected");
                        return ExchangeOutcome::Failure(ExchangeFailure {
                            status: Some(reply.status),
                            body: Some(reply.body),
                            raw_error: None,
                            endpoint: endpoint.clone(),
                        });
                    }
                    Err(e) => {
                        warn!(endpoint = %endpoint, attempt, error = %e, "token exchange network error");
                        last_error = Some(e.0);
                        if attempt < self.policy.max_attempts {
                            tokio::time::sleep(self.policy.delay_after(attempt)).await;
                        }
                    }
                }
            }
            info!(endpoint = %endpoint, "token endpoint exhausted, trying next");
        }

        ExchangeOutcome::Failure(ExchangeFailure {
            status: None,
            body: None,
            raw_error: last_error,
            endpoint: self.endpoints.last().cloned().unwrap_or_default(),
        })
    }
}
