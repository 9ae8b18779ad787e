//! Upwork REST and GraphQL access with a caller-supplied bearer token.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::{CoreError, Result, ValidationError};
use crate::storage::UpworkSettings;

const USER_AGENT: &str = concat!("worksync/", env!("CARGO_PKG_VERSION"));

/// Retrieves the raw candidate records for one sync run.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch_items(&self, access_token: &str) -> Result<Vec<Value>>;
}

/// Upstream status and body, unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamReply {
    pub status: u16,
    pub url: String,
    pub content_type: String,
    pub body: String,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as JSON when it parses, otherwise as a JSON string.
    pub fn json_or_text(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or_else(|_| Value::String(self.body.clone()))
    }
}

pub struct UpworkClient {
    http: Client,
    api_base: String,
    graphql_url: String,
    listing_path: String,
}

impl UpworkClient {
    pub fn new(http: Client, settings: &UpworkSettings) -> Self {
        Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            graphql_url: settings.graphql_url.clone(),
            listing_path: settings.listing_path.clone(),
        }
    }

    /// Resolve `path` against the API base.
    ///
    /// Absolute URLs are only accepted under the API base so the bearer
    /// token is never sent to another host.
    pub fn resolve(&self, path: &str) -> Result<String, ValidationError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            if path == self.api_base || path.starts_with(&format!("{}/", self.api_base)) {
                return Ok(path.to_string());
            }
            return Err(ValidationError::invalid(
                "path",
                "absolute URLs must point at the Upwork API base",
            ));
        }
        Ok(format!("{}/{}", self.api_base, path.trim_start_matches('/')))
    }

    /// Forward a GET and return the upstream answer verbatim.
    pub async fn get(&self, access_token: &str, path: &str) -> Result<UpstreamReply> {
        let url = self.resolve(path)?;
        debug!(url = %url, "upwork GET");
        let resp = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .send()
            .await?;
        read_reply(resp, url).await
    }

    /// Forward a GraphQL document and return the upstream answer verbatim.
    pub async fn graphql(&self, access_token: &str, query: &str, variables: &Value) -> Result<UpstreamReply> {
        debug!(url = %self.graphql_url, "upwork GraphQL");
        let resp = self
            .http
            .post(&self.graphql_url)
            .bearer_auth(access_token)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .json(&serde_json::json!({ "query": query, "variables": variables }))
            .send()
            .await?;
        read_reply(resp, self.graphql_url.clone()).await
    }
}

async fn read_reply(resp: reqwest::Response, url: String) -> Result<UpstreamReply> {
    let status = resp.status().as_u16();
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = resp.text().await?;
    Ok(UpstreamReply {
        status,
        url,
        content_type,
        body,
    })
}

/// Pull the record array out of a listing payload.
pub fn extract_items(payload: Value) -> Result<Vec<Value>, ValidationError> {
    match payload {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            for key in ["results", "contracts", "items"] {
                match map.remove(key) {
                    Some(Value::Array(items)) => return Ok(items),
                    Some(_) => {
                        return Err(ValidationError::invalid(key, "expected an array"));
                    }
                    None => {}
                }
            }
            Err(ValidationError::invalid(
                "listing",
                "no results, contracts or items array in response",
            ))
        }
        _ => Err(ValidationError::invalid("listing", "expected an object or array")),
    }
}

#[async_trait]
impl SourceFetcher for UpworkClient {
    async fn fetch_items(&self, access_token: &str) -> Result<Vec<Value>> {
        let reply = self.get(access_token, &self.listing_path).await?;
        if !reply.is_success() {
            return Err(CoreError::upstream("upwork", reply.status, reply.body));
        }
        let payload: Value = serde_json::from_str(&reply.body)?;
        let items = extract_items(payload)?;
        debug!(count = items.len(), "fetched upwork listing");
        Ok(items)
    }
}
