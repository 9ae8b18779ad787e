//! Runtime settings.
//!
//! Values come from an optional `config.toml` in the data directory and are
//! then overridden by environment variables:
//! - Upwork OAuth client (`UPWORK_CLIENT_ID`, `UPWORK_CLIENT_SECRET`,
//!   `UPWORK_REDIRECT_URI`, `UPWORK_SCOPES`)
//! - Upwork endpoints (`UPWORK_API_BASE`, `UPWORK_GRAPHQL_URL`,
//!   `UPWORK_AUTHORIZE_URL`, `UPWORK_TOKEN_ENDPOINTS`)
//! - Notion destination (`NOTION_TOKEN`, `NOTION_DATABASE_ID`/`NOTION_DB_ID`,
//!   `NOTION_API_BASE`)
//! - Local behaviour (`WORKSYNC_DB_PATH`, `WORKSYNC_RETRY_ATTEMPTS`,
//!   `WORKSYNC_RETRY_BASE_MS`)
//!
//! Loading never fails because a required value is missing. Required values
//! are checked by the accessor methods at the point of use.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;

pub const DEFAULT_API_BASE: &str = "https://www.upwork.com/api/v3";
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.upwork.com/graphql";
pub const DEFAULT_AUTHORIZE_URL: &str =
    "https://www.upwork.com/ab/account-security/oauth2/authorize";
pub const DEFAULT_TOKEN_ENDPOINTS: [&str; 2] = [
    "https://www.upwork.com/api/v3/oauth2/token",
    "https://api.upwork.com/api/v3/oauth2/token",
];
pub const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com/v1";

/// Upwork OAuth and API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpworkSettings {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub scopes: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_token_endpoints")]
    pub token_endpoints: Vec<String>,
    /// Listing fetched by a sync run, relative to `api_base`.
    #[serde(default = "default_listing_path")]
    pub listing_path: String,
}

/// Notion destination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionSettings {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub database_id: Option<String>,
    #[serde(default = "default_notion_api_base")]
    pub api_base: String,
}

/// Token exchange retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,
    #[serde(default = "default_retry_base_ms")]
    pub base_delay_ms: u64,
}

/// All runtime settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub upwork: UpworkSettings,
    #[serde(default)]
    pub notion: NotionSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    /// Overrides the default `worksync.db` location.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.into()
}
fn default_graphql_url() -> String {
    DEFAULT_GRAPHQL_URL.into()
}
fn default_authorize_url() -> String {
    DEFAULT_AUTHORIZE_URL.into()
}
fn default_token_endpoints() -> Vec<String> {
    DEFAULT_TOKEN_ENDPOINTS.iter().map(|s| s.to_string()).collect()
}
fn default_listing_path() -> String {
    "contracts".into()
}
fn default_notion_api_base() -> String {
    DEFAULT_NOTION_API_BASE.into()
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    500
}

impl Default for UpworkSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            scopes: None,
            api_base: default_api_base(),
            graphql_url: default_graphql_url(),
            authorize_url: default_authorize_url(),
            token_endpoints: default_token_endpoints(),
            listing_path: default_listing_path(),
        }
    }
}

impl Default for NotionSettings {
    fn default() -> Self {
        Self {
            token: None,
            database_id: None,
            api_base: default_notion_api_base(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            base_delay_ms: default_retry_base_ms(),
        }
    }
}

/// Treats empty strings the same as unset variables.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
}

impl NotionSettings {
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        require(&self.token, "NOTION_TOKEN")
    }

    pub fn require_database_id(&self) -> Result<&str, ConfigError> {
        require(&self.database_id, "NOTION_DATABASE_ID")
    }
}

impl Settings {
    /// Load `config.toml` (if any) and apply process environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or an
    /// override has an invalid value.
    pub fn load() -> Result<Self, ConfigError> {
        let path = data_dir()
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("~/.config/worksync"),
                message: e.to_string(),
            })?
            .join("config.toml");
        let base = Self::load_file(&path)?;
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Parse a TOML settings file. A missing file yields defaults.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Build settings from defaults plus a variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_overrides(lookup)
    }

    /// Apply overrides from `lookup` on top of `self`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_empty(lookup(key));

        if let Some(v) = get("UPWORK_CLIENT_ID") {
            self.upwork.client_id = Some(v);
        }
        if let Some(v) = get("UPWORK_CLIENT_SECRET") {
            self.upwork.client_secret = Some(v);
        }
        if let Some(v) = get("UPWORK_REDIRECT_URI") {
            self.upwork.redirect_uri = Some(v);
        }
        if let Some(v) = get("UPWORK_SCOPES") {
            self.upwork.scopes = Some(v);
        }
        if let Some(v) = get("UPWORK_API_BASE") {
            self.upwork.api_base = v;
        }
        if let Some(v) = get("UPWORK_GRAPHQL_URL") {
            self.upwork.graphql_url = v;
        }
        if let Some(v) = get("UPWORK_AUTHORIZE_URL") {
            self.upwork.authorize_url = v;
        }
        if let Some(v) = get("UPWORK_LISTING_PATH") {
            self.upwork.listing_path = v;
        }
        if let Some(v) = get("UPWORK_TOKEN_ENDPOINTS") {
            let endpoints: Vec<String> = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if endpoints.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "UPWORK_TOKEN_ENDPOINTS".into(),
                    message: "at least one endpoint is required".into(),
                });
            }
            self.upwork.token_endpoints = endpoints;
        }
        if let Some(v) = get("NOTION_TOKEN") {
            self.notion.token = Some(v);
        }
        if let Some(v) = get("NOTION_DATABASE_ID").or_else(|| get("NOTION_DB_ID")) {
            self.notion.database_id = Some(v);
        }
        if let Some(v) = get("NOTION_API_BASE") {
            self.notion.api_base = v;
        }
        if let Some(v) = get("WORKSYNC_DB_PATH") {
            self.database_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("WORKSYNC_RETRY_ATTEMPTS") {
            self.retry.attempts = parse_number("WORKSYNC_RETRY_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("WORKSYNC_RETRY_BASE_MS") {
            self.retry.base_delay_ms = parse_number("WORKSYNC_RETRY_BASE_MS", &v)?;
        }
        Ok(self)
    }

    pub fn client_id(&self) -> Result<&str, ConfigError> {
        require(&self.upwork.client_id, "UPWORK_CLIENT_ID")
    }

    pub fn client_secret(&self) -> Result<&str, ConfigError> {
        require(&self.upwork.client_secret, "UPWORK_CLIENT_SECRET")
    }

    pub fn redirect_uri(&self) -> Result<&str, ConfigError> {
        require(&self.upwork.redirect_uri, "UPWORK_REDIRECT_URI")
    }

    /// Requested scopes with runs of whitespace collapsed. Empty when unset.
    pub fn scopes(&self) -> String {
        self.upwork
            .scopes
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry.base_delay_ms)
    }

    /// Path of the SQLite database, creating the data directory if needed.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        data_dir()
            .map(|dir| dir.join("worksync.db"))
            .map_err(|e| ConfigError::InvalidValue {
                key: "WORKSYNC_DB_PATH".into(),
                message: e.to_string(),
            })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("cannot parse '{value}' as a number"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_production_hosts() {
        let settings = Settings::default();
        assert_eq!(settings.upwork.token_endpoints.len(), 2);
        assert_eq!(settings.upwork.api_base, DEFAULT_API_BASE);
        assert_eq!(settings.retry.attempts, 3);
        assert_eq!(settings.retry_base_delay(), Duration::from_millis(500));
    }

    #[test]
    fn missing_required_values_fail_at_use() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        match settings.client_id() {
            Err(ConfigError::MissingKey(key)) => assert_eq!(key, "UPWORK_CLIENT_ID"),
            other => panic!("expected MissingKey, got {other:?}"),
        }
        assert!(settings.notion.require_token().is_err());
    }

    #[test]
    fn empty_values_count_as_unset() {
        let settings = Settings::from_lookup(lookup(&[("UPWORK_CLIENT_ID", "  ")])).unwrap();
        assert!(settings.client_id().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let settings = Settings::from_lookup(lookup(&[
            ("UPWORK_CLIENT_ID", "cid"),
            ("NOTION_DB_ID", "db-1"),
            ("UPWORK_TOKEN_ENDPOINTS", "http://a/token, http://b/token"),
            ("WORKSYNC_RETRY_BASE_MS", "25"),
        ]))
        .unwrap();
        assert_eq!(settings.client_id().unwrap(), "cid");
        assert_eq!(settings.notion.require_database_id().unwrap(), "db-1");
        assert_eq!(
            settings.upwork.token_endpoints,
            vec!["http://a/token".to_string(), "http://b/token".to_string()]
        );
        assert_eq!(settings.retry.base_delay_ms, 25);
    }

    #[test]
    fn notion_database_id_prefers_primary_key() {
        let settings = Settings::from_lookup(lookup(&[
            ("NOTION_DATABASE_ID", "primary"),
            ("NOTION_DB_ID", "legacy"),
        ]))
        .unwrap();
        assert_eq!(settings.notion.require_database_id().unwrap(), "primary");
    }

    #[test]
    fn invalid_number_is_rejected() {
        let result = Settings::from_lookup(lookup(&[("WORKSYNC_RETRY_ATTEMPTS", "many")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn scopes_collapse_whitespace() {
        let settings =
            Settings::from_lookup(lookup(&[("UPWORK_SCOPES", "  read\n  write   offline ")]))
                .unwrap();
        assert_eq!(settings.scopes(), "read write offline");
    }

    #[test]
    fn file_settings_parse_and_env_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[upwork]\nclient_id = \"from-file\"\nredirect_uri = \"http://localhost:8787/callback\"\n\n[notion]\ndatabase_id = \"file-db\"\n",
        )
        .unwrap();

        let base = Settings::load_file(&path).unwrap();
        assert_eq!(base.redirect_uri().unwrap(), "http://localhost:8787/callback");

        let merged = base
            .with_overrides(lookup(&[("UPWORK_CLIENT_ID", "from-env")]))
            .unwrap();
        assert_eq!(merged.client_id().unwrap(), "from-env");
        assert_eq!(merged.notion.require_database_id().unwrap(), "file-db");
        assert_eq!(merged.upwork.listing_path, "contracts");
    }

    #[test]
    fn blank_file_values_fail_at_use() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[notion]\ntoken = \"\"\ndatabase_id = \"  \"\n").unwrap();

        let settings = Settings::load_file(&path).unwrap();
        assert!(matches!(
            settings.notion.require_token(),
            Err(ConfigError::MissingKey(key)) if key == "NOTION_TOKEN"
        ));
        assert!(matches!(
            settings.notion.require_database_id(),
            Err(ConfigError::MissingKey(key)) if key == "NOTION_DATABASE_ID"
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_file(&dir.path().join("absent.toml")).unwrap();
        assert!(settings.upwork.client_id.is_none());
    }
}
