//! Core error types for worksync-core.
//!
//! Every layer returns one of the sub-enums below; [`CoreError`] gathers them
//! so the inbound command surface can turn any failure into a status code and
//! a short machine-readable error string.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for worksync-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// OAuth-related errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The source or destination platform answered with a non-success status.
    #[error("{service} returned HTTP {status}: {body}")]
    Upstream {
        service: String,
        status: u16,
        body: String,
    },

    /// Transport failure talking to the source or destination platform.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Build an upstream error from a service name, status and raw body.
    pub fn upstream(service: &str, status: u16, body: impl Into<String>) -> Self {
        CoreError::Upstream {
            service: service.to_string(),
            status,
            body: body.into(),
        }
    }

    /// HTTP-style status used when this error reaches a caller.
    pub fn http_status(&self) -> u16 {
        match self {
            CoreError::Config(_) | CoreError::Database(_) | CoreError::Io(_) => 500,
            CoreError::Auth(AuthError::AuthorizationDenied(_)) => 400,
            CoreError::Auth(_) => 401,
            CoreError::Validation(ValidationError::MissingParameter(_)) => 400,
            CoreError::Validation(_) => 422,
            CoreError::Upstream { status, .. } if *status >= 400 => *status,
            CoreError::Upstream { .. } | CoreError::Network(_) | CoreError::Json(_) => 502,
        }
    }

    /// Short machine-readable code, stable across message wording changes.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "configuration_error",
            CoreError::Auth(AuthError::NotAuthenticated) => "no_token",
            CoreError::Auth(_) => "authentication_error",
            CoreError::Validation(_) => "validation_error",
            CoreError::Upstream { .. } => "upstream_error",
            CoreError::Network(_) => "network_error",
            CoreError::Database(_) | CoreError::Io(_) => "storage_error",
            CoreError::Json(_) => "invalid_json",
        }
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Stored row could not be decoded
    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: String, message: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),
}

/// OAuth-specific errors.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No credential has ever been stored.
    #[error("Not authenticated with Upwork; run the authorization flow first")]
    NotAuthenticated,

    /// The refresh grant was rejected or produced an unusable payload.
    #[error("Token refresh failed: {message}")]
    RefreshFailed {
        status: Option<u16>,
        body: Option<String>,
        message: String,
    },

    /// The authorization server redirected back with an error.
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Required field absent from a payload
    #[error("Missing required field '{0}'")]
    MissingField(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Required caller-supplied parameter absent
    #[error("{0}")]
    MissingParameter(String),
}

impl ValidationError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked
                    || inner.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
