mod config;
pub mod audit;
pub mod credentials;
pub mod database;

pub use audit::{best_effort, AuditLog, SqliteAuditLog};
pub use config::{NotionSettings, RetrySettings, Settings, UpworkSettings};
pub use credentials::{Credential, CredentialStore, SqliteCredentialStore};
pub use database::Database;

use std::path::PathBuf;

/// Returns `~/.config/worksync[-dev]/` based on WORKSYNC_ENV.
///
/// Set WORKSYNC_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("WORKSYNC_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("worksync-dev")
    } else {
        base_dir.join("worksync")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
