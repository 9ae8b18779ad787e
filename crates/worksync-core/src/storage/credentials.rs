//! Singleton credential persistence.
//!
//! Exactly one logical row, keyed [`SINGLETON_ID`], holds the active token
//! pair. `save` replaces every column of that row; there is no merge.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::database::Database;
use crate::error::DatabaseError;

pub const SINGLETON_ID: &str = "singleton";

/// The active OAuth token pair and the instant its access token stops working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Milliseconds since the Unix epoch.
    pub expires_at: i64,
    pub scope: Option<String>,
}

impl Credential {
    /// Milliseconds left before expiry, negative once expired.
    pub fn remaining_ms(&self, now_ms: i64) -> i64 {
        self.expires_at - now_ms
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Replace the singleton row.
    async fn save(&self, credential: &Credential) -> Result<(), DatabaseError>;

    /// Read the singleton row, `None` if no credential was ever issued.
    async fn load(&self) -> Result<Option<Credential>, DatabaseError>;
}

pub struct SqliteCredentialStore {
    db: Arc<Database>,
}

impl SqliteCredentialStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn save(&self, credential: &Credential) -> Result<(), DatabaseError> {
        let conn = self.db.conn()?;
        conn.execute(
            "INSERT INTO oauth_credentials (id, access_token, refresh_token, expires_at, scope, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                access_token  = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at    = excluded.expires_at,
                scope         = excluded.scope,
                updated_at    = excluded.updated_at",
            params![
                SINGLETON_ID,
                credential.access_token,
                credential.refresh_token,
                credential.expires_at,
                credential.scope,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Credential>, DatabaseError> {
        let conn = self.db.conn()?;
        let row = conn
            .query_row(
                "SELECT access_token, refresh_token, expires_at, scope
                 FROM oauth_credentials WHERE id = ?1",
                params![SINGLETON_ID],
                |row| {
                    Ok(Credential {
                        access_token: row.get(0)?,
                        refresh_token: row.get(1)?,
                        expires_at: row.get(2)?,
                        scope: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}
