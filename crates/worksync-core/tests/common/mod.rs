//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use worksync_core::error::Result;
use worksync_core::integrations::exchange::{
    ClientCredentials, TokenTransport, TransportError, TransportReply,
};
use worksync_core::integrations::upwork::SourceFetcher;
use worksync_core::storage::Settings;
use worksync_core::sync::{Destination, RecordPage, SyncItem};

pub const NOW: i64 = 1_700_000_000_000;

/// Settings with a complete Upwork client and Notion destination.
pub fn configured_settings() -> Settings {
    Settings::from_lookup(|key| {
        let value = match key {
            "UPWORK_CLIENT_ID" => "cid",
            "UPWORK_CLIENT_SECRET" => "csecret",
            "UPWORK_REDIRECT_URI" => "http://localhost:8787/callback",
            "UPWORK_SCOPES" => "read   write",
            "UPWORK_TOKEN_ENDPOINTS" => "https://token.test/oauth2/token",
            "NOTION_TOKEN" => "secret_notion",
            "NOTION_DATABASE_ID" => "db1",
            _ => return None,
        };
        Some(value.to_string())
    })
    .unwrap()
}

/// One recorded token endpoint call.
#[derive(Debug, Clone)]
pub struct TokenCall {
    pub endpoint: String,
    pub form: Vec<(&'static str, String)>,
}

/// Replays queued replies; the last one repeats once the queue runs dry.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<std::result::Result<TransportReply, TransportError>>>,
    fallback: std::result::Result<TransportReply, TransportError>,
    pub calls: Mutex<Vec<TokenCall>>,
    count: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(
        replies: Vec<std::result::Result<TransportReply, TransportError>>,
    ) -> Arc<Self> {
        let fallback = replies
            .last()
            .cloned()
            .unwrap_or_else(|| Err(TransportError("no scripted reply".into())));
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
            count: AtomicUsize::new(0),
        })
    }

    pub fn json(status: u16, body: &str) -> Arc<Self> {
        Self::new(vec![Ok(TransportReply {
            status,
            body: body.to_string(),
        })])
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn grant_types(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| {
                c.form
                    .iter()
                    .find(|(k, _)| *k == "grant_type")
                    .map(|(_, v)| v.clone())
            })
            .collect()
    }
}

#[async_trait]
impl TokenTransport for ScriptedTransport {
    async fn post_form(
        &self,
        endpoint: &str,
        _credentials: &ClientCredentials,
        form: &[(&'static str, String)],
    ) -> std::result::Result<TransportReply, TransportError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(TokenCall {
            endpoint: endpoint.to_string(),
            form: form.to_vec(),
        });
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Returns a fixed listing and remembers the bearer token it was given.
pub struct StaticSource {
    pub items: Vec<Value>,
    pub tokens_seen: Mutex<Vec<String>>,
}

impl StaticSource {
    pub fn new(items: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            items,
            tokens_seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SourceFetcher for StaticSource {
    async fn fetch_items(&self, access_token: &str) -> Result<Vec<Value>> {
        self.tokens_seen
            .lock()
            .unwrap()
            .push(access_token.to_string());
        Ok(self.items.clone())
    }
}

/// In-memory destination keyed by record id.
#[derive(Default)]
pub struct MemoryDestination {
    pub records: Mutex<BTreeMap<String, SyncItem>>,
    pub writes: AtomicUsize,
}

impl MemoryDestination {
    pub fn count_with(&self, external_id: &str) -> usize {
        self.records
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.external_id == external_id)
            .count()
    }
}

#[async_trait]
impl Destination for MemoryDestination {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<String>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|(_, i)| i.external_id == external_id)
            .map(|(id, _)| id.clone()))
    }

    async fn list_records(&self, _cursor: Option<&str>) -> Result<RecordPage> {
        Ok(RecordPage::default())
    }

    async fn update_record(&self, record_id: &str, item: &SyncItem) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .insert(record_id.to_string(), item.clone());
        Ok(())
    }

    async fn create_record(&self, item: &SyncItem) -> Result<String> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        let id = format!("page-{:03}", records.len() + 1);
        records.insert(id.clone(), item.clone());
        Ok(id)
    }
}
