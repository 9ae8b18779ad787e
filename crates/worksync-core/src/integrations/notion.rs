//! Notion database as the sync destination.
//!
//! Each synced item is one page. The `External ID` rich-text property holds
//! the Upwork identifier and is the only key used to find an existing page.

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Client, Method};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::storage::NotionSettings;
use crate::sync::types::{DestinationRecord, RecordPage, SyncItem};
use crate::sync::upsert::Destination;

const NOTION_VERSION: &str = "2022-06-28";
const SCAN_PAGE_SIZE: u32 = 100;

pub const PROP_NAME: &str = "Name";
pub const PROP_STAGE: &str = "Stage";
pub const PROP_TYPE: &str = "Type";
pub const PROP_EXTERNAL_ID: &str = "External ID";
pub const PROP_CLIENT: &str = "Client";
pub const PROP_VALUE: &str = "Value";
pub const PROP_CURRENCY: &str = "Currency";
pub const PROP_LINK: &str = "Upwork Link";
pub const PROP_CREATED: &str = "Created";
pub const PROP_UPDATED: &str = "Updated";

/// Builder for a Notion `properties` object.
///
/// The `opt_*` methods emit a property only when a value is present, unless
/// the builder was made with [`PageProperties::clearing`], in which case an
/// absent value is sent as the property's empty form. Notion leaves omitted
/// properties untouched on `PATCH`, so updates must clear explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageProperties {
    props: Map<String, Value>,
    clear_absent: bool,
}

impl PageProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clearing() -> Self {
        Self {
            props: Map::new(),
            clear_absent: true,
        }
    }

    fn put(mut self, name: &str, value: Value) -> Self {
        self.props.insert(name.to_string(), value);
        self
    }

    fn absent(self, name: &str, empty: Value) -> Self {
        if self.clear_absent {
            self.put(name, empty)
        } else {
            self
        }
    }

    pub fn title(self, name: &str, content: &str) -> Self {
        self.put(name, json!({ "title": [{ "text": { "content": content } }] }))
    }

    pub fn select(self, name: &str, option: &str) -> Self {
        self.put(name, json!({ "select": { "name": option } }))
    }

    pub fn rich_text(self, name: &str, content: &str) -> Self {
        self.put(name, json!({ "rich_text": [{ "text": { "content": content } }] }))
    }

    pub fn opt_rich_text(self, name: &str, content: Option<&str>) -> Self {
        match content {
            Some(c) => self.rich_text(name, c),
            None => self.absent(name, json!({ "rich_text": [] })),
        }
    }

    pub fn opt_select(self, name: &str, option: Option<&str>) -> Self {
        match option {
            Some(o) => self.select(name, o),
            None => self.absent(name, json!({ "select": null })),
        }
    }

    pub fn opt_number(self, name: &str, value: Option<f64>) -> Self {
        match value {
            Some(v) => self.put(name, json!({ "number": v })),
            None => self.absent(name, json!({ "number": null })),
        }
    }

    pub fn opt_url(self, name: &str, url: Option<&str>) -> Self {
        match url {
            Some(u) => self.put(name, json!({ "url": u })),
            None => self.absent(name, json!({ "url": null })),
        }
    }

    pub fn opt_date(self, name: &str, start: Option<&chrono::DateTime<chrono::Utc>>) -> Self {
        match start {
            Some(s) => self.put(
                name,
                json!({ "date": { "start": s.to_rfc3339_opts(SecondsFormat::AutoSi, true) } }),
            ),
            None => self.absent(name, json!({ "date": null })),
        }
    }

    /// Properties for a new page: required fields plus whatever is present.
    pub fn from_item(item: &SyncItem) -> Self {
        Self::new().tracked(item)
    }

    /// Every tracked property for `item`, absent ones cleared.
    pub fn replacing(item: &SyncItem) -> Self {
        Self::clearing().tracked(item)
    }

    fn tracked(self, item: &SyncItem) -> Self {
        self.title(PROP_NAME, &item.title)
            .select(PROP_STAGE, item.stage.as_str())
            .select(PROP_TYPE, item.item_type.as_str())
            .rich_text(PROP_EXTERNAL_ID, &item.external_id)
            .opt_rich_text(PROP_CLIENT, item.client.as_deref())
            .opt_number(PROP_VALUE, item.value)
            .opt_select(PROP_CURRENCY, item.currency.as_deref())
            .opt_url(PROP_LINK, item.url.as_deref())
            .opt_date(PROP_CREATED, item.created.as_ref())
            .opt_date(PROP_UPDATED, item.updated.as_ref())
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.props.contains_key(name)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.props)
    }
}

/// Plain text of a rich_text property on a page object.
pub fn rich_text_plain(page: &Value, property: &str) -> Option<String> {
    let parts = page
        .get("properties")?
        .get(property)?
        .get("rich_text")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| {
            p.get("plain_text")
                .or_else(|| p.get("text").and_then(|t| t.get("content")))
                .and_then(Value::as_str)
        })
        .collect();
    (!parts.is_empty()).then_some(text)
}

pub struct NotionClient {
    http: Client,
    api_base: String,
    settings: NotionSettings,
}

impl NotionClient {
    pub fn new(http: Client, settings: &NotionSettings) -> Self {
        Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            settings: settings.clone(),
        }
    }

    async fn send(&self, method: Method, path: &str, body: &Value) -> Result<Value> {
        let token = self.settings.require_token()?;
        let url = format!("{}/{}", self.api_base, path);
        debug!(method = %method, url = %url, "notion request");

        let resp = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(CoreError::upstream("notion", status.as_u16(), text));
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn query(&self, body: &Value) -> Result<Value> {
        let path = format!("databases/{}/query", self.settings.require_database_id()?);
        self.send(Method::POST, &path, body).await
    }
}

fn results(resp: &Value) -> &[Value] {
    resp.get("results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn page_id(page: &Value) -> Option<String> {
    page.get("id").and_then(Value::as_str).map(String::from)
}

#[async_trait]
impl Destination for NotionClient {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<String>> {
        let resp = self
            .query(&json!({
                "filter": {
                    "property": PROP_EXTERNAL_ID,
                    "rich_text": { "equals": external_id }
                },
                "page_size": 1
            }))
            .await?;
        Ok(results(&resp).first().and_then(page_id))
    }

    async fn list_records(&self, cursor: Option<&str>) -> Result<RecordPage> {
        let mut body = json!({ "page_size": SCAN_PAGE_SIZE });
        if let Some(c) = cursor {
            body["start_cursor"] = json!(c);
        }
        let resp = self.query(&body).await?;

        let records = results(&resp)
            .iter()
            .filter_map(|page| {
                Some(DestinationRecord {
                    id: page_id(page)?,
                    external_id: rich_text_plain(page, PROP_EXTERNAL_ID),
                })
            })
            .collect();
        let has_more = resp.get("has_more").and_then(Value::as_bool).unwrap_or(false);
        let next_cursor = if has_more {
            resp.get("next_cursor")
                .and_then(Value::as_str)
                .map(String::from)
        } else {
            None
        };
        Ok(RecordPage {
            records,
            next_cursor,
        })
    }

    async fn update_record(&self, record_id: &str, item: &SyncItem) -> Result<()> {
        let body = json!({ "properties": PageProperties::replacing(item).into_value() });
        self.send(Method::PATCH, &format!("pages/{record_id}"), &body)
            .await?;
        Ok(())
    }

    async fn create_record(&self, item: &SyncItem) -> Result<String> {
        let body = json!({
            "parent": { "database_id": self.settings.require_database_id()? },
            "properties": PageProperties::from_item(item).into_value()
        });
        let resp = self.send(Method::POST, "pages", &body).await?;
        page_id(&resp).ok_or_else(|| {
            crate::error::ValidationError::MissingField("id".into()).into()
        })
    }
}
