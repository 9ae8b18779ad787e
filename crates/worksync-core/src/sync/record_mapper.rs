//! Raw Upwork listing entries to validated [`SyncItem`]s.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::types::{ItemType, Stage, SyncItem};
use crate::error::ValidationError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    #[serde(alias = "external_id")]
    external_id: Option<String>,
    title: Option<String>,
    stage: Option<String>,
    #[serde(rename = "type")]
    item_type: Option<String>,
    client: Option<String>,
    value: Option<f64>,
    currency: Option<String>,
    url: Option<String>,
    created: Option<String>,
    updated: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, ValidationError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ValidationError::MissingField(field.to_string()))
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_stage(raw: &str) -> Result<Stage, ValidationError> {
    match raw {
        "Applied" => Ok(Stage::Applied),
        "Viewed" => Ok(Stage::Viewed),
        "Interview" => Ok(Stage::Interview),
        "Hired" => Ok(Stage::Hired),
        other => Err(ValidationError::invalid(
            "stage",
            format!("unknown stage '{other}'"),
        )),
    }
}

fn parse_type(raw: &str) -> Result<ItemType, ValidationError> {
    match raw {
        "Proposal" => Ok(ItemType::Proposal),
        "Offer" => Ok(ItemType::Offer),
        "Contract" => Ok(ItemType::Contract),
        other => Err(ValidationError::invalid(
            "type",
            format!("unknown type '{other}'"),
        )),
    }
}

fn parse_timestamp(
    raw: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    optional(raw)
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| ValidationError::invalid(field, format!("'{s}' is not RFC 3339: {e}")))
        })
        .transpose()
}

/// Validate and normalize one raw record.
///
/// # Errors
/// A [`ValidationError`] naming the first offending field.
pub fn map_record(raw: &Value) -> Result<SyncItem, ValidationError> {
    if !raw.is_object() {
        return Err(ValidationError::invalid("record", "expected a JSON object"));
    }
    let record: RawRecord = serde_json::from_value(raw.clone())
        .map_err(|e| ValidationError::invalid("record", e.to_string()))?;

    let external_id = required(record.external_id, "externalId")?;
    let title = required(record.title, "title")?;
    let stage = parse_stage(&required(record.stage, "stage")?)?;
    let item_type = parse_type(&required(record.item_type, "type")?)?;

    if let Some(v) = record.value {
        if !v.is_finite() {
            return Err(ValidationError::invalid("value", "must be a finite number"));
        }
    }

    let url = optional(record.url)
        .map(|u| match url::Url::parse(&u) {
            Ok(_) => Ok(u),
            Err(e) => Err(ValidationError::invalid("url", format!("'{u}': {e}"))),
        })
        .transpose()?;

    Ok(SyncItem {
        external_id,
        title,
        stage,
        item_type,
        client: optional(record.client),
        value: record.value,
        currency: optional(record.currency),
        url,
        created: parse_timestamp(record.created, "created")?,
        updated: parse_timestamp(record.updated, "updated")?,
    })
}
