//! Upsert engine against a mock Notion API.

use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;

use worksync_core::integrations::NotionClient;
use worksync_core::storage::NotionSettings;
use worksync_core::sync::{ItemType, Stage, SyncItem, UpsertEngine, UpsertOutcome};

fn engine(server: &mockito::Server) -> UpsertEngine {
    let settings = NotionSettings {
        token: Some("secret_notion".into()),
        database_id: Some("db1".into()),
        api_base: server.url(),
    };
    UpsertEngine::new(Arc::new(NotionClient::new(reqwest::Client::new(), &settings)))
}

fn item(external_id: &str) -> SyncItem {
    let mut item = SyncItem::new(external_id, "Rust contract", Stage::Hired, ItemType::Contract);
    item.value = Some(4200.0);
    item
}

fn page(id: &str, external_id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "properties": { "External ID": { "rich_text": [{ "plain_text": external_id }] } }
    })
}

fn lookup_body(external_id: &str) -> serde_json::Value {
    json!({
        "filter": { "property": "External ID", "rich_text": { "equals": external_id } },
        "page_size": 1
    })
}

#[tokio::test]
async fn lookup_hit_updates_the_existing_page() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/databases/db1/query")
        .match_body(Matcher::Json(lookup_body("ctr-1")))
        .with_status(200)
        .with_body(json!({ "results": [page("page-a", "ctr-1")], "has_more": false }).to_string())
        .create_async()
        .await;
    let patch = server
        .mock("PATCH", "/pages/page-a")
        .match_body(Matcher::PartialJson(json!({
            "properties": { "Value": { "number": 4200.0 }, "Stage": { "select": { "name": "Hired" } } }
        })))
        .with_status(200)
        .with_body(r#"{"id":"page-a"}"#)
        .create_async()
        .await;
    let create = server.mock("POST", "/pages").expect(0).create_async().await;

    let outcome = engine(&server).upsert(&item("ctr-1")).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);
    patch.assert_async().await;
    create.assert_async().await;
}

#[tokio::test]
async fn update_clears_fields_removed_upstream() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/databases/db1/query")
        .match_body(Matcher::Json(lookup_body("ctr-1")))
        .with_status(200)
        .with_body(json!({ "results": [page("page-a", "ctr-1")], "has_more": false }).to_string())
        .create_async()
        .await;
    let patch = server
        .mock("PATCH", "/pages/page-a")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""Client":\{"rich_text":\[\]\}"#.into()),
            Matcher::PartialJson(json!({
                "properties": {
                    "Value": { "number": null },
                    "Currency": { "select": null },
                    "Upwork Link": { "url": null },
                    "Created": { "date": null },
                    "Updated": { "date": null }
                }
            })),
        ]))
        .with_status(200)
        .with_body(r#"{"id":"page-a"}"#)
        .expect(1)
        .create_async()
        .await;

    let bare = SyncItem::new("ctr-1", "T", Stage::Hired, ItemType::Contract);
    let outcome = engine(&server).upsert(&bare).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);
    patch.assert_async().await;
}

#[tokio::test]
async fn lookup_failure_falls_back_to_paginated_scan() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/databases/db1/query")
        .match_body(Matcher::Json(lookup_body("ctr-9")))
        .with_status(400)
        .with_body(r#"{"object":"error","code":"validation_error","message":"Could not find property with name or id: External ID"}"#)
        .create_async()
        .await;
    let first_page = server
        .mock("POST", "/databases/db1/query")
        .match_body(Matcher::Json(json!({ "page_size": 100 })))
        .with_status(200)
        .with_body(
            json!({
                "results": [page("p1", "ctr-1"), page("p2", "ctr-90")],
                "has_more": true,
                "next_cursor": "cur-2"
            })
            .to_string(),
        )
        .create_async()
        .await;
    let second_page = server
        .mock("POST", "/databases/db1/query")
        .match_body(Matcher::Json(json!({ "page_size": 100, "start_cursor": "cur-2" })))
        .with_status(200)
        .with_body(
            json!({ "results": [page("p3", "ctr-9")], "has_more": false, "next_cursor": null })
                .to_string(),
        )
        .create_async()
        .await;
    let patch = server
        .mock("PATCH", "/pages/p3")
        .with_status(200)
        .with_body(r#"{"id":"p3"}"#)
        .create_async()
        .await;
    let create = server.mock("POST", "/pages").expect(0).create_async().await;

    let outcome = engine(&server).upsert(&item("ctr-9")).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);
    first_page.assert_async().await;
    second_page.assert_async().await;
    patch.assert_async().await;
    create.assert_async().await;
}

#[tokio::test]
async fn no_match_anywhere_creates_exactly_once() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/databases/db1/query")
        .match_body(Matcher::Json(lookup_body("new-1")))
        .with_status(400)
        .with_body(r#"{"code":"validation_error"}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/databases/db1/query")
        .match_body(Matcher::Json(json!({ "page_size": 100 })))
        .with_status(200)
        .with_body(json!({ "results": [page("p1", "new-10")], "has_more": false }).to_string())
        .create_async()
        .await;
    let create = server
        .mock("POST", "/pages")
        .match_body(Matcher::PartialJson(json!({
            "parent": { "database_id": "db1" },
            "properties": { "External ID": { "rich_text": [{ "text": { "content": "new-1" } }] } }
        })))
        .with_status(200)
        .with_body(r#"{"id":"created-page"}"#)
        .expect(1)
        .create_async()
        .await;

    let outcome = engine(&server).upsert(&item("new-1")).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Created);
    create.assert_async().await;
}

#[tokio::test]
async fn scan_failure_does_not_create() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/databases/db1/query")
        .with_status(503)
        .with_body("unavailable")
        .create_async()
        .await;
    let create = server.mock("POST", "/pages").expect(0).create_async().await;

    let err = engine(&server).upsert(&item("x")).await.unwrap_err();
    assert_eq!(err.http_status(), 503);
    create.assert_async().await;
}
