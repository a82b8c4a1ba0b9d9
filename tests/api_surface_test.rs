// ABOUTME: Integration tests for the assembled API surface
// ABOUTME: Covers the SSE stream endpoint, search, documents, cache, logs, and rate limiting
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;
mod helpers;

use common::create_test_resources;
use helpers::axum_test::AxumTestRequest;
use openrouter_console::models::{MessageRole, SessionType};
use openrouter_console::server::create_router;

use axum::http::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_health_endpoint() {
    let (resources, _storage) = create_test_resources().await;
    let router = create_router(resources);

    let response = AxumTestRequest::get("/api/health").send(router).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["ok"], true);
    assert!(response.header("X-RateLimit-Limit").is_some());
}

#[tokio::test]
async fn test_stream_without_credential_yields_sse_error_event() {
    let (resources, _storage) = create_test_resources().await;
    let router = create_router(resources);

    let response = AxumTestRequest::get(
        "/api/stream?session_id=any&model_id=gpt-x",
    )
    .send(router)
    .await;

    // EventSource clients cannot observe non-2xx; the channel must open
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response
        .header("content-type")
        .unwrap()
        .starts_with("text/event-stream"));

    let body = response.text();
    assert!(body.contains("event: error"));
    assert!(body.contains("\"status\":400"));
    assert!(body.contains("OPENROUTER_API_KEY"));
    assert!(body.contains("request_id"));
}

#[tokio::test]
async fn test_stream_rejects_out_of_range_temperature_in_band() {
    let (resources, _storage) = common::create_test_resources_with_key(Some("k")).await;
    let router = create_router(resources);

    let response = AxumTestRequest::get(
        "/api/stream?session_id=any&model_id=gpt-x&temperature=3.0",
    )
    .send(router)
    .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.text();
    assert!(body.contains("event: error"));
    assert!(body.contains("temperature"));
}

#[tokio::test]
async fn test_search_endpoint() {
    let (resources, _storage) = create_test_resources().await;
    let session = resources
        .database
        .create_session(SessionType::Chat, None, None)
        .await
        .unwrap();
    resources
        .database
        .add_message(&session.id, MessageRole::User, "API timeout error in prod")
        .await
        .unwrap();

    let router = create_router(resources);

    let response = AxumTestRequest::get("/api/search?q=timeout").send(router.clone()).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["total"], 1);
    assert!(body["results"][0]["snippet"]
        .as_str()
        .unwrap()
        .contains("<b>timeout</b>"));

    let response = AxumTestRequest::get("/api/search?q=").send(router).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_document_upload_list_delete() {
    let (resources, _storage) = create_test_resources().await;
    let router = create_router(resources);

    let response = AxumTestRequest::post("/api/documents/upload")
        .multipart_file("file", "notes.md", b"# Heading\nSome notes about errors.")
        .send(router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["name"], "notes.md");

    // Same name uploads get uniquified, not overwritten
    let response = AxumTestRequest::post("/api/documents/upload")
        .multipart_file("file", "notes.md", b"different content")
        .send(router.clone())
        .await;
    let second: Value = response.json();
    assert_eq!(second["name"], "notes_1.md");

    let response = AxumTestRequest::get("/api/documents").send(router.clone()).await;
    let listing: Value = response.json();
    assert_eq!(listing.as_array().unwrap().len(), 2);

    let response = AxumTestRequest::delete("/api/documents/notes.md")
        .send(router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    // Path traversal is not a way to reach files outside the uploads dir
    let response = AxumTestRequest::delete("/api/documents/..%2Fconsole.db")
        .send(router)
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_document_upload_rejects_bad_type_and_missing_file() {
    let (resources, _storage) = create_test_resources().await;
    let router = create_router(resources);

    let response = AxumTestRequest::post("/api/documents/upload")
        .multipart_file("file", "binary.exe", b"MZ...")
        .send(router.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = AxumTestRequest::post("/api/documents/missing.txt/qa")
        .json(&json!({ "question": "What?", "model_id": "gpt-x" }))
        .send(router)
        .await;
    // Q&A is an SSE endpoint, so the missing document surfaces in-band
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("event: error"));
}

#[tokio::test]
async fn test_cache_stats_and_clear() {
    let (resources, _storage) = create_test_resources().await;
    let router = create_router(resources);

    let response = AxumTestRequest::get("/api/cache/stats").send(router.clone()).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let names: Vec<&str> = body["caches"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["profiles", "models"]);

    let response = AxumTestRequest::post("/api/cache/clear").send(router).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["cleared"], json!(["profiles", "models"]));
}

#[tokio::test]
async fn test_frontend_log_sink() {
    let (resources, _storage) = create_test_resources().await;
    let router = create_router(resources);

    let response = AxumTestRequest::post("/api/logs")
        .json(&json!({
            "logs": [
                { "level": "info", "message": "page loaded", "context": { "route": "/chat" } },
                { "level": "error", "message": "fetch failed" }
            ]
        }))
        .send(router)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["received"], 2);
}

#[tokio::test]
async fn test_backup_requires_file_backed_database() {
    let (resources, _storage) = create_test_resources().await;
    let router = create_router(resources);

    let response = AxumTestRequest::get("/api/admin/backup").send(router).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_restore_rejects_non_sqlite_payload() {
    let (resources, _storage) = create_test_resources().await;
    let router = create_router(resources);

    let response = AxumTestRequest::post("/api/admin/restore")
        .multipart_file("file", "fake.db", b"this is not a database")
        .send(router)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_model_sync_rate_limit_window() {
    let (resources, _storage) = create_test_resources().await;
    let router = create_router(resources);

    // The sync preset allows 5 requests per hour; each fails fast on the
    // missing credential but still counts against the window
    for _ in 0..5 {
        let response = AxumTestRequest::post("/api/models/sync")
            .send(router.clone())
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    let response = AxumTestRequest::post("/api/models/sync").send(router).await;
    assert_eq!(response.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.header("Retry-After").is_some());
}
