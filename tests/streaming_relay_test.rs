// ABOUTME: Integration tests for the stream orchestrator state machine
// ABOUTME: Drives the relay with synthetic upstream line sequences and checks persistence
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::create_test_database;
use openrouter_console::database::Database;
use openrouter_console::errors::AppError;
use openrouter_console::llm::LineStream;
use openrouter_console::models::SessionType;
use openrouter_console::streaming::{error_only_stream, relay_stream, RelayContext, RelayEvent};

use futures_util::stream;
use serde_json::{Map, Value};
use tokio_stream::StreamExt;

// ============================================================================
// Test Helpers
// ============================================================================

fn line_stream(items: Vec<Result<String, AppError>>) -> LineStream {
    Box::pin(stream::iter(items))
}

fn ok_lines(items: &[&str]) -> LineStream {
    line_stream(items.iter().map(|s| Ok((*s).to_owned())).collect())
}

fn context(session_id: &str) -> RelayContext {
    let mut extra = Map::new();
    extra.insert(
        "session_id".to_owned(),
        Value::String(session_id.to_owned()),
    );
    RelayContext {
        session_id: session_id.to_owned(),
        catalog_model_id: None,
        profile_id: None,
        request_id: "req_test".to_owned(),
        extra,
    }
}

async fn create_session(db: &Database) -> String {
    db.create_session(SessionType::Chat, None, None)
        .await
        .unwrap()
        .id
}

async fn collect_events(
    db: Database,
    ctx: RelayContext,
    lines: LineStream,
) -> Vec<RelayEvent> {
    relay_stream(db, ctx, async move { Ok(lines) })
        .collect()
        .await
}

// ============================================================================
// Event Sequence Tests
// ============================================================================

#[tokio::test]
async fn test_token_event_and_accumulator() {
    let db = create_test_database().await;
    let session_id = create_session(&db).await;

    let events = collect_events(
        db.clone(),
        context(&session_id),
        ok_lines(&[
            r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":" world"}}]}"#,
            "data: [DONE]",
        ]),
    )
    .await;

    assert_eq!(events.len(), 4);
    assert_eq!(events[0].event, "start");
    assert_eq!(events[0].data["message"], "stream_start");
    assert_eq!(events[0].data["session_id"], session_id);
    assert_eq!(events[1].event, "token");
    assert_eq!(events[1].data["token"], "Hello");
    assert_eq!(events[2].data["token"], " world");
    assert_eq!(events[3].event, "done");
    assert_eq!(events[3].data["message"], "stream_end");
    assert_eq!(events[3].data["assistant"], "Hello world");
    assert_eq!(events[3].data["session_id"], session_id);

    let messages = db.list_messages(&session_id).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, "assistant");
    assert_eq!(messages[0].content, "Hello world");
}

#[tokio::test]
async fn test_done_sentinel_stops_consumption() {
    let db = create_test_database().await;
    let session_id = create_session(&db).await;

    // The line after [DONE] must never become an event
    let events = collect_events(
        db,
        context(&session_id),
        ok_lines(&[
            r#"data: {"choices":[{"delta":{"content":"a"}}]}"#,
            "data: [DONE]",
            r#"data: {"choices":[{"delta":{"content":"never"}}]}"#,
        ]),
    )
    .await;

    let tokens: Vec<&RelayEvent> = events.iter().filter(|e| e.event == "token").collect();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].data["token"], "a");
}

#[tokio::test]
async fn test_no_loss_forwarding() {
    let db = create_test_database().await;
    let session_id = create_session(&db).await;

    // Every non-blank line is either token text or raw passthrough
    let garbage = "data: }{ definitely not json";
    let usage_only = r#"{"usage":{"prompt_tokens":3}}"#;
    let events = collect_events(
        db,
        context(&session_id),
        ok_lines(&[
            "",
            garbage,
            usage_only,
            r#"data: {"choices":[{"delta":{"content":"ok"}}]}"#,
            "",
        ]),
    )
    .await;

    let tokens: Vec<&RelayEvent> = events.iter().filter(|e| e.event == "token").collect();
    assert_eq!(tokens.len(), 3, "blank lines must produce no event");
    assert_eq!(tokens[0].data["raw"], garbage);
    assert_eq!(tokens[1].data["raw"], usage_only);
    assert_eq!(tokens[2].data["token"], "ok");
}

#[tokio::test]
async fn test_exhaustion_without_done_completes() {
    let db = create_test_database().await;
    let session_id = create_session(&db).await;

    let events = collect_events(
        db.clone(),
        context(&session_id),
        ok_lines(&[r#"data: {"choices":[{"delta":{"content":"partial"}}]}"#]),
    )
    .await;

    assert_eq!(events.last().unwrap().event, "done");
    assert_eq!(db.list_messages(&session_id).await.unwrap().len(), 1);
    assert_eq!(db.list_usage_by_session(&session_id).await.unwrap().len(), 1);
}

// ============================================================================
// Usage Accounting Tests
// ============================================================================

#[tokio::test]
async fn test_partial_usage_chunks_merge_into_done_event() {
    let db = create_test_database().await;
    let session_id = create_session(&db).await;

    let events = collect_events(
        db.clone(),
        context(&session_id),
        ok_lines(&[
            r#"data: {"usage":{"prompt_tokens":10}}"#,
            r#"data: {"usage":{"completion_tokens":5}}"#,
            "data: [DONE]",
        ]),
    )
    .await;

    let done = events.last().unwrap();
    assert_eq!(done.event, "done");
    assert_eq!(done.data["usage"]["prompt_tokens"], 10);
    assert_eq!(done.data["usage"]["completion_tokens"], 5);
    assert_eq!(done.data["usage"]["total_tokens"], 15);

    let usage = db.list_usage_by_session(&session_id).await.unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].prompt_tokens, 10);
    assert_eq!(usage[0].completion_tokens, 5);
    assert_eq!(usage[0].total_tokens, 15);
}

#[tokio::test]
async fn test_empty_accumulator_still_writes_one_usage_record() {
    let db = create_test_database().await;
    let session_id = create_session(&db).await;

    let events = collect_events(
        db.clone(),
        context(&session_id),
        ok_lines(&[r#"data: {"usage":{"prompt_tokens":7,"completion_tokens":2}}"#, "data: [DONE]"]),
    )
    .await;

    assert_eq!(events.last().unwrap().event, "done");
    // No assistant turn for empty output, but exactly one usage record
    assert!(db.list_messages(&session_id).await.unwrap().is_empty());
    assert_eq!(db.list_usage_by_session(&session_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_usage_record_zeroes_when_none_observed() {
    let db = create_test_database().await;
    let session_id = create_session(&db).await;

    collect_events(
        db.clone(),
        context(&session_id),
        ok_lines(&[r#"data: {"choices":[{"delta":{"content":"hi"}}]}"#, "data: [DONE]"]),
    )
    .await;

    let usage = db.list_usage_by_session(&session_id).await.unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].prompt_tokens, 0);
    assert_eq!(usage[0].completion_tokens, 0);
    assert_eq!(usage[0].total_tokens, 0);
}

// ============================================================================
// Failure Tests
// ============================================================================

#[tokio::test]
async fn test_upstream_429_before_any_chunk() {
    let db = create_test_database().await;
    let session_id = create_session(&db).await;

    let events: Vec<RelayEvent> = relay_stream(db.clone(), context(&session_id), async {
        Err(AppError::upstream(429, "rate limited"))
    })
    .collect()
    .await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event, "start");
    assert_eq!(events[1].event, "error");
    assert_eq!(events[1].data["status"], 429);
    assert_eq!(events[1].data["request_id"], "req_test");
    assert!(events[1].data["message"]
        .as_str()
        .unwrap()
        .contains("rate limited"));

    // Failed streams persist nothing
    assert!(db.list_messages(&session_id).await.unwrap().is_empty());
    assert!(db.list_usage_by_session(&session_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_mid_stream_error_discards_partial_output() {
    let db = create_test_database().await;
    let session_id = create_session(&db).await;

    let events = collect_events(
        db.clone(),
        context(&session_id),
        line_stream(vec![
            Ok(r#"data: {"choices":[{"delta":{"content":"partial"}}]}"#.to_owned()),
            Err(AppError::upstream_unavailable("connection reset")),
        ]),
    )
    .await;

    assert_eq!(events.last().unwrap().event, "error");
    assert!(db.list_messages(&session_id).await.unwrap().is_empty());
    assert!(db.list_usage_by_session(&session_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_error_only_stream_shape() {
    let error = AppError::config_missing("OPENROUTER_API_KEY is not configured");
    let events: Vec<RelayEvent> = error_only_stream(&error, "req_cfg").collect().await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "error");
    assert_eq!(events[0].data["status"], 400);
    assert_eq!(events[0].data["request_id"], "req_cfg");
}

// ============================================================================
// Cancellation Tests
// ============================================================================

#[tokio::test]
async fn test_cancelled_stream_persists_nothing() {
    let db = create_test_database().await;
    let session_id = create_session(&db).await;

    // An upstream that never finishes: one token, then pending forever
    let lines: LineStream = Box::pin(
        stream::iter(vec![Ok(
            r#"data: {"choices":[{"delta":{"content":"partial"}}]}"#.to_owned()
        )])
        .chain(stream::pending()),
    );

    let mut events = Box::pin(relay_stream(db.clone(), context(&session_id), async move {
        Ok(lines)
    }));

    assert_eq!(events.next().await.unwrap().event, "start");
    assert_eq!(events.next().await.unwrap().event, "token");

    // Client disconnect: the generator future is dropped mid-stream
    drop(events);

    assert!(db.list_messages(&session_id).await.unwrap().is_empty());
    assert!(db.list_usage_by_session(&session_id).await.unwrap().is_empty());
}
