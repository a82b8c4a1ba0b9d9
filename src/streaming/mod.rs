// ABOUTME: Stream orchestrator relaying upstream completion chunks to SSE clients
// ABOUTME: Owns the accumulation state machine and exactly-once persistence on completion
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Stream Orchestrator
//!
//! Composes the upstream transport and the delta parser into the SSE event
//! sequence delivered to the client: one `start` event, a `token` event per
//! non-blank upstream line, and a terminal `done` or `error` event.
//!
//! States run `Starting → Streaming → {Completed | Cancelled | Failed}`:
//!
//! - **Completed** (sentinel seen, or the upstream sequence exhausts):
//!   append the assistant turn when the accumulator is non-empty, write
//!   exactly one usage record (zeros allowed), then emit `done`.
//! - **Cancelled** (client disconnected): the generator future is dropped
//!   at its current suspension point, so the persistence code below the
//!   consume loop never runs; a cancelled stream leaves no partial turn
//!   and no usage record, deliberately.
//! - **Failed** (upstream or internal error): one terminal `error` event
//!   carrying a status code and the request correlation id; nothing is
//!   persisted, since a partial generation is neither billable nor a
//!   finished conversational turn.
//!
//! The generator is deliberately parameterized over the upstream
//! line-stream future so tests can drive it with synthetic sequences.

pub mod delta;
pub mod resolve;

use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::llm::LineStream;
use crate::models::MessageRole;
use delta::{DeltaParser, LineEvent, UsageCounters};
use futures_util::Stream;
use serde_json::{json, Map, Value};
use std::future::Future;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

/// One client-facing SSE event produced by the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEvent {
    /// SSE event name (`start`, `token`, `error`, `done`)
    pub event: &'static str,
    /// JSON body
    pub data: Value,
}

impl RelayEvent {
    /// Convert into an axum SSE event
    #[must_use]
    pub fn into_sse(self) -> axum::response::sse::Event {
        axum::response::sse::Event::default()
            .event(self.event)
            .data(self.data.to_string())
    }
}

/// Correlation and persistence context for one stream invocation
#[derive(Debug, Clone)]
pub struct RelayContext {
    /// Session receiving the assistant turn
    pub session_id: String,
    /// Catalog model recorded on the usage ledger, when known
    pub catalog_model_id: Option<String>,
    /// Profile in effect, recorded on the usage ledger
    pub profile_id: Option<i64>,
    /// Request correlation id carried on error events
    pub request_id: String,
    /// Extra fields echoed on the start and done events (session id,
    /// document id)
    pub extra: Map<String, Value>,
}

/// Build the single-error-event stream used when resolution fails before
/// the stream can start
pub fn error_only_stream(
    error: &AppError,
    request_id: &str,
) -> impl Stream<Item = RelayEvent> + Send {
    let event = error_event(error, request_id);
    futures_util::stream::once(async move { event })
}

/// Relay one upstream completion to the client as an SSE event sequence
///
/// `open` is awaited after the `start` event is emitted; no network call
/// precedes that emission. The upstream connection is released on every
/// exit path when the line stream is dropped.
pub fn relay_stream<F>(
    database: Database,
    context: RelayContext,
    open: F,
) -> impl Stream<Item = RelayEvent> + Send
where
    F: Future<Output = AppResult<LineStream>> + Send + 'static,
{
    async_stream::stream! {
        let mut start_body = json!({ "message": "stream_start" });
        if let Value::Object(ref mut body) = start_body {
            for (key, value) in &context.extra {
                body.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        yield RelayEvent { event: "start", data: start_body };

        let mut lines = match open.await {
            Ok(lines) => lines,
            Err(e) => {
                error!(
                    session_id = %context.session_id,
                    request_id = %context.request_id,
                    status = e.http_status(),
                    "upstream request failed: {e}"
                );
                yield error_event(&e, &context.request_id);
                return;
            }
        };

        let mut parser = DeltaParser::new();
        let mut assistant_accum = String::new();

        loop {
            let Some(item) = lines.next().await else {
                // Upstream exhausted without [DONE]; treated as completion
                break;
            };

            let line = match item {
                Ok(line) => line,
                Err(e) => {
                    error!(
                        session_id = %context.session_id,
                        request_id = %context.request_id,
                        "stream terminated abnormally: {e}"
                    );
                    yield error_event(&e, &context.request_id);
                    return;
                }
            };

            match parser.parse_line(&line) {
                LineEvent::Blank => {}
                LineEvent::Done => break,
                LineEvent::Text(text) | LineEvent::ToolText(text) => {
                    assistant_accum.push_str(&text);
                    yield RelayEvent { event: "token", data: json!({ "token": text }) };
                }
                LineEvent::Raw(raw) => {
                    yield RelayEvent { event: "token", data: json!({ "raw": raw }) };
                }
            }
        }

        // Release the upstream connection before persistence
        drop(lines);

        let usage = parser.usage();
        match persist_completed(&database, &context, &assistant_accum, usage).await {
            Ok(()) => {}
            Err(e) => {
                error!(
                    session_id = %context.session_id,
                    request_id = %context.request_id,
                    "failed to persist completed stream: {e}"
                );
                yield error_event(&e, &context.request_id);
                return;
            }
        }

        info!(
            session_id = %context.session_id,
            request_id = %context.request_id,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "stream completed"
        );

        let mut done_body = json!({
            "message": "stream_end",
            "assistant": assistant_accum,
            "usage": usage,
        });
        if let Value::Object(ref mut body) = done_body {
            for (key, value) in &context.extra {
                body.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        yield RelayEvent { event: "done", data: done_body };
    }
}

/// Completed-state side effects, in order: assistant turn (only when the
/// trimmed accumulator is non-empty), then exactly one usage record
async fn persist_completed(
    database: &Database,
    context: &RelayContext,
    assistant_accum: &str,
    usage: UsageCounters,
) -> AppResult<()> {
    if !assistant_accum.trim().is_empty() {
        database
            .add_message(&context.session_id, MessageRole::Assistant, assistant_accum)
            .await?;
    } else {
        warn!(
            session_id = %context.session_id,
            "stream completed with empty assistant output"
        );
    }

    database
        .insert_usage_log(
            &context.session_id,
            context.catalog_model_id.as_deref(),
            context.profile_id,
            i64::from(usage.prompt_tokens),
            i64::from(usage.completion_tokens),
        )
        .await?;

    Ok(())
}

fn error_event(error: &AppError, request_id: &str) -> RelayEvent {
    RelayEvent {
        event: "error",
        data: json!({
            "status": error.http_status(),
            "message": error.to_string(),
            "request_id": request_id,
        }),
    }
}
