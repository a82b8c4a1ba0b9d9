// ABOUTME: Delta parser for heterogeneous streamed completion chunks
// ABOUTME: Interprets one raw line into token text, raw passthrough, or the done sentinel
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Delta Parser
//!
//! Interprets one raw upstream line at a time. A line yields exactly one of:
//! blank (skip), the `[DONE]` sentinel, displayable token text, or a raw
//! passthrough of the original line. Parse anomalies never propagate as
//! errors; an unrecognized line degrades to raw forwarding so nothing is
//! ever silently dropped from the client's view.
//!
//! Usage extraction is independent of content extraction: any chunk that
//! carries a usage object updates the parser's running counters, whether or
//! not it also carried text.

use serde::Serialize;
use serde_json::Value;

/// Outcome of parsing one raw line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Blank line; the orchestrator emits nothing for it
    Blank,
    /// `[DONE]` sentinel; the orchestrator must stop consuming immediately
    Done,
    /// Displayable content text extracted from the chunk's delta
    Text(String),
    /// Tool-call argument text, used only when the delta carried no content
    ToolText(String),
    /// No displayable token could be extracted; forward the original line
    Raw(String),
}

/// Running usage counters, merged across chunks
///
/// A later chunk with only partial usage fields never erases previously
/// seen counts: each field takes the new value only when present and
/// non-zero. The total falls back to prompt + completion when the provider
/// does not send an explicit figure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageCounters {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl UsageCounters {
    fn merge(&mut self, usage: &Value) {
        self.prompt_tokens = field_or(usage, "prompt_tokens", self.prompt_tokens);
        self.completion_tokens = field_or(usage, "completion_tokens", self.completion_tokens);

        let explicit_total = field_or(usage, "total_tokens", 0);
        self.total_tokens = if explicit_total > 0 {
            explicit_total
        } else {
            self.prompt_tokens + self.completion_tokens
        };
    }
}

/// Snapshot-merge helper: take the new value when present and non-zero
fn field_or(usage: &Value, field: &str, prior: u32) -> u32 {
    match usage.get(field).and_then(Value::as_u64) {
        Some(v) if v > 0 => u32::try_from(v).unwrap_or(u32::MAX),
        _ => prior,
    }
}

/// Stateful parser for one stream's chunk sequence
#[derive(Debug, Default)]
pub struct DeltaParser {
    usage: UsageCounters,
}

impl DeltaParser {
    /// Create a parser with zeroed usage counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Final usage snapshot observed so far
    #[must_use]
    pub const fn usage(&self) -> UsageCounters {
        self.usage
    }

    /// Interpret one raw line
    pub fn parse_line(&mut self, line: &str) -> LineEvent {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return LineEvent::Blank;
        }

        let chunk = trimmed
            .strip_prefix("data: ")
            .map_or(trimmed, str::trim);

        if chunk == "[DONE]" {
            return LineEvent::Done;
        }

        let Ok(object) = serde_json::from_str::<Value>(chunk) else {
            return LineEvent::Raw(line.to_owned());
        };
        if !object.is_object() {
            return LineEvent::Raw(line.to_owned());
        }

        let first_choice = object
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first());
        let delta = first_choice.and_then(|choice| choice.get("delta"));

        // Usage may arrive at the top level, nested under the delta, or on
        // the first choice; merging is independent of content routing
        let usage = object
            .get("usage")
            .or_else(|| delta.and_then(|d| d.get("usage")))
            .or_else(|| first_choice.and_then(|choice| choice.get("usage")));
        if let Some(usage @ Value::Object(_)) = usage {
            self.usage.merge(usage);
        }

        let content_text = delta.map_or_else(String::new, extract_content);
        if !content_text.is_empty() {
            return LineEvent::Text(content_text);
        }

        // Tool-call fallback, only when content yielded nothing
        let tool_text = delta.map_or_else(String::new, extract_tool_text);
        if !tool_text.is_empty() {
            return LineEvent::ToolText(tool_text);
        }

        LineEvent::Raw(line.to_owned())
    }
}

/// Resolve the delta's `content` field, which may be a plain string or a
/// list of heterogeneous items (strings, or objects exposing a `text` or
/// `content` string field); fragments concatenate in order
fn extract_content(delta: &Value) -> String {
    match delta.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => {
            let mut parts = String::new();
            for item in items {
                match item {
                    Value::String(s) => parts.push_str(s),
                    Value::Object(_) => {
                        if let Some(text) = item
                            .get("text")
                            .or_else(|| item.get("content"))
                            .and_then(Value::as_str)
                        {
                            parts.push_str(text);
                        }
                    }
                    _ => {}
                }
            }
            parts
        }
        _ => String::new(),
    }
}

/// Concatenate tool-call argument fragments: the `arguments` string nested
/// under a `function` object and/or a direct `text` field per element
fn extract_tool_text(delta: &Value) -> String {
    let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) else {
        return String::new();
    };

    let mut parts = String::new();
    for call in calls {
        if !call.is_object() {
            continue;
        }
        if let Some(arguments) = call
            .get("function")
            .and_then(|f| f.get("arguments"))
            .and_then(Value::as_str)
        {
            parts.push_str(arguments);
        }
        if let Some(text) = call.get("text").and_then(Value::as_str) {
            parts.push_str(text);
        }
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_content_delta() {
        let mut parser = DeltaParser::new();
        let event =
            parser.parse_line(r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#);
        assert_eq!(event, LineEvent::Text("Hello".into()));
    }

    #[test]
    fn test_blank_line_is_skipped() {
        let mut parser = DeltaParser::new();
        assert_eq!(parser.parse_line(""), LineEvent::Blank);
        assert_eq!(parser.parse_line("   "), LineEvent::Blank);
    }

    #[test]
    fn test_done_sentinel() {
        let mut parser = DeltaParser::new();
        assert_eq!(parser.parse_line("data: [DONE]"), LineEvent::Done);
        assert_eq!(parser.parse_line("[DONE]"), LineEvent::Done);
    }

    #[test]
    fn test_unparseable_line_forwards_original() {
        let mut parser = DeltaParser::new();
        let line = "data: : not json at all";
        assert_eq!(parser.parse_line(line), LineEvent::Raw(line.to_owned()));
    }

    #[test]
    fn test_non_object_json_is_raw() {
        let mut parser = DeltaParser::new();
        let line = "data: [1, 2, 3]";
        assert_eq!(parser.parse_line(line), LineEvent::Raw(line.to_owned()));
    }

    #[test]
    fn test_part_list_content_concatenates_in_order() {
        let mut parser = DeltaParser::new();
        let line = r#"{"choices":[{"delta":{"content":["Hel",{"text":"lo "},{"content":"world"},42]}}]}"#;
        assert_eq!(parser.parse_line(line), LineEvent::Text("Hello world".into()));
    }

    #[test]
    fn test_tool_call_fallback_only_without_content() {
        let mut parser = DeltaParser::new();
        let line = r#"{"choices":[{"delta":{"tool_calls":[{"function":{"arguments":"{\"q\":"}},{"text":"1}"}]}}]}"#;
        assert_eq!(parser.parse_line(line), LineEvent::ToolText("{\"q\":1}".into()));

        // Content wins over tool fragments when both are present
        let line = r#"{"choices":[{"delta":{"content":"visible","tool_calls":[{"text":"hidden"}]}}]}"#;
        assert_eq!(parser.parse_line(line), LineEvent::Text("visible".into()));
    }

    #[test]
    fn test_usage_only_chunk_is_raw_but_merges_counters() {
        let mut parser = DeltaParser::new();
        let line = r#"{"usage":{"prompt_tokens":10}}"#;
        assert_eq!(parser.parse_line(line), LineEvent::Raw(line.to_owned()));
        assert_eq!(parser.usage().prompt_tokens, 10);
        assert_eq!(parser.usage().total_tokens, 10);
    }

    #[test]
    fn test_partial_usage_chunks_merge() {
        let mut parser = DeltaParser::new();
        parser.parse_line(r#"{"usage":{"prompt_tokens":10}}"#);
        parser.parse_line(r#"{"usage":{"completion_tokens":5}}"#);

        let usage = parser.usage();
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 5);
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn test_usage_never_regresses_to_zero() {
        let mut parser = DeltaParser::new();
        parser.parse_line(r#"{"usage":{"prompt_tokens":10,"completion_tokens":4}}"#);
        parser.parse_line(r#"{"usage":{"prompt_tokens":0,"completion_tokens":0}}"#);

        let usage = parser.usage();
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 4);
    }

    #[test]
    fn test_usage_nested_under_delta_or_choice() {
        let mut parser = DeltaParser::new();
        parser.parse_line(r#"{"choices":[{"delta":{"usage":{"prompt_tokens":7}}}]}"#);
        assert_eq!(parser.usage().prompt_tokens, 7);

        let mut parser = DeltaParser::new();
        parser.parse_line(r#"{"choices":[{"delta":{},"usage":{"completion_tokens":3}}]}"#);
        assert_eq!(parser.usage().completion_tokens, 3);
    }

    #[test]
    fn test_explicit_total_preferred() {
        let mut parser = DeltaParser::new();
        parser.parse_line(r#"{"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":20}}"#);
        assert_eq!(parser.usage().total_tokens, 20);
    }

    #[test]
    fn test_usage_and_content_in_same_chunk_both_processed() {
        let mut parser = DeltaParser::new();
        let event = parser.parse_line(
            r#"{"choices":[{"delta":{"content":"hi"}}],"usage":{"prompt_tokens":2,"completion_tokens":1}}"#,
        );
        assert_eq!(event, LineEvent::Text("hi".into()));
        assert_eq!(parser.usage().total_tokens, 3);
    }

    #[test]
    fn test_chunk_without_usage_leaves_counters_unchanged() {
        let mut parser = DeltaParser::new();
        parser.parse_line(r#"{"usage":{"prompt_tokens":9,"completion_tokens":2}}"#);
        parser.parse_line(r#"{"choices":[{"delta":{"content":"more"}}]}"#);

        let usage = parser.usage();
        assert_eq!(usage.prompt_tokens, 9);
        assert_eq!(usage.completion_tokens, 2);
    }
}
