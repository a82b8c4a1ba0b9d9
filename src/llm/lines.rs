// ABOUTME: Line re-framing for chunked streaming response bodies
// ABOUTME: Handles partial lines across TCP boundaries and multiple lines per chunk
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Raw Line Buffer
//!
//! TCP does not guarantee alignment between network chunks and line
//! boundaries. This buffer accumulates bytes and emits complete lines only
//! when a terminating `\n` has arrived, solving two correctness issues:
//!
//! 1. **Multiple lines per TCP chunk**: all of them are emitted, not just
//!    the first.
//! 2. **A line split across two TCP chunks**: the partial tail is held
//!    until the rest arrives.
//!
//! Lines are emitted verbatim (minus the line terminator). Empty lines are
//! included; the stream orchestrator is the one that skips them.

use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::unfold;
use futures_util::{Stream, StreamExt};

use super::LineStream;
use crate::errors::AppError;

/// Line-buffering re-framer for chunked byte streams
#[derive(Debug, Default)]
pub struct LineBuffer {
    /// Accumulated bytes not yet terminated by a newline
    buffer: String,
}

impl LineBuffer {
    /// Create a new empty line buffer
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// Feed raw bytes from a TCP chunk, returning any complete lines
    ///
    /// Complete lines (terminated by `\n`) are extracted with their `\r\n`
    /// or `\n` terminator removed. Any trailing partial line remains
    /// buffered for the next `feed()` call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let text = String::from_utf8_lossy(bytes);
        self.buffer.push_str(&text);

        let mut complete = Vec::new();

        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..newline_pos].trim_end_matches('\r').to_owned();
            self.buffer = self.buffer[newline_pos + 1..].to_owned();
            complete.push(line);
        }

        complete
    }

    /// Flush any remaining buffered content as a final line
    ///
    /// Called when the byte stream ends with no trailing newline.
    pub fn flush(&mut self) -> Option<String> {
        let remaining = mem::take(&mut self.buffer);
        if remaining.is_empty() {
            None
        } else {
            Some(remaining.trim_end_matches('\r').to_owned())
        }
    }
}

/// Internal state for the line stream unfold
struct LineStreamState {
    buffer: LineBuffer,
    pending: VecDeque<Result<String, AppError>>,
    stream_ended: bool,
}

/// Wrap a raw byte stream into a stream of complete lines
///
/// Each iteration either drains a pending line or reads the next TCP
/// chunk. A read error ends the stream after surfacing the error item.
pub fn raw_line_stream<S>(byte_stream: S) -> LineStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let state = LineStreamState {
        buffer: LineBuffer::new(),
        pending: VecDeque::new(),
        stream_ended: false,
    };

    let stream = unfold(
        (
            Box::pin(byte_stream)
                as Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
            state,
        ),
        |(mut byte_stream, mut state)| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, (byte_stream, state)));
                }

                if state.stream_ended {
                    return None;
                }

                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        for line in state.buffer.feed(&bytes) {
                            state.pending.push_back(Ok(line));
                        }
                        // Loop to drain pending lines
                    }
                    Some(Err(e)) => {
                        state.stream_ended = true;
                        return Some((
                            Err(AppError::upstream_unavailable(format!(
                                "Stream read error: {e}"
                            ))),
                            (byte_stream, state),
                        ));
                    }
                    None => {
                        state.stream_ended = true;
                        if let Some(line) = state.buffer.flush() {
                            state.pending.push_back(Ok(line));
                        }
                        if let Some(item) = state.pending.pop_front() {
                            return Some((item, (byte_stream, state)));
                        }
                        return None;
                    }
                }
            }
        },
    );

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn test_multiple_lines_per_chunk() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.feed(b"data: one\ndata: two\n\n");
        assert_eq!(lines, vec!["data: one", "data: two", ""]);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.feed(b"data: {\"par").is_empty());
        let lines = buffer.feed(b"tial\":true}\n");
        assert_eq!(lines, vec!["data: {\"partial\":true}"]);
    }

    #[test]
    fn test_crlf_terminators() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.feed(b"data: x\r\ndata: y\r\n");
        assert_eq!(lines, vec!["data: x", "data: y"]);
    }

    #[test]
    fn test_flush_returns_trailing_partial_line() {
        let mut buffer = LineBuffer::new();
        buffer.feed(b"data: [DONE]");
        assert_eq!(buffer.flush().as_deref(), Some("data: [DONE]"));
        assert!(buffer.flush().is_none());
    }

    #[tokio::test]
    async fn test_raw_line_stream_reassembles() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"data: a\nda")),
            Ok(Bytes::from_static(b"ta: b\n")),
            Ok(Bytes::from_static(b"data: c")),
        ];
        let mut lines = raw_line_stream(stream::iter(chunks));

        let mut collected = Vec::new();
        while let Some(item) = lines.next().await {
            collected.push(item.unwrap());
        }
        assert_eq!(collected, vec!["data: a", "data: b", "data: c"]);
    }
}
