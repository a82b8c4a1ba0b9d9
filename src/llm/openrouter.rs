// ABOUTME: OpenRouter HTTP client for model listing and streaming chat completions
// ABOUTME: Translates non-2xx responses into typed upstream errors before any line is yielded
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # OpenRouter Client
//!
//! Client for the OpenRouter API. Two operations are exposed: a wholesale
//! `/models` listing used by catalog sync, and a chunked streaming POST to
//! `/chat/completions` whose body is surfaced as raw lines.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{raw_line_stream, ChatMessage, LineStream};
use crate::config::environment::OpenRouterConfig;
use crate::errors::{AppError, AppResult};

/// Connect timeout for upstream requests
const CONNECT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Wire Types
// ============================================================================

/// Chat completions request body
#[derive(Debug, Serialize)]
struct CompletionsRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    temperature: f64,
    max_tokens: u32,
}

/// `/models` listing response envelope
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<UpstreamModelEntry>,
}

/// One raw model entry as served by the provider
#[derive(Debug, Deserialize)]
struct UpstreamModelEntry {
    id: Option<String>,
    name: Option<String>,
    context_length: Option<i64>,
    #[serde(default)]
    pricing: Option<UpstreamPricing>,
    #[serde(default)]
    features: Option<Value>,
    #[serde(default)]
    is_reasoning: Option<bool>,
}

/// Prices arrive as decimal strings
#[derive(Debug, Deserialize)]
struct UpstreamPricing {
    prompt: Option<Value>,
    completion: Option<Value>,
}

/// Normalized catalog entry produced by `list_models`
#[derive(Debug, Clone)]
pub struct UpstreamModel {
    pub openrouter_id: String,
    pub name: String,
    pub context_length: Option<i64>,
    pub pricing_prompt: Option<f64>,
    pub pricing_completion: Option<f64>,
    pub is_reasoning: bool,
}

fn price_to_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

// ============================================================================
// Client
// ============================================================================

/// OpenRouter API client
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    config: OpenRouterConfig,
}

impl OpenRouterClient {
    /// Create a new client from upstream configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created
    pub fn new(config: OpenRouterConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Whether an API key is configured
    #[must_use]
    pub const fn has_credentials(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Build the API URL for a given endpoint
    fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint
        )
    }

    /// Resolve the bearer credential, failing before any network attempt
    fn bearer(&self) -> AppResult<&str> {
        self.config.api_key.as_deref().ok_or_else(|| {
            AppError::config_missing(
                "OPENROUTER_API_KEY is not configured. Set the OPENROUTER_API_KEY environment variable.",
            )
        })
    }

    /// Decorate a request with the headers OpenRouter expects
    fn decorate(&self, request: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
        request
            .header("Authorization", format!("Bearer {api_key}"))
            .header("HTTP-Referer", &self.config.http_referer)
            .header("X-Title", &self.config.x_title)
            .header("Content-Type", "application/json")
    }

    /// Fetch the provider's full model listing
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no credential is set, and an
    /// upstream error carrying the provider's status for non-2xx responses
    pub async fn list_models(&self) -> AppResult<Vec<UpstreamModel>> {
        let api_key = self.bearer()?.to_owned();

        info!(endpoint = "/models", "Requesting OpenRouter model listing");
        let request = self
            .decorate(self.client.get(self.api_url("models")), &api_key)
            .timeout(Duration::from_secs(self.config.timeout_secs));

        let response = request.send().await.map_err(map_request_error)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::upstream_unavailable(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(AppError::upstream(
                status.as_u16(),
                format!("OpenRouter /models failed: {body}"),
            ));
        }

        let listing: ModelsResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse /models response: {e}");
            AppError::upstream(status.as_u16(), format!("Unparseable /models response: {e}"))
        })?;

        let models = listing
            .data
            .into_iter()
            .filter_map(|entry| {
                let openrouter_id = entry.id?;
                let is_reasoning = entry
                    .features
                    .as_ref()
                    .and_then(|f| f.get("reasoning"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
                    || entry.is_reasoning.unwrap_or(false);
                Some(UpstreamModel {
                    name: entry.name.unwrap_or_else(|| openrouter_id.clone()),
                    openrouter_id,
                    context_length: entry.context_length,
                    pricing_prompt: entry
                        .pricing
                        .as_ref()
                        .and_then(|p| price_to_f64(p.prompt.as_ref())),
                    pricing_completion: entry
                        .pricing
                        .as_ref()
                        .and_then(|p| price_to_f64(p.completion.as_ref())),
                    is_reasoning,
                })
            })
            .collect();

        Ok(models)
    }

    /// Open one chunked streaming chat completion
    ///
    /// Returns a lazy, single-pass sequence of raw response lines. A
    /// non-success status fails here, before any line is yielded, with the
    /// provider's status code and body text. The returned stream holds the
    /// connection; dropping it releases the upstream socket.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no credential is set, an upstream
    /// error for non-2xx responses, and an unavailability error for
    /// connect-level failures
    pub async fn stream_chat_completions(
        &self,
        model: &str,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: u32,
    ) -> AppResult<LineStream> {
        let api_key = self.bearer()?.to_owned();

        let payload = CompletionsRequest {
            model,
            messages,
            stream: true,
            temperature,
            max_tokens,
        };

        info!(
            endpoint = "/chat/completions",
            model = %model,
            message_count = messages.len(),
            "Streaming chat completions to OpenRouter"
        );

        let request = self
            .decorate(self.client.post(self.api_url("chat/completions")), &api_key)
            .json(&payload);

        let response = request.send().await.map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "OpenRouter stream returned non-2xx");
            return Err(AppError::upstream(
                status.as_u16(),
                format!("OpenRouter stream failed: {body}"),
            ));
        }

        Ok(raw_line_stream(response.bytes_stream()))
    }
}

fn map_request_error(e: reqwest::Error) -> AppError {
    if e.is_connect() || e.is_timeout() {
        AppError::upstream_unavailable(format!("Cannot reach OpenRouter: {e}"))
    } else {
        AppError::upstream_unavailable(format!("Request to OpenRouter failed: {e}"))
    }
}
