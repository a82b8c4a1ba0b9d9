// ABOUTME: Resolution layer for effective model, temperature, token budget, and system prompt
// ABOUTME: Applies request > session > profile > default precedence before any upstream call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Resolution Layer
//!
//! Resolves a streaming request's effective parameters from its explicit
//! values, the stored session, and an optional named profile. All lookups
//! and validation complete here, before the stream's Starting state; a
//! failure in this layer is delivered to the client as an SSE error event
//! by the streaming endpoint, never as a broken connection.

use crate::constants::{defaults, limits};
use crate::errors::{AppError, AppResult};
use crate::llm::ChatMessage;
use crate::models::MessageRole;
use crate::resources::ServerResources;
use serde::Deserialize;

/// Request-level parameters for a stream, all optional except the targets
#[derive(Debug, Clone, Deserialize)]
pub struct StreamParams {
    /// Session whose history feeds the completion
    pub session_id: String,
    /// Requested model: a local catalog id or a raw OpenRouter id
    pub model_id: String,
    /// Explicit temperature override
    pub temperature: Option<f64>,
    /// Explicit max-token override
    pub max_tokens: Option<u32>,
    /// Explicit profile override
    pub profile_id: Option<i64>,
}

/// Fully resolved parameters ready for the upstream transport
#[derive(Debug, Clone)]
pub struct ResolvedStream {
    /// Session id (validated to exist)
    pub session_id: String,
    /// Model string sent upstream, including any preset suffix
    pub upstream_model: String,
    /// Local catalog id recorded on the usage ledger, when known
    pub catalog_model_id: Option<String>,
    /// Effective temperature
    pub temperature: f64,
    /// Effective max-token budget
    pub max_tokens: u32,
    /// Profile in effect, if any
    pub profile_id: Option<i64>,
    /// System prompt (if any) followed by stored session history
    pub messages: Vec<ChatMessage>,
}

/// Resolve a streaming request against stored state
///
/// Precedence, highest wins: explicit request parameter, then the
/// session's stored default, then the profile's stored default, then the
/// system default. The upstream credential is checked first so that
/// misconfiguration surfaces before any database or network work.
///
/// # Errors
///
/// - configuration error when no upstream credential is set
/// - not-found when the session or a referenced profile does not exist
/// - invalid-input when explicit parameters are out of range
pub async fn resolve_stream(
    resources: &ServerResources,
    params: StreamParams,
) -> AppResult<ResolvedStream> {
    if !resources.openrouter.has_credentials() {
        return Err(AppError::config_missing(
            "OPENROUTER_API_KEY is not configured. Set the OPENROUTER_API_KEY environment variable.",
        ));
    }

    validate_bounds(params.temperature, params.max_tokens)?;

    let session = resources
        .database
        .get_session(&params.session_id)
        .await?
        .ok_or_else(|| {
            AppError::not_found("Session").with_resource_id(params.session_id.clone())
        })?;

    // Request profile wins over the session's stored default
    let effective_profile_id = params.profile_id.or(session.profile_id);
    let profile = match effective_profile_id {
        Some(id) => Some(
            resources
                .cached_profile(id)
                .await?
                .ok_or_else(|| AppError::not_found("Profile").with_resource_id(id.to_string()))?,
        ),
        None => None,
    };

    let temperature = params
        .temperature
        .or(profile.as_ref().map(|p| p.temperature))
        .unwrap_or(defaults::TEMPERATURE);
    let max_tokens = params
        .max_tokens
        .or(profile
            .as_ref()
            .and_then(|p| u32::try_from(p.max_tokens).ok()))
        .unwrap_or(defaults::MAX_TOKENS);

    // Map the caller's model id through the catalog: a hit pins the usage
    // record to a stable local id and supplies the upstream identifier
    let catalog_model = resources.database.find_model(&params.model_id).await?;
    let (mut upstream_model, catalog_model_id) = match catalog_model {
        Some(model) => (model.openrouter_id, Some(model.id)),
        None => (params.model_id.clone(), None),
    };

    if let Some(preset) = profile
        .as_ref()
        .and_then(|p| p.openrouter_preset.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        upstream_model = apply_preset(&upstream_model, preset);
    }

    let history = resources.database.list_messages(&params.session_id).await?;
    let mut messages = Vec::with_capacity(history.len() + 1);

    if let Some(prompt) = profile
        .as_ref()
        .and_then(|p| p.system_prompt.as_deref())
        .filter(|p| !p.is_empty())
    {
        messages.push(ChatMessage::system(prompt));
    }

    for record in history {
        let role = match record.role.as_str() {
            "system" => MessageRole::System,
            "assistant" => MessageRole::Assistant,
            "tool" => MessageRole::Tool,
            _ => MessageRole::User,
        };
        messages.push(ChatMessage::new(role, record.content));
    }

    Ok(ResolvedStream {
        session_id: session.id,
        upstream_model,
        catalog_model_id,
        temperature,
        max_tokens,
        profile_id: effective_profile_id,
        messages,
    })
}

/// Append a normalized `@preset/<tag>` suffix unless the model id already
/// embeds a preset marker; tags arriving pre-prefixed are tolerated
fn apply_preset(model: &str, preset: &str) -> String {
    if model.contains("@preset/") {
        return model.to_owned();
    }
    if let Some(tag) = preset.strip_prefix("@preset/") {
        format!("{model}@preset/{tag}")
    } else {
        format!("{model}@preset/{preset}")
    }
}

fn validate_bounds(temperature: Option<f64>, max_tokens: Option<u32>) -> AppResult<()> {
    if let Some(t) = temperature {
        if !(limits::TEMPERATURE_MIN..=limits::TEMPERATURE_MAX).contains(&t) {
            return Err(AppError::invalid_input(format!(
                "temperature must be between {} and {}",
                limits::TEMPERATURE_MIN,
                limits::TEMPERATURE_MAX
            )));
        }
    }
    if let Some(m) = max_tokens {
        if !(limits::MAX_TOKENS_MIN..=limits::MAX_TOKENS_MAX).contains(&m) {
            return Err(AppError::invalid_input(format!(
                "max_tokens must be between {} and {}",
                limits::MAX_TOKENS_MIN,
                limits::MAX_TOKENS_MAX
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_preset_appends_suffix() {
        assert_eq!(apply_preset("gpt-x", "coding"), "gpt-x@preset/coding");
    }

    #[test]
    fn test_apply_preset_tolerates_prefixed_tag() {
        assert_eq!(
            apply_preset("gpt-x", "@preset/coding"),
            "gpt-x@preset/coding"
        );
    }

    #[test]
    fn test_apply_preset_skips_models_with_marker() {
        assert_eq!(
            apply_preset("gpt-x@preset/other", "coding"),
            "gpt-x@preset/other"
        );
    }

    #[test]
    fn test_bounds_validation() {
        assert!(validate_bounds(Some(0.0), Some(1)).is_ok());
        assert!(validate_bounds(Some(2.0), Some(32_768)).is_ok());
        assert!(validate_bounds(Some(2.1), None).is_err());
        assert!(validate_bounds(None, Some(0)).is_err());
        assert!(validate_bounds(None, None).is_ok());
    }
}
