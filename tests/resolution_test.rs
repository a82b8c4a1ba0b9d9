// ABOUTME: Integration tests for the resolution layer
// ABOUTME: Covers precedence, preset augmentation, catalog mapping, and failure ordering
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use common::{create_test_resources, create_test_resources_with_key};
use openrouter_console::database::{ModelUpsert, ProfileUpsert};
use openrouter_console::errors::ErrorCode;
use openrouter_console::models::{MessageRole, SessionType};
use openrouter_console::resources::ServerResources;
use openrouter_console::streaming::resolve::{resolve_stream, StreamParams};
use std::sync::Arc;

fn params(session_id: &str, model_id: &str) -> StreamParams {
    StreamParams {
        session_id: session_id.to_owned(),
        model_id: model_id.to_owned(),
        temperature: None,
        max_tokens: None,
        profile_id: None,
    }
}

async fn create_profile(resources: &Arc<ServerResources>, temperature: f64, preset: Option<&str>) -> i64 {
    resources
        .database
        .create_profile(&ProfileUpsert {
            name: "Test".into(),
            system_prompt: Some("You are terse.".into()),
            temperature,
            max_tokens: 4096,
            openrouter_preset: preset.map(ToOwned::to_owned),
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_explicit_temperature_always_wins() {
    let (resources, _storage) = create_test_resources_with_key(Some("test-key")).await;
    let profile_id = create_profile(&resources, 0.9, None).await;
    let session = resources
        .database
        .create_session(SessionType::Chat, None, Some(profile_id))
        .await
        .unwrap();

    let mut request = params(&session.id, "gpt-x");
    request.temperature = Some(1.5);
    let resolved = resolve_stream(&resources, request).await.unwrap();

    assert!((resolved.temperature - 1.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_profile_default_applies_without_explicit_value() {
    let (resources, _storage) = create_test_resources_with_key(Some("test-key")).await;
    let profile_id = create_profile(&resources, 0.9, None).await;
    let session = resources
        .database
        .create_session(SessionType::Chat, None, Some(profile_id))
        .await
        .unwrap();

    let resolved = resolve_stream(&resources, params(&session.id, "gpt-x"))
        .await
        .unwrap();

    assert!((resolved.temperature - 0.9).abs() < f64::EPSILON);
    assert_eq!(resolved.max_tokens, 4096);
}

#[tokio::test]
async fn test_system_defaults_without_profile() {
    let (resources, _storage) = create_test_resources_with_key(Some("test-key")).await;
    let session = resources
        .database
        .create_session(SessionType::Chat, None, None)
        .await
        .unwrap();

    let resolved = resolve_stream(&resources, params(&session.id, "gpt-x"))
        .await
        .unwrap();

    assert!((resolved.temperature - 0.7).abs() < f64::EPSILON);
    assert_eq!(resolved.max_tokens, 2048);
    assert!(resolved.messages.is_empty());
}

#[tokio::test]
async fn test_preset_augments_model_id() {
    let (resources, _storage) = create_test_resources_with_key(Some("test-key")).await;
    let profile_id = create_profile(&resources, 0.7, Some("coding")).await;
    let session = resources
        .database
        .create_session(SessionType::Chat, None, Some(profile_id))
        .await
        .unwrap();

    let resolved = resolve_stream(&resources, params(&session.id, "gpt-x"))
        .await
        .unwrap();

    assert_eq!(resolved.upstream_model, "gpt-x@preset/coding");
}

#[tokio::test]
async fn test_request_profile_overrides_session_profile() {
    let (resources, _storage) = create_test_resources_with_key(Some("test-key")).await;
    let session_profile = create_profile(&resources, 0.2, None).await;
    let request_profile = create_profile(&resources, 1.1, None).await;
    let session = resources
        .database
        .create_session(SessionType::Chat, None, Some(session_profile))
        .await
        .unwrap();

    let mut request = params(&session.id, "gpt-x");
    request.profile_id = Some(request_profile);
    let resolved = resolve_stream(&resources, request).await.unwrap();

    assert!((resolved.temperature - 1.1).abs() < f64::EPSILON);
    assert_eq!(resolved.profile_id, Some(request_profile));
}

#[tokio::test]
async fn test_system_prompt_prepended_ahead_of_history() {
    let (resources, _storage) = create_test_resources_with_key(Some("test-key")).await;
    let profile_id = create_profile(&resources, 0.7, None).await;
    let session = resources
        .database
        .create_session(SessionType::Chat, None, Some(profile_id))
        .await
        .unwrap();
    resources
        .database
        .add_message(&session.id, MessageRole::User, "hello")
        .await
        .unwrap();

    let resolved = resolve_stream(&resources, params(&session.id, "gpt-x"))
        .await
        .unwrap();

    assert_eq!(resolved.messages.len(), 2);
    assert_eq!(resolved.messages[0].role.as_str(), "system");
    assert_eq!(resolved.messages[0].content, "You are terse.");
    assert_eq!(resolved.messages[1].role.as_str(), "user");
}

#[tokio::test]
async fn test_catalog_hit_maps_both_ids() {
    let (resources, _storage) = create_test_resources_with_key(Some("test-key")).await;
    resources
        .database
        .upsert_models(&[ModelUpsert {
            openrouter_id: "openai/gpt-x".into(),
            name: "GPT X".into(),
            context_length: None,
            pricing_prompt: Some(1.0),
            pricing_completion: Some(2.0),
            is_reasoning: false,
        }])
        .await
        .unwrap();
    let catalog = resources
        .database
        .find_model("openai/gpt-x")
        .await
        .unwrap()
        .unwrap();
    let session = resources
        .database
        .create_session(SessionType::Chat, None, None)
        .await
        .unwrap();

    // Resolve by local id
    let resolved = resolve_stream(&resources, params(&session.id, &catalog.id))
        .await
        .unwrap();
    assert_eq!(resolved.upstream_model, "openai/gpt-x");
    assert_eq!(resolved.catalog_model_id.as_deref(), Some(catalog.id.as_str()));

    // An uncataloged id passes through with no catalog reference
    let resolved = resolve_stream(&resources, params(&session.id, "custom/model"))
        .await
        .unwrap();
    assert_eq!(resolved.upstream_model, "custom/model");
    assert!(resolved.catalog_model_id.is_none());
}

#[tokio::test]
async fn test_missing_credential_fails_first() {
    let (resources, _storage) = create_test_resources().await;

    // Even a nonexistent session reports the credential problem first
    let error = resolve_stream(&resources, params("missing", "gpt-x"))
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::ConfigMissing);
}

#[tokio::test]
async fn test_missing_session_and_profile_are_not_found() {
    let (resources, _storage) = create_test_resources_with_key(Some("test-key")).await;

    let error = resolve_stream(&resources, params("missing", "gpt-x"))
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::ResourceNotFound);

    let session = resources
        .database
        .create_session(SessionType::Chat, None, None)
        .await
        .unwrap();
    let mut request = params(&session.id, "gpt-x");
    request.profile_id = Some(4242);
    let error = resolve_stream(&resources, request).await.unwrap_err();
    assert_eq!(error.code, ErrorCode::ResourceNotFound);
}

#[tokio::test]
async fn test_out_of_range_values_rejected() {
    let (resources, _storage) = create_test_resources_with_key(Some("test-key")).await;
    let session = resources
        .database
        .create_session(SessionType::Chat, None, None)
        .await
        .unwrap();

    let mut request = params(&session.id, "gpt-x");
    request.temperature = Some(2.5);
    let error = resolve_stream(&resources, request).await.unwrap_err();
    assert_eq!(error.code, ErrorCode::InvalidInput);

    let mut request = params(&session.id, "gpt-x");
    request.max_tokens = Some(0);
    let error = resolve_stream(&resources, request).await.unwrap_err();
    assert_eq!(error.code, ErrorCode::InvalidInput);
}
