// ABOUTME: Core domain enums shared between the API surface and the database layer
// ABOUTME: Defines the closed session-type and message-role sets from the data model
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Shared domain types.
//!
//! Both enums are closed sets enforced at the database level with CHECK
//! constraints; parsing here is the application-side counterpart.

use serde::{Deserialize, Serialize};

/// Kind of console session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    /// Free-form chat
    #[default]
    Chat,
    /// Code assistant sessions
    Code,
    /// Document Q&A sessions
    Documents,
    /// Ad-hoc playground sessions
    Playground,
}

impl SessionType {
    /// String representation stored in the database
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Code => "code",
            Self::Documents => "documents",
            Self::Playground => "playground",
        }
    }
}

/// Role of a message within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction message
    System,
    /// User input message
    User,
    /// Assistant response message
    Assistant,
    /// Tool output message
    Tool,
}

impl MessageRole {
    /// String representation stored in the database and sent upstream
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}
