// ABOUTME: Configuration module organization for the console backend
// ABOUTME: Exposes environment-driven server configuration types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Environment-based server configuration
pub mod environment;
