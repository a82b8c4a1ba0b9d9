// ABOUTME: Test helper module organization
// ABOUTME: HTTP request driving utilities for router tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

pub mod axum_test;
