// ABOUTME: Shared test helpers and utilities for integration tests
// ABOUTME: Exports synthetic session generation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod synthetic_sessions;
