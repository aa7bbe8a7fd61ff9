// ABOUTME: Error types re-exported from sleepsense-core
// ABOUTME: Keeps crate::errors paths stable for services, binaries, and tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

//! # Error Handling
//!
//! One [`AppError`] type with an [`ErrorCode`] taxonomy. Insufficient data and
//! concurrent optimization attempts are deferrable outcomes; persistence
//! failures abort the operation without mutating the stored profile.

pub use sleepsense_core::errors::*;
