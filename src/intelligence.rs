// ABOUTME: Intelligence module re-exports from the sleepsense-intelligence crate
// ABOUTME: Signal primitives, heart rate analysis, state machine, and profile optimizer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

//! # Intelligence Module
//!
//! Pure algorithms re-exported from `sleepsense-intelligence`. The service
//! modules decide when each one runs.

pub use sleepsense_intelligence::*;

// Re-export submodules for path-based access (e.g., crate::intelligence::statistics::median)
pub use sleepsense_intelligence::{
    adaptive_threshold, anomaly_tracker, confirmation_window, heart_rate_analyzer,
    profile_optimizer, sliding_window, state_machine, statistics,
};
