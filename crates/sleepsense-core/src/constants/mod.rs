// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Detection timings, calibration bounds, cadences, optimizer weights, scheduling gates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

//! Constants module
//!
//! Constants are grouped by the component that owns them. Age-group specific
//! values live on [`crate::models::AgeGroup`] so the lookup stays exhaustive.

/// Safety bounds that every calibrated profile field must respect
pub mod bounds;
/// Signal derivation and state machine timing constants
pub mod detection;
/// Live monitor cadences
pub mod monitoring;
/// Profile optimizer weights and feedback corrections
pub mod optimizer;
/// Optimization scheduling gates
pub mod scheduling;

/// Service identification for structured logging
pub mod service_names {
    /// Service name used in log output and the CLI
    pub const SLEEPSENSE: &str = "sleepsense";
}
