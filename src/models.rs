// ABOUTME: Domain models re-exported from sleepsense-core
// ABOUTME: Profiles, sessions, samples, sleep states, and optimization results
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

//! # Data Models
//!
//! - `UserProfile`: per-user calibration, feedback counters, and derived sleep statistics
//! - `SleepSession`: one monitored night, append-only until finalized
//! - `SleepState` / `StateTransition`: classifier output
//! - `OptimizationResult` / `OptimizationStatus`: calibration reporting

pub use sleepsense_core::models::*;
