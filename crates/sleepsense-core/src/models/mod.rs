// ABOUTME: Core data models for sleep monitoring and calibration
// ABOUTME: Re-exports samples, profiles, sessions, states, and optimization result types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

//! # Data Models
//!
//! - `Sample`: timestamped heart rate or motion reading from the sensor provider
//! - `UserProfile`: per-user calibration state, bounded by safety ranges
//! - `SleepSession`: one monitoring episode with its heart rate history and feedback
//! - `SleepState`: the four-state sleep classification
//! - `OptimizationResult` / `OptimizationStatus`: outputs of the calibration loop

mod optimization;
mod profile;
mod sample;
mod session;
mod state;

pub use optimization::{
    AdjustmentType, OptimizationResult, OptimizationStatus, ProfileCalibration,
    SleepHeartRateStats,
};
pub use profile::{AgeGroup, UserProfile};
pub use sample::Sample;
pub use session::{SleepFeedback, SleepSession};
pub use state::{SleepState, StateTransition};
