// ABOUTME: Sleep detection and self-calibration algorithms for SleepSense
// ABOUTME: Signal primitives, heart rate analysis, state machine, and profile optimizer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

#![deny(unsafe_code)]

//! # `SleepSense` Intelligence
//!
//! Pure, synchronous algorithms. Nothing in this crate performs I/O or spawns
//! tasks; the service crate decides when each piece runs.
//!
//! Data flow: raw samples feed [`heart_rate_analyzer::HeartRateAnalyzer`] and the
//! motion [`sliding_window::SlidingWindow`] / [`adaptive_threshold::AdaptiveThreshold`]
//! pair; the derived booleans drive [`state_machine::SleepStateMachine`], whose
//! deep sleep gate is [`confirmation_window::ConfirmationWindow`]. Completed
//! sessions go through [`profile_optimizer::ProfileOptimizer`].

/// Generic EMA threshold estimator
pub mod adaptive_threshold;
/// Time-decayed anomaly scoring
pub mod anomaly_tracker;
/// Rolling deep sleep confirmation gate
pub mod confirmation_window;
/// Median smoothing, trend, and delta-HR derivation
pub mod heart_rate_analyzer;
/// Per-user threshold, duration, and resting ratio recalibration
pub mod profile_optimizer;
/// Fixed-duration sample buffer with cached statistics
pub mod sliding_window;
/// Four-state sleep classifier
pub mod state_machine;
/// Shared statistical helpers
pub mod statistics;

pub use adaptive_threshold::{AdaptiveThreshold, AdaptiveThresholdConfig};
pub use anomaly_tracker::{AnomalyClassification, AnomalyDecisionMode, AnomalyTracker};
pub use confirmation_window::{ConfirmationDecision, ConfirmationSample, ConfirmationWindow};
pub use heart_rate_analyzer::{HeartRateAnalyzer, HeartRateAnalyzerConfig, HeartRateSignals};
pub use profile_optimizer::{FeedbackCorrection, ProfileOptimization, ProfileOptimizer};
pub use sliding_window::SlidingWindow;
pub use state_machine::{SleepStateMachine, StateMachineConfig, TickOutcome, TickSignals};
