// ABOUTME: Main library entry point for the SleepSense sleep detection service
// ABOUTME: Live sleep-state monitoring, per-user profile management, and adaptive recalibration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

#![deny(unsafe_code)]

//! # `SleepSense`
//!
//! Classifies a wearer's sleep state from heart rate and motion streams and
//! recalibrates each user's detection parameters from past sessions and
//! explicit feedback.
//!
//! ## Architecture
//!
//! - **Intelligence** (`sleepsense-intelligence`): pure algorithms (signal
//!   windows, heart rate analysis, state machine, profile optimizer)
//! - **Sensors**: heart rate and motion provider traits
//! - **Storage**: profile and session persistence contract
//! - **Profile**: single-writer profile mutation
//! - **Monitoring**: per-session tick pipeline and event streams
//! - **Optimization**: scheduling gate and background recalibration
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sleepsense::config::SleepSenseConfig;
//! use sleepsense::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     let config = SleepSenseConfig::load()?;
//!     println!("evaluation tick every {} ms", config.monitor.tick_interval_ms);
//!     Ok(())
//! }
//! ```

/// Service configuration and environment overrides
pub mod config;

/// Constants re-exported from the core crate
pub mod constants;

/// Error types re-exported from the core crate
pub mod errors;

/// Sleep detection and calibration algorithms
pub mod intelligence;

/// Structured logging setup
pub mod logging;

/// Domain models re-exported from the core crate
pub mod models;

/// Live session monitoring and the timer-driven runner
pub mod monitoring;

/// Optimization scheduling and background recalibration
pub mod optimization;

/// Single-writer profile management
pub mod profile;

/// Heart rate and motion provider abstractions
pub mod sensors;

/// Seeded synthetic nights and session histories
pub mod simulation;

/// Profile and session persistence
pub mod storage;
