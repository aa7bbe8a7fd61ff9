// ABOUTME: Sensor collaborator contracts for heart rate and motion providers
// ABOUTME: The monitor depends only on these traits, never on a concrete device
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

//! Sensor provider abstractions
//!
//! Providers deliver timestamped samples at irregular cadence. A poll that
//! returns no samples is normal and must not be treated as an error.

/// Scripted provider replaying a fixed sample stream
pub mod replay;

pub use replay::ReplaySensor;

use crate::errors::AppResult;
use crate::models::Sample;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Heart rate provider (BPM)
#[async_trait]
pub trait HeartRateService: Send + Sync {
    /// Samples with timestamps strictly after `since`, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached
    async fn poll_heart_rate(&self, since: DateTime<Utc>) -> AppResult<Vec<Sample>>;

    /// The wearer's resting heart rate, when the provider knows it
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached
    async fn resting_heart_rate(&self) -> AppResult<Option<f64>>;
}

/// Motion intensity provider (unitless)
#[async_trait]
pub trait MotionService: Send + Sync {
    /// Samples with timestamps strictly after `since`, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be reached
    async fn poll_motion(&self, since: DateTime<Utc>) -> AppResult<Vec<Sample>>;
}
