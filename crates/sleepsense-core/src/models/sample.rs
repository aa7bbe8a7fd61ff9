// ABOUTME: Timestamped scalar sample produced by the sensor provider
// ABOUTME: Used for heart rate (BPM) and motion intensity (acceleration magnitude)
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable `{timestamp, value}` reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// When the sensor produced the value
    pub timestamp: DateTime<Utc>,
    /// BPM for heart rate, unitless magnitude for motion
    pub value: f64,
}

impl Sample {
    /// Create a new sample
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Finite and positive; anything else is a sensor glitch, not a heart rate
    #[must_use]
    pub fn is_valid_heart_rate(&self) -> bool {
        self.value.is_finite() && self.value > 0.0
    }
}
