// ABOUTME: Sleep monitoring session with append-only heart rate history
// ABOUTME: Tracks the first confirmed sleep time, closing statistics, and user feedback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

use super::sample::Sample;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Post-session label supplied by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SleepFeedback {
    /// Detection matched the user's experience
    Accurate,
    /// Sleep was reported while the user was still awake
    FalsePositive,
    /// The user fell asleep but no sleep was reported
    FalseNegative,
}

impl fmt::Display for SleepFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accurate => "accurate",
            Self::FalsePositive => "falsePositive",
            Self::FalseNegative => "falseNegative",
        })
    }
}

impl FromStr for SleepFeedback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "accurate" => Ok(Self::Accurate),
            "falsepositive" => Ok(Self::FalsePositive),
            "falsenegative" => Ok(Self::FalseNegative),
            other => Err(format!("unknown feedback label '{other}'")),
        }
    }
}

/// One monitoring episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepSession {
    /// Session identifier
    pub id: Uuid,
    /// Owner of the session
    pub user_id: Uuid,
    /// Monitoring start
    pub start_time: DateTime<Utc>,
    /// Monitoring stop, set once at finalization
    pub end_time: Option<DateTime<Utc>>,
    /// Smoothed heart rate samples in arrival order
    pub heart_rate_samples: Vec<Sample>,
    /// First confirmed deep sleep in this session
    pub detected_sleep_time: Option<DateTime<Utc>>,
    /// Mean heart rate, computed at completion
    pub average_heart_rate: Option<f64>,
    /// Lowest heart rate, computed at completion
    pub minimum_heart_rate: Option<f64>,
    /// User label
    pub feedback: Option<SleepFeedback>,
}

impl SleepSession {
    /// Open a session
    #[must_use]
    pub fn new(user_id: Uuid, start_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            start_time,
            end_time: None,
            heart_rate_samples: Vec::new(),
            detected_sleep_time: None,
            average_heart_rate: None,
            minimum_heart_rate: None,
            feedback: None,
        }
    }

    /// Whether the session has been finalized
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }

    /// Append a heart rate sample; ignored after finalization
    pub fn append_sample(&mut self, sample: Sample) {
        if !self.is_complete() {
            self.heart_rate_samples.push(sample);
        }
    }

    /// Record the confirmed sleep time. Returns `false` when one is already recorded.
    pub fn mark_sleep_detected(&mut self, at: DateTime<Utc>) -> bool {
        if self.detected_sleep_time.is_some() {
            return false;
        }
        self.detected_sleep_time = Some(at);
        true
    }

    /// Close the session and compute its statistics; later calls are no-ops
    pub fn finalize(&mut self, end_time: DateTime<Utc>) {
        if self.is_complete() {
            return;
        }
        self.end_time = Some(end_time);
        let values = self.heart_rate_values();
        if !values.is_empty() {
            #[allow(clippy::cast_precision_loss)] // sample counts stay far below 2^52
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            self.average_heart_rate = Some(mean);
            self.minimum_heart_rate = values.iter().copied().reduce(f64::min);
        }
    }

    /// Valid heart rate values in arrival order
    ///
    /// Non-finite and non-positive readings are skipped, so every statistic
    /// derived from a session stays finite.
    #[must_use]
    pub fn heart_rate_values(&self) -> Vec<f64> {
        self.heart_rate_samples
            .iter()
            .filter(|s| s.is_valid_heart_rate())
            .map(|s| s.value)
            .collect()
    }

    /// Population standard deviation of the session heart rate
    #[must_use]
    pub fn heart_rate_std_dev(&self) -> Option<f64> {
        let values = self.heart_rate_values();
        if values.len() < 2 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(variance.sqrt())
    }

    /// Time from session start to confirmed sleep
    #[must_use]
    pub fn time_to_sleep(&self) -> Option<Duration> {
        self.detected_sleep_time.map(|at| at - self.start_time)
    }
}
