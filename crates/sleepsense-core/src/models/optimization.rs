// ABOUTME: Optimization outputs: calibration candidates, results, and observable status
// ABOUTME: Results are derived and reported, never persisted as their own entity
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

use crate::constants::optimizer::NO_CHANGE_EPSILON;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a threshold recalibration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdjustmentType {
    /// Threshold percentage went up
    Increase,
    /// Threshold percentage went down
    Decrease,
    /// Change below reporting precision
    NoChange,
}

impl AdjustmentType {
    /// Classify a threshold change
    #[must_use]
    pub fn between(previous: f64, new: f64) -> Self {
        let delta = new - previous;
        if delta.abs() < NO_CHANGE_EPSILON {
            Self::NoChange
        } else if delta > 0.0 {
            Self::Increase
        } else {
            Self::Decrease
        }
    }
}

impl fmt::Display for AdjustmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Increase => "increase",
            Self::Decrease => "decrease",
            Self::NoChange => "noChange",
        })
    }
}

/// Sleep heart rate statistics collected during an optimizer pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepHeartRateStats {
    /// Mean heart rate across analyzed sessions (BPM)
    pub average: f64,
    /// Lowest heart rate across analyzed sessions (BPM)
    pub minimum: f64,
    /// Population variance across analyzed sessions (BPM^2)
    pub variance: f64,
    /// Analyzed sessions that carried heart rate data
    pub sessions: u32,
}

/// The three calibrated parameters, committed all together or not at all
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileCalibration {
    /// New threshold percentage
    pub threshold_percentage: f64,
    /// New confirmation duration (seconds)
    pub confirmation_duration_seconds: f64,
    /// New resting ratio requirement
    pub resting_ratio_threshold: f64,
    /// Statistics to refresh on the profile, when samples were available
    pub heart_rate_stats: Option<SleepHeartRateStats>,
}

/// Outcome of a successful optimization, reported to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Threshold percentage before the commit
    pub previous_threshold: f64,
    /// Threshold percentage after the commit
    pub new_threshold: f64,
    /// 0.0-1.0 confidence from data volume
    pub confidence_level: f64,
    /// Heart rate samples analyzed
    pub data_points_analyzed: usize,
    /// When the result was produced
    pub timestamp: DateTime<Utc>,
    /// Direction of the threshold change
    pub adjustment_type: AdjustmentType,
}

/// Observable optimization lifecycle
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "camelCase")]
pub enum OptimizationStatus {
    /// Nothing running
    #[default]
    Idle,
    /// Analysis or commit in flight
    Optimizing,
    /// Last run committed
    Optimized(OptimizationResult),
    /// Last run failed with a reason
    Failed(String),
}

impl OptimizationStatus {
    /// Whether an optimization is currently running
    #[must_use]
    pub const fn is_optimizing(&self) -> bool {
        matches!(self, Self::Optimizing)
    }

    /// Whether the status is terminal for the last run
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Optimized(_) | Self::Failed(_))
    }
}

impl fmt::Display for OptimizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Optimizing => f.write_str("optimizing"),
            Self::Optimized(result) => write!(
                f,
                "optimized ({:.3} -> {:.3})",
                result.previous_threshold, result.new_threshold
            ),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}
