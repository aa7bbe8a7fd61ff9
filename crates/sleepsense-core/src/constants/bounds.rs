// ABOUTME: Safety ranges for auto-calibrated user profile parameters
// ABOUTME: Every optimizer output and manual override is clamped into these ranges
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

/// Lowest allowed fraction of resting heart rate for the sleep threshold
pub const THRESHOLD_PERCENTAGE_MIN: f64 = 0.80;
/// Highest allowed fraction of resting heart rate for the sleep threshold
pub const THRESHOLD_PERCENTAGE_MAX: f64 = 0.95;

/// Shortest deep-sleep confirmation window (seconds)
pub const MIN_DURATION_SECONDS_MIN: f64 = 60.0;
/// Longest deep-sleep confirmation window (seconds)
pub const MIN_DURATION_SECONDS_MAX: f64 = 360.0;

/// Lowest required stationary fraction in the confirmation window
pub const RESTING_RATIO_MIN: f64 = 0.5;
/// Highest required stationary fraction in the confirmation window
pub const RESTING_RATIO_MAX: f64 = 0.95;

/// Largest magnitude a user may shift the threshold percentage by
pub const MANUAL_OFFSET_LIMIT: f64 = 0.10;

/// Plausible heart rate range for a resting human (BPM)
pub const RESTING_HEART_RATE_MIN: f64 = 30.0;
/// Upper plausible resting heart rate (BPM)
pub const RESTING_HEART_RATE_MAX: f64 = 120.0;
