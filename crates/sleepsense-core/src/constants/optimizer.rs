// ABOUTME: Profile optimizer weights, candidate rules, and feedback corrections
// ABOUTME: Values applied when recalibrating threshold, duration, and resting ratio
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

/// Weight of the observed minimum heart rate in the threshold candidate
pub const MIN_HR_WEIGHT: f64 = 0.7;
/// Weight of the observed mean heart rate in the threshold candidate
pub const MEAN_HR_WEIGHT: f64 = 0.3;

/// Fraction of the average time-to-sleep used as confirmation duration
pub const DETECTION_TIME_FRACTION: f64 = 0.2;
/// Floor for the duration candidate (seconds)
pub const DURATION_FLOOR_SECS: f64 = 60.0;

/// Session heart rate standard deviation considered stable (BPM)
pub const LOW_VARIANCE_STD_DEV_BPM: f64 = 5.0;
/// Resting ratio step applied from the variance rule
pub const VARIANCE_RATIO_STEP: f64 = 0.03;

/// False positive share above which detection is tightened
pub const FALSE_POSITIVE_SHARE: f64 = 1.0 / 3.0;
/// False negative share above which the resting ratio is relaxed
pub const FALSE_NEGATIVE_RATIO_SHARE: f64 = 1.0 / 3.0;
/// False negative share above which the confirmation duration is shortened
pub const FALSE_NEGATIVE_DURATION_SHARE: f64 = 0.25;
/// Resting ratio step applied from feedback
pub const FEEDBACK_RATIO_STEP: f64 = 0.05;
/// Duration added when false positives dominate (seconds)
pub const FALSE_POSITIVE_DURATION_STEP_SECS: f64 = 45.0;
/// Duration removed when false negatives dominate (seconds)
pub const FALSE_NEGATIVE_DURATION_STEP_SECS: f64 = 30.0;

/// Sessions at which optimization confidence saturates
pub const FULL_CONFIDENCE_SESSIONS: f64 = 14.0;
/// Heart rate samples at which the sample-coverage share of confidence saturates
pub const FULL_CONFIDENCE_SAMPLES: f64 = 600.0;
/// Share of confidence derived from sample coverage
pub const SAMPLE_CONFIDENCE_WEIGHT: f64 = 0.3;

/// Threshold change smaller than this is reported as no change
pub const NO_CHANGE_EPSILON: f64 = 0.001;
