// ABOUTME: Recalibrates threshold, confirmation duration, and resting ratio from past sessions
// ABOUTME: Statistical candidates plus feedback corrections, clamped to profile safety bounds
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense
#![allow(clippy::cast_precision_loss)] // Safe: session and sample counts are small

//! Profile Optimizer
//!
//! 1. Threshold: `0.7 * min(HR)/RHR + 0.3 * mean(HR)/RHR` over every sample of
//!    every session.
//! 2. Duration: a fifth of the average time to detected sleep, floored at 60 s.
//! 3. Resting ratio: the current ratio relaxed by 0.03 when most sessions show
//!    low heart rate variability, tightened by 0.03 otherwise.
//! 4. Feedback: false positives above a third tighten the ratio and lengthen
//!    the duration. Only when that did not fire, false negatives above a third
//!    relax the ratio and above a quarter shorten the duration.
//! 5. All three candidates are clamped to the profile bounds.
//!
//! The result is a complete [`ProfileCalibration`]; callers commit all of it or
//! none of it.

use crate::statistics::population_variance;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sleepsense_core::constants::bounds::{
    MIN_DURATION_SECONDS_MAX, MIN_DURATION_SECONDS_MIN, RESTING_RATIO_MAX, RESTING_RATIO_MIN,
    THRESHOLD_PERCENTAGE_MAX, THRESHOLD_PERCENTAGE_MIN,
};
use sleepsense_core::constants::optimizer::{
    DETECTION_TIME_FRACTION, DURATION_FLOOR_SECS, FALSE_NEGATIVE_DURATION_SHARE,
    FALSE_NEGATIVE_DURATION_STEP_SECS, FALSE_NEGATIVE_RATIO_SHARE,
    FALSE_POSITIVE_DURATION_STEP_SECS, FALSE_POSITIVE_SHARE, FEEDBACK_RATIO_STEP,
    FULL_CONFIDENCE_SAMPLES, FULL_CONFIDENCE_SESSIONS, LOW_VARIANCE_STD_DEV_BPM, MEAN_HR_WEIGHT,
    MIN_HR_WEIGHT, SAMPLE_CONFIDENCE_WEIGHT, VARIANCE_RATIO_STEP,
};
use sleepsense_core::errors::{AppError, AppResult};
use sleepsense_core::models::{
    AdjustmentType, OptimizationResult, ProfileCalibration, SleepFeedback, SleepHeartRateStats,
    SleepSession, UserProfile,
};
use tracing::debug;

/// Which feedback corrections fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeedbackCorrection {
    /// Sessions carrying a feedback label
    pub labeled_sessions: usize,
    /// Sessions labeled false positive
    pub false_positives: usize,
    /// Sessions labeled false negative
    pub false_negatives: usize,
    /// Ratio tightened and duration lengthened
    pub false_positive_applied: bool,
    /// Ratio relaxed
    pub false_negative_ratio_applied: bool,
    /// Duration shortened
    pub false_negative_duration_applied: bool,
}

/// Calibration plus the intermediate values that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileOptimization {
    /// Clamped calibration to commit
    pub calibration: ProfileCalibration,
    /// Threshold candidate before clamping
    pub threshold_candidate: f64,
    /// Duration candidate before feedback and clamping
    pub duration_candidate: f64,
    /// Resting ratio candidate before feedback and clamping
    pub resting_ratio_candidate: f64,
    /// Feedback corrections applied
    pub feedback: FeedbackCorrection,
    /// Sessions analyzed
    pub sessions_analyzed: usize,
    /// Heart rate samples analyzed
    pub data_points_analyzed: usize,
    /// Confidence in `[0, 1]`
    pub confidence_level: f64,
}

impl ProfileOptimization {
    /// Report for a commit of this calibration over `previous_threshold`
    #[must_use]
    pub fn to_result(&self, previous_threshold: f64, at: DateTime<Utc>) -> OptimizationResult {
        let new_threshold = self.calibration.threshold_percentage;
        OptimizationResult {
            previous_threshold,
            new_threshold,
            confidence_level: self.confidence_level,
            data_points_analyzed: self.data_points_analyzed,
            timestamp: at,
            adjustment_type: AdjustmentType::between(previous_threshold, new_threshold),
        }
    }
}

/// Per-session aggregate computed in parallel, over valid readings only
#[derive(Debug, Clone, Copy)]
struct HeartRateAggregate {
    count: usize,
    contributing_sessions: usize,
    sum: f64,
    minimum: f64,
    low_variance_sessions: usize,
    variance_eligible_sessions: usize,
}

impl HeartRateAggregate {
    const EMPTY: Self = Self {
        count: 0,
        contributing_sessions: 0,
        sum: 0.0,
        minimum: f64::INFINITY,
        low_variance_sessions: 0,
        variance_eligible_sessions: 0,
    };

    fn from_session(session: &SleepSession) -> Self {
        let values = session.heart_rate_values();
        let std_dev = session.heart_rate_std_dev();
        Self {
            count: values.len(),
            contributing_sessions: usize::from(!values.is_empty()),
            sum: values.iter().sum(),
            minimum: values.iter().copied().fold(f64::INFINITY, f64::min),
            low_variance_sessions: usize::from(
                std_dev.is_some_and(|sd| sd < LOW_VARIANCE_STD_DEV_BPM),
            ),
            variance_eligible_sessions: usize::from(std_dev.is_some()),
        }
    }

    fn merge(self, other: Self) -> Self {
        Self {
            count: self.count + other.count,
            contributing_sessions: self.contributing_sessions + other.contributing_sessions,
            sum: self.sum + other.sum,
            minimum: self.minimum.min(other.minimum),
            low_variance_sessions: self.low_variance_sessions + other.low_variance_sessions,
            variance_eligible_sessions: self.variance_eligible_sessions
                + other.variance_eligible_sessions,
        }
    }
}

/// Stateless recalibration pass
pub struct ProfileOptimizer;

impl ProfileOptimizer {
    /// Compute a calibration from `sessions`
    ///
    /// # Errors
    ///
    /// Returns an insufficient-data error when `sessions` is empty and an
    /// invalid-input error when `resting_heart_rate` is not positive.
    pub fn optimize(
        profile: &UserProfile,
        resting_heart_rate: f64,
        sessions: &[SleepSession],
    ) -> AppResult<ProfileOptimization> {
        if sessions.is_empty() {
            return Err(AppError::insufficient_data(1, 0).with_user_id(profile.user_id));
        }
        if !resting_heart_rate.is_finite() || resting_heart_rate <= 0.0 {
            return Err(AppError::invalid_input(format!(
                "resting heart rate must be positive, got {resting_heart_rate}"
            )));
        }

        let aggregate = sessions
            .par_iter()
            .map(HeartRateAggregate::from_session)
            .reduce(|| HeartRateAggregate::EMPTY, HeartRateAggregate::merge);

        let (threshold_candidate, heart_rate_stats) =
            Self::threshold_candidate(profile, resting_heart_rate, sessions, &aggregate);
        let duration_candidate = Self::duration_candidate(profile, sessions);
        let resting_ratio_candidate = Self::resting_ratio_candidate(profile, &aggregate);

        let feedback = Self::feedback_correction(sessions);
        let (duration, resting_ratio) =
            Self::apply_feedback(&feedback, duration_candidate, resting_ratio_candidate);

        let calibration = ProfileCalibration {
            threshold_percentage: threshold_candidate
                .clamp(THRESHOLD_PERCENTAGE_MIN, THRESHOLD_PERCENTAGE_MAX),
            confirmation_duration_seconds: duration
                .clamp(MIN_DURATION_SECONDS_MIN, MIN_DURATION_SECONDS_MAX),
            resting_ratio_threshold: resting_ratio.clamp(RESTING_RATIO_MIN, RESTING_RATIO_MAX),
            heart_rate_stats,
        };

        let confidence_level = Self::confidence(sessions.len(), aggregate.count);
        debug!(
            user_id = %profile.user_id,
            sessions = sessions.len(),
            samples = aggregate.count,
            threshold_candidate,
            duration_candidate,
            resting_ratio_candidate,
            ?feedback,
            "profile optimization pass complete"
        );

        Ok(ProfileOptimization {
            calibration,
            threshold_candidate,
            duration_candidate,
            resting_ratio_candidate,
            feedback,
            sessions_analyzed: sessions.len(),
            data_points_analyzed: aggregate.count,
            confidence_level,
        })
    }

    /// `min(1, sessions/14)` scaled down by up to 30% when samples are scarce
    #[must_use]
    pub fn confidence(sessions: usize, samples: usize) -> f64 {
        let session_factor = (sessions as f64 / FULL_CONFIDENCE_SESSIONS).min(1.0);
        let sample_factor = (samples as f64 / FULL_CONFIDENCE_SAMPLES).min(1.0);
        let sample_weight = 1.0 - SAMPLE_CONFIDENCE_WEIGHT;
        session_factor * SAMPLE_CONFIDENCE_WEIGHT.mul_add(sample_factor, sample_weight)
    }

    fn threshold_candidate(
        profile: &UserProfile,
        resting_heart_rate: f64,
        sessions: &[SleepSession],
        aggregate: &HeartRateAggregate,
    ) -> (f64, Option<SleepHeartRateStats>) {
        if aggregate.count == 0 {
            return (profile.threshold_percentage, None);
        }
        let average = aggregate.sum / aggregate.count as f64;
        let minimum = aggregate.minimum;
        let all_values: Vec<f64> = sessions
            .par_iter()
            .flat_map_iter(SleepSession::heart_rate_values)
            .collect();

        let candidate = MIN_HR_WEIGHT.mul_add(
            minimum / resting_heart_rate,
            MEAN_HR_WEIGHT * (average / resting_heart_rate),
        );
        let stats = SleepHeartRateStats {
            average,
            minimum,
            variance: population_variance(&all_values),
            sessions: u32::try_from(aggregate.contributing_sessions).unwrap_or(u32::MAX),
        };
        (candidate, Some(stats))
    }

    fn duration_candidate(profile: &UserProfile, sessions: &[SleepSession]) -> f64 {
        let detection_times: Vec<f64> = sessions
            .iter()
            .filter_map(SleepSession::time_to_sleep)
            .map(|d| d.num_milliseconds() as f64 / 1000.0)
            .collect();
        if detection_times.is_empty() {
            return profile.min_duration_seconds;
        }
        let average = detection_times.iter().sum::<f64>() / detection_times.len() as f64;
        (DETECTION_TIME_FRACTION * average).max(DURATION_FLOOR_SECS)
    }

    fn resting_ratio_candidate(profile: &UserProfile, aggregate: &HeartRateAggregate) -> f64 {
        let current = profile.resting_ratio_threshold;
        if aggregate.low_variance_sessions * 2 > aggregate.variance_eligible_sessions {
            current - VARIANCE_RATIO_STEP
        } else {
            current + VARIANCE_RATIO_STEP
        }
    }

    fn feedback_correction(sessions: &[SleepSession]) -> FeedbackCorrection {
        let mut correction = FeedbackCorrection::default();
        for feedback in sessions.iter().filter_map(|s| s.feedback) {
            correction.labeled_sessions += 1;
            match feedback {
                SleepFeedback::FalsePositive => correction.false_positives += 1,
                SleepFeedback::FalseNegative => correction.false_negatives += 1,
                SleepFeedback::Accurate => {}
            }
        }
        if correction.labeled_sessions == 0 {
            return correction;
        }

        let labeled = correction.labeled_sessions as f64;
        let fp_share = correction.false_positives as f64 / labeled;
        let fn_share = correction.false_negatives as f64 / labeled;

        correction.false_positive_applied = fp_share > FALSE_POSITIVE_SHARE;
        if !correction.false_positive_applied {
            correction.false_negative_ratio_applied = fn_share > FALSE_NEGATIVE_RATIO_SHARE;
            correction.false_negative_duration_applied = fn_share > FALSE_NEGATIVE_DURATION_SHARE;
        }
        correction
    }

    fn apply_feedback(
        correction: &FeedbackCorrection,
        duration: f64,
        resting_ratio: f64,
    ) -> (f64, f64) {
        let mut duration = duration;
        let mut resting_ratio = resting_ratio;
        if correction.false_positive_applied {
            resting_ratio += FEEDBACK_RATIO_STEP;
            duration += FALSE_POSITIVE_DURATION_STEP_SECS;
        }
        if correction.false_negative_ratio_applied {
            resting_ratio -= FEEDBACK_RATIO_STEP;
        }
        if correction.false_negative_duration_applied {
            duration -= FALSE_NEGATIVE_DURATION_STEP_SECS;
        }
        (duration, resting_ratio)
    }
}
