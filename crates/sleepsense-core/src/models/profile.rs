// ABOUTME: Per-user calibration profile with age-group defaults and safety bounds
// ABOUTME: Mutated only by the optimizer commit path or explicit user settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

use super::optimization::ProfileCalibration;
use super::session::SleepFeedback;
use crate::constants::bounds::{
    MANUAL_OFFSET_LIMIT, MIN_DURATION_SECONDS_MAX, MIN_DURATION_SECONDS_MIN,
    RESTING_RATIO_MAX, RESTING_RATIO_MIN, THRESHOLD_PERCENTAGE_MAX, THRESHOLD_PERCENTAGE_MIN,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Age group of the wearer; fixed at profile creation and drives safe defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeGroup {
    /// 13-19 years
    Teen,
    /// 20-64 years
    Adult,
    /// 65+ years
    Senior,
}

impl AgeGroup {
    /// Default fraction of resting heart rate below which the wearer counts as asleep
    #[must_use]
    pub const fn default_threshold_percentage(self) -> f64 {
        match self {
            Self::Teen => 0.88,
            Self::Adult => 0.90,
            Self::Senior => 0.92,
        }
    }

    /// Default deep sleep confirmation window (seconds)
    #[must_use]
    pub const fn default_min_duration_seconds(self) -> f64 {
        match self {
            Self::Teen => 150.0,
            Self::Adult => 180.0,
            Self::Senior => 240.0,
        }
    }

    /// Default stationary fraction required inside the confirmation window
    #[must_use]
    pub const fn default_resting_ratio(self) -> f64 {
        match self {
            Self::Teen => 0.80,
            Self::Adult => 0.75,
            Self::Senior => 0.70,
        }
    }

    /// Continuous stillness needed to move from awake to resting (seconds)
    #[must_use]
    pub const fn resting_entry_seconds(self) -> f64 {
        match self {
            Self::Teen => 25.0,
            Self::Adult => 30.0,
            Self::Senior => 40.0,
        }
    }

    /// Accumulated low-HR stillness needed to move from resting to light sleep (seconds)
    #[must_use]
    pub const fn light_sleep_entry_seconds(self) -> f64 {
        match self {
            Self::Teen => 45.0,
            Self::Adult => 60.0,
            Self::Senior => 75.0,
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Teen => "teen",
            Self::Adult => "adult",
            Self::Senior => "senior",
        })
    }
}

impl FromStr for AgeGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "teen" => Ok(Self::Teen),
            "adult" => Ok(Self::Adult),
            "senior" => Ok(Self::Senior),
            other => Err(format!("unknown age group '{other}'")),
        }
    }
}

/// Per-user calibration state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Owner of the profile
    pub user_id: Uuid,
    /// Age group, immutable after creation
    pub age_group: AgeGroup,
    /// Fraction of resting HR below which the wearer is physiologically asleep
    pub threshold_percentage: f64,
    /// Deep sleep confirmation window length (seconds)
    pub min_duration_seconds: f64,
    /// Required stationary fraction in the confirmation window
    pub resting_ratio_threshold: f64,
    /// User override added to the threshold percentage
    pub manual_adjustment_offset: f64,
    /// First monitoring session start
    pub first_use_date: Option<DateTime<Utc>>,
    /// Last successful optimizer commit
    pub last_model_update_date: Option<DateTime<Utc>>,
    /// Completed monitoring sessions
    pub sleep_sessions_count: u32,
    /// Value of `sleep_sessions_count` at the last optimizer commit
    pub sessions_at_last_update: u32,
    /// Sessions labeled accurate
    pub accurate_feedback_count: u32,
    /// Sessions labeled as falsely detected sleep
    pub false_positive_count: u32,
    /// Sessions labeled as missed sleep
    pub false_negative_count: u32,
    /// Average heart rate across completed sessions (BPM)
    pub average_sleep_hr: Option<f64>,
    /// Sessions folded into `average_sleep_hr` since it was last rebuilt
    #[serde(default)]
    pub sleep_hr_sessions: u32,
    /// Lowest heart rate observed across completed sessions (BPM)
    pub min_sleep_hr: Option<f64>,
    /// Heart rate variance from the last optimizer pass (BPM^2)
    pub sleep_hr_variance: Option<f64>,
}

impl UserProfile {
    /// Create a profile with the age group's safe defaults
    #[must_use]
    pub const fn new(user_id: Uuid, age_group: AgeGroup) -> Self {
        Self {
            user_id,
            age_group,
            threshold_percentage: age_group.default_threshold_percentage(),
            min_duration_seconds: age_group.default_min_duration_seconds(),
            resting_ratio_threshold: age_group.default_resting_ratio(),
            manual_adjustment_offset: 0.0,
            first_use_date: None,
            last_model_update_date: None,
            sleep_sessions_count: 0,
            sessions_at_last_update: 0,
            accurate_feedback_count: 0,
            false_positive_count: 0,
            false_negative_count: 0,
            average_sleep_hr: None,
            sleep_hr_sessions: 0,
            min_sleep_hr: None,
            sleep_hr_variance: None,
        }
    }

    /// Threshold percentage with the manual offset applied, kept inside the safety range
    #[must_use]
    pub fn adjusted_threshold_percentage(&self) -> f64 {
        (self.threshold_percentage + self.manual_adjustment_offset)
            .clamp(THRESHOLD_PERCENTAGE_MIN, THRESHOLD_PERCENTAGE_MAX)
    }

    /// Sessions completed since the last optimizer commit
    #[must_use]
    pub const fn new_sessions_since_update(&self) -> u32 {
        self.sleep_sessions_count
            .saturating_sub(self.sessions_at_last_update)
    }

    /// Sessions carrying any feedback label
    #[must_use]
    pub const fn labeled_feedback_count(&self) -> u32 {
        self.accurate_feedback_count + self.false_positive_count + self.false_negative_count
    }

    /// Record the first time monitoring was used; later calls are ignored
    pub fn mark_first_use(&mut self, at: DateTime<Utc>) {
        if self.first_use_date.is_none() {
            self.first_use_date = Some(at);
        }
    }

    /// Set the user's manual offset, limited to the allowed magnitude
    pub fn set_manual_offset(&mut self, offset: f64) {
        self.manual_adjustment_offset = offset.clamp(-MANUAL_OFFSET_LIMIT, MANUAL_OFFSET_LIMIT);
    }

    /// Commit an optimizer calibration. Only automatic fields are touched.
    pub fn apply_calibration(&mut self, calibration: &ProfileCalibration, at: DateTime<Utc>) {
        self.threshold_percentage = calibration.threshold_percentage;
        self.min_duration_seconds = calibration.confirmation_duration_seconds;
        self.resting_ratio_threshold = calibration.resting_ratio_threshold;
        if let Some(stats) = calibration.heart_rate_stats {
            self.average_sleep_hr = Some(stats.average);
            self.sleep_hr_sessions = stats.sessions;
            self.min_sleep_hr = Some(stats.minimum);
            self.sleep_hr_variance = Some(stats.variance);
        }
        self.last_model_update_date = Some(at);
        self.sessions_at_last_update = self.sleep_sessions_count;
        self.clamp_to_bounds();
    }

    /// Fold a completed session's statistics into the running profile statistics
    pub fn record_completed_session(&mut self, average_hr: Option<f64>, minimum_hr: Option<f64>) {
        self.sleep_sessions_count = self.sleep_sessions_count.saturating_add(1);
        if let Some(average) = average_hr.filter(|a| a.is_finite()) {
            self.sleep_hr_sessions = self.sleep_hr_sessions.saturating_add(1);
            let count = f64::from(self.sleep_hr_sessions);
            self.average_sleep_hr = Some(
                self.average_sleep_hr
                    .map_or(average, |previous| previous + (average - previous) / count),
            );
        }
        if let Some(minimum) = minimum_hr {
            self.min_sleep_hr = Some(self.min_sleep_hr.map_or(minimum, |m| m.min(minimum)));
        }
    }

    /// Count a feedback label against the profile
    pub fn record_feedback(&mut self, feedback: SleepFeedback) {
        let counter = match feedback {
            SleepFeedback::Accurate => &mut self.accurate_feedback_count,
            SleepFeedback::FalsePositive => &mut self.false_positive_count,
            SleepFeedback::FalseNegative => &mut self.false_negative_count,
        };
        *counter = counter.saturating_add(1);
    }

    /// Drop derived sleep heart rate statistics so they rebuild from new sessions
    pub fn reset_baseline(&mut self) {
        self.average_sleep_hr = None;
        self.sleep_hr_sessions = 0;
        self.min_sleep_hr = None;
        self.sleep_hr_variance = None;
    }

    /// Whether every bounded field is inside its safety range
    #[must_use]
    pub fn is_within_bounds(&self) -> bool {
        (THRESHOLD_PERCENTAGE_MIN..=THRESHOLD_PERCENTAGE_MAX).contains(&self.threshold_percentage)
            && (MIN_DURATION_SECONDS_MIN..=MIN_DURATION_SECONDS_MAX)
                .contains(&self.min_duration_seconds)
            && (RESTING_RATIO_MIN..=RESTING_RATIO_MAX).contains(&self.resting_ratio_threshold)
            && self.manual_adjustment_offset.abs() <= MANUAL_OFFSET_LIMIT
    }

    fn clamp_to_bounds(&mut self) {
        self.threshold_percentage = self
            .threshold_percentage
            .clamp(THRESHOLD_PERCENTAGE_MIN, THRESHOLD_PERCENTAGE_MAX);
        self.min_duration_seconds = self
            .min_duration_seconds
            .clamp(MIN_DURATION_SECONDS_MIN, MIN_DURATION_SECONDS_MAX);
        self.resting_ratio_threshold = self
            .resting_ratio_threshold
            .clamp(RESTING_RATIO_MIN, RESTING_RATIO_MAX);
        self.manual_adjustment_offset = self
            .manual_adjustment_offset
            .clamp(-MANUAL_OFFSET_LIMIT, MANUAL_OFFSET_LIMIT);
    }
}

#[cfg(test)]
mod tests {
    use super::super::optimization::SleepHeartRateStats;
    use super::*;

    #[test]
    fn test_defaults_follow_age_group() {
        let senior = UserProfile::new(Uuid::new_v4(), AgeGroup::Senior);
        assert!((senior.resting_ratio_threshold - 0.70).abs() < f64::EPSILON);
        assert!(senior.is_within_bounds());
        assert!(senior.first_use_date.is_none());
    }

    #[test]
    fn test_adjusted_threshold_is_clamped() {
        let mut profile = UserProfile::new(Uuid::new_v4(), AgeGroup::Senior);
        profile.set_manual_offset(0.5);
        assert!((profile.manual_adjustment_offset - MANUAL_OFFSET_LIMIT).abs() < f64::EPSILON);
        assert!((profile.adjusted_threshold_percentage() - THRESHOLD_PERCENTAGE_MAX).abs() < 1e-9);
    }

    #[test]
    fn test_apply_calibration_clamps_and_resets_counter() {
        let mut profile = UserProfile::new(Uuid::new_v4(), AgeGroup::Adult);
        profile.sleep_sessions_count = 9;
        let calibration = ProfileCalibration {
            threshold_percentage: 0.5,
            confirmation_duration_seconds: 1_000.0,
            resting_ratio_threshold: 0.99,
            heart_rate_stats: None,
        };
        profile.apply_calibration(&calibration, Utc::now());
        assert!(profile.is_within_bounds());
        assert_eq!(profile.new_sessions_since_update(), 0);
        assert!(profile.last_model_update_date.is_some());
    }

    #[test]
    fn test_running_session_statistics() {
        let mut profile = UserProfile::new(Uuid::new_v4(), AgeGroup::Adult);
        profile.record_completed_session(Some(60.0), Some(52.0));
        profile.record_completed_session(Some(56.0), Some(54.0));
        assert_eq!(profile.sleep_sessions_count, 2);
        assert!((profile.average_sleep_hr.unwrap_or_default() - 58.0).abs() < 1e-9);
        assert!((profile.min_sleep_hr.unwrap_or_default() - 52.0).abs() < 1e-9);
    }

    #[test]
    fn test_running_average_counts_only_contributing_sessions() {
        let mut profile = UserProfile::new(Uuid::new_v4(), AgeGroup::Adult);
        profile.record_completed_session(None, None);
        profile.record_completed_session(None, None);
        profile.record_completed_session(Some(60.0), Some(55.0));
        profile.record_completed_session(Some(54.0), Some(50.0));
        assert_eq!(profile.sleep_sessions_count, 4);
        assert_eq!(profile.sleep_hr_sessions, 2);
        assert!((profile.average_sleep_hr.unwrap_or_default() - 57.0).abs() < 1e-9);

        profile.reset_baseline();
        profile.record_completed_session(Some(50.0), Some(48.0));
        assert!((profile.average_sleep_hr.unwrap_or_default() - 50.0).abs() < 1e-9);
        profile.record_completed_session(Some(52.0), Some(49.0));
        assert!((profile.average_sleep_hr.unwrap_or_default() - 51.0).abs() < 1e-9);
    }

    #[test]
    fn test_calibration_stats_rebase_the_running_average() {
        let mut profile = UserProfile::new(Uuid::new_v4(), AgeGroup::Adult);
        for _ in 0..10 {
            profile.record_completed_session(Some(70.0), Some(60.0));
        }
        let calibration = ProfileCalibration {
            threshold_percentage: 0.9,
            confirmation_duration_seconds: 180.0,
            resting_ratio_threshold: 0.75,
            heart_rate_stats: Some(SleepHeartRateStats {
                average: 56.0,
                minimum: 50.0,
                variance: 4.0,
                sessions: 2,
            }),
        };
        profile.apply_calibration(&calibration, Utc::now());
        profile.record_completed_session(Some(59.0), Some(52.0));
        // (56 * 2 + 59) / 3
        assert!((profile.average_sleep_hr.unwrap_or_default() - 57.0).abs() < 1e-9);
        assert_eq!(profile.sleep_hr_sessions, 3);
    }

    #[test]
    fn test_age_group_parses_case_insensitively() {
        assert_eq!("Teen".parse::<AgeGroup>(), Ok(AgeGroup::Teen));
        assert!("toddler".parse::<AgeGroup>().is_err());
    }
}
