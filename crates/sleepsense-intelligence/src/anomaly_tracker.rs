// ABOUTME: Dated anomaly severities with exponential per-day decay
// ABOUTME: Classifies the cumulative score into none, temporary, persistent, or reset bands
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense
#![allow(clippy::cast_precision_loss)] // Safe: elapsed seconds within the retention period

//! Anomaly Tracker
//!
//! Each record contributes `severity * decay^days_since` to the cumulative
//! score. Records older than the retention period are purged on every write.
//!
//! The scoring engine always runs. Whether the classification reaches callers
//! is governed by [`AnomalyDecisionMode`]: in `Disabled` mode (the default)
//! [`AnomalyTracker::classification`] reports [`AnomalyClassification::None`] and
//! [`AnomalyTracker::effective_score`] reports zero, while
//! [`AnomalyTracker::cumulative_score_at`] still exposes the raw score.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sleepsense_core::constants::detection::anomaly;
use std::fmt;
use std::str::FromStr;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Severity band of the cumulative anomaly score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnomalyClassification {
    /// Score below 3
    #[default]
    None,
    /// Score in `[3, 7)`
    Temporary,
    /// Score in `[7, 12)`
    Persistent,
    /// Score of 12 or more
    RequiresBaselineReset,
}

impl fmt::Display for AnomalyClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Temporary => write!(f, "temporary"),
            Self::Persistent => write!(f, "persistent"),
            Self::RequiresBaselineReset => write!(f, "requires baseline reset"),
        }
    }
}

/// Whether classifications are surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyDecisionMode {
    /// Scores are tracked but every classification reads as `None`
    #[default]
    Disabled,
    /// Classifications follow the score bands
    Enabled,
}

impl FromStr for AnomalyDecisionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disabled" | "off" | "false" => Ok(Self::Disabled),
            "enabled" | "on" | "true" => Ok(Self::Enabled),
            other => Err(format!("unknown anomaly decision mode: {other}")),
        }
    }
}

/// One dated severity score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    /// Severity in `[0, 10]`
    pub severity: f64,
    /// When the anomaly was observed
    pub recorded_at: DateTime<Utc>,
}

/// Time-decayed anomaly score
#[derive(Debug, Clone)]
pub struct AnomalyTracker {
    mode: AnomalyDecisionMode,
    decay_factor: f64,
    retention: Duration,
    records: Vec<AnomalyRecord>,
}

impl Default for AnomalyTracker {
    fn default() -> Self {
        Self::new(AnomalyDecisionMode::default())
    }
}

impl AnomalyTracker {
    /// Tracker with default decay and retention
    #[must_use]
    pub fn new(mode: AnomalyDecisionMode) -> Self {
        Self {
            mode,
            decay_factor: anomaly::DECAY_FACTOR,
            retention: Duration::days(anomaly::RETENTION_DAYS),
            records: Vec::new(),
        }
    }

    /// Decision mode in effect
    #[must_use]
    pub const fn mode(&self) -> AnomalyDecisionMode {
        self.mode
    }

    /// Switch the decision mode; stored records are kept
    pub fn set_mode(&mut self, mode: AnomalyDecisionMode) {
        self.mode = mode;
    }

    /// Stored records, oldest first
    #[must_use]
    pub fn records(&self) -> &[AnomalyRecord] {
        &self.records
    }

    /// Store a severity (clamped to `[0, 10]`) and purge expired records
    pub fn record_anomaly(&mut self, severity: f64, date: DateTime<Utc>) {
        let severity = if severity.is_finite() {
            severity.clamp(0.0, anomaly::MAX_SEVERITY)
        } else {
            0.0
        };
        self.records.push(AnomalyRecord {
            severity,
            recorded_at: date,
        });
        self.records.sort_by_key(|r| r.recorded_at);

        let newest = self.records.last().map_or(date, |r| r.recorded_at);
        let cutoff = newest - self.retention;
        self.records.retain(|r| r.recorded_at >= cutoff);
    }

    /// Raw decayed score at the current time
    #[must_use]
    pub fn cumulative_score(&self) -> f64 {
        self.cumulative_score_at(Utc::now())
    }

    /// Raw decayed score at `now`; records dated after `now` count undecayed
    #[must_use]
    pub fn cumulative_score_at(&self, now: DateTime<Utc>) -> f64 {
        self.records
            .iter()
            .map(|r| {
                let days = ((now - r.recorded_at).num_seconds() as f64 / SECONDS_PER_DAY).max(0.0);
                r.severity * self.decay_factor.powf(days)
            })
            .sum()
    }

    /// Score band for a raw score
    #[must_use]
    pub fn classify_score(score: f64) -> AnomalyClassification {
        if score >= anomaly::BASELINE_RESET_THRESHOLD {
            AnomalyClassification::RequiresBaselineReset
        } else if score >= anomaly::PERSISTENT_THRESHOLD {
            AnomalyClassification::Persistent
        } else if score >= anomaly::TEMPORARY_THRESHOLD {
            AnomalyClassification::Temporary
        } else {
            AnomalyClassification::None
        }
    }

    /// Classification surfaced to callers under the current mode
    #[must_use]
    pub fn classification(&self, now: DateTime<Utc>) -> AnomalyClassification {
        match self.mode {
            AnomalyDecisionMode::Disabled => AnomalyClassification::None,
            AnomalyDecisionMode::Enabled => Self::classify_score(self.cumulative_score_at(now)),
        }
    }

    /// Score surfaced to callers under the current mode
    #[must_use]
    pub fn effective_score(&self, now: DateTime<Utc>) -> f64 {
        match self.mode {
            AnomalyDecisionMode::Disabled => 0.0,
            AnomalyDecisionMode::Enabled => self.cumulative_score_at(now),
        }
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
    }

    #[test]
    fn test_score_decays_per_day() {
        let mut tracker = AnomalyTracker::new(AnomalyDecisionMode::Enabled);
        tracker.record_anomaly(5.0, base());
        assert!((tracker.cumulative_score_at(base()) - 5.0).abs() < 1e-9);
        assert!((tracker.cumulative_score_at(base() + Duration::days(1)) - 4.0).abs() < 1e-9);
        assert!((tracker.cumulative_score_at(base() + Duration::days(2)) - 3.2).abs() < 1e-9);
    }

    #[test]
    fn test_severity_is_clamped() {
        let mut tracker = AnomalyTracker::default();
        tracker.record_anomaly(25.0, base());
        tracker.record_anomaly(-3.0, base());
        assert!((tracker.cumulative_score_at(base()) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_old_records_are_purged_on_write() {
        let mut tracker = AnomalyTracker::default();
        tracker.record_anomaly(4.0, base());
        tracker.record_anomaly(4.0, base() + Duration::days(31));
        assert_eq!(tracker.records().len(), 1);
    }

    #[test]
    fn test_classification_bands() {
        assert_eq!(AnomalyTracker::classify_score(2.9), AnomalyClassification::None);
        assert_eq!(AnomalyTracker::classify_score(3.0), AnomalyClassification::Temporary);
        assert_eq!(AnomalyTracker::classify_score(7.0), AnomalyClassification::Persistent);
        assert_eq!(
            AnomalyTracker::classify_score(12.0),
            AnomalyClassification::RequiresBaselineReset
        );
    }

    #[test]
    fn test_disabled_mode_masks_decisions_but_keeps_score() {
        let mut tracker = AnomalyTracker::new(AnomalyDecisionMode::Disabled);
        tracker.record_anomaly(10.0, base());
        tracker.record_anomaly(10.0, base());
        assert_eq!(tracker.classification(base()), AnomalyClassification::None);
        assert!(tracker.effective_score(base()).abs() < f64::EPSILON);
        assert!((tracker.cumulative_score_at(base()) - 20.0).abs() < 1e-9);

        tracker.set_mode(AnomalyDecisionMode::Enabled);
        assert_eq!(
            tracker.classification(base()),
            AnomalyClassification::RequiresBaselineReset
        );
    }

    #[test]
    fn test_decision_mode_parses() {
        assert_eq!("Enabled".parse::<AnomalyDecisionMode>(), Ok(AnomalyDecisionMode::Enabled));
        assert_eq!("off".parse::<AnomalyDecisionMode>(), Ok(AnomalyDecisionMode::Disabled));
        assert!("maybe".parse::<AnomalyDecisionMode>().is_err());
    }
}
