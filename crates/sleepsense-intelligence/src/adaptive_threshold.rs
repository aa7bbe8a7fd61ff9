// ABOUTME: EMA-smoothed threshold estimator derived from mean plus standard deviation
// ABOUTME: Rate-limited, minimum-sample gated, and clamped to configured bounds
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

use crate::statistics::{mean, population_std_dev};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sleepsense_core::constants::detection::motion;

/// Parameters for an [`AdaptiveThreshold`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveThresholdConfig {
    /// Starting threshold
    pub initial: f64,
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
    /// Weight of the new candidate in the EMA (0-1)
    pub smoothing_factor: f64,
    /// Minimum time between gated updates (seconds)
    pub update_interval_secs: i64,
    /// Minimum samples for a gated update
    pub min_samples: usize,
}

impl Default for AdaptiveThresholdConfig {
    fn default() -> Self {
        Self {
            initial: motion::INITIAL_THRESHOLD,
            min: motion::MIN_THRESHOLD,
            max: motion::MAX_THRESHOLD,
            smoothing_factor: motion::SMOOTHING_FACTOR,
            update_interval_secs: motion::UPDATE_INTERVAL_SECS,
            min_samples: motion::MIN_UPDATE_SAMPLES,
        }
    }
}

/// Threshold that follows `mean + stddev` of recent samples
#[derive(Debug, Clone)]
pub struct AdaptiveThreshold {
    config: AdaptiveThresholdConfig,
    current: f64,
    last_update: Option<DateTime<Utc>>,
}

impl AdaptiveThreshold {
    /// Create a threshold starting at the clamped initial value
    #[must_use]
    pub fn new(config: AdaptiveThresholdConfig) -> Self {
        Self {
            current: config.initial.clamp(config.min, config.max),
            config,
            last_update: None,
        }
    }

    /// Current threshold
    #[must_use]
    pub const fn current(&self) -> f64 {
        self.current
    }

    /// Time of the last applied update
    #[must_use]
    pub const fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// Gated update. Returns `false` without changes when fewer than the
    /// minimum samples are given or the update interval has not elapsed.
    pub fn update(&mut self, samples: &[f64], now: DateTime<Utc>) -> bool {
        if samples.len() < self.config.min_samples {
            return false;
        }
        if let Some(last) = self.last_update {
            if now - last < Duration::seconds(self.config.update_interval_secs) {
                return false;
            }
        }
        self.apply(samples, now)
    }

    /// Ungated update used for manual recalibration. Still smooths and clamps;
    /// an empty slice leaves the threshold untouched.
    pub fn force_update(&mut self, samples: &[f64], now: DateTime<Utc>) -> bool {
        if samples.is_empty() {
            return false;
        }
        self.apply(samples, now)
    }

    /// Return to the initial value and forget the last update time
    pub fn reset(&mut self) {
        self.current = self.config.initial.clamp(self.config.min, self.config.max);
        self.last_update = None;
    }

    fn apply(&mut self, samples: &[f64], now: DateTime<Utc>) -> bool {
        let candidate = mean(samples) + population_std_dev(samples);
        let s = self.config.smoothing_factor;
        let blended = (1.0 - s).mul_add(self.current, s * candidate);
        self.current = blended.clamp(self.config.min, self.config.max);
        self.last_update = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AdaptiveThresholdConfig {
        AdaptiveThresholdConfig {
            initial: 1.0,
            min: 0.5,
            max: 2.0,
            smoothing_factor: 0.5,
            update_interval_secs: 60,
            min_samples: 10,
        }
    }

    #[test]
    fn test_update_requires_minimum_samples() {
        let mut threshold = AdaptiveThreshold::new(config());
        assert!(!threshold.update(&[1.5; 9], Utc::now()));
        assert!(threshold.last_update().is_none());
    }

    #[test]
    fn test_update_is_rate_limited() {
        let mut threshold = AdaptiveThreshold::new(config());
        let now = Utc::now();
        assert!(threshold.update(&[1.5; 10], now));
        // candidate 1.5 blended 50/50 with 1.0
        assert!((threshold.current() - 1.25).abs() < 1e-9);
        assert!(!threshold.update(&[1.5; 10], now + Duration::seconds(30)));
        assert!(threshold.update(&[1.5; 10], now + Duration::seconds(60)));
    }

    #[test]
    fn test_force_update_bypasses_gates_but_clamps() {
        let mut threshold = AdaptiveThreshold::new(config());
        let now = Utc::now();
        assert!(threshold.force_update(&[10.0, 10.0], now));
        assert!((threshold.current() - 2.0).abs() < 1e-9);
        assert!(threshold.force_update(&[0.0], now));
        assert!((threshold.current() - 1.0).abs() < 1e-9);
        assert!(!threshold.force_update(&[], now));
    }
}
