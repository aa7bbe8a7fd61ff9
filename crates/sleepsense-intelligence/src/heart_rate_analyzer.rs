// ABOUTME: Heart rate signal derivation for sleep onset detection
// ABOUTME: Median spike rejection, weighted regression trend, and delta-HR significant-drop signal
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense
#![allow(clippy::cast_precision_loss)] // Safe: sample indices and counts are small

//! Heart Rate Analyzer
//!
//! Raw batches from the sensor provider are reduced to one smoothed value per
//! batch (median of the last three raw samples). Three detectors read the
//! smoothed history:
//!
//! - **static threshold**: smoothed HR below `resting HR x threshold percentage`
//! - **delta-HR**: the second half of the short-term window averages at least
//!   5 BPM and 5% below the first half, and below resting HR
//! - **trend assist**: a falling weighted-regression trend while HR is already
//!   within 5% of resting HR
//!
//! Any one of them marks heart rate as low; the static threshold alone is always
//! sufficient.

use crate::statistics::{mean, median, weighted_linear_slope};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sleepsense_core::constants::detection::heart_rate;
use sleepsense_core::models::Sample;
use std::collections::VecDeque;

/// Tunables for [`HeartRateAnalyzer`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartRateAnalyzerConfig {
    /// Raw samples per batch considered by the median
    pub median_batch_size: usize,
    /// Trend regression span (seconds)
    pub trend_window_secs: i64,
    /// Samples needed before a non-zero trend is reported
    pub trend_min_samples: usize,
    /// Weight added per sample, oldest first
    pub trend_weight_step: f64,
    /// Projection horizon for the slope (seconds)
    pub trend_slope_horizon_secs: f64,
    /// Projected change that saturates the trend (BPM)
    pub trend_saturation_bpm: f64,
    /// Short-term window for the delta-HR signal (seconds)
    pub short_term_window_secs: i64,
    /// Samples needed in the short-term window
    pub delta_hr_min_samples: usize,
    /// Absolute drop required (BPM)
    pub delta_hr_min_drop_bpm: f64,
    /// Relative drop required
    pub delta_hr_min_drop_ratio: f64,
    /// Trend below which the trend assist may fire
    pub trend_assist_threshold: f64,
    /// Margin above resting HR for the trend assist
    pub trend_assist_resting_margin: f64,
    /// Smoothed samples retained
    pub max_smoothed_samples: usize,
}

impl Default for HeartRateAnalyzerConfig {
    fn default() -> Self {
        Self {
            median_batch_size: heart_rate::MEDIAN_BATCH_SIZE,
            trend_window_secs: heart_rate::TREND_WINDOW_SECS,
            trend_min_samples: heart_rate::TREND_MIN_SAMPLES,
            trend_weight_step: heart_rate::TREND_WEIGHT_STEP,
            trend_slope_horizon_secs: heart_rate::TREND_SLOPE_HORIZON_SECS,
            trend_saturation_bpm: heart_rate::TREND_SATURATION_BPM,
            short_term_window_secs: heart_rate::SHORT_TERM_WINDOW_SECS,
            delta_hr_min_samples: heart_rate::DELTA_HR_MIN_SAMPLES,
            delta_hr_min_drop_bpm: heart_rate::DELTA_HR_MIN_DROP_BPM,
            delta_hr_min_drop_ratio: heart_rate::DELTA_HR_MIN_DROP_RATIO,
            trend_assist_threshold: heart_rate::TREND_ASSIST_THRESHOLD,
            trend_assist_resting_margin: heart_rate::TREND_ASSIST_RESTING_MARGIN,
            max_smoothed_samples: heart_rate::MAX_SMOOTHED_SAMPLES,
        }
    }
}

/// Point-in-time view of every derived heart rate signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartRateSignals {
    /// Latest smoothed heart rate (BPM)
    pub smoothed_heart_rate: Option<f64>,
    /// Static sleep threshold (BPM)
    pub threshold_bpm: f64,
    /// Normalized trend in `[-1, 1]`
    pub trend: f64,
    /// Delta-HR detector output
    pub significant_decrease: bool,
    /// Combined heart-rate-low signal fed to the state machine
    pub is_heart_rate_low: bool,
}

/// Derives sleep-relevant signals from the smoothed heart rate history
#[derive(Debug, Clone)]
pub struct HeartRateAnalyzer {
    config: HeartRateAnalyzerConfig,
    resting_heart_rate: f64,
    threshold_percentage: f64,
    smoothed: VecDeque<Sample>,
    trend: f64,
}

impl HeartRateAnalyzer {
    /// Create an analyzer for a resting heart rate and threshold fraction
    #[must_use]
    pub const fn new(
        config: HeartRateAnalyzerConfig,
        resting_heart_rate: f64,
        threshold_percentage: f64,
    ) -> Self {
        Self {
            config,
            resting_heart_rate,
            threshold_percentage,
            smoothed: VecDeque::new(),
            trend: 0.0,
        }
    }

    /// Replace the calibration used by the threshold detectors
    pub fn set_calibration(&mut self, resting_heart_rate: f64, threshold_percentage: f64) {
        self.resting_heart_rate = resting_heart_rate;
        self.threshold_percentage = threshold_percentage;
    }

    /// Resting heart rate used for normalization (BPM)
    #[must_use]
    pub const fn resting_heart_rate(&self) -> f64 {
        self.resting_heart_rate
    }

    /// Static sleep threshold (BPM)
    #[must_use]
    pub fn threshold_bpm(&self) -> f64 {
        self.resting_heart_rate * self.threshold_percentage
    }

    /// Latest smoothed heart rate
    #[must_use]
    pub fn current_heart_rate(&self) -> Option<f64> {
        self.smoothed.back().map(|s| s.value)
    }

    /// Trend from the last [`Self::refresh_trend`]
    #[must_use]
    pub const fn trend(&self) -> f64 {
        self.trend
    }

    /// Smoothed history, oldest first
    pub fn smoothed_samples(&self) -> impl Iterator<Item = &Sample> {
        self.smoothed.iter()
    }

    /// Median of the last `batch_size` valid raw samples of a batch
    ///
    /// Non-finite and non-positive readings are dropped before the median.
    #[must_use]
    pub fn smooth_batch(batch: &[Sample], batch_size: usize) -> Option<f64> {
        let valid: Vec<f64> = batch
            .iter()
            .filter(|s| s.is_valid_heart_rate())
            .map(|s| s.value)
            .collect();
        let take = batch_size.max(1).min(valid.len());
        median(&valid[valid.len() - take..])
    }

    /// Reduce a raw batch to one smoothed sample stamped with the last valid
    /// reading's timestamp. A batch without valid readings changes nothing.
    pub fn ingest_batch(&mut self, batch: &[Sample]) -> Option<Sample> {
        let last = batch.iter().rev().find(|s| s.is_valid_heart_rate())?;
        let value = Self::smooth_batch(batch, self.config.median_batch_size)?;
        let sample = Sample::new(last.timestamp, value);
        self.smoothed.push_back(sample);
        while self.smoothed.len() > self.config.max_smoothed_samples {
            self.smoothed.pop_front();
        }
        Some(sample)
    }

    /// Recompute the trend over the trend window ending at `now`
    pub fn refresh_trend(&mut self, now: DateTime<Utc>) -> f64 {
        let window = self.window_ending_at(now, self.config.trend_window_secs);
        self.trend = Self::compute_trend(&window, &self.config);
        self.trend
    }

    /// Weighted regression trend in `[-1, 1]`
    ///
    /// Sample `i` (0 = oldest) weighs `1 + step * i`. The slope in BPM/second
    /// is projected over the horizon and divided by the saturation change.
    #[must_use]
    pub fn compute_trend(samples: &[Sample], config: &HeartRateAnalyzerConfig) -> f64 {
        if samples.len() < config.trend_min_samples.max(2) {
            return 0.0;
        }
        let origin = samples[0].timestamp;
        let x: Vec<f64> = samples
            .iter()
            .map(|s| (s.timestamp - origin).num_milliseconds() as f64 / 1000.0)
            .collect();
        let y: Vec<f64> = samples.iter().map(|s| s.value).collect();
        let weights: Vec<f64> = (0..samples.len())
            .map(|i| (i as f64).mul_add(config.trend_weight_step, 1.0))
            .collect();

        weighted_linear_slope(&x, &y, &weights).map_or(0.0, |slope| {
            (slope * config.trend_slope_horizon_secs / config.trend_saturation_bpm).clamp(-1.0, 1.0)
        })
    }

    /// Delta-HR detector over the short-term window ending at `now`
    #[must_use]
    pub fn significant_decrease(&self, now: DateTime<Utc>) -> bool {
        let window = self.window_ending_at(now, self.config.short_term_window_secs);
        if window.len() < self.config.delta_hr_min_samples {
            return false;
        }
        let (first, second) = window.split_at(window.len() / 2);
        let first_avg = mean(&first.iter().map(|s| s.value).collect::<Vec<_>>());
        let second_avg = mean(&second.iter().map(|s| s.value).collect::<Vec<_>>());
        if first_avg <= 0.0 {
            return false;
        }
        let drop = first_avg - second_avg;
        drop >= self.config.delta_hr_min_drop_bpm
            && drop / first_avg >= self.config.delta_hr_min_drop_ratio
            && second_avg < self.resting_heart_rate
    }

    /// Combined heart-rate-low signal
    #[must_use]
    pub fn is_heart_rate_low(&self, now: DateTime<Utc>) -> bool {
        self.signals(now).is_heart_rate_low
    }

    /// Snapshot of every derived signal at `now`
    #[must_use]
    pub fn signals(&self, now: DateTime<Utc>) -> HeartRateSignals {
        let threshold_bpm = self.threshold_bpm();
        let smoothed_heart_rate = self.current_heart_rate();
        let significant_decrease = self.significant_decrease(now);

        let is_heart_rate_low = smoothed_heart_rate.is_some_and(|current| {
            let below_threshold = current < threshold_bpm;
            let trend_assist = self.trend < self.config.trend_assist_threshold
                && current
                    <= self.resting_heart_rate * (1.0 + self.config.trend_assist_resting_margin);
            below_threshold || significant_decrease || trend_assist
        });

        HeartRateSignals {
            smoothed_heart_rate,
            threshold_bpm,
            trend: self.trend,
            significant_decrease,
            is_heart_rate_low,
        }
    }

    /// Forget all history (new session)
    pub fn reset(&mut self) {
        self.smoothed.clear();
        self.trend = 0.0;
    }

    fn window_ending_at(&self, now: DateTime<Utc>, span_secs: i64) -> Vec<Sample> {
        let cutoff = now - Duration::seconds(span_secs);
        self.smoothed
            .iter()
            .filter(|s| s.timestamp >= cutoff && s.timestamp <= now)
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
    }

    fn at(secs: i64, value: f64) -> Sample {
        Sample::new(base() + Duration::seconds(secs), value)
    }

    fn analyzer() -> HeartRateAnalyzer {
        HeartRateAnalyzer::new(HeartRateAnalyzerConfig::default(), 60.0, 0.9)
    }

    fn feed(analyzer: &mut HeartRateAnalyzer, points: &[(i64, f64)]) {
        for (secs, value) in points {
            analyzer.ingest_batch(&[at(*secs, *value)]);
        }
    }

    #[test]
    fn test_median_rejects_single_spike() {
        let mut analyzer = analyzer();
        let batch = [at(0, 80.0), at(1, 58.0), at(2, 59.0), at(3, 120.0)];
        let sample = analyzer.ingest_batch(&batch);
        assert_eq!(sample.map(|s| s.value), Some(59.0));
        assert_eq!(sample.map(|s| s.timestamp), Some(base() + Duration::seconds(3)));
    }

    #[test]
    fn test_empty_batch_is_ignored() {
        let mut analyzer = analyzer();
        assert!(analyzer.ingest_batch(&[]).is_none());
        assert!(analyzer.current_heart_rate().is_none());
        assert!(!analyzer.is_heart_rate_low(base()));
    }

    #[test]
    fn test_invalid_readings_are_dropped_before_smoothing() {
        let mut analyzer = analyzer();
        assert!(analyzer.ingest_batch(&[at(0, f64::NAN)]).is_none());
        assert!(analyzer.ingest_batch(&[at(1, 0.0), at(2, f64::INFINITY)]).is_none());
        assert!(analyzer.current_heart_rate().is_none());

        let batch = [at(3, 55.0), at(4, f64::NAN), at(5, 54.0), at(6, -1.0)];
        let sample = analyzer.ingest_batch(&batch);
        assert_eq!(sample.map(|s| s.value), Some(54.5));
        assert_eq!(sample.map(|s| s.timestamp), Some(base() + Duration::seconds(5)));
        assert_eq!(HeartRateAnalyzer::smooth_batch(&batch, 3), Some(54.5));
    }

    #[test]
    fn test_trend_needs_three_samples() {
        let mut analyzer = analyzer();
        feed(&mut analyzer, &[(0, 70.0), (10, 60.0)]);
        assert!(analyzer.refresh_trend(base() + Duration::seconds(10)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_trend_scales_slope_over_horizon() {
        let mut analyzer = analyzer();
        // -0.05 BPM/s projected over 30 s is -1.5 BPM, i.e. -0.75 of saturation
        feed(&mut analyzer, &[(0, 70.0), (10, 69.5), (20, 69.0), (30, 68.5)]);
        let trend = analyzer.refresh_trend(base() + Duration::seconds(30));
        assert!((trend + 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_trend_saturates() {
        let mut analyzer = analyzer();
        feed(&mut analyzer, &[(0, 90.0), (10, 80.0), (20, 70.0)]);
        let trend = analyzer.refresh_trend(base() + Duration::seconds(20));
        assert!((trend + 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_static_threshold_alone_is_sufficient() {
        let mut analyzer = analyzer();
        feed(&mut analyzer, &[(0, 53.0)]);
        let signals = analyzer.signals(base());
        assert!((signals.threshold_bpm - 54.0).abs() < 1e-9);
        assert!(!signals.significant_decrease);
        assert!(signals.is_heart_rate_low);
    }

    #[test]
    fn test_significant_decrease_detects_drop_below_resting() {
        let mut analyzer = analyzer();
        feed(
            &mut analyzer,
            &[(0, 70.0), (10, 70.0), (20, 70.0), (30, 58.0), (40, 58.0), (50, 58.0)],
        );
        let now = base() + Duration::seconds(50);
        assert!(analyzer.significant_decrease(now));
        // 58 is above the 54 BPM static threshold
        assert!(analyzer.is_heart_rate_low(now));
    }

    #[test]
    fn test_significant_decrease_requires_second_half_below_resting() {
        let mut analyzer = analyzer();
        feed(
            &mut analyzer,
            &[(0, 80.0), (10, 80.0), (20, 80.0), (30, 68.0), (40, 68.0), (50, 68.0)],
        );
        assert!(!analyzer.significant_decrease(base() + Duration::seconds(50)));
    }

    #[test]
    fn test_trend_assist_only_near_resting() {
        let mut near = analyzer();
        feed(&mut near, &[(0, 68.0), (20, 66.0), (40, 64.0), (60, 62.0)]);
        let now = base() + Duration::seconds(60);
        assert!(near.refresh_trend(now) < -0.15);
        assert!(near.is_heart_rate_low(now));

        let mut far = analyzer();
        feed(&mut far, &[(0, 70.0), (20, 68.0), (40, 66.0), (60, 64.0)]);
        assert!(far.refresh_trend(now) < -0.15);
        assert!(!far.is_heart_rate_low(now));
    }

    #[test]
    fn test_set_calibration_moves_threshold() {
        let mut analyzer = analyzer();
        feed(&mut analyzer, &[(0, 55.0)]);
        assert!(!analyzer.is_heart_rate_low(base()));
        analyzer.set_calibration(60.0, 0.95);
        assert!(analyzer.is_heart_rate_low(base()));
    }
}
