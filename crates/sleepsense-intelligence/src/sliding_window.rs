// ABOUTME: Fixed-duration buffer of timestamped samples with cached statistics
// ABOUTME: Provides mean, population standard deviation, and a cached below-threshold ratio
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense
#![allow(clippy::cast_precision_loss)] // Safe: window sizes are small

//! Sliding window over `[now - duration, now]`.
//!
//! Mean and standard deviation come from running sums maintained on insert and
//! eviction. The stationary ratio scans the window, so its result is cached
//! until new data arrives or a different threshold is asked for.

use chrono::{DateTime, Duration, Utc};
use sleepsense_core::models::Sample;
use std::collections::VecDeque;

/// Cached result of the last `stationary_ratio` query
#[derive(Debug, Clone, Copy)]
struct RatioCache {
    threshold: f64,
    below_count: usize,
}

/// Time-bounded sample buffer
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    duration: Duration,
    samples: VecDeque<Sample>,
    sum: f64,
    sum_squares: f64,
    ratio_cache: Option<RatioCache>,
}

impl SlidingWindow {
    /// Create an empty window spanning `duration`
    #[must_use]
    pub const fn new(duration: Duration) -> Self {
        Self {
            duration,
            samples: VecDeque::new(),
            sum: 0.0,
            sum_squares: 0.0,
            ratio_cache: None,
        }
    }

    /// Window length
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Append a sample and evict entries older than `timestamp - duration`
    pub fn add(&mut self, value: f64, timestamp: DateTime<Utc>) {
        self.samples.push_back(Sample::new(timestamp, value));
        self.sum += value;
        self.sum_squares = value.mul_add(value, self.sum_squares);
        self.ratio_cache = None;
        self.evict_expired(timestamp);
    }

    /// Drop entries that fell out of `[now - duration, now]`
    pub fn evict_expired(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.duration;
        let mut evicted = false;
        while let Some(front) = self.samples.front() {
            if front.timestamp >= cutoff {
                break;
            }
            let value = front.value;
            self.sum -= value;
            self.sum_squares = value.mul_add(-value, self.sum_squares);
            self.samples.pop_front();
            evicted = true;
        }
        if evicted {
            self.ratio_cache = None;
            if self.samples.is_empty() {
                self.sum = 0.0;
                self.sum_squares = 0.0;
            }
        }
    }

    /// Number of samples in the window
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window holds no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recent sample
    #[must_use]
    pub fn latest(&self) -> Option<Sample> {
        self.samples.back().copied()
    }

    /// Values in arrival order
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    /// Time between the oldest and newest sample
    #[must_use]
    pub fn span(&self) -> Duration {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => Duration::zero(),
        }
    }

    /// Population mean, `0.0` when empty
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.sum / self.samples.len() as f64
    }

    /// Population standard deviation, `0.0` when empty
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let n = self.samples.len() as f64;
        let mean = self.sum / n;
        // running sums can drift slightly negative for constant input
        (self.sum_squares / n - mean * mean).max(0.0).sqrt()
    }

    /// Samples strictly below `threshold`
    pub fn count_below(&mut self, threshold: f64) -> usize {
        if let Some(cache) = self.ratio_cache {
            if cache.threshold.to_bits() == threshold.to_bits() {
                return cache.below_count;
            }
        }
        let below_count = self.samples.iter().filter(|s| s.value < threshold).count();
        self.ratio_cache = Some(RatioCache {
            threshold,
            below_count,
        });
        below_count
    }

    /// Fraction of samples strictly below `threshold`, `0.0` when empty
    pub fn stationary_ratio(&mut self, threshold: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.count_below(threshold) as f64 / self.samples.len() as f64
    }

    /// Remove every sample
    pub fn clear(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
        self.sum_squares = 0.0;
        self.ratio_cache = None;
    }
}
