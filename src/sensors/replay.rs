// ABOUTME: Replay sensor that serves pre-recorded heart rate and motion samples
// ABOUTME: Used by the CLI and integration tests to drive monitors deterministically
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

use super::{HeartRateService, MotionService};
use crate::errors::{AppError, AppResult};
use crate::models::Sample;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Serves scripted samples; `poll_*` returns everything after `since`
#[derive(Debug, Clone, Default)]
pub struct ReplaySensor {
    heart_rate: Arc<Vec<Sample>>,
    motion: Arc<Vec<Sample>>,
    resting_heart_rate: Option<f64>,
    offline: Arc<AtomicBool>,
}

impl ReplaySensor {
    /// Build from heart rate and motion streams; both are sorted by timestamp
    #[must_use]
    pub fn new(mut heart_rate: Vec<Sample>, mut motion: Vec<Sample>) -> Self {
        heart_rate.sort_by_key(|s| s.timestamp);
        motion.sort_by_key(|s| s.timestamp);
        Self {
            heart_rate: Arc::new(heart_rate),
            motion: Arc::new(motion),
            resting_heart_rate: None,
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Report a resting heart rate from `resting_heart_rate()`
    #[must_use]
    pub fn with_resting_heart_rate(mut self, bpm: f64) -> Self {
        self.resting_heart_rate = Some(bpm);
        self
    }

    /// Simulate a disconnected device; polls fail while offline
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Timestamp of the last scripted sample across both streams
    #[must_use]
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        let hr = self.heart_rate.last().map(|s| s.timestamp);
        let motion = self.motion.last().map(|s| s.timestamp);
        hr.max(motion)
    }

    fn window(&self, samples: &[Sample], since: DateTime<Utc>) -> AppResult<Vec<Sample>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::internal("replay sensor is offline"));
        }
        let start = samples.partition_point(|s| s.timestamp <= since);
        Ok(samples[start..].to_vec())
    }

    /// Samples in `(since, until]`, for callers replaying in simulated time
    ///
    /// # Errors
    ///
    /// Returns an error while the sensor is offline
    pub fn heart_rate_between(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<Sample>> {
        let mut samples = self.window(&self.heart_rate, since)?;
        samples.retain(|s| s.timestamp <= until);
        Ok(samples)
    }

    /// Motion samples in `(since, until]`
    ///
    /// # Errors
    ///
    /// Returns an error while the sensor is offline
    pub fn motion_between(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> AppResult<Vec<Sample>> {
        let mut samples = self.window(&self.motion, since)?;
        samples.retain(|s| s.timestamp <= until);
        Ok(samples)
    }
}

#[async_trait]
impl HeartRateService for ReplaySensor {
    async fn poll_heart_rate(&self, since: DateTime<Utc>) -> AppResult<Vec<Sample>> {
        self.window(&self.heart_rate, since)
    }

    async fn resting_heart_rate(&self) -> AppResult<Option<f64>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::internal("replay sensor is offline"));
        }
        Ok(self.resting_heart_rate)
    }
}

#[async_trait]
impl MotionService for ReplaySensor {
    async fn poll_motion(&self, since: DateTime<Utc>) -> AppResult<Vec<Sample>> {
        self.window(&self.motion, since)
    }
}
