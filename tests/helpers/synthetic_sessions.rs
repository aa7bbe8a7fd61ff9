// ABOUTME: Synthetic finished sleep sessions for optimizer and scheduler tests
// ABOUTME: Builds sessions directly, without replaying per-second sensor streams
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use chrono::{DateTime, Duration, Utc};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use sleepsense::models::{Sample, SleepFeedback, SleepSession};
use uuid::Uuid;

/// Fixed reference time so tests never depend on the wall clock
pub fn reference_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Deterministic builder of finished sessions
#[derive(Debug, Clone)]
pub struct SyntheticSessions {
    rng: ChaCha8Rng,
    user_id: Uuid,
}

/// Shape of one generated session
#[derive(Debug, Clone, Copy)]
pub struct SessionSpec {
    /// Mean sleeping heart rate (BPM)
    pub mean_heart_rate: f64,
    /// Uniform noise amplitude around the mean (BPM)
    pub noise_bpm: f64,
    /// Number of smoothed samples, 30 s apart
    pub samples: usize,
    /// Seconds from start to confirmed sleep, `None` when never detected
    pub sleep_latency_secs: Option<i64>,
    /// User label
    pub feedback: Option<SleepFeedback>,
}

impl Default for SessionSpec {
    fn default() -> Self {
        Self {
            mean_heart_rate: 52.0,
            noise_bpm: 1.0,
            samples: 120,
            sleep_latency_secs: Some(900),
            feedback: None,
        }
    }
}

impl SyntheticSessions {
    pub fn new(seed: u64, user_id: Uuid) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            user_id,
        }
    }

    /// One finished session starting `day` days after the reference time
    pub fn session(&mut self, day: i64, spec: SessionSpec) -> SleepSession {
        let start = reference_time() + Duration::days(day);
        let mut session = SleepSession::new(self.user_id, start);
        for i in 0..spec.samples {
            let noise = if spec.noise_bpm > 0.0 {
                self.rng.gen_range(-spec.noise_bpm..spec.noise_bpm)
            } else {
                0.0
            };
            let offset = Duration::seconds(i64::try_from(i).unwrap() * 30);
            session.append_sample(Sample::new(start + offset, spec.mean_heart_rate + noise));
        }
        if let Some(latency) = spec.sleep_latency_secs {
            session.mark_sleep_detected(start + Duration::seconds(latency));
        }
        session.feedback = spec.feedback;
        let duration = i64::try_from(spec.samples).unwrap() * 30;
        session.finalize(start + Duration::seconds(duration.max(60)));
        session
    }

    /// `count` sessions on consecutive days sharing one spec
    pub fn nights(&mut self, count: i64, spec: SessionSpec) -> Vec<SleepSession> {
        (0..count).map(|day| self.session(day, spec)).collect()
    }
}
