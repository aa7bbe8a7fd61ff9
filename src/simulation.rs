// ABOUTME: Seeded synthetic nights of heart rate and motion data plus a simulated-time replay
// ABOUTME: Used by the CLI, integration tests, and benches to exercise the full detection pipeline
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

//! Synthetic night generation
//!
//! A night has three phases: settling (moving, heart rate above resting),
//! falling asleep (still, heart rate ramping down) and asleep (still with
//! rare movements, heart rate near a fraction of resting). Excursion nights
//! shift the sleeping heart rate by a fraction of resting heart rate.
//! Generation is deterministic for a given seed.

use crate::config::MonitorConfig;
use crate::errors::AppResult;
use crate::models::{Sample, SleepFeedback, StateTransition};
use crate::monitoring::SleepMonitor;
use crate::profile::CompletedSession;
use chrono::{DateTime, Duration, Utc};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Awake heart rate as a multiple of resting
const AWAKE_HEART_RATE_FACTOR: f64 = 1.12;
/// Sleeping heart rate as a multiple of resting, before excursions
const ASLEEP_HEART_RATE_FACTOR: f64 = 0.85;
/// Uniform heart rate noise amplitude (BPM)
const HEART_RATE_NOISE_BPM: f64 = 1.5;
/// Chance that a heart rate reading is a motion artifact spike
const SPIKE_PROBABILITY: f64 = 0.005;
/// Chance per second of a brief movement while asleep
const MOVEMENT_PROBABILITY: f64 = 0.002;
/// Share of nights with a heart rate excursion
const EXCURSION_NIGHT_SHARE: f64 = 2.0 / 7.0;
/// Chance a night is labeled false positive or false negative
const MISLABEL_PROBABILITY: f64 = 0.15;
/// Chance a correctly detected night carries an `accurate` label
const ACCURATE_LABEL_PROBABILITY: f64 = 0.5;

/// Phase lengths and sampling cadence of a synthetic night
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightShape {
    /// Moving around before lying still (seconds)
    pub settle_secs: i64,
    /// Heart rate ramp from awake to asleep (seconds)
    pub onset_secs: i64,
    /// Asleep phase (seconds)
    pub sleep_secs: i64,
    /// Heart rate reading cadence (seconds)
    pub heart_rate_interval_secs: i64,
}

impl Default for NightShape {
    fn default() -> Self {
        Self {
            settle_secs: 600,
            onset_secs: 900,
            sleep_secs: 3_600,
            heart_rate_interval_secs: 5,
        }
    }
}

impl NightShape {
    /// Total night length
    #[must_use]
    pub const fn total_secs(&self) -> i64 {
        self.settle_secs + self.onset_secs + self.sleep_secs
    }
}

/// One generated night
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedNight {
    /// Monitoring start
    pub start: DateTime<Utc>,
    /// Monitoring end
    pub end: DateTime<Utc>,
    /// Sleeping heart rate shift as a fraction of resting (0 for a normal night)
    pub excursion: f64,
    /// End of the heart rate ramp
    pub sleep_onset: DateTime<Utc>,
    /// Raw heart rate readings, oldest first
    pub heart_rate: Vec<Sample>,
    /// Motion intensity readings, oldest first
    pub motion: Vec<Sample>,
    /// Label the simulated user gives the night
    pub feedback: Option<SleepFeedback>,
}

/// Outcome of replaying a night through a monitor
#[derive(Debug, Clone)]
pub struct NightReport {
    /// Finalized session and updated profile
    pub completed: CompletedSession,
    /// Every transition in order
    pub transitions: Vec<StateTransition>,
}

/// Deterministic generator of synthetic nights
#[derive(Debug, Clone)]
pub struct NightSimulator {
    seed: u64,
    rng: ChaCha8Rng,
    resting_heart_rate: f64,
    shape: NightShape,
}

impl NightSimulator {
    /// Generator for a wearer with `resting_heart_rate`
    #[must_use]
    pub fn new(seed: u64, resting_heart_rate: f64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            resting_heart_rate,
            shape: NightShape::default(),
        }
    }

    /// Override the night shape
    #[must_use]
    pub const fn with_shape(mut self, shape: NightShape) -> Self {
        self.shape = shape;
        self
    }

    /// Resting heart rate of the simulated wearer
    #[must_use]
    pub const fn resting_heart_rate(&self) -> f64 {
        self.resting_heart_rate
    }

    /// Night shape in use
    #[must_use]
    pub const fn shape(&self) -> NightShape {
        self.shape
    }

    /// Generate one unlabeled night
    pub fn night(&mut self, start: DateTime<Utc>, excursion: f64) -> SimulatedNight {
        let night_seed = self.rng.gen();
        self.generate(night_seed, start, excursion, None)
    }

    /// Generate `days` consecutive nights starting at `first_night`
    ///
    /// About two nights a week get an excursion of 10-15% of resting heart
    /// rate in a random direction, and roughly 15% of nights are labeled
    /// false positive or false negative.
    #[must_use]
    pub fn history(&mut self, first_night: DateTime<Utc>, days: u32) -> Vec<SimulatedNight> {
        #[allow(clippy::cast_sign_loss)] // days is unsigned, so the product is non-negative
        let excursion_nights = (f64::from(days) * EXCURSION_NIGHT_SHARE).round() as usize;
        let day_indices: Vec<u32> = (0..days).collect();
        let excursion_days: Vec<u32> = day_indices
            .choose_multiple(&mut self.rng, excursion_nights)
            .copied()
            .collect();

        let plans: Vec<(u32, u64, f64, Option<SleepFeedback>)> = day_indices
            .iter()
            .map(|&day| {
                let excursion = if excursion_days.contains(&day) {
                    let magnitude = self.rng.gen_range(0.10..=0.15);
                    if self.rng.gen_bool(0.5) {
                        magnitude
                    } else {
                        -magnitude
                    }
                } else {
                    0.0
                };
                let feedback = if self.rng.gen_bool(MISLABEL_PROBABILITY) {
                    Some(if self.rng.gen_bool(0.5) {
                        SleepFeedback::FalsePositive
                    } else {
                        SleepFeedback::FalseNegative
                    })
                } else if self.rng.gen_bool(ACCURATE_LABEL_PROBABILITY) {
                    Some(SleepFeedback::Accurate)
                } else {
                    None
                };
                (day, self.rng.gen(), excursion, feedback)
            })
            .collect();

        plans
            .into_par_iter()
            .map(|(day, night_seed, excursion, feedback)| {
                self.generate(
                    night_seed,
                    first_night + Duration::days(i64::from(day)),
                    excursion,
                    feedback,
                )
            })
            .collect()
    }

    fn generate(
        &self,
        night_seed: u64,
        start: DateTime<Utc>,
        excursion: f64,
        feedback: Option<SleepFeedback>,
    ) -> SimulatedNight {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed ^ night_seed);
        let shape = self.shape;
        let awake_hr = self.resting_heart_rate * AWAKE_HEART_RATE_FACTOR;
        let asleep_hr = self.resting_heart_rate * ASLEEP_HEART_RATE_FACTOR * (1.0 + excursion);
        let asleep_from = shape.settle_secs + shape.onset_secs;
        let total = shape.total_secs();
        let hr_interval = shape.heart_rate_interval_secs.max(1);

        let capacity = usize::try_from(total).unwrap_or_default();
        let mut motion = Vec::with_capacity(capacity);
        let mut heart_rate = Vec::with_capacity(capacity / 4);

        for second in 0..=total {
            let timestamp = start + Duration::seconds(second);
            let intensity = if second < shape.settle_secs {
                rng.gen_range(0.08..0.4)
            } else if second >= asleep_from && rng.gen_bool(MOVEMENT_PROBABILITY) {
                rng.gen_range(0.1..0.3)
            } else {
                rng.gen_range(0.0..0.015)
            };
            motion.push(Sample::new(timestamp, intensity));

            if second % hr_interval == 0 {
                let base = if second < shape.settle_secs {
                    awake_hr
                } else if second < asleep_from {
                    let progress =
                        (second - shape.settle_secs) as f64 / shape.onset_secs.max(1) as f64;
                    (asleep_hr - awake_hr).mul_add(progress, awake_hr)
                } else {
                    asleep_hr
                };
                let mut bpm = base + rng.gen_range(-HEART_RATE_NOISE_BPM..HEART_RATE_NOISE_BPM);
                if rng.gen_bool(SPIKE_PROBABILITY) {
                    bpm += rng.gen_range(20.0..40.0);
                }
                heart_rate.push(Sample::new(timestamp, bpm));
            }
        }

        SimulatedNight {
            start,
            end: start + Duration::seconds(total),
            excursion,
            sleep_onset: start + Duration::seconds(asleep_from),
            heart_rate,
            motion,
            feedback,
        }
    }
}

/// Replay `night` through `monitor` in simulated time, one tick per second
///
/// Analysis and trend refreshes run every `analysis_interval_secs` and
/// `trend_interval_secs` ticks. The session is finalized at the night's end.
///
/// # Errors
///
/// Returns an error if the session cannot be started, a tick is rejected,
/// or the finished session cannot be recorded
pub async fn replay_night(
    monitor: &mut SleepMonitor,
    night: &SimulatedNight,
    resting_heart_rate: f64,
    config: &MonitorConfig,
) -> AppResult<NightReport> {
    monitor
        .start_session(night.start, Some(resting_heart_rate))
        .await?;

    let analysis_every = i64::try_from(config.analysis_interval_secs.max(1)).unwrap_or(i64::MAX);
    let trend_every = i64::try_from(config.trend_interval_secs.max(1)).unwrap_or(i64::MAX);
    let mut hr_cursor = 0;
    let mut motion_cursor = 0;
    let mut transitions = Vec::new();

    let total = (night.end - night.start).num_seconds();
    for second in 1..=total {
        let now = night.start + Duration::seconds(second);

        let pending_hr = &night.heart_rate[hr_cursor..];
        let hr_end = hr_cursor + pending_hr.partition_point(|s| s.timestamp <= now);
        monitor.ingest_heart_rate(&night.heart_rate[hr_cursor..hr_end]);
        hr_cursor = hr_end;

        let pending_motion = &night.motion[motion_cursor..];
        let motion_end = motion_cursor + pending_motion.partition_point(|s| s.timestamp <= now);
        monitor.ingest_motion(&night.motion[motion_cursor..motion_end]);
        motion_cursor = motion_end;

        let outcome = monitor.tick(now)?;
        transitions.extend(outcome.transition);

        if second % analysis_every == 0 {
            monitor.analyze(now);
        }
        if second % trend_every == 0 {
            monitor.refresh_trend(now);
        }
    }

    let completed = monitor.stop_session(night.end).await?;
    Ok(NightReport {
        completed,
        transitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = NightSimulator::new(7, 60.0).night(start(), 0.0);
        let b = NightSimulator::new(7, 60.0).night(start(), 0.0);
        assert_eq!(a.heart_rate, b.heart_rate);
        assert_eq!(a.motion.len(), b.motion.len());
    }

    #[test]
    fn test_history_marks_excursion_nights() {
        let nights = NightSimulator::new(42, 60.0).history(start(), 14);
        assert_eq!(nights.len(), 14);
        let excursions: Vec<f64> = nights
            .iter()
            .map(|n| n.excursion)
            .filter(|e| e.abs() > f64::EPSILON)
            .collect();
        assert_eq!(excursions.len(), 4);
        assert!(excursions.iter().all(|e| (0.10..=0.15).contains(&e.abs())));
        assert!(nights.windows(2).all(|w| w[1].start - w[0].start == Duration::days(1)));
    }
}
