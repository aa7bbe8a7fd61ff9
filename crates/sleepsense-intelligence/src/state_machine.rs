// ABOUTME: Four-state sleep classifier driven by per-tick motion and heart rate signals
// ABOUTME: Decaying accumulators, awake debounce, resting timeout, deep sleep confirmation gate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense
#![allow(clippy::cast_precision_loss)] // Safe: tick gaps are capped to seconds

//! Sleep State Machine
//!
//! | From | To | Rule |
//! |------|----|------|
//! | Awake | Resting | stationary time accumulated for the age-based entry duration |
//! | Resting | Awake | 3 consecutive non-stationary ticks, or 10 minutes without progressing |
//! | Resting | `LightSleep` | HR-low and stationary time accumulated (stationary-only: half) |
//! | `LightSleep` | `DeepSleep` | confirmation window passes both ratio gates |
//! | `LightSleep` | Resting | 3 consecutive non-stationary ticks |
//! | `DeepSleep` | `LightSleep` | HR-low or stationary lost |
//! | `DeepSleep` | Awake | both lost; detection time cleared |
//!
//! Ticks credit the elapsed time since the previous tick, capped so a sensor
//! gap cannot jump an accumulator forward. Disqualifying ticks decay an
//! accumulator by a fixed amount instead of zeroing it.

use crate::confirmation_window::{ConfirmationDecision, ConfirmationSample, ConfirmationWindow};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sleepsense_core::constants::detection::{confirmation, state_machine};
use sleepsense_core::models::{AgeGroup, SleepState, StateTransition, UserProfile};
use tracing::{debug, info};
use uuid::Uuid;

/// Durations and ratios for one user's state machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateMachineConfig {
    /// Stationary time needed to leave Awake (seconds)
    pub resting_entry_seconds: f64,
    /// HR-low and stationary time needed to leave Resting (seconds)
    pub light_sleep_entry_seconds: f64,
    /// Span the confirmation window must cover (seconds)
    pub confirmation_duration_seconds: f64,
    /// Required share of stationary ticks in the confirmation span
    pub resting_ratio_required: f64,
    /// Required share of HR-low ticks in the confirmation span
    pub heart_rate_ratio_required: f64,
    /// Accumulator decay on a disqualifying tick (seconds)
    pub decay_seconds: f64,
    /// Credit factor for stationary ticks without low HR while resting
    pub stationary_only_weight: f64,
    /// Consecutive non-stationary ticks that end Resting or `LightSleep`
    pub awake_debounce_ticks: u32,
    /// Longest stay in Resting (seconds)
    pub resting_timeout_seconds: i64,
    /// Cap on credited time per tick (seconds)
    pub max_tick_credit_seconds: f64,
    /// History retained by the confirmation window (seconds)
    pub confirmation_capacity_seconds: i64,
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        Self::for_profile(&UserProfile::new(Uuid::nil(), AgeGroup::Adult))
    }
}

impl StateMachineConfig {
    /// Age-based entry durations plus the profile's calibrated confirmation parameters
    #[must_use]
    pub const fn for_profile(profile: &UserProfile) -> Self {
        Self {
            resting_entry_seconds: profile.age_group.resting_entry_seconds(),
            light_sleep_entry_seconds: profile.age_group.light_sleep_entry_seconds(),
            confirmation_duration_seconds: profile.min_duration_seconds,
            resting_ratio_required: profile.resting_ratio_threshold,
            heart_rate_ratio_required: confirmation::HEART_RATE_RATIO_REQUIRED,
            decay_seconds: state_machine::DECAY_SECS,
            stationary_only_weight: state_machine::STATIONARY_ONLY_WEIGHT,
            awake_debounce_ticks: state_machine::AWAKE_DEBOUNCE_TICKS,
            resting_timeout_seconds: state_machine::RESTING_TIMEOUT_SECS,
            max_tick_credit_seconds: state_machine::MAX_TICK_CREDIT_SECS,
            confirmation_capacity_seconds: confirmation::CAPACITY_SECS,
        }
    }

    // Safe: confirmation durations are bounded to minutes
    #[allow(clippy::cast_possible_truncation)]
    fn confirmation_span(&self) -> Duration {
        Duration::milliseconds((self.confirmation_duration_seconds * 1000.0).round() as i64)
    }
}

/// Signals evaluated by one tick, computed before the tick runs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickSignals {
    /// Tick time
    pub timestamp: DateTime<Utc>,
    /// Motion-stationary signal
    pub is_stationary: bool,
    /// Combined heart-rate-low signal
    pub is_heart_rate_low: bool,
    /// Current heart rate trend
    pub trend: f64,
}

/// What a tick changed
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickOutcome {
    /// Transition taken, if any
    pub transition: Option<StateTransition>,
    /// Set when this tick confirmed sleep for the first time since the last full wake
    pub sleep_detected: Option<DateTime<Utc>>,
    /// Confirmation gate result when evaluated from `LightSleep`
    pub confirmation: Option<ConfirmationDecision>,
}

/// Per-session sleep classifier
#[derive(Debug, Clone)]
pub struct SleepStateMachine {
    config: StateMachineConfig,
    state: SleepState,
    accumulated_seconds: f64,
    non_stationary_streak: u32,
    state_entered_at: Option<DateTime<Utc>>,
    last_tick: Option<DateTime<Utc>>,
    detected_sleep_time: Option<DateTime<Utc>>,
    confirmation: ConfirmationWindow,
}

impl SleepStateMachine {
    /// Machine in `Awake` with empty accumulators
    #[must_use]
    pub fn new(config: StateMachineConfig) -> Self {
        Self {
            state: SleepState::Awake,
            accumulated_seconds: 0.0,
            non_stationary_streak: 0,
            state_entered_at: None,
            last_tick: None,
            detected_sleep_time: None,
            confirmation: ConfirmationWindow::new(Duration::seconds(
                config.confirmation_capacity_seconds,
            )),
            config,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SleepState {
        self.state
    }

    /// Config in effect
    #[must_use]
    pub const fn config(&self) -> &StateMachineConfig {
        &self.config
    }

    /// Replace durations and ratios without touching state or accumulators
    pub fn set_config(&mut self, config: StateMachineConfig) {
        self.config = config;
    }

    /// Time sleep was last confirmed, cleared by a full regression to Awake
    #[must_use]
    pub const fn detected_sleep_time(&self) -> Option<DateTime<Utc>> {
        self.detected_sleep_time
    }

    /// Progress toward the next forward transition (seconds)
    #[must_use]
    pub const fn accumulated_seconds(&self) -> f64 {
        self.accumulated_seconds
    }

    /// When the current state was entered
    #[must_use]
    pub const fn state_entered_at(&self) -> Option<DateTime<Utc>> {
        self.state_entered_at
    }

    /// Confirmation buffer
    #[must_use]
    pub const fn confirmation_window(&self) -> &ConfirmationWindow {
        &self.confirmation
    }

    /// Back to a fresh `Awake` machine, keeping the config
    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }

    /// Evaluate one tick
    pub fn tick(&mut self, signals: TickSignals) -> TickOutcome {
        let now = signals.timestamp;
        let credit = self.credit_for(now);
        self.state_entered_at.get_or_insert(now);

        self.confirmation.push(ConfirmationSample {
            timestamp: now,
            is_heart_rate_below_threshold: signals.is_heart_rate_low,
            is_resting: signals.is_stationary,
        });

        debug!(
            state = %self.state,
            stationary = signals.is_stationary,
            heart_rate_low = signals.is_heart_rate_low,
            trend = signals.trend,
            accumulated = self.accumulated_seconds,
            "state machine tick"
        );

        let mut outcome = TickOutcome::default();
        let next = match self.state {
            SleepState::Awake => self.evaluate_awake(signals, credit),
            SleepState::Resting => self.evaluate_resting(signals, credit),
            SleepState::LightSleep => {
                let (next, decision) = self.evaluate_light_sleep(signals);
                outcome.confirmation = decision;
                next
            }
            SleepState::DeepSleep => Self::evaluate_deep_sleep(signals),
        };

        if let Some(new_state) = next {
            outcome.transition = Some(self.transition_to(new_state, now));
            if new_state == SleepState::DeepSleep && self.detected_sleep_time.is_none() {
                self.detected_sleep_time = Some(now);
                outcome.sleep_detected = Some(now);
                info!(detected_at = %now, "sleep confirmed");
            }
        }
        outcome
    }

    fn credit_for(&mut self, now: DateTime<Utc>) -> f64 {
        let credit = self.last_tick.map_or(state_machine::TICK_SECS, |prev| {
            let elapsed = (now - prev).num_milliseconds() as f64 / 1000.0;
            elapsed.clamp(0.0, self.config.max_tick_credit_seconds)
        });
        match self.last_tick {
            Some(prev) if prev >= now => {}
            _ => self.last_tick = Some(now),
        }
        credit
    }

    fn decay(&mut self) {
        self.accumulated_seconds = (self.accumulated_seconds - self.config.decay_seconds).max(0.0);
    }

    fn track_motion(&mut self, is_stationary: bool) -> bool {
        if is_stationary {
            self.non_stationary_streak = 0;
        } else {
            self.non_stationary_streak += 1;
        }
        self.non_stationary_streak >= self.config.awake_debounce_ticks
    }

    fn evaluate_awake(&mut self, signals: TickSignals, credit: f64) -> Option<SleepState> {
        if signals.is_stationary {
            self.accumulated_seconds += credit;
        } else {
            self.decay();
        }
        (self.accumulated_seconds >= self.config.resting_entry_seconds)
            .then_some(SleepState::Resting)
    }

    fn evaluate_resting(&mut self, signals: TickSignals, credit: f64) -> Option<SleepState> {
        if self.track_motion(signals.is_stationary) {
            return Some(SleepState::Awake);
        }

        let in_state = self
            .state_entered_at
            .map_or_else(Duration::zero, |entered| signals.timestamp - entered);
        if in_state >= Duration::seconds(self.config.resting_timeout_seconds) {
            debug!("resting timeout reached without progressing");
            return Some(SleepState::Awake);
        }

        match (signals.is_heart_rate_low, signals.is_stationary) {
            (true, true) => self.accumulated_seconds += credit,
            (false, true) => {
                self.accumulated_seconds += credit * self.config.stationary_only_weight;
            }
            _ => self.decay(),
        }
        (self.accumulated_seconds >= self.config.light_sleep_entry_seconds)
            .then_some(SleepState::LightSleep)
    }

    fn evaluate_light_sleep(
        &mut self,
        signals: TickSignals,
    ) -> (Option<SleepState>, Option<ConfirmationDecision>) {
        if self.track_motion(signals.is_stationary) {
            return (Some(SleepState::Resting), None);
        }

        let decision = self.confirmation.evaluate(
            self.config.confirmation_span(),
            self.config.heart_rate_ratio_required,
            self.config.resting_ratio_required,
        );
        let next = decision.is_confirmed().then_some(SleepState::DeepSleep);
        (next, Some(decision))
    }

    const fn evaluate_deep_sleep(signals: TickSignals) -> Option<SleepState> {
        match (signals.is_heart_rate_low, signals.is_stationary) {
            (true, true) => None,
            (false, false) => Some(SleepState::Awake),
            _ => Some(SleepState::LightSleep),
        }
    }

    fn transition_to(&mut self, new_state: SleepState, at: DateTime<Utc>) -> StateTransition {
        let transition = StateTransition {
            timestamp: at,
            old_state: self.state,
            new_state,
        };
        info!(from = %self.state, to = %new_state, at = %at, "sleep state transition");

        match (self.state, new_state) {
            (SleepState::DeepSleep, SleepState::Awake) => {
                self.confirmation.clear();
                self.detected_sleep_time = None;
            }
            // deep sleep must be re-confirmed over a full span of fresh ticks
            (SleepState::DeepSleep, SleepState::LightSleep) | (_, SleepState::Awake) => {
                self.confirmation.clear();
            }
            _ => {}
        }
        self.state = new_state;
        self.accumulated_seconds = 0.0;
        self.non_stationary_streak = 0;
        self.state_entered_at = Some(at);
        transition
    }
}
