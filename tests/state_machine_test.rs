// ABOUTME: Integration tests for the sleep state machine driven by randomized signal streams
// ABOUTME: Checks transition legality, awake debounce, confirmation gate, detection bookkeeping
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod helpers;

use chrono::{DateTime, Duration, Utc};
use helpers::synthetic_sessions::reference_time;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use sleepsense::config::DetectionConfig;
use sleepsense::intelligence::{SleepStateMachine, StateMachineConfig, TickSignals};
use sleepsense::models::{AgeGroup, SleepState, UserProfile};
use uuid::Uuid;

fn tick_at(secs: i64, is_stationary: bool, is_heart_rate_low: bool) -> TickSignals {
    TickSignals {
        timestamp: reference_time() + Duration::seconds(secs),
        is_stationary,
        is_heart_rate_low,
        trend: 0.0,
    }
}

fn is_legal(from: SleepState, to: SleepState) -> bool {
    matches!(
        (from, to),
        (SleepState::Awake, SleepState::Resting)
            | (SleepState::Resting, SleepState::Awake | SleepState::LightSleep)
            | (SleepState::LightSleep, SleepState::DeepSleep | SleepState::Resting)
            | (SleepState::DeepSleep, SleepState::LightSleep | SleepState::Awake)
    )
}

/// Mostly still and low-HR stream with bursts of restlessness
fn noisy_stream(rng: &mut ChaCha8Rng, seconds: i64) -> Vec<TickSignals> {
    let restless_probability = rng.gen_range(0.0..0.3);
    let high_hr_probability = rng.gen_range(0.0..0.3);
    (0..seconds)
        .map(|secs| {
            tick_at(
                secs,
                !rng.gen_bool(restless_probability),
                !rng.gen_bool(high_hr_probability),
            )
        })
        .collect()
}

#[test]
fn test_random_streams_only_take_legal_transitions() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for _ in 0..50 {
        let mut machine = SleepStateMachine::new(StateMachineConfig::default());
        for signals in noisy_stream(&mut rng, 1_200) {
            let before = machine.state();
            if let Some(transition) = machine.tick(signals).transition {
                assert_eq!(transition.old_state, before);
                assert!(
                    is_legal(transition.old_state, transition.new_state),
                    "illegal {} -> {}",
                    transition.old_state,
                    transition.new_state
                );
                assert_eq!(transition.timestamp, signals.timestamp);
            }
        }
    }
}

#[test]
fn test_debounced_exits_follow_three_restless_ticks() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let config = StateMachineConfig::default();
    for _ in 0..50 {
        let mut machine = SleepStateMachine::new(config);
        let mut restless_streak = 0_u32;
        for signals in noisy_stream(&mut rng, 1_200) {
            let entered = machine.state_entered_at();
            let outcome = machine.tick(signals);
            restless_streak = if signals.is_stationary { 0 } else { restless_streak + 1 };

            let Some(transition) = outcome.transition else {
                continue;
            };
            match (transition.old_state, transition.new_state) {
                (SleepState::LightSleep, SleepState::Resting) => {
                    assert!(restless_streak >= config.awake_debounce_ticks);
                }
                (SleepState::Resting, SleepState::Awake) => {
                    let timed_out = entered.is_some_and(|at| {
                        signals.timestamp - at >= Duration::seconds(config.resting_timeout_seconds)
                    });
                    assert!(restless_streak >= config.awake_debounce_ticks || timed_out);
                }
                _ => {}
            }
            // streak counting restarts in every new state
            restless_streak = 0;
        }
    }
}

#[test]
fn test_sleep_detected_once_per_wake_cycle() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    for _ in 0..30 {
        let mut machine = SleepStateMachine::new(StateMachineConfig::default());
        let mut detected_since_wake = 0;
        for signals in noisy_stream(&mut rng, 1_800) {
            let outcome = machine.tick(signals);
            if let Some(at) = outcome.sleep_detected {
                detected_since_wake += 1;
                assert_eq!(machine.state(), SleepState::DeepSleep);
                assert_eq!(machine.detected_sleep_time(), Some(at));
            }
            if let Some(transition) = outcome.transition {
                if transition.old_state == SleepState::DeepSleep
                    && transition.new_state == SleepState::Awake
                {
                    assert!(machine.detected_sleep_time().is_none());
                    detected_since_wake = 0;
                }
            }
            assert!(detected_since_wake <= 1);
        }
    }
}

#[test]
fn test_confirmation_needs_both_gates() {
    // stationary throughout, but heart rate only low on four of every five ticks
    let mut machine = SleepStateMachine::new(StateMachineConfig::default());
    let mut reached_light_sleep = false;
    for secs in 0..900 {
        machine.tick(tick_at(secs, true, secs % 5 != 0));
        reached_light_sleep |= machine.state() == SleepState::LightSleep;
        assert_ne!(machine.state(), SleepState::DeepSleep, "confirmed at +{secs}s");
    }
    assert!(reached_light_sleep);
}

#[test]
fn test_longer_calibrated_duration_delays_confirmation() {
    fn detection_offset(config: StateMachineConfig) -> i64 {
        let mut machine = SleepStateMachine::new(config);
        (0..1_000)
            .find_map(|secs| machine.tick(tick_at(secs, true, true)).sleep_detected)
            .map(|at: DateTime<Utc>| (at - reference_time()).num_seconds())
            .unwrap()
    }

    let detection = DetectionConfig::default();
    let adult = UserProfile::new(Uuid::new_v4(), AgeGroup::Adult);
    let mut calibrated = adult.clone();
    calibrated.min_duration_seconds = 300.0;

    let baseline = detection_offset(detection.state_machine_config(&adult));
    let delayed = detection_offset(detection.state_machine_config(&calibrated));
    assert_eq!(delayed - baseline, 120);
}

#[test]
fn test_age_groups_change_entry_durations() {
    fn resting_after(age_group: AgeGroup) -> i64 {
        let profile = UserProfile::new(Uuid::nil(), age_group);
        let mut machine = SleepStateMachine::new(StateMachineConfig::for_profile(&profile));
        (0..200)
            .find(|secs| machine.tick(tick_at(*secs, true, false)).transition.is_some())
            .unwrap()
    }

    assert!(resting_after(AgeGroup::Teen) < resting_after(AgeGroup::Adult));
    assert!(resting_after(AgeGroup::Adult) < resting_after(AgeGroup::Senior));
}
