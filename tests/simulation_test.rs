// ABOUTME: End-to-end test replaying two weeks of synthetic nights through detection/calibration
// ABOUTME: Feedback is recorded per night, then a forced optimization lowers the sleep threshold
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use chrono::Duration;
use common::{create_test_services, create_test_user, TestServices};
use helpers::synthetic_sessions::reference_time;
use sleepsense::models::{AdjustmentType, OptimizationStatus};
use sleepsense::optimization::TriggerOutcome;
use sleepsense::simulation::{replay_night, NightShape, NightSimulator, SimulatedNight};
use sleepsense::storage::SleepStore;
use uuid::Uuid;

const RESTING_HR: f64 = 60.0;

fn two_weeks() -> Vec<SimulatedNight> {
    let shape = NightShape {
        settle_secs: 300,
        onset_secs: 600,
        sleep_secs: 1_200,
        heart_rate_interval_secs: 5,
    };
    NightSimulator::new(42, RESTING_HR)
        .with_shape(shape)
        .history(reference_time(), 14)
}

/// Replay every night and record its feedback label
async fn replay_history(services: &TestServices, user_id: Uuid, nights: &[SimulatedNight]) {
    let mut monitor = services.monitor(user_id).await;
    for night in nights {
        let report = replay_night(&mut monitor, night, RESTING_HR, &services.config.monitor)
            .await
            .unwrap();
        if let Some(feedback) = night.feedback {
            services
                .profiles
                .record_feedback(user_id, report.completed.session_id, feedback)
                .await
                .unwrap();
        }
    }
}

#[tokio::test]
async fn test_two_weeks_then_forced_optimization_lowers_threshold() {
    let services = create_test_services();
    let (user_id, initial) = create_test_user(&services).await;
    let nights = two_weeks();
    replay_history(&services, user_id, &nights).await;

    let profile = services.profiles.profile(user_id).await.unwrap();
    assert_eq!(profile.sleep_sessions_count, 14);
    let labeled = nights.iter().filter(|n| n.feedback.is_some()).count();
    assert_eq!(profile.labeled_feedback_count() as usize, labeled);
    assert_eq!(profile.first_use_date, Some(nights[0].start));

    let mut statuses = services.scheduler.subscribe(user_id);
    let finished_at = nights.last().unwrap().end;
    let TriggerOutcome::Started(handle) = services
        .scheduler
        .check_and_optimize(user_id, RESTING_HR, true, finished_at)
        .await
        .unwrap()
    else {
        panic!("forced optimization did not start");
    };
    assert_eq!(*statuses.borrow_and_update(), OptimizationStatus::Optimizing);

    let status = handle.wait().await.unwrap();
    statuses.changed().await.unwrap();
    let OptimizationStatus::Optimized(result) = statuses.borrow().clone() else {
        panic!("expected optimized, got {status}");
    };

    assert!((result.previous_threshold - initial.threshold_percentage).abs() < f64::EPSILON);
    assert!(result.new_threshold < result.previous_threshold);
    assert_eq!(result.adjustment_type, AdjustmentType::Decrease);
    assert_eq!(result.timestamp, finished_at);

    let sessions = services.store.get_sessions(user_id).await.unwrap();
    let samples: usize = sessions.iter().map(|s| s.heart_rate_samples.len()).sum();
    assert_eq!(result.data_points_analyzed, samples);
    assert!(result.confidence_level > 0.9);

    let calibrated = services.profiles.profile(user_id).await.unwrap();
    assert!(calibrated.is_within_bounds());
    assert!((calibrated.threshold_percentage - result.new_threshold).abs() < f64::EPSILON);
    assert_eq!(calibrated.last_model_update_date, Some(finished_at));
    assert_eq!(calibrated.sleep_sessions_count, profile.sleep_sessions_count);
}

#[tokio::test]
async fn test_first_scheduled_update_fires_after_a_week_of_nights() {
    let services = create_test_services();
    let (user_id, _) = create_test_user(&services).await;
    let nights = two_weeks();
    replay_history(&services, user_id, &nights[..8]).await;

    let before_week = services
        .scheduler
        .check_and_optimize(user_id, RESTING_HR, false, nights[6].end)
        .await
        .unwrap();
    assert!(matches!(before_week, TriggerOutcome::NotTriggered(_)));

    let after_week = nights[0].start + Duration::days(7);
    let TriggerOutcome::Started(handle) = services
        .scheduler
        .check_and_optimize(user_id, RESTING_HR, false, after_week)
        .await
        .unwrap()
    else {
        panic!("scheduled optimization did not start");
    };
    assert!(matches!(
        handle.wait().await.unwrap(),
        OptimizationStatus::Optimized(_)
    ));

    let again = services
        .scheduler
        .check_and_optimize(user_id, RESTING_HR, false, after_week + Duration::days(1))
        .await
        .unwrap();
    assert!(matches!(again, TriggerOutcome::NotTriggered(_)));
}
