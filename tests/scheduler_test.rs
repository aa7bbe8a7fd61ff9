// ABOUTME: Integration tests for the optimization scheduler over the in-memory store
// ABOUTME: Gate decisions, status streaming, per-user mutual exclusion, and failure atomicity
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use chrono::Duration;
use common::{create_test_services, create_test_user, TestServices};
use helpers::synthetic_sessions::{reference_time, SessionSpec, SyntheticSessions};
use sleepsense::errors::ErrorCode;
use sleepsense::models::{AdjustmentType, OptimizationStatus};
use sleepsense::optimization::{OptimizationHandle, ScheduleSkip, TriggerOutcome};
use uuid::Uuid;

const RESTING_HR: f64 = 60.0;

/// Mark first use at the reference time and record `count` finished nights
async fn seed_history(services: &TestServices, user_id: Uuid, count: i64) {
    services
        .profiles
        .mark_first_use(user_id, reference_time())
        .await
        .unwrap();
    let sessions = SyntheticSessions::new(21, user_id).nights(count, SessionSpec::default());
    for session in &sessions {
        services.profiles.record_completed_session(session).await.unwrap();
    }
}

fn started(outcome: TriggerOutcome) -> OptimizationHandle {
    match outcome {
        TriggerOutcome::Started(handle) => handle,
        other => panic!("expected a started run, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fresh_profile_is_not_triggered() {
    let services = create_test_services();
    let (user_id, _) = create_test_user(&services).await;

    let outcome = services
        .scheduler
        .check_and_optimize(user_id, RESTING_HR, false, reference_time())
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        TriggerOutcome::NotTriggered(ScheduleSkip::NoFirstUse)
    ));
    assert_eq!(services.scheduler.status(user_id), OptimizationStatus::Idle);
}

#[tokio::test]
async fn test_first_scheduled_update_after_a_week() {
    let services = create_test_services();
    let (user_id, _) = create_test_user(&services).await;
    seed_history(&services, user_id, 5).await;

    let early = services
        .scheduler
        .check_and_optimize(user_id, RESTING_HR, false, reference_time() + Duration::days(6))
        .await
        .unwrap();
    assert!(matches!(
        early,
        TriggerOutcome::NotTriggered(ScheduleSkip::FirstUpdateNotDue { sessions: 5, .. })
    ));

    let due = services
        .scheduler
        .check_and_optimize(user_id, RESTING_HR, false, reference_time() + Duration::days(7))
        .await
        .unwrap();
    let status = started(due).wait().await.unwrap();
    assert!(matches!(status, OptimizationStatus::Optimized(_)));

    let profile = services.profiles.profile(user_id).await.unwrap();
    assert_eq!(
        profile.last_model_update_date,
        Some(reference_time() + Duration::days(7))
    );
    assert_eq!(profile.new_sessions_since_update(), 0);
}

#[tokio::test]
async fn test_forced_run_streams_optimizing_then_optimized() {
    let services = create_test_services();
    let (user_id, before) = create_test_user(&services).await;
    seed_history(&services, user_id, 4).await;
    let mut statuses = services.scheduler.subscribe(user_id);
    assert_eq!(*statuses.borrow(), OptimizationStatus::Idle);

    let handle = started(
        services
            .scheduler
            .check_and_optimize(user_id, RESTING_HR, true, reference_time())
            .await
            .unwrap(),
    );
    assert_eq!(handle.user_id(), user_id);
    assert_eq!(*statuses.borrow_and_update(), OptimizationStatus::Optimizing);
    assert!(services.scheduler.is_optimizing(user_id));

    let status = handle.wait().await.unwrap();
    statuses.changed().await.unwrap();
    assert_eq!(*statuses.borrow(), status);
    assert!(!services.scheduler.is_optimizing(user_id));

    let OptimizationStatus::Optimized(result) = status else {
        panic!("expected optimized, got {status}");
    };
    assert!((result.previous_threshold - before.threshold_percentage).abs() < f64::EPSILON);
    assert!(result.new_threshold < result.previous_threshold);
    assert_eq!(result.adjustment_type, AdjustmentType::Decrease);
    assert_eq!(result.data_points_analyzed, 4 * SessionSpec::default().samples);

    let after = services.profiles.profile(user_id).await.unwrap();
    assert!((after.threshold_percentage - result.new_threshold).abs() < f64::EPSILON);
    assert!(after.is_within_bounds());
}

#[tokio::test]
async fn test_forced_run_with_too_few_sessions_fails() {
    let services = create_test_services();
    let (user_id, before) = create_test_user(&services).await;
    seed_history(&services, user_id, 2).await;

    let status = started(
        services
            .scheduler
            .check_and_optimize(user_id, RESTING_HR, true, reference_time())
            .await
            .unwrap(),
    )
    .wait()
    .await
    .unwrap();

    assert!(matches!(status, OptimizationStatus::Failed(_)));
    assert_eq!(services.scheduler.status(user_id), status);
    let after = services.profiles.profile(user_id).await.unwrap();
    assert!((after.threshold_percentage - before.threshold_percentage).abs() < f64::EPSILON);
    assert!(after.last_model_update_date.is_none());
}

#[tokio::test]
async fn test_second_trigger_is_rejected_while_running() {
    let services = create_test_services();
    let (user_id, _) = create_test_user(&services).await;
    seed_history(&services, user_id, 4).await;

    let first = services
        .scheduler
        .check_and_optimize(user_id, RESTING_HR, true, reference_time())
        .await
        .unwrap();
    let second = services
        .scheduler
        .check_and_optimize(user_id, RESTING_HR, true, reference_time())
        .await
        .unwrap();
    assert!(matches!(second, TriggerOutcome::AlreadyOptimizing));

    started(first).wait().await.unwrap();
    let third = services
        .scheduler
        .check_and_optimize(user_id, RESTING_HR, true, reference_time())
        .await
        .unwrap();
    started(third).wait().await.unwrap();
}

#[tokio::test]
async fn test_manual_offset_set_during_run_survives_commit() {
    let services = create_test_services();
    let (user_id, _) = create_test_user(&services).await;
    seed_history(&services, user_id, 4).await;

    let handle = started(
        services
            .scheduler
            .check_and_optimize(user_id, RESTING_HR, true, reference_time())
            .await
            .unwrap(),
    );
    services
        .profiles
        .set_manual_offset(user_id, 0.05)
        .await
        .unwrap();
    let status = handle.wait().await.unwrap();
    assert!(matches!(status, OptimizationStatus::Optimized(_)));

    let profile = services.profiles.profile(user_id).await.unwrap();
    assert!((profile.manual_adjustment_offset - 0.05).abs() < f64::EPSILON);
    assert!(
        (profile.adjusted_threshold_percentage() - (profile.threshold_percentage + 0.05)).abs()
            < 1e-9
    );
}

#[tokio::test]
async fn test_commit_failure_leaves_profile_untouched() {
    let services = create_test_services();
    let (user_id, _) = create_test_user(&services).await;
    seed_history(&services, user_id, 4).await;
    let before = services.profiles.profile(user_id).await.unwrap();

    services.store.fail_writes(true);
    let status = started(
        services
            .scheduler
            .check_and_optimize(user_id, RESTING_HR, true, reference_time())
            .await
            .unwrap(),
    )
    .wait()
    .await
    .unwrap();
    services.store.fail_writes(false);

    assert!(matches!(status, OptimizationStatus::Failed(_)));
    let after = services.profiles.profile(user_id).await.unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let services = create_test_services();
    let error = services
        .scheduler
        .check_and_optimize(Uuid::new_v4(), RESTING_HR, true, reference_time())
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::ResourceNotFound);
}
