// ABOUTME: Integration tests for the live sleep monitor and its timer-driven runner
// ABOUTME: Replays synthetic nights, checks event streams, and verifies sessions persist on stop
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use chrono::{Duration, Utc};
use common::{create_test_services, create_test_user, create_test_user_with_age};
use helpers::synthetic_sessions::reference_time;
use sleepsense::config::MonitorConfig;
use sleepsense::models::{AgeGroup, Sample, SleepState};
use sleepsense::monitoring::{run_monitor, MonitorEvent};
use sleepsense::sensors::ReplaySensor;
use sleepsense::simulation::{replay_night, NightShape, NightSimulator};
use sleepsense::storage::SleepStore;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::mpsc;
use tokio::time::sleep;

const RESTING_HR: f64 = 60.0;

fn short_night_shape() -> NightShape {
    NightShape {
        settle_secs: 300,
        onset_secs: 600,
        sleep_secs: 1_200,
        heart_rate_interval_secs: 5,
    }
}

#[tokio::test]
async fn test_normal_night_reaches_deep_sleep_once() {
    let services = create_test_services();
    let (user_id, _) = create_test_user(&services).await;
    let mut monitor = services.monitor(user_id).await;
    let mut events = monitor.subscribe();

    let night = NightSimulator::new(3, RESTING_HR)
        .with_shape(short_night_shape())
        .night(reference_time(), 0.0);
    let report = replay_night(&mut monitor, &night, RESTING_HR, &services.config.monitor)
        .await
        .unwrap();

    let first = report.transitions.first().unwrap();
    assert_eq!(first.old_state, SleepState::Awake);
    assert_eq!(first.new_state, SleepState::Resting);
    assert!(report
        .transitions
        .iter()
        .any(|t| t.new_state == SleepState::DeepSleep));

    let mut detections = Vec::new();
    loop {
        match events.try_recv() {
            Ok(MonitorEvent::SleepDetected {
                detected_sleep_time,
                session_id,
                ..
            }) => {
                assert_eq!(session_id, report.completed.session_id);
                detections.push(detected_sleep_time);
            }
            Ok(MonitorEvent::StateChanged { .. }) => {}
            Err(TryRecvError::Empty) => break,
            Err(other) => panic!("event stream failed: {other}"),
        }
    }
    assert_eq!(detections.len(), 1);

    let stored = services
        .store
        .get_session(report.completed.session_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_complete());
    assert_eq!(stored.detected_sleep_time, Some(detections[0]));
    assert!(stored.detected_sleep_time.unwrap() > night.start);
    assert!(stored.detected_sleep_time.unwrap() < night.end);
    assert!(!stored.heart_rate_samples.is_empty());
    assert_eq!(report.completed.profile.sleep_sessions_count, 1);
    assert!(monitor.session().is_none());
}

#[tokio::test]
async fn test_stop_mid_session_finalizes_and_persists() {
    let services = create_test_services();
    let (user_id, _) = create_test_user_with_age(&services, AgeGroup::Senior).await;
    let mut monitor = services.monitor(user_id).await;
    let start = reference_time();

    let session_id = monitor.start_session(start, Some(RESTING_HR)).await.unwrap();
    assert_eq!(monitor.snapshot().borrow().session_id, Some(session_id));
    for i in 1..=20 {
        let now = start + Duration::seconds(i);
        monitor.ingest_heart_rate(&[Sample::new(now, 66.0)]);
        monitor.ingest_motion(&[Sample::new(now, 0.2)]);
        monitor.tick(now).unwrap();
    }
    assert_eq!(monitor.state(), SleepState::Awake);

    let stopped_at = start + Duration::seconds(21);
    let completed = monitor.stop_session(stopped_at).await.unwrap();
    assert_eq!(completed.session_id, session_id);

    let stored = services.store.get_session(session_id).await.unwrap().unwrap();
    assert_eq!(stored.end_time, Some(stopped_at));
    assert_eq!(stored.heart_rate_samples.len(), 20);
    assert_eq!(stored.average_heart_rate, Some(66.0));
    assert!(stored.detected_sleep_time.is_none());

    let profile = services.profiles.profile(user_id).await.unwrap();
    assert_eq!(profile.sleep_sessions_count, 1);
    assert_eq!(profile.first_use_date, Some(start));
    assert!(monitor.snapshot().borrow().session_id.is_none());
    assert!(monitor.tick(stopped_at).is_err());
}

#[tokio::test]
async fn test_resting_heart_rate_is_clamped_and_defaulted() {
    let services = create_test_services();
    let (user_id, _) = create_test_user(&services).await;
    let mut monitor = services.monitor(user_id).await;

    monitor.start_session(reference_time(), Some(200.0)).await.unwrap();
    assert!((monitor.snapshot().borrow().threshold_bpm - 120.0 * 0.90).abs() < 1e-9);
    monitor.stop_session(reference_time()).await.unwrap();

    monitor.start_session(reference_time(), None).await.unwrap();
    let default_threshold = services.config.monitor.default_resting_heart_rate * 0.90;
    assert!((monitor.snapshot().borrow().threshold_bpm - default_threshold).abs() < 1e-9);
}

#[tokio::test]
async fn test_manual_offset_moves_live_threshold() {
    let services = create_test_services();
    let (user_id, _) = create_test_user(&services).await;
    let mut monitor = services.monitor(user_id).await;
    monitor.start_session(reference_time(), Some(RESTING_HR)).await.unwrap();

    let profile = services
        .profiles
        .set_manual_offset(user_id, -0.05)
        .await
        .unwrap();
    monitor.apply_profile(profile);
    assert!((monitor.snapshot().borrow().threshold_bpm - RESTING_HR * 0.85).abs() < 1e-9);
    assert!(monitor.session().is_some());
}

#[tokio::test]
async fn test_runner_finalizes_session_on_shutdown() {
    let services = create_test_services();
    let (user_id, _) = create_test_user(&services).await;
    let mut monitor = services.monitor(user_id).await;

    let first = Utc::now() + Duration::seconds(1);
    let heart_rate: Vec<Sample> = (0..30)
        .map(|i| Sample::new(first + Duration::milliseconds(i * 10), 58.0))
        .collect();
    let motion: Vec<Sample> = (0..30)
        .map(|i| Sample::new(first + Duration::milliseconds(i * 10), 0.01))
        .collect();
    let sensor = Arc::new(
        ReplaySensor::new(heart_rate, motion).with_resting_heart_rate(RESTING_HR),
    );

    let config = MonitorConfig {
        tick_interval_ms: 10,
        analysis_interval_secs: 1,
        trend_interval_secs: 1,
        ..services.config.monitor.clone()
    };
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        sleep(StdDuration::from_millis(100)).await;
        shutdown_tx.send(()).await.unwrap();
    });

    let completed = run_monitor(&mut monitor, sensor.clone(), sensor, &config, shutdown_rx)
        .await
        .unwrap();

    assert_eq!(completed.profile.sleep_sessions_count, 1);
    let stored = services
        .store
        .get_session(completed.session_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_complete());
    assert!(!stored.heart_rate_samples.is_empty());
    assert!(monitor.session().is_none());
}

#[tokio::test]
async fn test_runner_survives_offline_sensor() {
    let services = create_test_services();
    let (user_id, _) = create_test_user(&services).await;
    let mut monitor = services.monitor(user_id).await;

    let sensor = Arc::new(ReplaySensor::default());
    sensor.set_offline(true);
    let config = MonitorConfig {
        tick_interval_ms: 10,
        ..services.config.monitor.clone()
    };
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        sleep(StdDuration::from_millis(60)).await;
        shutdown_tx.send(()).await.unwrap();
    });

    let completed = run_monitor(&mut monitor, sensor.clone(), sensor, &config, shutdown_rx)
        .await
        .unwrap();
    let stored = services
        .store
        .get_session(completed.session_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.heart_rate_samples.is_empty());
    assert!(stored.average_heart_rate.is_none());
}
