// ABOUTME: Timer-driven monitor loop polling sensors and driving evaluation and trend ticks
// ABOUTME: Finalizes the session when the shutdown signal arrives
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

use super::SleepMonitor;
use crate::config::MonitorConfig;
use crate::errors::AppResult;
use crate::logging::AppLogger;
use crate::profile::CompletedSession;
use crate::sensors::{HeartRateService, MotionService};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Drive `monitor` until `shutdown_rx` fires or closes, then finalize the session
///
/// Each evaluation tick polls both sensors, ingests what arrived, and only
/// then evaluates the state machine. Sensor failures are logged and the tick
/// proceeds with whatever signals are already known.
///
/// # Errors
///
/// Returns an error if the session cannot be started or finalized
pub async fn run_monitor(
    monitor: &mut SleepMonitor,
    heart_rate: Arc<dyn HeartRateService>,
    motion: Arc<dyn MotionService>,
    config: &MonitorConfig,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> AppResult<CompletedSession> {
    let user_id = monitor.user_id();
    let resting_heart_rate = match heart_rate.resting_heart_rate().await {
        Ok(bpm) => bpm,
        Err(e) => {
            AppLogger::log_sensor_failure(user_id, "resting_heart_rate", &e);
            None
        }
    };

    let started_at = Utc::now();
    let session_id = monitor.start_session(started_at, resting_heart_rate).await?;
    info!(user.id = %user_id, session.id = %session_id, "Monitor loop started");

    let mut heart_rate_cursor: DateTime<Utc> = started_at;
    let mut motion_cursor: DateTime<Utc> = started_at;

    let mut evaluation = interval(config.tick_interval());
    let mut analysis = interval(config.analysis_interval());
    let mut trend = interval(config.trend_interval());
    for timer in [&mut evaluation, &mut analysis, &mut trend] {
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    }

    loop {
        tokio::select! {
            _ = evaluation.tick() => {
                match heart_rate.poll_heart_rate(heart_rate_cursor).await {
                    Ok(batch) => {
                        if let Some(last) = batch.last() {
                            heart_rate_cursor = last.timestamp;
                        }
                        monitor.ingest_heart_rate(&batch);
                    }
                    Err(e) => AppLogger::log_sensor_failure(user_id, "heart_rate", &e),
                }
                match motion.poll_motion(motion_cursor).await {
                    Ok(batch) => {
                        if let Some(last) = batch.last() {
                            motion_cursor = last.timestamp;
                        }
                        monitor.ingest_motion(&batch);
                    }
                    Err(e) => AppLogger::log_sensor_failure(user_id, "motion", &e),
                }
                monitor.tick(Utc::now())?;
            }
            _ = analysis.tick() => {
                monitor.analyze(Utc::now());
            }
            _ = trend.tick() => {
                monitor.refresh_trend(Utc::now());
            }
            _ = shutdown_rx.recv() => {
                debug!(user.id = %user_id, "Monitor loop received shutdown signal");
                break;
            }
        }
    }

    monitor.stop_session(Utc::now()).await
}
