// ABOUTME: Per-user sleep monitor running the sensor to signal to state machine pipeline
// ABOUTME: Owns the active session, publishes transitions, and finalizes sessions on stop
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

use super::{MonitorEvent, MonitorSnapshot};
use crate::config::SleepSenseConfig;
use crate::constants::bounds::{RESTING_HEART_RATE_MAX, RESTING_HEART_RATE_MIN};
use crate::errors::{AppError, AppResult};
use crate::intelligence::{
    AdaptiveThreshold, HeartRateAnalyzer, HeartRateSignals, SleepStateMachine, SlidingWindow,
    TickOutcome, TickSignals,
};
use crate::logging::AppLogger;
use crate::models::{Sample, SleepSession, SleepState, UserProfile};
use crate::profile::{CompletedSession, ProfileManager};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};
use uuid::Uuid;

/// Live classifier for one user
///
/// Methods take `&mut self`; a monitor is owned by exactly one driver (the
/// runner task or a test). Each [`tick`](Self::tick) reads the signals
/// produced by the ingest calls that preceded it.
pub struct SleepMonitor {
    user_id: Uuid,
    config: SleepSenseConfig,
    profiles: Arc<ProfileManager>,
    profile: UserProfile,
    analyzer: HeartRateAnalyzer,
    motion_window: SlidingWindow,
    motion_threshold: AdaptiveThreshold,
    machine: SleepStateMachine,
    session: Option<SleepSession>,
    last_signals: Option<HeartRateSignals>,
    is_stationary: bool,
    events: broadcast::Sender<MonitorEvent>,
    snapshot: watch::Sender<MonitorSnapshot>,
}

impl SleepMonitor {
    /// Monitor for `profile`'s owner; idle until [`start_session`](Self::start_session)
    #[must_use]
    pub fn new(
        profile: UserProfile,
        profiles: Arc<ProfileManager>,
        config: SleepSenseConfig,
    ) -> Self {
        let analyzer = HeartRateAnalyzer::new(
            config.detection.heart_rate,
            config.monitor.default_resting_heart_rate,
            profile.adjusted_threshold_percentage(),
        );
        let machine = SleepStateMachine::new(config.detection.state_machine_config(&profile));
        let motion_threshold = AdaptiveThreshold::new(config.detection.motion_threshold);
        let (events, _) = broadcast::channel(config.monitor.event_channel_capacity.max(1));
        let (snapshot, _) = watch::channel(MonitorSnapshot {
            threshold_bpm: analyzer.threshold_bpm(),
            motion_threshold: motion_threshold.current(),
            ..MonitorSnapshot::default()
        });

        Self {
            user_id: profile.user_id,
            motion_window: SlidingWindow::new(Duration::seconds(
                config.detection.motion_window_secs,
            )),
            config,
            profiles,
            profile,
            analyzer,
            motion_threshold,
            machine,
            session: None,
            last_signals: None,
            is_stationary: false,
            events,
            snapshot,
        }
    }

    /// Monitored user
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SleepState {
        self.machine.state()
    }

    /// Profile the detectors are calibrated from
    #[must_use]
    pub const fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Active session
    #[must_use]
    pub const fn session(&self) -> Option<&SleepSession> {
        self.session.as_ref()
    }

    /// State change and sleep detection stream
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Latest query snapshot
    #[must_use]
    pub fn snapshot(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshot.subscribe()
    }

    /// Open a session and reset every detector
    ///
    /// `resting_heart_rate` comes from the sensor provider; when absent the
    /// configured default is used. Values are kept inside the plausible
    /// resting range.
    ///
    /// # Errors
    ///
    /// Returns `OperationInProgress` if a session is already active, or a
    /// storage error if the first-use date cannot be recorded
    pub async fn start_session(
        &mut self,
        now: DateTime<Utc>,
        resting_heart_rate: Option<f64>,
    ) -> AppResult<Uuid> {
        if let Some(active) = &self.session {
            return Err(AppError::operation_in_progress("sleep session")
                .with_user_id(self.user_id)
                .with_resource_id(active.id.to_string()));
        }

        self.profile = self.profiles.mark_first_use(self.user_id, now).await?;

        let resting = resting_heart_rate
            .filter(|bpm| bpm.is_finite())
            .unwrap_or(self.config.monitor.default_resting_heart_rate)
            .clamp(RESTING_HEART_RATE_MIN, RESTING_HEART_RATE_MAX);
        self.analyzer.reset();
        self.analyzer
            .set_calibration(resting, self.profile.adjusted_threshold_percentage());
        self.machine =
            SleepStateMachine::new(self.config.detection.state_machine_config(&self.profile));
        self.motion_window.clear();
        self.motion_threshold.reset();
        self.last_signals = None;
        self.is_stationary = false;

        let session = SleepSession::new(self.user_id, now);
        let session_id = session.id;
        self.session = Some(session);
        AppLogger::log_session_event(self.user_id, session_id, "started");
        self.publish_snapshot(now);
        Ok(session_id)
    }

    /// Median-smooth a heart rate batch and append the result to the session
    pub fn ingest_heart_rate(&mut self, batch: &[Sample]) -> Option<Sample> {
        let smoothed = self.analyzer.ingest_batch(batch)?;
        if let Some(session) = self.session.as_mut() {
            session.append_sample(smoothed);
        }
        Some(smoothed)
    }

    /// Feed motion samples into the stationary window
    pub fn ingest_motion(&mut self, batch: &[Sample]) {
        for sample in batch.iter().filter(|s| s.value.is_finite()) {
            self.motion_window.add(sample.value, sample.timestamp);
        }
    }

    /// One evaluation tick: motion signal, heart rate signal, state machine, events
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when no session is active
    pub fn tick(&mut self, now: DateTime<Utc>) -> AppResult<TickOutcome> {
        let Some(session_id) = self.session.as_ref().map(|s| s.id) else {
            return Err(AppError::invalid_input("no active sleep session")
                .with_user_id(self.user_id));
        };

        self.motion_window.evict_expired(now);
        self.is_stationary = !self.motion_window.is_empty()
            && self
                .motion_window
                .stationary_ratio(self.motion_threshold.current())
                >= self.config.detection.stationary_fraction;

        let signals = self.analyzer.signals(now);
        self.last_signals = Some(signals);

        let outcome = self.machine.tick(TickSignals {
            timestamp: now,
            is_stationary: self.is_stationary,
            is_heart_rate_low: signals.is_heart_rate_low,
            trend: signals.trend,
        });

        if let Some(transition) = outcome.transition {
            info!(
                user.id = %self.user_id,
                session.id = %session_id,
                from = %transition.old_state,
                to = %transition.new_state,
                "Sleep state changed"
            );
            self.emit(MonitorEvent::StateChanged {
                user_id: self.user_id,
                session_id,
                transition,
            });
        }

        if let Some(detected_at) = outcome.sleep_detected {
            let first_in_session = self
                .session
                .as_mut()
                .is_some_and(|session| session.mark_sleep_detected(detected_at));
            if first_in_session {
                AppLogger::log_session_event(self.user_id, session_id, "sleep_detected");
                self.emit(MonitorEvent::SleepDetected {
                    user_id: self.user_id,
                    session_id,
                    detected_sleep_time: detected_at,
                });
            }
        }

        self.publish_snapshot(now);
        Ok(outcome)
    }

    /// Periodic analysis: recalibrate the motion threshold from the current window
    pub fn analyze(&mut self, now: DateTime<Utc>) -> bool {
        let updated = self
            .motion_threshold
            .update(&self.motion_window.values(), now);
        if updated {
            debug!(
                user.id = %self.user_id,
                threshold = self.motion_threshold.current(),
                samples = self.motion_window.len(),
                "Motion threshold recalibrated"
            );
            self.publish_snapshot(now);
        }
        updated
    }

    /// Periodic trend recomputation over the smoothed heart rate history
    pub fn refresh_trend(&mut self, now: DateTime<Utc>) -> f64 {
        let trend = self.analyzer.refresh_trend(now);
        debug!(user.id = %self.user_id, trend, "Heart rate trend refreshed");
        self.publish_snapshot(now);
        trend
    }

    /// Recalibrate detectors from an updated profile without resetting state
    pub fn apply_profile(&mut self, profile: UserProfile) {
        self.analyzer.set_calibration(
            self.analyzer.resting_heart_rate(),
            profile.adjusted_threshold_percentage(),
        );
        self.machine
            .set_config(self.config.detection.state_machine_config(&profile));
        self.profile = profile;
        let now = self
            .snapshot
            .borrow()
            .updated_at
            .unwrap_or_else(Utc::now);
        self.publish_snapshot(now);
    }

    /// Finalize and persist the active session, then fold it into the profile
    ///
    /// Detector state is discarded even when persistence fails; the stored
    /// profile then stays as it was.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when no session is active, or the profile
    /// manager's error when the session cannot be recorded
    pub async fn stop_session(&mut self, now: DateTime<Utc>) -> AppResult<CompletedSession> {
        let Some(mut session) = self.session.take() else {
            return Err(AppError::invalid_input("no active sleep session")
                .with_user_id(self.user_id));
        };
        session.finalize(now);
        AppLogger::log_session_event(self.user_id, session.id, "stopped");

        self.machine.reset();
        self.motion_window.clear();
        self.last_signals = None;
        self.is_stationary = false;
        self.publish_snapshot(now);

        let completed = self.profiles.record_completed_session(&session).await?;
        self.apply_profile(completed.profile.clone());
        Ok(completed)
    }

    fn emit(&self, event: MonitorEvent) {
        // Sending only fails when nobody is subscribed
        if self.events.send(event).is_err() {
            debug!(user.id = %self.user_id, "No monitor event subscribers");
        }
    }

    fn publish_snapshot(&self, now: DateTime<Utc>) {
        let signals = self.last_signals;
        let snapshot = MonitorSnapshot {
            state: self.machine.state(),
            session_id: self.session.as_ref().map(|s| s.id),
            smoothed_heart_rate: self.analyzer.current_heart_rate(),
            threshold_bpm: self.analyzer.threshold_bpm(),
            trend: self.analyzer.trend(),
            is_stationary: self.is_stationary,
            is_heart_rate_low: signals.is_some_and(|s| s.is_heart_rate_low),
            motion_threshold: self.motion_threshold.current(),
            detected_sleep_time: self.session.as_ref().and_then(|s| s.detected_sleep_time),
            sleep_confirmed_at: self.machine.detected_sleep_time(),
            updated_at: Some(now),
        };
        self.snapshot.send_replace(snapshot);
    }
}
