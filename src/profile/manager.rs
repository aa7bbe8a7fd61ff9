// ABOUTME: Single-writer profile manager serializing every profile mutation per user
// ABOUTME: Tracks heart rate anomalies across sessions and persists before returning updates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

//! Profile mutation arbitration
//!
//! A profile is changed from two directions: user settings (manual offset,
//! feedback) and optimizer commits. Each mutation takes the user's lock,
//! loads a fresh copy, touches only its own fields and saves before the
//! updated profile is returned. A failed save leaves the stored profile
//! authoritative.

use crate::errors::{AppError, AppResult};
use crate::intelligence::{AnomalyClassification, AnomalyDecisionMode, AnomalyTracker};
use crate::logging::AppLogger;
use crate::models::{AgeGroup, ProfileCalibration, SleepFeedback, SleepSession, UserProfile};
use crate::storage::SleepStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sleepsense_core::constants::detection::anomaly;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of folding a finished session into its owner's profile
#[derive(Debug, Clone)]
pub struct CompletedSession {
    /// Stored session id
    pub session_id: Uuid,
    /// Profile as saved
    pub profile: UserProfile,
    /// Anomaly classification after this session, under the configured mode
    pub anomaly: AnomalyClassification,
    /// Severity recorded for this session (0 when no baseline existed)
    pub anomaly_severity: f64,
}

/// Serializes profile read-modify-write per user
pub struct ProfileManager {
    store: Arc<dyn SleepStore>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    anomalies: DashMap<Uuid, AnomalyTracker>,
    anomaly_mode: AnomalyDecisionMode,
}

impl ProfileManager {
    /// Create a manager over a store
    #[must_use]
    pub fn new(store: Arc<dyn SleepStore>, anomaly_mode: AnomalyDecisionMode) -> Self {
        Self {
            store,
            locks: DashMap::new(),
            anomalies: DashMap::new(),
            anomaly_mode,
        }
    }

    /// Underlying store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SleepStore> {
        &self.store
    }

    /// Decision mode applied to every user's anomaly tracker
    #[must_use]
    pub const fn anomaly_mode(&self) -> AnomalyDecisionMode {
        self.anomaly_mode
    }

    fn user_lock(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(user_id).or_default().clone()
    }

    async fn load(&self, user_id: Uuid) -> AppResult<UserProfile> {
        match self.store.get_profile(user_id).await {
            Ok(Some(profile)) => Ok(profile),
            Ok(None) => Err(AppError::not_found(format!("profile {user_id}"))
                .with_user_id(user_id)),
            Err(e) => {
                AppLogger::log_persistence_failure(user_id, "get_profile", &e);
                Err(e)
            }
        }
    }

    async fn save(&self, profile: &UserProfile) -> AppResult<()> {
        self.store.save_profile(profile).await.inspect_err(|e| {
            AppLogger::log_persistence_failure(profile.user_id, "save_profile", e);
        })
    }

    /// Lock, load, apply `change`, save, return the saved profile
    async fn mutate<F>(&self, user_id: Uuid, change: F) -> AppResult<UserProfile>
    where
        F: FnOnce(&mut UserProfile) + Send,
    {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let mut profile = self.load(user_id).await?;
        change(&mut profile);
        self.save(&profile).await?;
        Ok(profile)
    }

    /// Return the stored profile, creating one with age-group defaults if absent
    ///
    /// # Errors
    ///
    /// Returns a storage error if the profile cannot be read or the new profile cannot be saved
    pub async fn load_or_create(
        &self,
        user_id: Uuid,
        age_group: AgeGroup,
    ) -> AppResult<UserProfile> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        if let Some(profile) = self.store.get_profile(user_id).await.inspect_err(|e| {
            AppLogger::log_persistence_failure(user_id, "get_profile", e);
        })? {
            return Ok(profile);
        }

        let profile = UserProfile::new(user_id, age_group);
        self.save(&profile).await?;
        info!(user.id = %user_id, age_group = ?age_group, "Created user profile");
        Ok(profile)
    }

    /// Current stored profile
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for unknown users or a storage error
    pub async fn profile(&self, user_id: Uuid) -> AppResult<UserProfile> {
        self.load(user_id).await
    }

    /// Record the first monitoring use; later calls leave the date unchanged
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for unknown users or a storage error
    pub async fn mark_first_use(&self, user_id: Uuid, at: DateTime<Utc>) -> AppResult<UserProfile> {
        self.mutate(user_id, |profile| profile.mark_first_use(at)).await
    }

    /// Set the manual threshold offset, clamped to its limit. Touches only the offset.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a non-finite offset, `ResourceNotFound`
    /// for unknown users, or a storage error
    pub async fn set_manual_offset(&self, user_id: Uuid, offset: f64) -> AppResult<UserProfile> {
        if !offset.is_finite() {
            return Err(AppError::invalid_input("manual offset must be finite")
                .with_user_id(user_id));
        }
        self.mutate(user_id, |profile| profile.set_manual_offset(offset))
            .await
    }

    /// Commit an optimizer calibration. The manual offset and counters are untouched.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for unknown users or a storage error
    pub async fn apply_calibration(
        &self,
        user_id: Uuid,
        calibration: &ProfileCalibration,
        at: DateTime<Utc>,
    ) -> AppResult<UserProfile> {
        let profile = self
            .mutate(user_id, |profile| profile.apply_calibration(calibration, at))
            .await?;
        info!(
            user.id = %user_id,
            threshold = profile.threshold_percentage,
            min_duration_secs = profile.min_duration_seconds,
            resting_ratio = profile.resting_ratio_threshold,
            "Applied profile calibration"
        );
        Ok(profile)
    }

    /// Persist a finalized session and fold its statistics into the profile
    ///
    /// The session's mean heart rate is scored against the profile's average
    /// sleep heart rate before the average absorbs it. When anomaly decisions
    /// are enabled and the cumulative score calls for it, derived sleep
    /// statistics are rebuilt starting from this session.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an unfinished session, `ResourceNotFound`
    /// for unknown users, or a storage error
    pub async fn record_completed_session(
        &self,
        session: &SleepSession,
    ) -> AppResult<CompletedSession> {
        let user_id = session.user_id;
        let Some(ended_at) = session.end_time else {
            return Err(AppError::invalid_input("session has not been finalized")
                .with_user_id(user_id)
                .with_resource_id(session.id.to_string()));
        };

        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let mut profile = self.load(user_id).await?;
        let mut tracker = self
            .anomalies
            .get(&user_id)
            .map_or_else(|| AnomalyTracker::new(self.anomaly_mode), |t| t.clone());

        let severity = match (session.average_heart_rate, profile.average_sleep_hr) {
            (Some(average), Some(baseline)) if baseline > 0.0 => {
                let deviation_percent = ((average - baseline) / baseline * 100.0).abs();
                deviation_percent / anomaly::DEVIATION_PERCENT_PER_POINT
            }
            _ => 0.0,
        };
        tracker.record_anomaly(severity, ended_at);
        let classification = tracker.classification(ended_at);

        if classification == AnomalyClassification::RequiresBaselineReset {
            warn!(
                user.id = %user_id,
                score = tracker.effective_score(ended_at),
                "Heart rate anomalies require a baseline reset"
            );
            profile.reset_baseline();
            tracker.clear();
        }
        profile.record_completed_session(session.average_heart_rate, session.minimum_heart_rate);

        self.store.save_session(session).await.inspect_err(|e| {
            AppLogger::log_persistence_failure(user_id, "save_session", e);
        })?;
        self.save(&profile).await?;
        self.anomalies.insert(user_id, tracker);

        Ok(CompletedSession {
            session_id: session.id,
            profile,
            anomaly: classification,
            anomaly_severity: severity,
        })
    }

    /// Attach a feedback label to a stored session and count it on the profile
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the session does not exist or belongs
    /// to another user, or a storage error
    pub async fn record_feedback(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        feedback: SleepFeedback,
    ) -> AppResult<UserProfile> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let mut session = self
            .store
            .get_session(session_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| {
                AppError::not_found(format!("session {session_id}")).with_user_id(user_id)
            })?;
        let mut profile = self.load(user_id).await?;

        session.feedback = Some(feedback);
        profile.record_feedback(feedback);

        self.store.save_session(&session).await.inspect_err(|e| {
            AppLogger::log_persistence_failure(user_id, "save_session", e);
        })?;
        self.save(&profile).await?;
        info!(
            user.id = %user_id,
            session.id = %session_id,
            feedback = %feedback,
            "Recorded session feedback"
        );
        Ok(profile)
    }

    /// Anomaly classification surfaced for a user at `now`
    #[must_use]
    pub fn anomaly_classification(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AnomalyClassification {
        self.anomalies
            .get(&user_id)
            .map_or(AnomalyClassification::None, |t| t.classification(now))
    }

    /// Raw decayed anomaly score, independent of the decision mode
    #[must_use]
    pub fn anomaly_score(&self, user_id: Uuid, now: DateTime<Utc>) -> f64 {
        self.anomalies
            .get(&user_id)
            .map_or(0.0, |t| t.cumulative_score_at(now))
    }
}
