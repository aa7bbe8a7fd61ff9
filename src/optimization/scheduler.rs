// ABOUTME: Optimization scheduler deciding when to recalibrate and running the optimizer off-thread
// ABOUTME: Publishes per-user status transitions and rejects overlapping runs for the same user
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

//! Optimization scheduling
//!
//! [`evaluate_schedule`] is the pure gate. [`OptimizationScheduler`] applies
//! it, enforces one run per user at a time, runs the statistical pass on the
//! blocking pool, and commits through the [`ProfileManager`] so the commit
//! is serialized with every other profile mutation.

use crate::config::SchedulerConfig;
use crate::errors::{AppError, AppResult};
use crate::intelligence::ProfileOptimizer;
use crate::logging::AppLogger;
use crate::models::{OptimizationStatus, SleepSession, UserProfile};
use crate::profile::ProfileManager;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{self, JoinHandle};
use tracing::warn;
use uuid::Uuid;

/// Why the schedule gate declined to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleSkip {
    /// Monitoring has never been used
    NoFirstUse,
    /// Not enough completed sessions yet
    TooFewSessions {
        /// Completed sessions
        sessions: u32,
        /// Sessions required
        required: u32,
    },
    /// Never optimized and the first-update requirements are not met
    FirstUpdateNotDue {
        /// Whole days since first use
        days_since_first_use: i64,
        /// Completed sessions
        sessions: u32,
    },
    /// Optimized before and neither refresh rule is met
    RefreshNotDue {
        /// Whole days since the last commit
        days_since_update: i64,
        /// Sessions completed since the last commit
        new_sessions: u32,
    },
}

impl fmt::Display for ScheduleSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFirstUse => f.write_str("monitoring has not been used yet"),
            Self::TooFewSessions { sessions, required } => {
                write!(f, "{sessions} sessions recorded, {required} required")
            }
            Self::FirstUpdateNotDue {
                days_since_first_use,
                sessions,
            } => write!(
                f,
                "first update not due ({days_since_first_use} days, {sessions} sessions)"
            ),
            Self::RefreshNotDue {
                days_since_update,
                new_sessions,
            } => write!(
                f,
                "refresh not due ({days_since_update} days, {new_sessions} new sessions)"
            ),
        }
    }
}

/// Decide whether an unforced optimization is due for `profile` at `now`
///
/// # Errors
///
/// Returns the [`ScheduleSkip`] reason when the run is not due
pub fn evaluate_schedule(
    config: &SchedulerConfig,
    profile: &UserProfile,
    now: DateTime<Utc>,
) -> Result<(), ScheduleSkip> {
    let Some(first_use) = profile.first_use_date else {
        return Err(ScheduleSkip::NoFirstUse);
    };
    let sessions = profile.sleep_sessions_count;
    if sessions < config.min_sessions {
        return Err(ScheduleSkip::TooFewSessions {
            sessions,
            required: config.min_sessions,
        });
    }

    match profile.last_model_update_date {
        None => {
            let days_since_first_use = (now - first_use).num_days();
            if days_since_first_use >= config.first_update_min_days
                && sessions >= config.first_update_min_sessions
            {
                Ok(())
            } else {
                Err(ScheduleSkip::FirstUpdateNotDue {
                    days_since_first_use,
                    sessions,
                })
            }
        }
        Some(last_update) => {
            let days_since_update = (now - last_update).num_days();
            let new_sessions = profile.new_sessions_since_update();
            let refresh_due = days_since_update >= config.refresh_interval_days;
            let early_refresh_due = new_sessions >= config.early_refresh_new_sessions
                && days_since_update >= config.early_refresh_min_days;
            if refresh_due || early_refresh_due {
                Ok(())
            } else {
                Err(ScheduleSkip::RefreshNotDue {
                    days_since_update,
                    new_sessions,
                })
            }
        }
    }
}

/// Result of a trigger request
#[derive(Debug)]
pub enum TriggerOutcome {
    /// The schedule gate declined
    NotTriggered(ScheduleSkip),
    /// A run for this user is already in flight
    AlreadyOptimizing,
    /// A run was started
    Started(OptimizationHandle),
}

/// Handle to a running optimization
#[derive(Debug)]
pub struct OptimizationHandle {
    user_id: Uuid,
    task: JoinHandle<OptimizationStatus>,
}

impl OptimizationHandle {
    /// User being optimized
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Wait for the run to finish and return its terminal status
    ///
    /// # Errors
    ///
    /// Returns an internal error if the run task panicked or was cancelled
    pub async fn wait(self) -> AppResult<OptimizationStatus> {
        self.task.await.map_err(|e| {
            AppError::internal(format!("optimization task failed: {e}")).with_user_id(self.user_id)
        })
    }
}

struct SchedulerInner {
    config: SchedulerConfig,
    profiles: Arc<ProfileManager>,
    statuses: DashMap<Uuid, watch::Sender<OptimizationStatus>>,
    in_flight: DashSet<Uuid>,
}

impl SchedulerInner {
    fn publish(&self, user_id: Uuid, status: OptimizationStatus) {
        self.statuses
            .entry(user_id)
            .or_insert_with(|| watch::channel(OptimizationStatus::Idle).0)
            .send_replace(status);
    }
}

/// Releases the per-user in-flight slot on every exit path
struct InFlightGuard {
    inner: Arc<SchedulerInner>,
    user_id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.remove(&self.user_id);
    }
}

/// Gates and runs profile optimizations
#[derive(Clone)]
pub struct OptimizationScheduler {
    inner: Arc<SchedulerInner>,
}

impl OptimizationScheduler {
    /// Scheduler committing through `profiles`
    #[must_use]
    pub fn new(config: SchedulerConfig, profiles: Arc<ProfileManager>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                profiles,
                statuses: DashMap::new(),
                in_flight: DashSet::new(),
            }),
        }
    }

    /// Gate configuration
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Status stream for `user_id`, starting at the current status
    #[must_use]
    pub fn subscribe(&self, user_id: Uuid) -> watch::Receiver<OptimizationStatus> {
        self.inner
            .statuses
            .entry(user_id)
            .or_insert_with(|| watch::channel(OptimizationStatus::Idle).0)
            .subscribe()
    }

    /// Current status for `user_id`
    #[must_use]
    pub fn status(&self, user_id: Uuid) -> OptimizationStatus {
        self.inner
            .statuses
            .get(&user_id)
            .map_or(OptimizationStatus::Idle, |tx| tx.borrow().clone())
    }

    /// Whether a run for `user_id` is in flight
    #[must_use]
    pub fn is_optimizing(&self, user_id: Uuid) -> bool {
        self.inner.in_flight.contains(&user_id)
    }

    /// Start an optimization when due (or when `force` is set)
    ///
    /// A second request while one is running is rejected, never queued.
    /// Insufficient session history, optimizer errors and commit failures
    /// are reported through the status stream as `Failed`.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` for unknown users or a storage error when
    /// the profile cannot be read
    pub async fn check_and_optimize(
        &self,
        user_id: Uuid,
        resting_heart_rate: f64,
        force: bool,
        now: DateTime<Utc>,
    ) -> AppResult<TriggerOutcome> {
        let profile = self.inner.profiles.profile(user_id).await?;

        if !force {
            if let Err(skip) = evaluate_schedule(&self.inner.config, &profile, now) {
                AppLogger::log_schedule_skip(user_id, &skip.to_string());
                return Ok(TriggerOutcome::NotTriggered(skip));
            }
        }

        if !self.inner.in_flight.insert(user_id) {
            AppLogger::log_schedule_skip(user_id, "optimization already in progress");
            return Ok(TriggerOutcome::AlreadyOptimizing);
        }
        let guard = InFlightGuard {
            inner: Arc::clone(&self.inner),
            user_id,
        };

        self.inner.publish(user_id, OptimizationStatus::Optimizing);
        AppLogger::log_optimization_event(
            user_id,
            "started",
            if force { "forced" } else { "scheduled" },
        );

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let status = match Self::run(&inner, profile, resting_heart_rate, now).await {
                Ok(status) => status,
                Err(e) => {
                    AppLogger::log_optimization_event(user_id, "failed", &e.to_string());
                    OptimizationStatus::Failed(e.to_string())
                }
            };
            inner.publish(user_id, status.clone());
            drop(guard);
            status
        });

        Ok(TriggerOutcome::Started(OptimizationHandle { user_id, task }))
    }

    async fn run(
        inner: &SchedulerInner,
        profile: UserProfile,
        resting_heart_rate: f64,
        now: DateTime<Utc>,
    ) -> AppResult<OptimizationStatus> {
        let user_id = profile.user_id;
        let sessions: Vec<SleepSession> = inner
            .profiles
            .store()
            .get_sessions(user_id)
            .await
            .inspect_err(|e| AppLogger::log_persistence_failure(user_id, "get_sessions", e))?
            .into_iter()
            .filter(SleepSession::is_complete)
            .collect();

        let required = inner.config.min_sessions as usize;
        if sessions.len() < required {
            return Err(AppError::insufficient_data(required, sessions.len()).with_user_id(user_id));
        }

        let previous_threshold = profile.threshold_percentage;
        let optimization = task::spawn_blocking(move || {
            ProfileOptimizer::optimize(&profile, resting_heart_rate, &sessions)
        })
        .await
        .map_err(|e| {
            warn!(user.id = %user_id, error = %e, "Optimizer task did not complete");
            AppError::internal(format!("optimizer task failed: {e}")).with_user_id(user_id)
        })??;

        inner
            .profiles
            .apply_calibration(user_id, &optimization.calibration, now)
            .await?;

        let result = optimization.to_result(previous_threshold, now);
        AppLogger::log_optimization_event(
            user_id,
            "completed",
            &format!(
                "threshold {:.3} -> {:.3} ({}), confidence {:.2}, {} samples",
                result.previous_threshold,
                result.new_threshold,
                result.adjustment_type,
                result.confidence_level,
                result.data_points_analyzed
            ),
        );
        Ok(OptimizationStatus::Optimized(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AgeGroup;
    use chrono::Duration;

    fn profile_with(
        sessions: u32,
        first_use_days_ago: Option<i64>,
        now: DateTime<Utc>,
    ) -> UserProfile {
        let mut profile = UserProfile::new(Uuid::new_v4(), AgeGroup::Adult);
        profile.first_use_date = first_use_days_ago.map(|d| now - Duration::days(d));
        profile.sleep_sessions_count = sessions;
        profile
    }

    #[test]
    fn test_fresh_profile_is_never_due() {
        let now = Utc::now();
        let config = SchedulerConfig::default();
        assert_eq!(
            evaluate_schedule(&config, &profile_with(0, None, now), now),
            Err(ScheduleSkip::NoFirstUse)
        );
        assert!(matches!(
            evaluate_schedule(&config, &profile_with(2, Some(30), now), now),
            Err(ScheduleSkip::TooFewSessions { .. })
        ));
    }

    #[test]
    fn test_first_update_needs_days_and_sessions() {
        let now = Utc::now();
        let config = SchedulerConfig::default();
        assert!(evaluate_schedule(&config, &profile_with(4, Some(10), now), now).is_err());
        assert!(evaluate_schedule(&config, &profile_with(5, Some(6), now), now).is_err());
        assert!(evaluate_schedule(&config, &profile_with(5, Some(7), now), now).is_ok());
    }

    #[test]
    fn test_refresh_rules() {
        let now = Utc::now();
        let config = SchedulerConfig::default();
        let mut profile = profile_with(10, Some(40), now);
        profile.sessions_at_last_update = 9;

        profile.last_model_update_date = Some(now - Duration::days(13));
        assert!(evaluate_schedule(&config, &profile, now).is_err());

        profile.last_model_update_date = Some(now - Duration::days(14));
        assert!(evaluate_schedule(&config, &profile, now).is_ok());

        profile.last_model_update_date = Some(now - Duration::days(7));
        profile.sessions_at_last_update = 7;
        assert!(evaluate_schedule(&config, &profile, now).is_ok());

        profile.last_model_update_date = Some(now - Duration::days(6));
        assert!(evaluate_schedule(&config, &profile, now).is_err());
    }
}
