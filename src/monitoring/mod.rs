// ABOUTME: Live sleep monitoring: per-user session coordinator, events, and query snapshots
// ABOUTME: The runner drives a monitor from sensor services on three periodic timers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

//! Live monitoring
//!
//! A [`SleepMonitor`] owns the signal pipeline for one user. Callers observe
//! it through a broadcast stream of [`MonitorEvent`]s and a `watch` channel
//! carrying the latest [`MonitorSnapshot`].

/// Per-user session coordinator
pub mod monitor;
/// Timer-driven monitor loop
pub mod runner;

pub use monitor::SleepMonitor;
pub use runner::run_monitor;

use crate::models::{SleepState, StateTransition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification emitted by a monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MonitorEvent {
    /// Any state machine transition
    StateChanged {
        /// Monitored user
        user_id: Uuid,
        /// Active session
        session_id: Uuid,
        /// Old and new state with the transition time
        transition: StateTransition,
    },
    /// Sleep confirmed for the first time in the session. Re-confirmations
    /// after waking only show up as state changes.
    SleepDetected {
        /// Monitored user
        user_id: Uuid,
        /// Active session
        session_id: Uuid,
        /// Confirmation time
        detected_sleep_time: DateTime<Utc>,
    },
}

/// Read-only view of the monitor, safe to poll from a UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    /// Current state
    pub state: SleepState,
    /// Active session, if any
    pub session_id: Option<Uuid>,
    /// Latest smoothed heart rate (BPM)
    pub smoothed_heart_rate: Option<f64>,
    /// Heart rate threshold (BPM)
    pub threshold_bpm: f64,
    /// Normalized trend in `[-1, 1]`
    pub trend: f64,
    /// Motion stationary signal at the last tick
    pub is_stationary: bool,
    /// Heart-rate-low signal at the last tick
    pub is_heart_rate_low: bool,
    /// Adaptive motion threshold
    pub motion_threshold: f64,
    /// First confirmed sleep in the active session; kept after the wearer
    /// wakes and never moved by a later re-confirmation
    pub detected_sleep_time: Option<DateTime<Utc>>,
    /// Confirmation behind the current deep sleep episode; cleared when the
    /// wearer drops from deep sleep straight to awake
    pub sleep_confirmed_at: Option<DateTime<Utc>>,
    /// Time of the last update
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for MonitorSnapshot {
    fn default() -> Self {
        Self {
            state: SleepState::Awake,
            session_id: None,
            smoothed_heart_rate: None,
            threshold_bpm: 0.0,
            trend: 0.0,
            is_stationary: false,
            is_heart_rate_low: false,
            motion_threshold: 0.0,
            detected_sleep_time: None,
            sleep_confirmed_at: None,
            updated_at: None,
        }
    }
}
