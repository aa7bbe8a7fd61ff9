// ABOUTME: Service configuration aggregating detection, monitor, scheduler, and store settings
// ABOUTME: Defaults from core constants, SLEEPSENSE_* environment overrides, and range validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

//! Configuration
//!
//! Every setting has a default taken from [`sleepsense_core::constants`].
//! [`SleepSenseConfig::load`] applies `SLEEPSENSE_*` environment overrides and
//! validates the result. There is no global instance; the loaded config is
//! passed to the services that need it.

/// Configuration error types
pub mod error;

pub use error::ConfigError;

use crate::intelligence::{
    AdaptiveThresholdConfig, AnomalyDecisionMode, HeartRateAnalyzerConfig, StateMachineConfig,
};
use crate::models::UserProfile;
use serde::{Deserialize, Serialize};
use sleepsense_core::constants::bounds::{RESTING_HEART_RATE_MAX, RESTING_HEART_RATE_MIN};
use sleepsense_core::constants::detection::{confirmation, motion, state_machine};
use sleepsense_core::constants::{monitoring, scheduling};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Signal derivation and state machine tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Heart rate analyzer windows and thresholds
    pub heart_rate: HeartRateAnalyzerConfig,
    /// Adaptive motion threshold parameters
    pub motion_threshold: AdaptiveThresholdConfig,
    /// Motion window length (seconds)
    pub motion_window_secs: i64,
    /// Share of the motion window below threshold that counts as stationary
    pub stationary_fraction: f64,
    /// Accumulator decay on a disqualifying tick (seconds)
    pub decay_seconds: f64,
    /// Consecutive non-stationary ticks that end Resting
    pub awake_debounce_ticks: u32,
    /// Longest stay in Resting (seconds)
    pub resting_timeout_seconds: i64,
    /// Share of HR-low ticks required by the confirmation window
    pub heart_rate_ratio_required: f64,
    /// Whether anomaly classifications are surfaced
    pub anomaly_mode: AnomalyDecisionMode,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            heart_rate: HeartRateAnalyzerConfig::default(),
            motion_threshold: AdaptiveThresholdConfig::default(),
            motion_window_secs: motion::WINDOW_SECS,
            stationary_fraction: motion::STATIONARY_FRACTION,
            decay_seconds: state_machine::DECAY_SECS,
            awake_debounce_ticks: state_machine::AWAKE_DEBOUNCE_TICKS,
            resting_timeout_seconds: state_machine::RESTING_TIMEOUT_SECS,
            heart_rate_ratio_required: confirmation::HEART_RATE_RATIO_REQUIRED,
            anomaly_mode: AnomalyDecisionMode::default(),
        }
    }
}

impl DetectionConfig {
    /// State machine config for `profile` with the service-level overrides applied
    #[must_use]
    pub fn state_machine_config(&self, profile: &UserProfile) -> StateMachineConfig {
        StateMachineConfig {
            decay_seconds: self.decay_seconds,
            awake_debounce_ticks: self.awake_debounce_ticks,
            resting_timeout_seconds: self.resting_timeout_seconds,
            heart_rate_ratio_required: self.heart_rate_ratio_required,
            ..StateMachineConfig::for_profile(profile)
        }
    }
}

/// Live monitor cadences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// State machine evaluation period (milliseconds)
    pub tick_interval_ms: u64,
    /// Motion threshold recalibration period (seconds)
    pub analysis_interval_secs: u64,
    /// Trend recomputation period (seconds)
    pub trend_interval_secs: u64,
    /// Resting heart rate used when the sensor provider reports none (BPM)
    pub default_resting_heart_rate: f64,
    /// Buffered events per broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: monitoring::TICK_INTERVAL_MS,
            analysis_interval_secs: monitoring::ANALYSIS_INTERVAL_SECS,
            trend_interval_secs: monitoring::TREND_INTERVAL_SECS,
            default_resting_heart_rate: monitoring::DEFAULT_RESTING_HEART_RATE,
            event_channel_capacity: monitoring::EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl MonitorConfig {
    /// Evaluation tick period
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Analysis tick period
    #[must_use]
    pub const fn analysis_interval(&self) -> Duration {
        Duration::from_secs(self.analysis_interval_secs)
    }

    /// Trend tick period
    #[must_use]
    pub const fn trend_interval(&self) -> Duration {
        Duration::from_secs(self.trend_interval_secs)
    }
}

/// Optimization scheduling gates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Sessions required before any optimization
    pub min_sessions: u32,
    /// Days since first use before the first scheduled optimization
    pub first_update_min_days: i64,
    /// Sessions required before the first scheduled optimization
    pub first_update_min_sessions: u32,
    /// Days after which a previously optimized profile is refreshed
    pub refresh_interval_days: i64,
    /// New sessions allowing an early refresh
    pub early_refresh_new_sessions: u32,
    /// Days required alongside the early refresh session count
    pub early_refresh_min_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_sessions: scheduling::MIN_SESSIONS,
            first_update_min_days: scheduling::FIRST_UPDATE_MIN_DAYS,
            first_update_min_sessions: scheduling::FIRST_UPDATE_MIN_SESSIONS,
            refresh_interval_days: scheduling::REFRESH_INTERVAL_DAYS,
            early_refresh_new_sessions: scheduling::EARLY_REFRESH_NEW_SESSIONS,
            early_refresh_min_days: scheduling::EARLY_REFRESH_MIN_DAYS,
        }
    }
}

/// Persistence limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Sessions retained per user, oldest evicted first
    pub max_sessions_per_user: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_sessions_per_user: scheduling::MAX_STORED_SESSIONS,
        }
    }
}

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SleepSenseConfig {
    /// Signal and state machine settings
    pub detection: DetectionConfig,
    /// Monitor cadences
    pub monitor: MonitorConfig,
    /// Optimization gates
    pub scheduler: SchedulerConfig,
    /// Persistence limits
    pub store: StoreConfig,
}

impl SleepSenseConfig {
    /// Load defaults, apply environment overrides, and validate
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable cannot be parsed or a
    /// resulting value fails validation
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::default().apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_var<T: FromStr>(env_var_name: &str, target: &mut T) -> Result<(), ConfigError> {
        if let Ok(val) = env::var(env_var_name) {
            *target = val
                .parse()
                .map_err(|_| ConfigError::Parse(format!("Invalid {env_var_name}")))?;
        }
        Ok(())
    }

    fn apply_env_overrides(mut self) -> Result<Self, ConfigError> {
        let detection = &mut self.detection;
        Self::apply_env_var("SLEEPSENSE_MOTION_WINDOW_SECS", &mut detection.motion_window_secs)?;
        Self::apply_env_var(
            "SLEEPSENSE_STATIONARY_FRACTION",
            &mut detection.stationary_fraction,
        )?;
        Self::apply_env_var(
            "SLEEPSENSE_MOTION_THRESHOLD_INITIAL",
            &mut detection.motion_threshold.initial,
        )?;
        Self::apply_env_var(
            "SLEEPSENSE_MOTION_THRESHOLD_MIN",
            &mut detection.motion_threshold.min,
        )?;
        Self::apply_env_var(
            "SLEEPSENSE_MOTION_THRESHOLD_MAX",
            &mut detection.motion_threshold.max,
        )?;
        Self::apply_env_var(
            "SLEEPSENSE_MOTION_SMOOTHING",
            &mut detection.motion_threshold.smoothing_factor,
        )?;
        Self::apply_env_var(
            "SLEEPSENSE_TREND_WINDOW_SECS",
            &mut detection.heart_rate.trend_window_secs,
        )?;
        Self::apply_env_var(
            "SLEEPSENSE_DELTA_HR_MIN_DROP_BPM",
            &mut detection.heart_rate.delta_hr_min_drop_bpm,
        )?;
        Self::apply_env_var(
            "SLEEPSENSE_TREND_ASSIST_THRESHOLD",
            &mut detection.heart_rate.trend_assist_threshold,
        )?;
        Self::apply_env_var("SLEEPSENSE_DECAY_SECS", &mut detection.decay_seconds)?;
        Self::apply_env_var(
            "SLEEPSENSE_AWAKE_DEBOUNCE_TICKS",
            &mut detection.awake_debounce_ticks,
        )?;
        Self::apply_env_var(
            "SLEEPSENSE_RESTING_TIMEOUT_SECS",
            &mut detection.resting_timeout_seconds,
        )?;
        Self::apply_env_var("SLEEPSENSE_ANOMALY_MODE", &mut detection.anomaly_mode)?;

        let monitor = &mut self.monitor;
        Self::apply_env_var("SLEEPSENSE_TICK_INTERVAL_MS", &mut monitor.tick_interval_ms)?;
        Self::apply_env_var(
            "SLEEPSENSE_ANALYSIS_INTERVAL_SECS",
            &mut monitor.analysis_interval_secs,
        )?;
        Self::apply_env_var("SLEEPSENSE_TREND_INTERVAL_SECS", &mut monitor.trend_interval_secs)?;
        Self::apply_env_var(
            "SLEEPSENSE_DEFAULT_RESTING_HR",
            &mut monitor.default_resting_heart_rate,
        )?;

        let scheduler = &mut self.scheduler;
        Self::apply_env_var("SLEEPSENSE_MIN_SESSIONS", &mut scheduler.min_sessions)?;
        Self::apply_env_var(
            "SLEEPSENSE_FIRST_UPDATE_MIN_DAYS",
            &mut scheduler.first_update_min_days,
        )?;
        Self::apply_env_var(
            "SLEEPSENSE_FIRST_UPDATE_MIN_SESSIONS",
            &mut scheduler.first_update_min_sessions,
        )?;
        Self::apply_env_var(
            "SLEEPSENSE_REFRESH_INTERVAL_DAYS",
            &mut scheduler.refresh_interval_days,
        )?;
        Self::apply_env_var(
            "SLEEPSENSE_EARLY_REFRESH_NEW_SESSIONS",
            &mut scheduler.early_refresh_new_sessions,
        )?;
        Self::apply_env_var(
            "SLEEPSENSE_EARLY_REFRESH_MIN_DAYS",
            &mut scheduler.early_refresh_min_days,
        )?;

        Self::apply_env_var(
            "SLEEPSENSE_MAX_SESSIONS_PER_USER",
            &mut self.store.max_sessions_per_user,
        )?;
        Ok(self)
    }

    /// Validate ranges and cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_detection()?;
        self.validate_monitor()?;
        self.validate_scheduler()
    }

    fn validate_detection(&self) -> Result<(), ConfigError> {
        let detection = &self.detection;
        let threshold = &detection.motion_threshold;
        if threshold.min <= 0.0 || threshold.min >= threshold.max {
            return Err(ConfigError::InvalidRange(
                "motion threshold min must be positive and < max",
            ));
        }
        if threshold.smoothing_factor <= 0.0 || threshold.smoothing_factor > 1.0 {
            return Err(ConfigError::ValueOutOfRange(
                "motion smoothing factor must be in (0, 1]",
            ));
        }
        if detection.stationary_fraction <= 0.0 || detection.stationary_fraction > 1.0 {
            return Err(ConfigError::ValueOutOfRange(
                "stationary fraction must be in (0, 1]",
            ));
        }
        if detection.heart_rate_ratio_required <= 0.0 || detection.heart_rate_ratio_required > 1.0
        {
            return Err(ConfigError::ValueOutOfRange(
                "heart rate ratio requirement must be in (0, 1]",
            ));
        }
        if detection.motion_window_secs <= 0 || detection.heart_rate.trend_window_secs <= 0 {
            return Err(ConfigError::ValueOutOfRange("signal windows must be positive"));
        }
        if detection.decay_seconds < 0.0 {
            return Err(ConfigError::ValueOutOfRange("decay must not be negative"));
        }
        if detection.awake_debounce_ticks == 0 {
            return Err(ConfigError::ValueOutOfRange("awake debounce must be at least one tick"));
        }
        if detection.resting_timeout_seconds <= 0 {
            return Err(ConfigError::ValueOutOfRange("resting timeout must be positive"));
        }
        Ok(())
    }

    fn validate_monitor(&self) -> Result<(), ConfigError> {
        let monitor = &self.monitor;
        if monitor.tick_interval_ms == 0
            || monitor.analysis_interval_secs == 0
            || monitor.trend_interval_secs == 0
        {
            return Err(ConfigError::ValueOutOfRange("monitor intervals must be positive"));
        }
        if !(RESTING_HEART_RATE_MIN..=RESTING_HEART_RATE_MAX)
            .contains(&monitor.default_resting_heart_rate)
        {
            return Err(ConfigError::ValueOutOfRange(
                "default resting heart rate must be within physiological bounds",
            ));
        }
        if monitor.event_channel_capacity == 0 {
            return Err(ConfigError::ValueOutOfRange("event channel capacity must be positive"));
        }
        Ok(())
    }

    fn validate_scheduler(&self) -> Result<(), ConfigError> {
        let scheduler = &self.scheduler;
        if scheduler.min_sessions == 0 {
            return Err(ConfigError::ValueOutOfRange("min sessions must be at least one"));
        }
        if scheduler.first_update_min_sessions < scheduler.min_sessions {
            return Err(ConfigError::InvalidRange(
                "first update sessions must be >= min sessions",
            ));
        }
        if scheduler.early_refresh_min_days > scheduler.refresh_interval_days {
            return Err(ConfigError::InvalidRange(
                "early refresh days must be <= refresh interval days",
            ));
        }
        if self.store.max_sessions_per_user < scheduler.min_sessions as usize {
            return Err(ConfigError::InvalidRange(
                "max sessions per user must be >= min sessions",
            ));
        }
        Ok(())
    }
}
