// ABOUTME: Signal derivation and sleep state machine timing constants
// ABOUTME: Defaults for heart rate smoothing, trend, delta-HR, motion, and confirmation gates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

/// Heart rate analyzer defaults
pub mod heart_rate {
    /// Raw samples considered for median smoothing
    pub const MEDIAN_BATCH_SIZE: usize = 3;
    /// Span of smoothed samples used for trend regression (seconds)
    pub const TREND_WINDOW_SECS: i64 = 300;
    /// Minimum smoothed samples before a trend is reported
    pub const TREND_MIN_SAMPLES: usize = 3;
    /// Weight increment per sample (oldest sample has weight 1.0)
    pub const TREND_WEIGHT_STEP: f64 = 0.2;
    /// Seconds the regression slope is projected over before normalization
    pub const TREND_SLOPE_HORIZON_SECS: f64 = 30.0;
    /// Projected BPM change that saturates the normalized trend
    pub const TREND_SATURATION_BPM: f64 = 2.0;
    /// Span of the short-term window used for the delta-HR signal (seconds)
    pub const SHORT_TERM_WINDOW_SECS: i64 = 120;
    /// Samples required in the short-term window
    pub const DELTA_HR_MIN_SAMPLES: usize = 6;
    /// Absolute drop between window halves counted as significant (BPM)
    pub const DELTA_HR_MIN_DROP_BPM: f64 = 5.0;
    /// Relative drop between window halves counted as significant
    pub const DELTA_HR_MIN_DROP_RATIO: f64 = 0.05;
    /// Trend value below which a falling heart rate assists detection
    pub const TREND_ASSIST_THRESHOLD: f64 = -0.15;
    /// Margin above resting HR within which the trend assist applies
    pub const TREND_ASSIST_RESTING_MARGIN: f64 = 0.05;
    /// Smoothed samples kept in memory
    pub const MAX_SMOOTHED_SAMPLES: usize = 600;
}

/// Motion signal defaults
pub mod motion {
    /// Window of motion intensity samples used for the stationary signal (seconds)
    pub const WINDOW_SECS: i64 = 30;
    /// Fraction of window samples below threshold to count as stationary
    pub const STATIONARY_FRACTION: f64 = 0.8;
    /// Initial motion intensity threshold (g)
    pub const INITIAL_THRESHOLD: f64 = 0.05;
    /// Lowest adaptive motion threshold (g)
    pub const MIN_THRESHOLD: f64 = 0.02;
    /// Highest adaptive motion threshold (g)
    pub const MAX_THRESHOLD: f64 = 0.15;
    /// EMA smoothing factor for the adaptive motion threshold
    pub const SMOOTHING_FACTOR: f64 = 0.1;
    /// Minimum seconds between adaptive threshold updates
    pub const UPDATE_INTERVAL_SECS: i64 = 60;
    /// Minimum samples for an adaptive threshold update
    pub const MIN_UPDATE_SAMPLES: usize = 10;
}

/// Sleep state machine defaults
pub mod state_machine {
    /// Seconds removed from an accumulator on a disqualifying tick
    pub const DECAY_SECS: f64 = 5.0;
    /// Weight of a stationary tick whose heart rate is not low
    pub const STATIONARY_ONLY_WEIGHT: f64 = 0.5;
    /// Consecutive non-stationary ticks required to leave resting
    pub const AWAKE_DEBOUNCE_TICKS: u32 = 3;
    /// Longest time spent resting without progressing (seconds)
    pub const RESTING_TIMEOUT_SECS: i64 = 600;
    /// Nominal evaluation period (seconds)
    pub const TICK_SECS: f64 = 1.0;
    /// Largest elapsed time credited to a single tick after a gap (seconds)
    pub const MAX_TICK_CREDIT_SECS: f64 = 5.0;
}

/// Deep sleep confirmation window defaults
pub mod confirmation {
    /// Fraction of samples that must be below the heart rate threshold
    pub const HEART_RATE_RATIO_REQUIRED: f64 = 0.9;
    /// Buffer span retained beyond the longest confirmation window (seconds)
    pub const CAPACITY_SECS: i64 = 390;
}

/// Anomaly tracker defaults
pub mod anomaly {
    /// Per-day decay applied to stored severities
    pub const DECAY_FACTOR: f64 = 0.8;
    /// Records older than this are purged on write (days)
    pub const RETENTION_DAYS: i64 = 30;
    /// Highest accepted severity
    pub const MAX_SEVERITY: f64 = 10.0;
    /// Lower bound of the temporary band
    pub const TEMPORARY_THRESHOLD: f64 = 3.0;
    /// Lower bound of the persistent band
    pub const PERSISTENT_THRESHOLD: f64 = 7.0;
    /// Score requiring a baseline reset
    pub const BASELINE_RESET_THRESHOLD: f64 = 12.0;
    /// Percent deviation from the sleep HR baseline worth one severity point
    pub const DEVIATION_PERCENT_PER_POINT: f64 = 2.0;
}
