// ABOUTME: Timer periods and fallbacks used by the live session monitor
// ABOUTME: Evaluation, analysis, and trend cadences plus broadcast channel sizing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

/// State machine evaluation period (milliseconds)
pub const TICK_INTERVAL_MS: u64 = 1_000;
/// Motion threshold recalibration period (seconds)
pub const ANALYSIS_INTERVAL_SECS: u64 = 10;
/// Heart rate trend recomputation period (seconds)
pub const TREND_INTERVAL_SECS: u64 = 30;
/// Resting heart rate used when the sensor provider has none (BPM)
pub const DEFAULT_RESTING_HEART_RATE: f64 = 60.0;
/// Buffered events per monitor broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
