// ABOUTME: Gates deciding when a profile becomes eligible for re-optimization
// ABOUTME: Session counts and day intervals for first and subsequent calibrations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

/// Sessions required before any optimization (forced or scheduled)
pub const MIN_SESSIONS: u32 = 3;
/// Days since first use before the first scheduled optimization
pub const FIRST_UPDATE_MIN_DAYS: i64 = 7;
/// Sessions required before the first scheduled optimization
pub const FIRST_UPDATE_MIN_SESSIONS: u32 = 5;
/// Days after which a re-optimization always runs
pub const REFRESH_INTERVAL_DAYS: i64 = 14;
/// New sessions that allow an early re-optimization
pub const EARLY_REFRESH_NEW_SESSIONS: u32 = 3;
/// Days that must pass before an early re-optimization
pub const EARLY_REFRESH_MIN_DAYS: i64 = 7;
/// Sessions retained per user by the store
pub const MAX_STORED_SESSIONS: usize = 30;
