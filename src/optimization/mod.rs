// ABOUTME: Optimization service module gating and running background profile recalibration
// ABOUTME: Re-exports the scheduler, its trigger outcomes, and the schedule gate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

/// Scheduling gate and background optimizer runs
pub mod scheduler;

pub use scheduler::{
    evaluate_schedule, OptimizationHandle, OptimizationScheduler, ScheduleSkip, TriggerOutcome,
};
