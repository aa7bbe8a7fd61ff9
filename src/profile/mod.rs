// ABOUTME: Profile management module with per-user serialized read-modify-write
// ABOUTME: Re-exports the profile manager used by the monitor and optimization scheduler
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

/// Per-user single-writer profile manager
pub mod manager;

pub use manager::{CompletedSession, ProfileManager};
