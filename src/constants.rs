// ABOUTME: Constants re-exported from sleepsense-core
// ABOUTME: Detection, bounds, monitoring, optimizer, and scheduling groups
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

pub use sleepsense_core::constants::*;
