// ABOUTME: Core types and constants for the SleepSense sleep detection engine
// ABOUTME: Foundation crate with error handling, domain models, and calibration constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

#![deny(unsafe_code)]

//! # `SleepSense` Core
//!
//! Foundation crate providing shared types and constants for the `SleepSense`
//! sleep detection engine. This crate is designed to change infrequently, so the
//! algorithm and service crates built on top of it compile incrementally.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **constants**: Detection, calibration bounds, optimizer and scheduling constants
//! - **models**: Samples, user profiles, sleep sessions, states and optimization results

/// Unified error handling system with standard error codes
pub mod errors;

/// Constants organized by domain
pub mod constants;

/// Core data models (profiles, sessions, samples, sleep states)
pub mod models;
