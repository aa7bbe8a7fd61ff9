// ABOUTME: Configuration error types for environment overrides and validation
// ABOUTME: Structured failures for ranges, parse errors, and cross-field constraints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

use sleepsense_core::errors::AppError;
use thiserror::Error;

/// Configuration loading or validation failure
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Two related values are inconsistent
    #[error("Invalid range: {0}")]
    InvalidRange(&'static str),

    /// Environment variable could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// A single value is outside its accepted range
    #[error("Value out of range: {0}")]
    ValueOutOfRange(&'static str),
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        Self::config(error.to_string())
    }
}
