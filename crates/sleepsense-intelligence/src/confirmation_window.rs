// ABOUTME: Rolling buffer of per-tick heart rate and resting flags gating deep sleep confirmation
// ABOUTME: Confirms only when both the HR-below-threshold and resting ratios hold over the span
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense
#![allow(clippy::cast_precision_loss)] // Safe: window holds a few hundred ticks

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sleepsense_core::constants::detection::confirmation;
use std::collections::VecDeque;

/// One tick worth of gate inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationSample {
    /// Tick time
    pub timestamp: DateTime<Utc>,
    /// Heart-rate-low signal at this tick
    pub is_heart_rate_below_threshold: bool,
    /// Motion-stationary signal at this tick
    pub is_resting: bool,
}

/// Outcome of [`ConfirmationWindow::evaluate`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConfirmationDecision {
    /// Buffer does not yet span the required duration
    Waiting {
        /// Current buffer span
        span_seconds: i64,
    },
    /// Span reached but at least one ratio fell short
    Rejected {
        /// Share of samples with HR below threshold
        heart_rate_ratio: f64,
        /// Share of samples flagged resting
        resting_ratio: f64,
    },
    /// Both ratios met over the required span
    Confirmed {
        /// Share of samples with HR below threshold
        heart_rate_ratio: f64,
        /// Share of samples flagged resting
        resting_ratio: f64,
    },
}

impl ConfirmationDecision {
    /// Whether deep sleep was confirmed
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}

/// Time-ordered buffer capped by duration
#[derive(Debug, Clone)]
pub struct ConfirmationWindow {
    capacity: Duration,
    samples: VecDeque<ConfirmationSample>,
}

impl Default for ConfirmationWindow {
    fn default() -> Self {
        Self::new(Duration::seconds(confirmation::CAPACITY_SECS))
    }
}

impl ConfirmationWindow {
    /// Empty window retaining at most `capacity` of history
    #[must_use]
    pub const fn new(capacity: Duration) -> Self {
        Self {
            capacity,
            samples: VecDeque::new(),
        }
    }

    /// Append a tick; samples older than the newest minus capacity are dropped.
    /// Out-of-order samples are ignored.
    pub fn push(&mut self, sample: ConfirmationSample) {
        if self
            .samples
            .back()
            .is_some_and(|last| sample.timestamp < last.timestamp)
        {
            return;
        }
        self.samples.push_back(sample);
        let cutoff = sample.timestamp - self.capacity;
        while self.samples.front().is_some_and(|s| s.timestamp < cutoff) {
            self.samples.pop_front();
        }
    }

    /// Time between the oldest and newest sample
    #[must_use]
    pub fn span(&self) -> Duration {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => Duration::zero(),
        }
    }

    /// Number of buffered ticks
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop every sample
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Evaluate the dual gate over the most recent `required_span`
    #[must_use]
    pub fn evaluate(
        &self,
        required_span: Duration,
        heart_rate_ratio_required: f64,
        resting_ratio_required: f64,
    ) -> ConfirmationDecision {
        let span = self.span();
        let Some(latest) = self.samples.back() else {
            return ConfirmationDecision::Waiting { span_seconds: 0 };
        };
        if self.samples.len() < 2 || span < required_span {
            return ConfirmationDecision::Waiting {
                span_seconds: span.num_seconds(),
            };
        }

        let cutoff = latest.timestamp - required_span;
        let (count, below, resting) = self
            .samples
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .fold((0_usize, 0_usize, 0_usize), |(n, hr, rest), s| {
                (
                    n + 1,
                    hr + usize::from(s.is_heart_rate_below_threshold),
                    rest + usize::from(s.is_resting),
                )
            });

        let heart_rate_ratio = below as f64 / count as f64;
        let resting_ratio = resting as f64 / count as f64;

        if heart_rate_ratio >= heart_rate_ratio_required && resting_ratio >= resting_ratio_required
        {
            ConfirmationDecision::Confirmed {
                heart_rate_ratio,
                resting_ratio,
            }
        } else {
            ConfirmationDecision::Rejected {
                heart_rate_ratio,
                resting_ratio,
            }
        }
    }
}
