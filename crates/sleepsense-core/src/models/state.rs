// ABOUTME: Four-state sleep classification and the transition record emitted on change
// ABOUTME: Awake -> Resting -> LightSleep -> DeepSleep with state-specific regressions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sleep state of the wearer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SleepState {
    /// Moving or not yet settled
    #[default]
    Awake,
    /// Still, heart rate not yet confirming sleep
    Resting,
    /// Low heart rate and stillness, awaiting confirmation
    LightSleep,
    /// Confirmed asleep
    DeepSleep,
}

impl SleepState {
    /// Next state in the forward chain, `None` from `DeepSleep`
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Awake => Some(Self::Resting),
            Self::Resting => Some(Self::LightSleep),
            Self::LightSleep => Some(Self::DeepSleep),
            Self::DeepSleep => None,
        }
    }

    /// Whether the wearer is considered asleep
    #[must_use]
    pub const fn is_asleep(self) -> bool {
        matches!(self, Self::LightSleep | Self::DeepSleep)
    }
}

impl fmt::Display for SleepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Awake => "awake",
            Self::Resting => "resting",
            Self::LightSleep => "lightSleep",
            Self::DeepSleep => "deepSleep",
        })
    }
}

/// `{timestamp, oldState, newState}` emitted on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Tick at which the transition happened
    pub timestamp: DateTime<Utc>,
    /// State before the tick
    pub old_state: SleepState,
    /// State after the tick
    pub new_state: SleepState,
}
