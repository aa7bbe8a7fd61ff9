// ABOUTME: Persistence contract for user profiles and sleep sessions
// ABOUTME: Async store trait consumed by the profile manager, monitor, and scheduler
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

//! Storage
//!
//! Only single-key read-modify-write is assumed of a backend; callers that need
//! atomic profile updates go through [`crate::profile::ProfileManager`].

/// In-memory backend
pub mod memory;

pub use memory::InMemoryStore;

use crate::errors::AppResult;
use crate::models::{SleepSession, UserProfile};
use async_trait::async_trait;
use uuid::Uuid;

/// Profile and session persistence
#[async_trait]
pub trait SleepStore: Send + Sync {
    /// Stored profile, `None` for an unknown user
    async fn get_profile(&self, user_id: Uuid) -> AppResult<Option<UserProfile>>;

    /// Insert or replace a profile
    async fn save_profile(&self, profile: &UserProfile) -> AppResult<()>;

    /// A user's sessions, most recent first, capped by the backend retention
    async fn get_sessions(&self, user_id: Uuid) -> AppResult<Vec<SleepSession>>;

    /// One session by id
    async fn get_session(&self, session_id: Uuid) -> AppResult<Option<SleepSession>>;

    /// Insert or replace a session by id
    async fn save_session(&self, session: &SleepSession) -> AppResult<()>;
}
