// ABOUTME: In-memory profile and session store with per-user session retention
// ABOUTME: Oldest sessions evicted first; write failures can be injected for tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

use super::SleepStore;
use crate::config::StoreConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{SleepSession, UserProfile};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
struct StoreState {
    profiles: HashMap<Uuid, UserProfile>,
    /// Per-user sessions ordered by start time, oldest first
    sessions: HashMap<Uuid, Vec<SleepSession>>,
    session_owners: HashMap<Uuid, Uuid>,
}

/// Shared in-memory store; clones share the same data
#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
    max_sessions_per_user: usize,
    fail_writes: Arc<AtomicBool>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

impl InMemoryStore {
    /// Empty store honoring the configured retention
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            max_sessions_per_user: config.max_sessions_per_user.max(1),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every subsequent write fail (or succeed again)
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self, operation: &str) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::storage(format!("{operation} rejected: store is read-only")));
        }
        Ok(())
    }
}

#[async_trait]
impl SleepStore for InMemoryStore {
    async fn get_profile(&self, user_id: Uuid) -> AppResult<Option<UserProfile>> {
        Ok(self.state.read().await.profiles.get(&user_id).cloned())
    }

    async fn save_profile(&self, profile: &UserProfile) -> AppResult<()> {
        self.check_writable("save_profile")?;
        self.state
            .write()
            .await
            .profiles
            .insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn get_sessions(&self, user_id: Uuid) -> AppResult<Vec<SleepSession>> {
        let state = self.state.read().await;
        Ok(state
            .sessions
            .get(&user_id)
            .map(|sessions| {
                sessions
                    .iter()
                    .rev()
                    .take(self.max_sessions_per_user)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_session(&self, session_id: Uuid) -> AppResult<Option<SleepSession>> {
        let state = self.state.read().await;
        Ok(state.session_owners.get(&session_id).and_then(|user_id| {
            state
                .sessions
                .get(user_id)
                .and_then(|sessions| sessions.iter().find(|s| s.id == session_id).cloned())
        }))
    }

    async fn save_session(&self, session: &SleepSession) -> AppResult<()> {
        self.check_writable("save_session")?;
        let mut state = self.state.write().await;
        let StoreState {
            sessions,
            session_owners,
            ..
        } = &mut *state;

        let user_sessions = sessions.entry(session.user_id).or_default();
        if let Some(existing) = user_sessions.iter_mut().find(|s| s.id == session.id) {
            *existing = session.clone();
        } else {
            user_sessions.push(session.clone());
            session_owners.insert(session.id, session.user_id);
        }
        user_sessions.sort_by_key(|s| s.start_time);

        while user_sessions.len() > self.max_sessions_per_user {
            let evicted = user_sessions.remove(0);
            session_owners.remove(&evicted.id);
            debug!(
                user_id = %session.user_id,
                session_id = %evicted.id,
                "evicted oldest sleep session"
            );
        }
        Ok(())
    }
}
