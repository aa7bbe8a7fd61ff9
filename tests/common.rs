// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides quiet logging, in-memory service wiring, and test user creation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used
)]
//! Shared test utilities for `sleepsense`

use sleepsense::config::SleepSenseConfig;
use sleepsense::models::{AgeGroup, UserProfile};
use sleepsense::monitoring::SleepMonitor;
use sleepsense::optimization::OptimizationScheduler;
use sleepsense::profile::ProfileManager;
use sleepsense::storage::InMemoryStore;
use std::sync::{Arc, Once};
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// In-memory service graph wired the way the CLI wires it
pub struct TestServices {
    pub config: SleepSenseConfig,
    pub store: Arc<InMemoryStore>,
    pub profiles: Arc<ProfileManager>,
    pub scheduler: OptimizationScheduler,
}

impl TestServices {
    /// Monitor for an existing user
    pub async fn monitor(&self, user_id: Uuid) -> SleepMonitor {
        let profile = self.profiles.profile(user_id).await.unwrap();
        SleepMonitor::new(profile, self.profiles.clone(), self.config.clone())
    }
}

/// Services over a fresh in-memory store with default configuration
pub fn create_test_services() -> TestServices {
    create_test_services_with_config(SleepSenseConfig::default())
}

/// Services over a fresh in-memory store
pub fn create_test_services_with_config(config: SleepSenseConfig) -> TestServices {
    init_test_logging();
    let store = Arc::new(InMemoryStore::new(&config.store));
    let profiles = Arc::new(ProfileManager::new(
        store.clone(),
        config.detection.anomaly_mode,
    ));
    let scheduler = OptimizationScheduler::new(config.scheduler.clone(), profiles.clone());
    TestServices {
        config,
        store,
        profiles,
        scheduler,
    }
}

/// Create and persist an adult test user
pub async fn create_test_user(services: &TestServices) -> (Uuid, UserProfile) {
    create_test_user_with_age(services, AgeGroup::Adult).await
}

/// Create and persist a test user in `age_group`
pub async fn create_test_user_with_age(
    services: &TestServices,
    age_group: AgeGroup,
) -> (Uuid, UserProfile) {
    let user_id = Uuid::new_v4();
    let profile = services
        .profiles
        .load_or_create(user_id, age_group)
        .await
        .unwrap();
    (user_id, profile)
}
