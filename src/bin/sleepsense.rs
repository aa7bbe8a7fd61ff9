// ABOUTME: Command-line driver replaying synthetic nights through the SleepSense pipeline
// ABOUTME: Runs a single night or a multi-day history followed by a forced profile optimization
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 SleepSense

//! Usage:
//! ```bash
//! # Replay one synthetic night and print every state transition
//! cargo run --bin sleepsense -- night --seed 7
//!
//! # Two weeks of nights, scheduled optimizations, then a forced one
//! cargo run --bin sleepsense -- simulate --days 14
//! ```

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use sleepsense::config::SleepSenseConfig;
use sleepsense::logging::{LogFormat, LoggingConfig};
use sleepsense::models::{AgeGroup, OptimizationStatus};
use sleepsense::monitoring::SleepMonitor;
use sleepsense::optimization::{OptimizationScheduler, TriggerOutcome};
use sleepsense::profile::ProfileManager;
use sleepsense::simulation::{replay_night, NightShape, NightSimulator};
use sleepsense::storage::{InMemoryStore, SleepStore};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "sleepsense",
    about = "SleepSense sleep detection simulator",
    long_about = "Replay seeded synthetic nights through live sleep detection and adaptive \
                  profile calibration."
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Random seed for synthetic data
    #[arg(long, global = true, default_value = "42")]
    seed: u64,

    /// Resting heart rate of the simulated wearer (BPM)
    #[arg(long, global = true, default_value = "60")]
    resting_hr: f64,

    /// Age group (teen, adult, senior)
    #[arg(long, global = true, default_value = "adult")]
    age_group: AgeGroup,

    /// Length of the asleep phase of each night (minutes)
    #[arg(long, global = true, default_value = "60")]
    sleep_minutes: i64,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Replay one night and print state transitions
    Night {
        /// Sleeping heart rate shift as a fraction of resting heart rate
        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        excursion: f64,
    },

    /// Replay consecutive nights, then force an optimization and print the result
    Simulate {
        /// Number of nights
        #[arg(long, default_value = "14")]
        days: u32,
    },
}

struct Services {
    config: SleepSenseConfig,
    store: Arc<InMemoryStore>,
    profiles: Arc<ProfileManager>,
    scheduler: OptimizationScheduler,
}

impl Services {
    fn new(config: SleepSenseConfig) -> Self {
        let store = Arc::new(InMemoryStore::new(&config.store));
        let profiles = Arc::new(ProfileManager::new(
            store.clone(),
            config.detection.anomaly_mode,
        ));
        let scheduler = OptimizationScheduler::new(config.scheduler.clone(), profiles.clone());
        Self {
            config,
            store,
            profiles,
            scheduler,
        }
    }

    async fn monitor(&self, user_id: Uuid, age_group: AgeGroup) -> Result<SleepMonitor> {
        let profile = self.profiles.load_or_create(user_id, age_group).await?;
        Ok(SleepMonitor::new(
            profile,
            self.profiles.clone(),
            self.config.clone(),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut logging = LoggingConfig::from_env();
    logging.format = LogFormat::Compact;
    if args.verbose {
        logging.level = "debug".into();
    }
    logging.init()?;

    let config = SleepSenseConfig::load()?;
    let services = Services::new(config);
    let shape = NightShape {
        sleep_secs: args.sleep_minutes.max(1) * 60,
        ..NightShape::default()
    };
    let simulator = NightSimulator::new(args.seed, args.resting_hr).with_shape(shape);

    match args.command {
        Command::Night { excursion } => run_night(&services, simulator, &args, excursion).await,
        Command::Simulate { days } => run_simulation(&services, simulator, &args, days).await,
    }
}

async fn run_night(
    services: &Services,
    mut simulator: NightSimulator,
    args: &Args,
    excursion: f64,
) -> Result<()> {
    let user_id = Uuid::new_v4();
    let mut monitor = services.monitor(user_id, args.age_group).await?;
    let night = simulator.night(Utc::now() - Duration::days(1), excursion);

    let report = replay_night(
        &mut monitor,
        &night,
        args.resting_hr,
        &services.config.monitor,
    )
    .await?;
    for transition in &report.transitions {
        let offset = transition.timestamp - night.start;
        println!(
            "+{:>5}s  {} -> {}",
            offset.num_seconds(),
            transition.old_state,
            transition.new_state
        );
    }

    let completed = &report.completed;
    let stored = services
        .store
        .get_session(completed.session_id)
        .await?
        .ok_or_else(|| anyhow!("finished session was not stored"))?;
    match stored.time_to_sleep() {
        Some(latency) => println!("sleep detected after {} s", latency.num_seconds()),
        None => println!("sleep not detected"),
    }
    println!(
        "average heart rate {:.1} BPM over {} samples; profile now has {} session(s)",
        stored.average_heart_rate.unwrap_or_default(),
        stored.heart_rate_samples.len(),
        completed.profile.sleep_sessions_count
    );
    Ok(())
}

async fn run_simulation(
    services: &Services,
    mut simulator: NightSimulator,
    args: &Args,
    days: u32,
) -> Result<()> {
    let user_id = Uuid::new_v4();
    let mut monitor = services.monitor(user_id, args.age_group).await?;
    let nights = simulator.history(Utc::now() - Duration::days(i64::from(days)), days);

    for (day, night) in nights.iter().enumerate() {
        let report =
            replay_night(&mut monitor, night, args.resting_hr, &services.config.monitor).await?;
        let latest = services
            .store
            .get_session(report.completed.session_id)
            .await?
            .ok_or_else(|| anyhow!("night {day} was not stored"))?;
        if let Some(feedback) = night.feedback {
            services
                .profiles
                .record_feedback(user_id, report.completed.session_id, feedback)
                .await?;
        }
        info!(
            night = day + 1,
            excursion = night.excursion,
            detected = latest.detected_sleep_time.is_some(),
            feedback = ?night.feedback,
            "Night replayed"
        );

        let outcome = services
            .scheduler
            .check_and_optimize(user_id, args.resting_hr, false, night.end)
            .await?;
        if let TriggerOutcome::Started(handle) = outcome {
            let status = handle.wait().await?;
            println!("night {:>2}: scheduled optimization {status}", day + 1);
            monitor.apply_profile(services.profiles.profile(user_id).await?);
        }
    }

    let finished_at = nights.last().map_or_else(Utc::now, |n| n.end);
    let outcome = services
        .scheduler
        .check_and_optimize(user_id, args.resting_hr, true, finished_at)
        .await?;
    let status = match outcome {
        TriggerOutcome::Started(handle) => handle.wait().await?,
        TriggerOutcome::AlreadyOptimizing => return Err(anyhow!("optimization already running")),
        TriggerOutcome::NotTriggered(reason) => return Err(anyhow!("not triggered: {reason}")),
    };

    match status {
        OptimizationStatus::Optimized(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        other => Err(anyhow!("optimization did not complete: {other}")),
    }
}
