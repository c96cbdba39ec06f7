// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Async driver for the scheduler.
//!
//! The scheduler itself is synchronous; this wraps it in a shared handle
//! and a loop that ticks it at a fixed interval. A tick that reports
//! leftover work is followed up immediately (after yielding to the
//! runtime) instead of waiting out the interval, so a deep job queue
//! drains at full speed while request handlers stay responsive. On
//! shutdown every tenant is flushed and released.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info};

use crate::config::Config;
use crate::scheduler::Scheduler;

/// Driver timing knobs.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Interval between scheduled ticks.
    pub tick_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(250),
        }
    }
}

impl From<&Config> for RuntimeConfig {
    fn from(config: &Config) -> Self {
        Self {
            tick_interval: config.tick_interval,
        }
    }
}

/// Owns the scheduler and drives its tick loop.
pub struct SchedulerRuntime {
    scheduler: Arc<Mutex<Scheduler>>,
    shutdown: Arc<Notify>,
    config: RuntimeConfig,
}

impl SchedulerRuntime {
    /// Wrap a scheduler for driving.
    pub fn new(scheduler: Scheduler, config: RuntimeConfig) -> Self {
        Self {
            scheduler: Arc::new(Mutex::new(scheduler)),
            shutdown: Arc::new(Notify::new()),
            config,
        }
    }

    /// Shared handle to the scheduler, for request handlers.
    pub fn scheduler(&self) -> Arc<Mutex<Scheduler>> {
        self.scheduler.clone()
    }

    /// Get a handle that can be used to signal shutdown.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Run the tick loop.
    ///
    /// The loop exits when the shutdown signal is received; all tenants
    /// are flushed and released before this returns.
    pub async fn run(&self) {
        info!(
            tick_interval_ms = self.config.tick_interval.as_millis() as u64,
            "Scheduler runtime started"
        );

        let mut saturated = false;
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    info!("Scheduler runtime received shutdown signal");
                    break;
                }

                _ = Self::pause(saturated, self.config.tick_interval) => {
                    saturated = !self.scheduler.lock().await.run_tick(Utc::now());
                    if saturated {
                        debug!("Tick exhausted its budget, following up");
                    }
                }
            }
        }

        self.scheduler.lock().await.shutdown();
        info!("Scheduler runtime stopped");
    }

    /// Wait for the next tick: a bare yield while saturated, the full
    /// interval otherwise. The shutdown arm stays ahead of both.
    async fn pause(saturated: bool, interval: Duration) {
        if saturated {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(interval).await;
        }
    }
}
