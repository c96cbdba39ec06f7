// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Scheduler configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory holding per-contest description files and spools
    pub contests_dir: PathBuf,
    /// Work units one tick may consume (jobs plus result files)
    pub work_batch: usize,
    /// Idle window after which an untouched tenant is evicted
    pub tenant_expiry: Duration,
    /// Cadence of the timer-driven tick
    pub tick_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `AGON_CONTESTS_DIR`: root directory with per-contest data
    ///
    /// Optional (with defaults):
    /// - `AGON_WORK_BATCH`: work units per tick (default: 10)
    /// - `AGON_TENANT_EXPIRY_SECS`: tenant idle expiry in seconds (default: 1800)
    /// - `AGON_TICK_INTERVAL_MS`: timer tick cadence in milliseconds (default: 250)
    pub fn from_env() -> Result<Self, ConfigError> {
        let contests_dir = PathBuf::from(
            std::env::var("AGON_CONTESTS_DIR")
                .map_err(|_| ConfigError::Missing("AGON_CONTESTS_DIR"))?,
        );

        let work_batch: usize = std::env::var("AGON_WORK_BATCH")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("AGON_WORK_BATCH", "must be a positive integer"))?;
        if work_batch == 0 {
            return Err(ConfigError::Invalid(
                "AGON_WORK_BATCH",
                "must be a positive integer",
            ));
        }

        let expiry_secs: u64 = std::env::var("AGON_TENANT_EXPIRY_SECS")
            .unwrap_or_else(|_| "1800".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("AGON_TENANT_EXPIRY_SECS", "must be a number of seconds")
            })?;

        let tick_ms: u64 = std::env::var("AGON_TICK_INTERVAL_MS")
            .unwrap_or_else(|_| "250".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("AGON_TICK_INTERVAL_MS", "must be a number of milliseconds")
            })?;

        Ok(Self {
            contests_dir,
            work_batch,
            tenant_expiry: Duration::from_secs(expiry_secs),
            tick_interval: Duration::from_millis(tick_ms),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
