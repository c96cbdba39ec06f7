// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for agon-core.

use thiserror::Error;

use crate::tenant_cache::ContestId;

/// Scheduler core errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Contest id is outside the accepted range.
    #[error("Invalid contest id: {0}")]
    InvalidContestId(ContestId),

    /// Contest is not loaded and was not asked to be loaded.
    #[error("Contest not loaded: {0}")]
    NotLoaded(ContestId),

    /// Judging engine reported a failure.
    #[error("Engine error: {0}")]
    Engine(#[from] crate::engine::EngineError),

    /// An administrative import is already pending for the contest.
    #[error("Import already pending for contest {0}")]
    ImportPending(ContestId),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type using the scheduler core Error.
pub type Result<T> = std::result::Result<T, Error>;
