// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Judging-engine trait definitions.
//!
//! Defines the abstract interfaces between the scheduler core and its
//! heavyweight collaborators: the judging-state loader, result-file
//! ingestion, and contest lifecycle hooks.

use std::path::Path;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::lifecycle::ContestSchedule;
use crate::resolver::ContestDescription;
use crate::tenant_cache::ContestId;

/// Identifier of a single judged submission within a contest.
pub type RunId = i32;

/// Errors from judging-engine operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// Contest data directory or settings are missing.
    #[error("Contest not provisioned: {0}")]
    NotProvisioned(ContestId),

    /// Judging state could not be loaded.
    #[error("State load failed: {0}")]
    LoadFailed(String),

    /// Referenced run does not exist.
    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    /// A result file could not be ingested.
    #[error("Result ingest failed: {0}")]
    IngestFailed(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("Other: {0}")]
    Other(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Loaded judging state for one contest.
///
/// The handle owns everything heavyweight about a contest: the run
/// database, scoring buffers, queued submissions, registered contest
/// timers. The tenant cache is its single owner; all access goes through
/// one control flow, so the methods are synchronous and take `&mut self`
/// where they mutate.
pub trait JudgingState: Send {
    /// Contest this state belongs to.
    fn contest_id(&self) -> ContestId;

    /// Current schedule timestamps as stored in the contest state.
    fn schedule(&self) -> ContestSchedule;

    /// Record the official contest start time.
    fn record_start(&mut self, at: DateTime<Utc>);

    /// Record the official contest stop time.
    fn record_stop(&mut self, at: DateTime<Utc>);

    /// Dispatch registered contest-event timers whose trigger time has
    /// passed (virtual auto-stops and similar). Runs every tick.
    fn fire_due_timers(&mut self, now: DateTime<Utc>);

    /// Number of submissions currently out at the judge.
    fn transient_run_count(&self) -> usize;

    /// Rewrite the contest status file.
    fn flush_status(&mut self) -> Result<()>;

    /// Flush buffered score and auxiliary data.
    fn flush_scores(&mut self) -> Result<()>;

    /// Whether judging of new submissions is currently suspended.
    fn testing_suspended(&self) -> bool;

    /// Suspend or resume judging of new submissions.
    fn set_testing_suspended(&mut self, suspended: bool);

    /// Hand submissions queued while judging was suspended to the judge.
    fn release_queued_runs(&mut self);

    /// Queue one run for rejudging.
    fn schedule_rejudge(&mut self, run: RunId) -> Result<()>;

    /// Externally-registered periodic work (public standings log refresh
    /// and similar). Runs every tick after the lifecycle machine.
    fn periodic_maintenance(&mut self, now: DateTime<Utc>);
}

/// Loader and destroyer of judging state.
///
/// Engines are state factories - loading reads the contest's on-disk
/// data, destroying flushes and releases it. Scheduling policy (when to
/// load, when to evict) is entirely the caller's.
pub trait JudgingEngine: Send + Sync {
    /// Load the judging state for a contest.
    ///
    /// `refresh_roster` forces a re-fetch of the participant roster from
    /// the directory service instead of trusting cached data.
    fn load(&self, contest_id: ContestId, refresh_roster: bool) -> Result<Box<dyn JudgingState>>;

    /// Release a judging state, consuming the handle.
    ///
    /// `description` is passed when resolvable so the engine can write
    /// final artifacts to configured paths; `None` must be safe.
    fn destroy(&self, state: Box<dyn JudgingState>, description: Option<&ContestDescription>);
}

/// Consumer of inbound result files.
///
/// The implementation parses the file, applies it to the judging state,
/// and deletes or archives the file. A file left in place is retried on a
/// later tick.
pub trait ResultIngest: Send + Sync {
    /// Apply one spooled result file to the contest's judging state.
    fn ingest(&self, state: &mut dyn JudgingState, path: &Path) -> Result<()>;
}

/// External side effects fired on lifecycle transitions.
///
/// Implementations run configured hook commands, refresh standings
/// snapshots, and similar. Failures are the implementation's to log;
/// the scheduler fires and forgets.
pub trait ContestHooks: Send + Sync {
    /// Contest has started.
    fn contest_started(&self, contest_id: ContestId, description: &ContestDescription);

    /// Contest has finished.
    fn contest_finished(&self, contest_id: ContestId, description: &ContestDescription);
}
