// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock judging engine for testing.
//!
//! In-memory implementations of the collaborator contracts that record
//! every interaction, so scheduler behavior can be asserted without a
//! real judging backend.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::traits::*;
use crate::lifecycle::ContestSchedule;
use crate::resolver::ContestDescription;
use crate::tenant_cache::ContestId;

/// Observable state backing one mock contest.
///
/// Shared between the engine and any handle loaded for the contest, so
/// tests keep access after the handle moves into the tenant cache.
#[derive(Debug, Default)]
pub struct MockContestState {
    /// Schedule returned by the handle; mutated by record_start/stop.
    pub schedule: ContestSchedule,
    /// Submissions reported as currently out at the judge.
    pub transient_runs: usize,
    /// Current judging suspension flag.
    pub testing_suspended: bool,
    /// Registered contest-event timers not yet fired.
    pub due_timers: Vec<DateTime<Utc>>,
    /// Timers dispatched so far.
    pub timers_fired: usize,
    /// Successful status-file flushes.
    pub status_flushes: usize,
    /// Successful score flushes.
    pub score_flushes: usize,
    /// Make flush_status fail.
    pub fail_status_flush: bool,
    /// Times queued runs were released to the judge.
    pub queued_releases: usize,
    /// Runs queued for rejudging.
    pub rejudged: Vec<RunId>,
    /// Runs schedule_rejudge reports as unknown.
    pub missing_runs: Vec<RunId>,
    /// Periodic maintenance invocations.
    pub maintenance_runs: usize,
    /// Set once the engine has destroyed the handle.
    pub destroyed: bool,
    /// Whether destroy received a resolvable description.
    pub destroy_had_description: Option<bool>,
}

/// Judging-state handle backed by a [`MockContestState`] cell.
pub struct MockJudgingState {
    contest_id: ContestId,
    data: Arc<Mutex<MockContestState>>,
}

impl MockJudgingState {
    /// Create a standalone handle with a fresh state cell.
    pub fn new(contest_id: ContestId) -> Self {
        Self {
            contest_id,
            data: Arc::new(Mutex::new(MockContestState::default())),
        }
    }

    /// Shared state cell behind this handle.
    pub fn contest(&self) -> Arc<Mutex<MockContestState>> {
        self.data.clone()
    }
}

impl JudgingState for MockJudgingState {
    fn contest_id(&self) -> ContestId {
        self.contest_id
    }

    fn schedule(&self) -> ContestSchedule {
        self.data.lock().unwrap().schedule
    }

    fn record_start(&mut self, at: DateTime<Utc>) {
        self.data.lock().unwrap().schedule.start = Some(at);
    }

    fn record_stop(&mut self, at: DateTime<Utc>) {
        self.data.lock().unwrap().schedule.stop = Some(at);
    }

    fn fire_due_timers(&mut self, now: DateTime<Utc>) {
        let mut data = self.data.lock().unwrap();
        let before = data.due_timers.len();
        data.due_timers.retain(|t| *t > now);
        data.timers_fired += before - data.due_timers.len();
    }

    fn transient_run_count(&self) -> usize {
        self.data.lock().unwrap().transient_runs
    }

    fn flush_status(&mut self) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        if data.fail_status_flush {
            return Err(EngineError::Other("mock status flush failure".to_string()));
        }
        data.status_flushes += 1;
        Ok(())
    }

    fn flush_scores(&mut self) -> Result<()> {
        self.data.lock().unwrap().score_flushes += 1;
        Ok(())
    }

    fn testing_suspended(&self) -> bool {
        self.data.lock().unwrap().testing_suspended
    }

    fn set_testing_suspended(&mut self, suspended: bool) {
        self.data.lock().unwrap().testing_suspended = suspended;
    }

    fn release_queued_runs(&mut self) {
        self.data.lock().unwrap().queued_releases += 1;
    }

    fn schedule_rejudge(&mut self, run: RunId) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        if data.missing_runs.contains(&run) {
            return Err(EngineError::RunNotFound(run));
        }
        data.rejudged.push(run);
        Ok(())
    }

    fn periodic_maintenance(&mut self, _now: DateTime<Utc>) {
        self.data.lock().unwrap().maintenance_runs += 1;
    }
}

/// Mock judging engine.
pub struct MockEngine {
    contests: Mutex<HashMap<ContestId, Arc<Mutex<MockContestState>>>>,
    loads: Mutex<Vec<(ContestId, bool)>>,
    /// If true, every load fails
    pub fail_loads: bool,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a new mock engine.
    pub fn new() -> Self {
        Self {
            contests: Mutex::new(HashMap::new()),
            loads: Mutex::new(Vec::new()),
            fail_loads: false,
        }
    }

    /// Create a mock engine whose loads always fail.
    pub fn failing() -> Self {
        Self {
            contests: Mutex::new(HashMap::new()),
            loads: Mutex::new(Vec::new()),
            fail_loads: true,
        }
    }

    /// State cell for a contest, created on first use.
    ///
    /// Usable before any load to preset schedules and counters, and after
    /// eviction to inspect what happened.
    pub fn contest(&self, contest_id: ContestId) -> Arc<Mutex<MockContestState>> {
        self.contests
            .lock()
            .unwrap()
            .entry(contest_id)
            .or_default()
            .clone()
    }

    /// Every load performed, in order, with its roster-refresh flag.
    pub fn loads(&self) -> Vec<(ContestId, bool)> {
        self.loads.lock().unwrap().clone()
    }
}

impl JudgingEngine for MockEngine {
    fn load(&self, contest_id: ContestId, refresh_roster: bool) -> Result<Box<dyn JudgingState>> {
        self.loads.lock().unwrap().push((contest_id, refresh_roster));
        if self.fail_loads {
            return Err(EngineError::LoadFailed("mock load failure".to_string()));
        }
        Ok(Box::new(MockJudgingState {
            contest_id,
            data: self.contest(contest_id),
        }))
    }

    fn destroy(&self, state: Box<dyn JudgingState>, description: Option<&ContestDescription>) {
        let cell = self.contest(state.contest_id());
        let mut data = cell.lock().unwrap();
        data.destroyed = true;
        data.destroy_had_description = Some(description.is_some());
    }
}

/// Recording result-file consumer.
pub struct MockIngest {
    ingested: Mutex<Vec<PathBuf>>,
    /// If true, every ingest fails and leaves the file in place
    pub fail_all: bool,
}

impl Default for MockIngest {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIngest {
    /// Create a consumer that deletes and records each file.
    pub fn new() -> Self {
        Self {
            ingested: Mutex::new(Vec::new()),
            fail_all: false,
        }
    }

    /// Create a consumer that rejects every file.
    pub fn failing() -> Self {
        Self {
            ingested: Mutex::new(Vec::new()),
            fail_all: true,
        }
    }

    /// Files consumed so far, in order.
    pub fn ingested(&self) -> Vec<PathBuf> {
        self.ingested.lock().unwrap().clone()
    }
}

impl ResultIngest for MockIngest {
    fn ingest(&self, state: &mut dyn JudgingState, path: &Path) -> Result<()> {
        let _ = state;
        if self.fail_all {
            return Err(EngineError::IngestFailed("mock ingest failure".to_string()));
        }
        std::fs::remove_file(path)?;
        self.ingested.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

/// Recording lifecycle hooks.
#[derive(Default)]
pub struct MockHooks {
    started: Mutex<Vec<ContestId>>,
    finished: Mutex<Vec<ContestId>>,
}

impl MockHooks {
    /// Create recording hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Contests reported started, in order.
    pub fn started(&self) -> Vec<ContestId> {
        self.started.lock().unwrap().clone()
    }

    /// Contests reported finished, in order.
    pub fn finished(&self) -> Vec<ContestId> {
        self.finished.lock().unwrap().clone()
    }
}

impl ContestHooks for MockHooks {
    fn contest_started(&self, contest_id: ContestId, _description: &ContestDescription) {
        self.started.lock().unwrap().push(contest_id);
    }

    fn contest_finished(&self, contest_id: ContestId, _description: &ContestDescription) {
        self.finished.lock().unwrap().push(contest_id);
    }
}
