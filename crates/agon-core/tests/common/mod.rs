// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for agon-core integration tests.
//!
//! Provides a TestContext owning a real contest data tree (resolved
//! through the filesystem resolver) and a scheduler over mock
//! collaborators.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use agon_core::engine::mock::{MockEngine, MockHooks, MockIngest};
use agon_core::resolver::{ContestDescription, FsContestResolver};
use agon_core::scheduler::{Scheduler, SchedulerConfig};
use agon_core::tenant_cache::ContestId;

/// Test context with a contest data tree and a fully mocked scheduler.
pub struct TestContext {
    pub engine: Arc<MockEngine>,
    pub ingest: Arc<MockIngest>,
    pub hooks: Arc<MockHooks>,
    pub scheduler: Scheduler,
    pub contests_dir: PathBuf,
    _temp_dir: TempDir,
}

impl TestContext {
    /// Context with default tick tuning over an empty contest tree.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Context with explicit tick tuning.
    pub fn with_config(config: SchedulerConfig) -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let contests_dir = temp_dir.path().to_path_buf();
        let engine = Arc::new(MockEngine::new());
        let ingest = Arc::new(MockIngest::new());
        let hooks = Arc::new(MockHooks::new());
        let scheduler = Scheduler::new(
            engine.clone(),
            Arc::new(FsContestResolver::new(contests_dir.clone())),
            ingest.clone(),
            hooks.clone(),
            config,
        );
        Self {
            engine,
            ingest,
            hooks,
            scheduler,
            contests_dir,
            _temp_dir: temp_dir,
        }
    }

    /// Per-contest data directory (`{contests_dir}/{id:06}`).
    pub fn contest_dir(&self, contest_id: ContestId) -> PathBuf {
        self.contests_dir.join(format!("{contest_id:06}"))
    }

    /// Write `contest.json` for a contest, creating its directory.
    pub fn write_description(&self, description: &ContestDescription) {
        let dir = self.contest_dir(description.contest_id);
        std::fs::create_dir_all(&dir).expect("create contest dir");
        let json = serde_json::to_string_pretty(description).expect("serialize description");
        std::fs::write(dir.join("contest.json"), json).expect("write description");
    }

    /// Create a result spool directory for a contest.
    pub fn spool_dir(&self, contest_id: ContestId, name: &str) -> PathBuf {
        let dir = self.contest_dir(contest_id).join(name);
        std::fs::create_dir_all(&dir).expect("create spool dir");
        dir
    }
}

/// Drop a result file into a spool directory.
pub fn spool_file(dir: &Path, name: &str) {
    std::fs::write(dir.join(name), b"result").expect("write spool file");
}

/// Deterministic instant `secs` after a fixed base.
pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}
