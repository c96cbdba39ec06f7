// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Contest description resolution.
//!
//! A contest's static description (name, mode, spool directories) lives in
//! a `contest.json` file under the per-contest data directory. The
//! filesystem resolver parses descriptions on demand and caches them keyed
//! by file mtime, so per-tick resolution does not re-read unchanged files.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::tenant_cache::ContestId;

/// Static description of one contest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestDescription {
    /// Contest this description belongs to.
    pub contest_id: ContestId,
    /// Human-readable contest name.
    pub name: String,
    /// Virtual contests manage start/stop per participant; the global
    /// lifecycle machine leaves them alone.
    #[serde(default)]
    pub virtual_mode: bool,
    /// Inbound spool directories drained by the scheduler tick
    /// (compile results, run results). Relative paths are resolved
    /// against the contest directory.
    #[serde(default)]
    pub result_dirs: Vec<PathBuf>,
    /// Directory holding served template fragments, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragments_dir: Option<PathBuf>,
}

impl ContestDescription {
    /// Create a minimal description with everything optional defaulted.
    pub fn new(contest_id: ContestId, name: impl Into<String>) -> Self {
        Self {
            contest_id,
            name: name.into(),
            virtual_mode: false,
            result_dirs: Vec::new(),
            fragments_dir: None,
        }
    }
}

/// Resolver of contest descriptions.
///
/// `None` means the contest is unknown or its description is currently
/// unreadable; callers keep whatever cached state they have and retry on
/// a later tick.
pub trait ContestResolver: Send + Sync {
    /// Resolve the description for a contest.
    fn resolve(&self, contest_id: ContestId) -> Option<Arc<ContestDescription>>;
}

/// Fixed in-memory resolver.
///
/// Used by embedders that manage a closed set of contests, and by tests.
#[derive(Default)]
pub struct StaticResolver {
    descriptions: HashMap<ContestId, Arc<ContestDescription>>,
}

impl StaticResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a description, replacing any previous one for the contest.
    pub fn insert(&mut self, description: ContestDescription) {
        self.descriptions
            .insert(description.contest_id, Arc::new(description));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, description: ContestDescription) -> Self {
        self.insert(description);
        self
    }
}

impl ContestResolver for StaticResolver {
    fn resolve(&self, contest_id: ContestId) -> Option<Arc<ContestDescription>> {
        self.descriptions.get(&contest_id).cloned()
    }
}

struct CachedDescription {
    modified: SystemTime,
    description: Arc<ContestDescription>,
}

/// Filesystem-backed resolver reading `{root}/{id:06}/contest.json`.
pub struct FsContestResolver {
    root: PathBuf,
    cache: Mutex<HashMap<ContestId, CachedDescription>>,
}

impl FsContestResolver {
    /// Create a resolver rooted at the contests directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Data directory for a contest.
    pub fn contest_dir(&self, contest_id: ContestId) -> PathBuf {
        self.root.join(format!("{contest_id:06}"))
    }

    fn description_path(&self, contest_id: ContestId) -> PathBuf {
        self.contest_dir(contest_id).join("contest.json")
    }

    fn read_description(
        &self,
        contest_id: ContestId,
        path: &Path,
    ) -> Option<Arc<ContestDescription>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(contest_id, error = %e, "Failed to read contest description");
                return None;
            }
        };
        let mut description: ContestDescription = match serde_json::from_str(&content) {
            Ok(description) => description,
            Err(e) => {
                warn!(contest_id, error = %e, "Failed to parse contest description");
                return None;
            }
        };
        if description.contest_id != contest_id {
            warn!(
                contest_id,
                file_contest_id = description.contest_id,
                "Contest description id mismatch"
            );
            return None;
        }
        // Spool and fragment paths may be written relative to the contest
        // directory.
        let base = self.contest_dir(contest_id);
        for dir in &mut description.result_dirs {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        if let Some(fragments) = &mut description.fragments_dir
            && fragments.is_relative()
        {
            *fragments = base.join(&*fragments);
        }
        Some(Arc::new(description))
    }
}

impl ContestResolver for FsContestResolver {
    fn resolve(&self, contest_id: ContestId) -> Option<Arc<ContestDescription>> {
        let path = self.description_path(contest_id);
        let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;

        let mut cache = self.cache.lock().unwrap();
        if let Some(cached) = cache.get(&contest_id)
            && cached.modified == modified
        {
            return Some(cached.description.clone());
        }

        let description = self.read_description(contest_id, &path)?;
        cache.insert(
            contest_id,
            CachedDescription {
                modified,
                description: description.clone(),
            },
        );
        Some(description)
    }
}
