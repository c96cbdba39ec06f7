// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Served template fragments.
//!
//! Contests serve small operator-editable text fragments (page header,
//! footer, menus). The files are tiny but read on every rendered page, so
//! each tenant caches them, spaces the mtime checks out, and re-reads only
//! when the mtime actually moves.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tracing::warn;

/// Default spacing between on-disk checks of a watched file.
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(2);

/// One text file cached with mtime invalidation.
pub struct WatchedText {
    path: PathBuf,
    check_interval: Duration,
    checked_at: Option<Instant>,
    modified: Option<SystemTime>,
    text: Arc<str>,
}

impl WatchedText {
    /// Create an empty cache for a file that may not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_check_interval(path, DEFAULT_CHECK_INTERVAL)
    }

    /// Cache with explicit spacing between on-disk checks. A zero
    /// interval checks on every refresh.
    pub fn with_check_interval(path: impl Into<PathBuf>, check_interval: Duration) -> Self {
        Self {
            path: path.into(),
            check_interval,
            checked_at: None,
            modified: None,
            text: Arc::from(""),
        }
    }

    /// Watched file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached contents without checking the file.
    pub fn cached(&self) -> Arc<str> {
        self.text.clone()
    }

    /// Current contents, re-reading the file if it changed on disk.
    ///
    /// The file is stat-ed at most once per check interval; between
    /// checks the cached text is served as is, so a render burst costs
    /// no filesystem traffic. A missing file yields empty text; an
    /// unreadable file keeps the last loaded contents.
    pub fn refresh(&mut self) -> Arc<str> {
        if let Some(checked_at) = self.checked_at
            && checked_at.elapsed() < self.check_interval
        {
            return self.text.clone();
        }
        self.checked_at = Some(Instant::now());

        let modified = fs::metadata(&self.path).and_then(|m| m.modified()).ok();
        match modified {
            None => {
                if self.modified.is_some() {
                    self.modified = None;
                    self.text = Arc::from("");
                }
            }
            Some(modified) if self.modified == Some(modified) => {}
            Some(modified) => match fs::read_to_string(&self.path) {
                Ok(content) => {
                    self.modified = Some(modified);
                    self.text = Arc::from(content.as_str());
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Fragment read failed");
                }
            },
        }
        self.text.clone()
    }
}

/// The fragment slots a contest serves.
pub struct FragmentSet {
    /// Page header.
    pub header: WatchedText,
    /// Page footer.
    pub footer: WatchedText,
    /// Primary menu.
    pub menu1: WatchedText,
    /// Secondary menu.
    pub menu2: WatchedText,
    /// Section separator.
    pub separator: WatchedText,
    /// Welcome text shown on the landing page.
    pub welcome: WatchedText,
}

impl FragmentSet {
    /// Build the standard slots under a fragments directory.
    pub fn for_dir(dir: &Path) -> Self {
        Self {
            header: WatchedText::new(dir.join("header.html")),
            footer: WatchedText::new(dir.join("footer.html")),
            menu1: WatchedText::new(dir.join("menu_1.html")),
            menu2: WatchedText::new(dir.join("menu_2.html")),
            separator: WatchedText::new(dir.join("separator.html")),
            welcome: WatchedText::new(dir.join("welcome.html")),
        }
    }
}
