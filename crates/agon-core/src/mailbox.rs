// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Inbound result spools.
//!
//! Judge hosts deliver compile and run results as files dropped into
//! per-contest spool directories. The directory is a durable mailbox:
//! files stay until ingested, so the scheduler can drain a bounded number
//! per tick and leave the rest for later.

use std::io;
use std::path::{Path, PathBuf};

/// List files pending in a spool directory, in name order.
///
/// Writers follow the dotfile convention: a result is composed under a
/// hidden name and renamed into place, so dotfiles (and subdirectories)
/// are skipped. A missing directory is an empty mailbox, not an error.
pub fn list_pending(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut pending = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if !entry.file_type()?.is_file() {
            continue;
        }
        pending.push(entry.path());
    }
    pending.sort();
    Ok(pending)
}
