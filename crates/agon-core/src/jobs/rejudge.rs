// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mass rejudge job.

use tracing::warn;

use super::{Job, StepOutcome};
use crate::engine::RunId;
use crate::tenant_cache::{ContestId, TenantCache};

/// Queues a captured set of runs for rejudging, a budgeted slice at a
/// time.
///
/// The run set is fixed at enqueue; submissions arriving later are not
/// picked up. Unknown runs are logged and skipped. If the contest is
/// evicted mid-job the remainder is abandoned.
pub struct RejudgeJob {
    contest_id: ContestId,
    runs: Vec<RunId>,
    cursor: usize,
}

impl RejudgeJob {
    /// Capture a run set for one contest.
    pub fn new(contest_id: ContestId, runs: Vec<RunId>) -> Self {
        Self {
            contest_id,
            runs,
            cursor: 0,
        }
    }
}

impl Job for RejudgeJob {
    fn step(&mut self, tenants: &mut TenantCache, budget: usize) -> StepOutcome {
        let contest_id = self.contest_id;
        let judging = tenants
            .try_get_mut(contest_id)
            .and_then(|tenant| tenant.judging.as_deref_mut());
        let Some(judging) = judging else {
            warn!(
                contest_id,
                queued = self.cursor,
                total = self.runs.len(),
                "Rejudge abandoned: contest no longer loaded"
            );
            return StepOutcome::done(0);
        };

        let mut done = 0;
        while done < budget && self.cursor < self.runs.len() {
            let run = self.runs[self.cursor];
            self.cursor += 1;
            done += 1;
            if let Err(e) = judging.schedule_rejudge(run) {
                warn!(contest_id, run, error = %e, "Rejudge skipped run");
            }
        }

        StepOutcome {
            completed: self.cursor >= self.runs.len(),
            work_done: done,
        }
    }

    fn describe(&self) -> String {
        format!(
            "rejudge contest {}: {}/{} runs queued",
            self.contest_id,
            self.cursor,
            self.runs.len()
        )
    }

    fn contest_id(&self) -> Option<ContestId> {
        Some(self.contest_id)
    }
}
