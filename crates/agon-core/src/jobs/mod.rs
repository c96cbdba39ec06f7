// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Background job queue.
//!
//! Arbitrarily long operations (mass rejudges, archival passes) run as
//! resumable jobs: each tick the queue offers the head job one bounded
//! slice of work. Only the head ever runs, so jobs finish strictly in
//! enqueue order; the queue owns its jobs and drops them exactly once on
//! dequeue.

pub mod rejudge;

pub use rejudge::RejudgeJob;

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::tenant_cache::{ContestId, TenantCache};

/// Result of one work slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// Whether the job is finished and should be dequeued.
    pub completed: bool,
    /// Discrete work units consumed, at most the offered budget.
    pub work_done: usize,
}

impl StepOutcome {
    /// The job finished within this slice.
    pub fn done(work_done: usize) -> Self {
        Self {
            completed: true,
            work_done,
        }
    }

    /// The job wants another slice.
    pub fn in_progress(work_done: usize) -> Self {
        Self {
            completed: false,
            work_done,
        }
    }
}

/// A resumable background operation.
///
/// A job keeps its own cursor and performs at most `budget` units of
/// work per slice. A job that hits a fatal error logs it and reports
/// itself completed; the queue has no retry policy.
pub trait Job: Send {
    /// Advance by at most `budget` units of work.
    fn step(&mut self, tenants: &mut TenantCache, budget: usize) -> StepOutcome;

    /// One-line progress description for status listings.
    fn describe(&self) -> String;

    /// Tenant this job works for, if any; its access stamp is refreshed
    /// on every slice.
    fn contest_id(&self) -> Option<ContestId> {
        None
    }
}

struct QueuedJob {
    id: u64,
    enqueued_at: DateTime<Utc>,
    job: Box<dyn Job>,
}

/// Status row for one queued job.
#[derive(Debug, Clone)]
pub struct JobStatus {
    /// Queue serial, unique and monotonically increasing.
    pub id: u64,
    /// When the job was enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// Tenant association, if any.
    pub contest_id: Option<ContestId>,
    /// Job-reported progress text.
    pub description: String,
}

/// FIFO queue of background jobs.
#[derive(Default)]
pub struct JobQueue {
    entries: VecDeque<QueuedJob>,
    last_serial: u64,
}

impl JobQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued jobs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a job and assign its serial.
    pub fn enqueue(&mut self, job: Box<dyn Job>, now: DateTime<Utc>) -> u64 {
        self.last_serial += 1;
        let id = self.last_serial;
        debug!(job_id = id, description = %job.describe(), "Job enqueued");
        self.entries.push_back(QueuedJob {
            id,
            enqueued_at: now,
            job,
        });
        id
    }

    /// Offer the head job one bounded slice.
    ///
    /// The head's associated tenant is touched first, then the job steps.
    /// A completed job is dequeued and dropped. Returns the work units
    /// consumed.
    pub fn tick_one(&mut self, tenants: &mut TenantCache, now: DateTime<Utc>, budget: usize) -> usize {
        let Some(head) = self.entries.front_mut() else {
            return 0;
        };
        if let Some(contest_id) = head.job.contest_id()
            && let Some(tenant) = tenants.try_get_mut(contest_id)
        {
            tenant.touch(now);
        }
        let outcome = head.job.step(tenants, budget);
        let work_done = outcome.work_done.min(budget);
        if outcome.completed {
            let id = head.id;
            self.entries.pop_front();
            info!(job_id = id, remaining = self.entries.len(), "Job completed");
        }
        work_done
    }

    /// Status of every queued job, head first.
    pub fn statuses(&self) -> Vec<JobStatus> {
        self.entries
            .iter()
            .map(|entry| JobStatus {
                id: entry.id,
                enqueued_at: entry.enqueued_at,
                contest_id: entry.job.contest_id(),
                description: entry.job.describe(),
            })
            .collect()
    }
}
