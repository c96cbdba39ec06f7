// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cooperative scheduler over the tenant cache.
//!
//! All contest state is owned by one control loop; request handling and
//! background work interleave on it instead of locking individual
//! records. Each tick runs a fixed sequence under a shared work budget:
//!
//! 1. one bounded slice of the head background job,
//! 2. per tenant: lifecycle evaluation, periodic maintenance, result
//!    spool draining, import finalization,
//! 3. the idle-tenant expiry sweep.
//!
//! The budget counts discrete work units (job slice units, ingested
//! result files). A tick that exhausts it reports leftover work so the
//! driver schedules an immediate follow-up instead of sleeping.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::engine::{ContestHooks, JudgingEngine, ResultIngest};
use crate::error::{Error, Result};
use crate::import::{ImportOperation, ImportOutcome, PendingImport, ReplySlot};
use crate::jobs::{Job, JobQueue, JobStatus};
use crate::lifecycle;
use crate::mailbox;
use crate::resolver::ContestResolver;
use crate::tenant_cache::{ContestId, Tenant, TenantCache, valid_contest_id};

/// Tick tuning knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Work units (job slice units plus result files) one tick may
    /// consume. Must be at least 1.
    pub work_batch: usize,
    /// Idle window after which a quiescent tenant is evicted.
    pub tenant_expiry: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            work_batch: 10,
            tenant_expiry: Duration::from_secs(1800), // 30 minutes
        }
    }
}

impl From<&Config> for SchedulerConfig {
    fn from(config: &Config) -> Self {
        Self {
            work_batch: config.work_batch,
            tenant_expiry: config.tenant_expiry,
        }
    }
}

/// Owner of all live contest state and the work that advances it.
///
/// Not internally synchronized: the host wraps it in whatever single
/// point of entry it uses (the bundled runtime uses an async mutex) and
/// calls [`Scheduler::run_tick`] from exactly one place.
pub struct Scheduler {
    tenants: TenantCache,
    jobs: JobQueue,
    engine: Arc<dyn JudgingEngine>,
    resolver: Arc<dyn ContestResolver>,
    ingest: Arc<dyn ResultIngest>,
    hooks: Arc<dyn ContestHooks>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a scheduler over the given collaborators.
    pub fn new(
        engine: Arc<dyn JudgingEngine>,
        resolver: Arc<dyn ContestResolver>,
        ingest: Arc<dyn ResultIngest>,
        hooks: Arc<dyn ContestHooks>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            tenants: TenantCache::new(),
            jobs: JobQueue::new(),
            engine,
            resolver,
            ingest,
            hooks,
            config,
        }
    }

    /// Tenant cache, read-only.
    pub fn tenants(&self) -> &TenantCache {
        &self.tenants
    }

    /// Tenant cache, for request handlers that mutate records in place.
    pub fn tenants_mut(&mut self) -> &mut TenantCache {
        &mut self.tenants
    }

    /// Tick tuning in effect.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Record for a contest with judging loaded, loading on demand.
    ///
    /// The already-loaded path only refreshes the access stamp. The
    /// loading path honors a stale-roster mark and clears it on success.
    /// A failed load leaves the cache exactly as found: a brand-new
    /// contest is loaded before any record is inserted.
    pub fn open_contest(
        &mut self,
        contest_id: ContestId,
        now: DateTime<Utc>,
    ) -> Result<&mut Tenant> {
        if !valid_contest_id(contest_id) {
            return Err(Error::InvalidContestId(contest_id));
        }
        let loaded = self
            .tenants
            .try_get(contest_id)
            .is_some_and(|t| t.judging.is_some());
        if !loaded {
            let refresh_roster = self
                .tenants
                .try_get(contest_id)
                .is_some_and(|t| t.roster_stale);
            let judging = match self.engine.load(contest_id, refresh_roster) {
                Ok(judging) => judging,
                Err(e) => {
                    warn!(contest_id, error = %e, "Judging load failed");
                    return Err(e.into());
                }
            };
            let tenant = self.tenants.get_or_create(contest_id, now)?;
            tenant.judging = Some(judging);
            tenant.roster_stale = false;
            info!(contest_id, refresh_roster, "Contest loaded");
        }
        self.tenants.get_or_create(contest_id, now)
    }

    /// Directory-service notification: participant data changed.
    ///
    /// Pure lookup semantics, nothing is created or touched. An unknown
    /// contest needs no mark since its eventual load reads fresh data
    /// anyway.
    pub fn roster_invalidated(&mut self, contest_id: ContestId) {
        if let Some(tenant) = self.tenants.try_get_mut(contest_id) {
            tenant.roster_stale = true;
            debug!(contest_id, "Roster marked stale");
        }
    }

    /// Queue a background job; returns its serial.
    pub fn enqueue_job(&mut self, job: Box<dyn Job>, now: DateTime<Utc>) -> u64 {
        self.jobs.enqueue(job, now)
    }

    /// Status of every queued background job, head first.
    pub fn job_statuses(&self) -> Vec<JobStatus> {
        self.jobs.statuses()
    }

    /// Park an administrative import on a loaded contest.
    ///
    /// Judging is suspended for as long as the import is parked; the
    /// prior flag value is restored when it resolves. At most one import
    /// may be parked per contest. Returns the import ticket.
    pub fn schedule_import(
        &mut self,
        contest_id: ContestId,
        op: Box<dyn ImportOperation>,
        reply: ReplySlot,
        now: DateTime<Utc>,
    ) -> Result<Uuid> {
        let Some(tenant) = self.tenants.try_get_mut(contest_id) else {
            return Err(Error::NotLoaded(contest_id));
        };
        if tenant.pending_import.is_some() {
            return Err(Error::ImportPending(contest_id));
        }
        let Some(judging) = tenant.judging.as_deref_mut() else {
            return Err(Error::NotLoaded(contest_id));
        };
        let prior = judging.testing_suspended();
        judging.set_testing_suspended(true);
        let pending = PendingImport::new(op, reply, prior, now);
        let ticket = pending.ticket();
        info!(contest_id, ticket = %ticket, description = %pending.describe(), "Import parked");
        tenant.pending_import = Some(pending);
        tenant.touch(now);
        Ok(ticket)
    }

    /// Resolve a parked import immediately, applied or abandoned.
    ///
    /// Used by session teardown (which cancels the reply binding first)
    /// and by operator cancellation. Returns the outcome, or `None` when
    /// the contest has no import parked.
    pub fn resolve_import(&mut self, contest_id: ContestId) -> Option<ImportOutcome> {
        let tenant = self.tenants.try_get_mut(contest_id)?;
        let pending = tenant.pending_import.take()?;
        let Some(judging) = tenant.judging.as_deref_mut() else {
            warn!(contest_id, "Parked import dropped: judging not loaded");
            return None;
        };
        Some(pending.finalize(judging))
    }

    /// Evict one contest now, resolving any parked import first so its
    /// client is answered. Returns whether a record existed.
    pub fn evict_contest(&mut self, contest_id: ContestId) -> bool {
        self.resolve_import(contest_id);
        self.tenants
            .evict(contest_id, self.engine.as_ref(), self.resolver.as_ref())
    }

    /// Flush and release every tenant. Parked imports are resolved first
    /// so waiting clients get an answer instead of silence.
    pub fn shutdown(&mut self) {
        for contest_id in self.tenants.contest_ids() {
            self.resolve_import(contest_id);
        }
        let count = self.tenants.len();
        self.tenants
            .evict_all(self.engine.as_ref(), self.resolver.as_ref());
        info!(tenants = count, "Scheduler shut down");
    }

    /// One cooperative tick.
    ///
    /// Returns `true` when the tick finished under budget and the host
    /// may sleep until the next one, `false` when leftover work wants an
    /// immediate follow-up.
    pub fn run_tick(&mut self, now: DateTime<Utc>) -> bool {
        let budget = self.config.work_batch;
        let mut done = self.jobs.tick_one(&mut self.tenants, now, budget);

        for tenant in self.tenants.iter_mut() {
            Self::service_tenant(
                tenant,
                self.resolver.as_ref(),
                self.ingest.as_ref(),
                self.hooks.as_ref(),
                now,
                budget,
                &mut done,
            );
        }

        self.tenants.sweep_expired(
            now,
            self.config.tenant_expiry,
            self.engine.as_ref(),
            self.resolver.as_ref(),
        );

        done < budget
    }

    /// Lifecycle-only pass over every loaded tenant.
    ///
    /// Cheap enough to run after each handled request, so starts and
    /// stops are observed promptly between timer ticks. No job slices,
    /// no spool draining, no sweeping.
    pub fn poll_clock(&mut self, now: DateTime<Utc>) {
        for tenant in self.tenants.iter_mut() {
            if tenant.judging.is_none() {
                continue;
            }
            let contest_id = tenant.contest_id();
            let Some(description) = self.resolver.resolve(contest_id) else {
                continue;
            };
            let Some(judging) = tenant.judging.as_deref_mut() else {
                continue;
            };
            if lifecycle::advance_contest(judging, &description, self.hooks.as_ref(), now).is_some()
            {
                tenant.last_access = now;
            }
        }
    }

    /// The per-tenant portion of the tick.
    ///
    /// Any failure here affects only this tenant: an unresolvable
    /// description skips it whole, a failed ingest skips that file.
    fn service_tenant(
        tenant: &mut Tenant,
        resolver: &dyn ContestResolver,
        ingest: &dyn ResultIngest,
        hooks: &dyn ContestHooks,
        now: DateTime<Utc>,
        budget: usize,
        done: &mut usize,
    ) {
        if tenant.judging.is_none() {
            return;
        }
        let contest_id = tenant.contest_id();
        let Some(description) = resolver.resolve(contest_id) else {
            debug!(contest_id, "Contest description unavailable, tenant skipped");
            return;
        };
        let Some(judging) = tenant.judging.as_deref_mut() else {
            return;
        };

        if lifecycle::advance_contest(judging, &description, hooks, now).is_some() {
            tenant.last_access = now;
        }

        judging.periodic_maintenance(now);

        'drain: for dir in &description.result_dirs {
            let pending = match mailbox::list_pending(dir) {
                Ok(pending) => pending,
                Err(e) => {
                    warn!(
                        contest_id,
                        dir = %dir.display(),
                        error = %e,
                        "Result directory scan failed"
                    );
                    continue;
                }
            };
            for path in pending {
                if *done >= budget {
                    break 'drain;
                }
                // A failed file still spends budget; it stays in the
                // spool and is retried next tick.
                *done += 1;
                match ingest.ingest(judging, &path) {
                    Ok(()) => tenant.last_access = now,
                    Err(e) => {
                        warn!(
                            contest_id,
                            path = %path.display(),
                            error = %e,
                            "Result ingest failed"
                        );
                    }
                }
            }
        }

        if tenant.pending_import.is_some()
            && judging.transient_run_count() == 0
            && let Some(pending) = tenant.pending_import.take()
        {
            pending.finalize(judging);
            tenant.last_access = now;
        }
    }
}
