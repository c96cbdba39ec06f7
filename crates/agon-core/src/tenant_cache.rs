// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tenant cache.
//!
//! One long-lived process serves many contests; each loaded contest is a
//! tenant record holding its judging handle, fragment caches, and access
//! stats. The cache is a `Vec` kept strictly ascending by contest id:
//! with tens to low hundreds of live contests, binary search plus a
//! shifting insert beats any tree or hash map and keeps iteration order
//! deterministic for the scheduler tick.
//!
//! The cache is the single owner of judging handles. Request handlers
//! re-resolve records on every use and never hold them across ticks;
//! eviction is therefore safe whenever the control thread runs it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::engine::{JudgingEngine, JudgingState};
use crate::error::{Error, Result};
use crate::fragments::FragmentSet;
use crate::import::PendingImport;
use crate::resolver::{ContestDescription, ContestResolver};

/// Contest identifier. Positive, externally assigned.
pub type ContestId = i32;

/// Highest accepted contest id (ids name six-digit data directories).
pub const MAX_CONTEST_ID: ContestId = 999_999;

/// Whether an id is inside the accepted contest id range.
pub fn valid_contest_id(contest_id: ContestId) -> bool {
    (1..=MAX_CONTEST_ID).contains(&contest_id)
}

/// Cached runtime state for one contest.
pub struct Tenant {
    contest_id: ContestId,
    /// Refreshed on lookup and whenever the tick does work for the
    /// tenant; drives expiry.
    pub last_access: DateTime<Utc>,
    /// Heavyweight judging state, `None` until the first successful load.
    pub judging: Option<Box<dyn JudgingState>>,
    /// Administrative import parked on this tenant, if any. While set
    /// the expiry sweep leaves the tenant alone.
    pub pending_import: Option<PendingImport>,
    /// Served template fragments, built on first use.
    pub fragments: Option<FragmentSet>,
    /// Set by the directory-service bridge; makes the next judging load
    /// re-fetch the participant roster.
    pub roster_stale: bool,
}

impl Tenant {
    fn new(contest_id: ContestId, now: DateTime<Utc>) -> Self {
        Self {
            contest_id,
            last_access: now,
            judging: None,
            pending_import: None,
            fragments: None,
            roster_stale: false,
        }
    }

    /// Contest this record belongs to.
    pub fn contest_id(&self) -> ContestId {
        self.contest_id
    }

    /// Refresh the access stamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_access = now;
    }

    /// Fragment cache for this contest, built on first use.
    ///
    /// `None` when the description configures no fragments directory.
    pub fn fragment_set(&mut self, description: &ContestDescription) -> Option<&mut FragmentSet> {
        if self.fragments.is_none() {
            let dir = description.fragments_dir.as_ref()?;
            self.fragments = Some(FragmentSet::for_dir(dir));
        }
        self.fragments.as_mut()
    }
}

/// Sorted index of tenant records, strictly ascending by contest id.
#[derive(Default)]
pub struct TenantCache {
    tenants: Vec<Tenant>,
}

impl TenantCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of loaded tenants.
    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    /// Whether no tenant is loaded.
    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }

    /// Tenants in ascending contest id order.
    pub fn iter(&self) -> impl Iterator<Item = &Tenant> {
        self.tenants.iter()
    }

    /// Mutable tenants in ascending contest id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Tenant> {
        self.tenants.iter_mut()
    }

    /// Loaded contest ids, ascending.
    pub fn contest_ids(&self) -> Vec<ContestId> {
        self.tenants.iter().map(|t| t.contest_id).collect()
    }

    fn position(&self, contest_id: ContestId) -> std::result::Result<usize, usize> {
        self.tenants
            .binary_search_by_key(&contest_id, |t| t.contest_id)
    }

    /// Record for a contest, created at its sorted position if absent.
    ///
    /// Fails only on an out-of-range id. An existing record has its
    /// access stamp refreshed; a new one starts with no judging handle.
    pub fn get_or_create(
        &mut self,
        contest_id: ContestId,
        now: DateTime<Utc>,
    ) -> Result<&mut Tenant> {
        if !valid_contest_id(contest_id) {
            return Err(Error::InvalidContestId(contest_id));
        }
        let index = match self.position(contest_id) {
            Ok(index) => {
                self.tenants[index].last_access = now;
                index
            }
            Err(index) => {
                // Inserting at the end (new maximum, or empty cache) is a
                // plain push; anything else shifts the tail.
                self.tenants.insert(index, Tenant::new(contest_id, now));
                index
            }
        };
        Ok(&mut self.tenants[index])
    }

    /// Pure lookup: no record created, no access stamp refreshed.
    pub fn try_get(&self, contest_id: ContestId) -> Option<&Tenant> {
        self.position(contest_id).ok().map(|i| &self.tenants[i])
    }

    /// Mutable pure lookup.
    pub fn try_get_mut(&mut self, contest_id: ContestId) -> Option<&mut Tenant> {
        self.position(contest_id)
            .ok()
            .map(|i| &mut self.tenants[i])
    }

    /// Remove and dispose one record. Returns whether one existed.
    ///
    /// Dirty state is flushed through the judging handle and the handle
    /// released through the engine, best-effort: flush failures are
    /// logged and eviction proceeds. A still-parked import is dropped
    /// unresolved; callers wanting to answer its client finalize it
    /// before evicting.
    pub fn evict(
        &mut self,
        contest_id: ContestId,
        engine: &dyn JudgingEngine,
        resolver: &dyn ContestResolver,
    ) -> bool {
        match self.position(contest_id) {
            Ok(index) => {
                let tenant = self.tenants.remove(index);
                Self::dispose(tenant, engine, resolver);
                true
            }
            Err(_) => false,
        }
    }

    /// Evict every record (process shutdown).
    pub fn evict_all(&mut self, engine: &dyn JudgingEngine, resolver: &dyn ContestResolver) {
        for tenant in self.tenants.drain(..) {
            Self::dispose(tenant, engine, resolver);
        }
    }

    /// Evict records untouched for longer than `window`.
    ///
    /// Tenants with a parked import or with submissions still out at the
    /// judge are skipped and picked up by a later sweep. Survivor order
    /// is unchanged. Returns the number of evicted records.
    pub fn sweep_expired(
        &mut self,
        now: DateTime<Utc>,
        window: Duration,
        engine: &dyn JudgingEngine,
        resolver: &dyn ContestResolver,
    ) -> usize {
        let cutoff = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| now.checked_sub_signed(w));
        let Some(cutoff) = cutoff else {
            return 0;
        };

        let mut evicted = 0;
        let mut index = 0;
        while index < self.tenants.len() {
            let tenant = &self.tenants[index];
            let expired = tenant.last_access < cutoff;
            let busy = tenant.pending_import.is_some()
                || tenant
                    .judging
                    .as_ref()
                    .is_some_and(|j| j.transient_run_count() > 0);
            if !expired || busy {
                if expired {
                    debug!(
                        contest_id = tenant.contest_id,
                        "Expired tenant retained: work in flight"
                    );
                }
                index += 1;
                continue;
            }
            let tenant = self.tenants.remove(index);
            Self::dispose(tenant, engine, resolver);
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, remaining = self.len(), "Expired tenants swept");
        }
        evicted
    }

    fn dispose(mut tenant: Tenant, engine: &dyn JudgingEngine, resolver: &dyn ContestResolver) {
        let contest_id = tenant.contest_id;
        if let Some(mut judging) = tenant.judging.take() {
            if let Err(e) = judging.flush_status() {
                warn!(contest_id, error = %e, "Status flush failed during eviction");
            }
            if let Err(e) = judging.flush_scores() {
                warn!(contest_id, error = %e, "Score flush failed during eviction");
            }
            let description = resolver.resolve(contest_id);
            engine.destroy(judging, description.as_deref());
        }
        info!(contest_id, "Tenant evicted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;
    use crate::import::{ImportOperation, ImportReport, ReplySlot};
    use crate::resolver::StaticResolver;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn load(cache: &mut TenantCache, engine: &MockEngine, contest_id: ContestId, now: DateTime<Utc>) {
        let tenant = cache.get_or_create(contest_id, now).unwrap();
        tenant.judging = Some(engine.load(contest_id, false).unwrap());
    }

    struct NoopImport;

    impl ImportOperation for NoopImport {
        fn apply(&mut self, _state: &mut dyn JudgingState) -> Result<ImportReport> {
            Ok(ImportReport {
                success: true,
                message: String::new(),
            })
        }

        fn describe(&self) -> String {
            "noop".to_string()
        }
    }

    fn park_import(tenant: &mut Tenant, now: DateTime<Utc>) {
        tenant.pending_import = Some(PendingImport::new(
            Box::new(NoopImport),
            ReplySlot::detached(),
            false,
            now,
        ));
    }

    #[test]
    fn test_insert_keeps_ascending_order() {
        let mut cache = TenantCache::new();
        for contest_id in [2, 5, 9] {
            cache.get_or_create(contest_id, at(0)).unwrap();
        }

        cache.get_or_create(7, at(1)).unwrap();

        assert_eq!(cache.contest_ids(), vec![2, 5, 7, 9]);
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut cache = TenantCache::new();
        let first = cache.get_or_create(5, at(0)).unwrap() as *const Tenant;
        let second = cache.get_or_create(5, at(10)).unwrap() as *const Tenant;

        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.try_get(5).unwrap().last_access, at(10));
    }

    #[test]
    fn test_out_of_range_ids_rejected() {
        let mut cache = TenantCache::new();

        for bad in [0, -3, MAX_CONTEST_ID + 1] {
            let result = cache.get_or_create(bad, at(0));
            assert!(matches!(result, Err(Error::InvalidContestId(id)) if id == bad));
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn test_try_get_neither_creates_nor_touches() {
        let mut cache = TenantCache::new();
        assert!(cache.try_get(5).is_none());
        assert!(cache.is_empty());

        cache.get_or_create(5, at(0)).unwrap();
        let _ = cache.try_get(5).unwrap();

        assert_eq!(cache.try_get(5).unwrap().last_access, at(0));
    }

    #[test]
    fn test_fragment_set_built_once_from_description() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("header.html"), "<h1>Round</h1>").unwrap();
        let mut cache = TenantCache::new();
        let tenant = cache.get_or_create(5, at(0)).unwrap();

        let plain = ContestDescription::new(5, "Test");
        assert!(tenant.fragment_set(&plain).is_none());

        let mut with_fragments = ContestDescription::new(5, "Test");
        with_fragments.fragments_dir = Some(tmp.path().to_path_buf());
        let fragments = tenant.fragment_set(&with_fragments).unwrap();
        assert_eq!(&*fragments.header.refresh(), "<h1>Round</h1>");

        // Built once; later lookups reuse the cached set even when the
        // description stops naming a directory.
        assert!(tenant.fragment_set(&plain).is_some());
    }

    #[test]
    fn test_evict_removes_exactly_one_preserving_order() {
        let engine = MockEngine::new();
        let resolver = StaticResolver::new();
        let mut cache = TenantCache::new();
        for contest_id in [2, 5, 7, 9] {
            cache.get_or_create(contest_id, at(0)).unwrap();
        }

        assert!(cache.evict(5, &engine, &resolver));
        assert_eq!(cache.contest_ids(), vec![2, 7, 9]);

        // Absent id is an idempotent no-op.
        assert!(!cache.evict(5, &engine, &resolver));
        assert_eq!(cache.contest_ids(), vec![2, 7, 9]);
    }

    #[test]
    fn test_evict_flushes_and_destroys_through_engine() {
        let engine = MockEngine::new();
        let resolver = StaticResolver::new().with(ContestDescription::new(5, "Test"));
        let mut cache = TenantCache::new();
        load(&mut cache, &engine, 5, at(0));

        assert!(cache.evict(5, &engine, &resolver));

        let cell = engine.contest(5);
        let data = cell.lock().unwrap();
        assert!(data.destroyed);
        assert_eq!(data.status_flushes, 1);
        assert_eq!(data.score_flushes, 1);
        assert_eq!(data.destroy_had_description, Some(true));
    }

    #[test]
    fn test_evict_proceeds_when_flush_fails() {
        let engine = MockEngine::new();
        let resolver = StaticResolver::new();
        let mut cache = TenantCache::new();
        load(&mut cache, &engine, 5, at(0));
        engine.contest(5).lock().unwrap().fail_status_flush = true;

        assert!(cache.evict(5, &engine, &resolver));

        let cell = engine.contest(5);
        let data = cell.lock().unwrap();
        assert!(data.destroyed);
        assert_eq!(data.destroy_had_description, Some(false));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evict_all_empties_cache() {
        let engine = MockEngine::new();
        let resolver = StaticResolver::new();
        let mut cache = TenantCache::new();
        for contest_id in [2, 5, 9] {
            load(&mut cache, &engine, contest_id, at(0));
        }

        cache.evict_all(&engine, &resolver);

        assert!(cache.is_empty());
        for contest_id in [2, 5, 9] {
            assert!(engine.contest(contest_id).lock().unwrap().destroyed);
        }
    }

    #[test]
    fn test_sweep_evicts_all_stale_tenants() {
        let engine = MockEngine::new();
        let resolver = StaticResolver::new();
        let mut cache = TenantCache::new();
        for contest_id in [2, 5, 9] {
            cache.get_or_create(contest_id, at(0)).unwrap();
        }

        let evicted = cache.sweep_expired(at(301), Duration::from_secs(300), &engine, &resolver);

        assert_eq!(evicted, 3);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_keeps_fresh_tenants_in_order() {
        let engine = MockEngine::new();
        let resolver = StaticResolver::new();
        let mut cache = TenantCache::new();
        cache.get_or_create(2, at(0)).unwrap();
        cache.get_or_create(5, at(250)).unwrap();
        cache.get_or_create(9, at(0)).unwrap();
        cache.get_or_create(12, at(280)).unwrap();

        let evicted = cache.sweep_expired(at(301), Duration::from_secs(300), &engine, &resolver);

        assert_eq!(evicted, 2);
        assert_eq!(cache.contest_ids(), vec![5, 12]);
    }

    #[test]
    fn test_sweep_skips_pending_import_until_cleared() {
        let engine = MockEngine::new();
        let resolver = StaticResolver::new();
        let mut cache = TenantCache::new();
        load(&mut cache, &engine, 5, at(0));
        park_import(cache.try_get_mut(5).unwrap(), at(0));

        let evicted = cache.sweep_expired(at(1000), Duration::from_secs(300), &engine, &resolver);
        assert_eq!(evicted, 0);
        assert_eq!(cache.len(), 1);

        // Import resolved; the next sweep removes the tenant.
        cache.try_get_mut(5).unwrap().pending_import = None;
        let evicted = cache.sweep_expired(at(1000), Duration::from_secs(300), &engine, &resolver);
        assert_eq!(evicted, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_skips_tenants_with_runs_in_flight() {
        let engine = MockEngine::new();
        let resolver = StaticResolver::new();
        let mut cache = TenantCache::new();
        load(&mut cache, &engine, 5, at(0));
        engine.contest(5).lock().unwrap().transient_runs = 1;

        let evicted = cache.sweep_expired(at(1000), Duration::from_secs(300), &engine, &resolver);
        assert_eq!(evicted, 0);

        engine.contest(5).lock().unwrap().transient_runs = 0;
        let evicted = cache.sweep_expired(at(1000), Duration::from_secs(300), &engine, &resolver);
        assert_eq!(evicted, 1);
    }

    #[test]
    fn test_ordering_invariant_under_mixed_operations() {
        let engine = MockEngine::new();
        let resolver = StaticResolver::new();
        let mut cache = TenantCache::new();

        // Deterministic pseudo-random walk over inserts and evictions.
        let mut rng: u64 = 0x2545_F491_4F6C_DD1D;
        for step in 0..500 {
            rng ^= rng << 13;
            rng ^= rng >> 7;
            rng ^= rng << 17;
            let contest_id = (rng % 64 + 1) as ContestId;
            if rng % 3 == 0 {
                cache.evict(contest_id, &engine, &resolver);
            } else {
                cache.get_or_create(contest_id, at(step)).unwrap();
            }

            let ids = cache.contest_ids();
            let mut sorted = ids.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(ids, sorted, "order or uniqueness broken at step {step}");
        }
        assert!(!cache.is_empty());
    }
}
