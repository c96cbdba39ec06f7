// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end tick loop tests over a real contest data tree.

mod common;

use std::time::Duration;

use agon_core::jobs::RejudgeJob;
use agon_core::resolver::ContestDescription;
use agon_core::scheduler::SchedulerConfig;

use common::{TestContext, at, spool_file};

// ============================================================================
// Lifecycle through the tick
// ============================================================================

#[test]
fn test_scheduled_start_fires_during_tick() {
    let mut ctx = TestContext::new();
    ctx.write_description(&ContestDescription::new(5, "Spring Round"));
    ctx.scheduler.open_contest(5, at(0)).unwrap();
    ctx.engine.contest(5).lock().unwrap().schedule.scheduled_start = Some(at(100));

    assert!(ctx.scheduler.run_tick(at(50)));
    assert!(ctx.hooks.started().is_empty());

    // The tick lands late; the official start is still the scheduled one.
    ctx.scheduler.run_tick(at(130));
    assert_eq!(ctx.hooks.started(), vec![5]);
    assert_eq!(
        ctx.engine.contest(5).lock().unwrap().schedule.start,
        Some(at(100))
    );
    assert_eq!(ctx.scheduler.tenants().try_get(5).unwrap().last_access, at(130));

    // Already started; later ticks change nothing.
    ctx.scheduler.run_tick(at(200));
    assert_eq!(ctx.hooks.started(), vec![5]);
}

#[test]
fn test_duration_stop_uses_official_deadline() {
    let mut ctx = TestContext::new();
    ctx.write_description(&ContestDescription::new(5, "Timed Round"));
    ctx.scheduler.open_contest(5, at(0)).unwrap();
    {
        let cell = ctx.engine.contest(5);
        let mut data = cell.lock().unwrap();
        data.schedule.start = Some(at(0));
        data.schedule.duration = Some(chrono::Duration::seconds(300));
    }

    ctx.scheduler.run_tick(at(200));
    assert!(ctx.hooks.finished().is_empty());

    ctx.scheduler.run_tick(at(412));
    assert_eq!(ctx.hooks.finished(), vec![5]);
    let cell = ctx.engine.contest(5);
    let data = cell.lock().unwrap();
    assert_eq!(data.schedule.stop, Some(at(300)));
    assert!(data.status_flushes >= 1);
}

#[test]
fn test_multiple_contests_start_in_id_order() {
    let mut ctx = TestContext::new();
    for contest_id in [9, 2, 5] {
        ctx.write_description(&ContestDescription::new(contest_id, "Round"));
        ctx.scheduler.open_contest(contest_id, at(0)).unwrap();
        ctx.engine
            .contest(contest_id)
            .lock()
            .unwrap()
            .schedule
            .scheduled_start = Some(at(10));
    }

    ctx.scheduler.run_tick(at(10));

    // The cache iterates ascending regardless of open order.
    assert_eq!(ctx.hooks.started(), vec![2, 5, 9]);
}

// ============================================================================
// Result spools, jobs, and the shared budget
// ============================================================================

#[test]
fn test_spool_drain_respects_budget_across_ticks() {
    let mut ctx = TestContext::with_config(SchedulerConfig {
        work_batch: 4,
        tenant_expiry: Duration::from_secs(1800),
    });
    for contest_id in [3, 7] {
        let mut description = ContestDescription::new(contest_id, "Round");
        description.result_dirs = vec!["results".into()];
        ctx.write_description(&description);
        ctx.scheduler.open_contest(contest_id, at(0)).unwrap();
        let spool = ctx.spool_dir(contest_id, "results");
        for name in ["r1", "r2", "r3"] {
            spool_file(&spool, name);
        }
    }

    // Six files against a budget of four: leftover work is reported.
    assert!(!ctx.scheduler.run_tick(at(1)));
    let ingested = ctx.ingest.ingested();
    assert_eq!(ingested.len(), 4);
    for path in &ingested[..3] {
        assert!(path.starts_with(ctx.contest_dir(3)));
    }
    assert!(ingested[3].starts_with(ctx.contest_dir(7)));

    // The follow-up finishes the job and leaves headroom.
    assert!(ctx.scheduler.run_tick(at(2)));
    assert_eq!(ctx.ingest.ingested().len(), 6);
    assert!(agon_core::mailbox::list_pending(&ctx.spool_dir(7, "results"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_head_job_starves_spools_until_done() {
    let mut ctx = TestContext::new();
    let mut description = ContestDescription::new(5, "Round");
    description.result_dirs = vec!["results".into()];
    ctx.write_description(&description);
    ctx.scheduler.open_contest(5, at(0)).unwrap();
    let spool = ctx.spool_dir(5, "results");
    spool_file(&spool, "r1");
    spool_file(&spool, "r2");

    ctx.scheduler
        .enqueue_job(Box::new(RejudgeJob::new(5, (1..=25).collect())), at(0));

    // Two saturated ticks go entirely to the job.
    assert!(!ctx.scheduler.run_tick(at(1)));
    assert!(!ctx.scheduler.run_tick(at(2)));
    assert!(ctx.ingest.ingested().is_empty());

    // The job's 5-unit tail leaves room for both spool files.
    assert!(ctx.scheduler.run_tick(at(3)));
    assert_eq!(ctx.ingest.ingested().len(), 2);
    assert_eq!(ctx.engine.contest(5).lock().unwrap().rejudged.len(), 25);
    assert!(ctx.scheduler.job_statuses().is_empty());
}

#[test]
fn test_description_edit_visible_between_ticks() {
    let mut ctx = TestContext::new();
    let mut description = ContestDescription::new(5, "Round");
    ctx.write_description(&description);
    ctx.scheduler.open_contest(5, at(0)).unwrap();
    let spool = ctx.spool_dir(5, "results");
    spool_file(&spool, "r1");

    // The description names no spool yet.
    ctx.scheduler.run_tick(at(1));
    assert!(ctx.ingest.ingested().is_empty());

    // Operator adds it; the resolver notices the mtime change. The
    // mtime is pushed firmly past the first write so the edit is never
    // hidden by timestamp granularity.
    description.result_dirs = vec!["results".into()];
    ctx.write_description(&description);
    let later = std::time::SystemTime::now() + Duration::from_secs(10);
    std::fs::File::options()
        .write(true)
        .open(ctx.contest_dir(5).join("contest.json"))
        .unwrap()
        .set_modified(later)
        .unwrap();
    ctx.scheduler.run_tick(at(2));
    assert_eq!(ctx.ingest.ingested().len(), 1);
}

#[test]
fn test_unresolvable_contest_is_skipped_not_failed() {
    let mut ctx = TestContext::new();
    // No contest.json on disk at all.
    ctx.scheduler.open_contest(5, at(0)).unwrap();
    ctx.engine.contest(5).lock().unwrap().schedule.scheduled_start = Some(at(1));

    assert!(ctx.scheduler.run_tick(at(10)));

    assert!(ctx.hooks.started().is_empty());
    assert_eq!(ctx.engine.contest(5).lock().unwrap().maintenance_runs, 0);
    // The record itself stays; serving may still want it.
    assert_eq!(ctx.scheduler.tenants().len(), 1);
}

// ============================================================================
// Expiry within the tick
// ============================================================================

#[test]
fn test_expired_tenant_evicted_only_when_quiescent() {
    let mut ctx = TestContext::with_config(SchedulerConfig {
        work_batch: 10,
        tenant_expiry: Duration::from_secs(300),
    });
    ctx.write_description(&ContestDescription::new(5, "Round"));
    ctx.scheduler.open_contest(5, at(0)).unwrap();
    ctx.engine.contest(5).lock().unwrap().transient_runs = 1;

    // Idle past the window, but runs are still out at the judge.
    ctx.scheduler.run_tick(at(400));
    assert_eq!(ctx.scheduler.tenants().len(), 1);

    ctx.engine.contest(5).lock().unwrap().transient_runs = 0;
    ctx.scheduler.run_tick(at(401));

    assert!(ctx.scheduler.tenants().is_empty());
    let cell = ctx.engine.contest(5);
    let data = cell.lock().unwrap();
    assert!(data.destroyed);
    assert!(data.status_flushes >= 1);
    assert!(data.score_flushes >= 1);
    assert_eq!(data.destroy_had_description, Some(true));
}
