// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Agon Core - Contest Runtime Scheduling
//!
//! This crate is the runtime core of a contest-serving daemon. It keeps
//! many contests resident in one process, advances their lifecycle on
//! the official clock, drains judge result spools, and runs long
//! administrative operations as resumable background jobs, all from a
//! single cooperative control loop.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Serving Front End                          │
//! │          (request handlers, directory-service bridge)           │
//! └─────────────────────────────────────────────────────────────────┘
//!                  │ open / lookup            │ roster invalidation
//!                  ▼                          ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    agon-core (This Crate)                       │
//! │  ┌────────────┐  ┌────────────┐  ┌───────────┐  ┌───────────┐  │
//! │  │   Tenant   │  │ Background │  │ Lifecycle │  │  Deferred │  │
//! │  │   Cache    │  │ Job Queue  │  │  Machine  │  │  Imports  │  │
//! │  └────────────┘  └────────────┘  └───────────┘  └───────────┘  │
//! │                      Scheduler tick loop                        │
//! └─────────────────────────────────────────────────────────────────┘
//!          │ load / destroy        │ ingest           │ resolve
//!          ▼                       ▼                  ▼
//! ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐
//! │  Judging Engine  │  │  Result Spools   │  │  Contest Data    │
//! │  (per contest)   │  │  (directories)   │  │  (contest.json)  │
//! └──────────────────┘  └──────────────────┘  └──────────────────┘
//! ```
//!
//! # The Tick
//!
//! All mutation funnels through [`Scheduler::run_tick`], invoked at a
//! fixed interval by [`runtime::SchedulerRuntime`]. One tick runs:
//!
//! | Step | Work |
//! |------|------|
//! | 1 | One bounded slice of the head background job |
//! | 2 | Per tenant: lifecycle evaluation and due timers |
//! | 3 | Per tenant: periodic judging maintenance |
//! | 4 | Per tenant: drain result spool files into the engine |
//! | 5 | Per tenant: finalize a parked import once runs drain |
//! | 6 | Evict tenants idle past the expiry window |
//!
//! Steps 1 and 4 share one work budget per tick
//! ([`scheduler::SchedulerConfig::work_batch`]); a tick that exhausts it
//! reports leftover work and the runtime follows up immediately instead
//! of sleeping.
//!
//! # Contest Lifecycle
//!
//! ```text
//!    ┌───────────┐  scheduled_start   ┌─────────┐
//!    │ SCHEDULED │ ──────reached────► │ RUNNING │
//!    └───────────┘                    └────┬────┘
//!                                          │ start + duration elapsed,
//!                                          │ or finish deadline reached
//!                                          ▼
//!                                    ┌──────────┐
//!                                    │ FINISHED │
//!                                    └──────────┘
//! ```
//!
//! Transitions are derived purely from the recorded schedule, so they
//! fire exactly once no matter how often the clock is polled, and the
//! recorded timestamps are the official ones (the crossed threshold,
//! not the polling instant). Contests in virtual mode never transition
//! collectively; each participant runs on an individual clock.
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `AGON_CONTESTS_DIR` | Yes | - | Root directory of contest data |
//! | `AGON_WORK_BATCH` | No | `10` | Work units per tick |
//! | `AGON_TENANT_EXPIRY_SECS` | No | `1800` | Idle window before eviction |
//! | `AGON_TICK_INTERVAL_MS` | No | `250` | Interval between ticks |
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`engine`]: Judging engine abstraction and in-memory mock
//! - [`error`]: Error types for scheduler operations
//! - [`fragments`]: Mtime-cached served page fragments
//! - [`import`]: Deferred administrative imports
//! - [`jobs`]: Resumable background job queue
//! - [`lifecycle`]: Contest start/stop state machine
//! - [`mailbox`]: Result spool directory scanning
//! - [`resolver`]: Contest description lookup
//! - [`runtime`]: Async driver for the scheduler
//! - [`scheduler`]: The cooperative tick loop itself
//! - [`tenant_cache`]: Sorted in-process cache of live contests

#![deny(missing_docs)]

/// Configuration loaded from environment variables.
pub mod config;

/// Judging engine abstraction and the in-memory mock used in tests.
pub mod engine;

/// Error types for scheduler operations.
pub mod error;

/// Mtime-cached page fragments served per contest.
pub mod fragments;

/// Administrative imports deferred until a contest is quiescent.
pub mod import;

/// Resumable background jobs and their FIFO queue.
pub mod jobs;

/// Pure contest start/stop state machine.
pub mod lifecycle;

/// Result spool directory scanning.
pub mod mailbox;

/// Contest description lookup and caching.
pub mod resolver;

/// Async driver ticking the scheduler.
pub mod runtime;

/// The cooperative scheduler tick loop.
pub mod scheduler;

/// Sorted in-process cache of live contest records.
pub mod tenant_cache;

pub use config::Config;
pub use error::Error;
pub use runtime::SchedulerRuntime;
pub use scheduler::Scheduler;
