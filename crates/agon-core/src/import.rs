// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deferred administrative imports.
//!
//! A bulk import (answer database replacement, roster merge) must not run
//! while judged submissions are in flight, so it is parked on the tenant
//! with judging suspended and resolved later: by the tick once in-flight
//! runs drain, or by connection teardown when the requesting client goes
//! away first. Both paths converge on [`PendingImport::finalize`]; the
//! client binding is a first-wins slot so a dead connection is never
//! written to.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::JudgingState;
use crate::error::Result;

/// Outcome report delivered to the waiting client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Whether the import applied cleanly.
    pub success: bool,
    /// Human-readable report text.
    pub message: String,
}

/// A bulk operation applied once the contest is quiescent.
pub trait ImportOperation: Send {
    /// Apply the import to the contest's judging state.
    ///
    /// Runs with judging suspended and zero submissions in flight.
    fn apply(&mut self, state: &mut dyn JudgingState) -> Result<ImportReport>;

    /// One-line description for status listings.
    fn describe(&self) -> String;
}

/// Delivery channel back to the requesting client.
pub trait ImportReply: Send {
    /// Stream the final report to the client.
    fn deliver(self: Box<Self>, report: &ImportReport);
}

/// Shared client binding between a pending import and its session.
///
/// Whoever resolves the slot first wins: finalize takes the binding to
/// deliver the report, the session cancels it on disconnect. The loser
/// finds the slot empty and does nothing.
#[derive(Clone)]
pub struct ReplySlot {
    inner: Arc<Mutex<Option<Box<dyn ImportReply>>>>,
}

impl ReplySlot {
    /// Bind a client delivery channel.
    pub fn new(reply: Box<dyn ImportReply>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(reply))),
        }
    }

    /// Slot with no client, for operator-initiated imports.
    pub fn detached() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Take the client binding, if this caller wins.
    pub fn take(&self) -> Option<Box<dyn ImportReply>> {
        self.inner.lock().unwrap().take()
    }

    /// Drop the client binding on disconnect. Returns whether this call
    /// won the slot.
    pub fn cancel(&self) -> bool {
        self.inner.lock().unwrap().take().is_some()
    }

    /// Whether a client is still bound.
    pub fn is_bound(&self) -> bool {
        self.inner.lock().unwrap().is_some()
    }
}

/// How a pending import was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The operation ran; its report, failure reports included.
    Applied(ImportReport),
    /// In-flight runs prevented applying; the operation was dropped.
    Abandoned,
}

/// An administrative import parked until in-flight runs drain.
///
/// While a tenant carries one it is protected from the expiry sweep and
/// its judging stays suspended.
pub struct PendingImport {
    ticket: Uuid,
    scheduled_at: DateTime<Utc>,
    op: Box<dyn ImportOperation>,
    reply: ReplySlot,
    prior_testing_suspended: bool,
}

impl PendingImport {
    /// Park an import. `prior_testing_suspended` is the suspension flag
    /// value to restore once the import resolves.
    pub fn new(
        op: Box<dyn ImportOperation>,
        reply: ReplySlot,
        prior_testing_suspended: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            ticket: Uuid::new_v4(),
            scheduled_at: now,
            op,
            reply,
            prior_testing_suspended,
        }
    }

    /// Ticket for log correlation.
    pub fn ticket(&self) -> Uuid {
        self.ticket
    }

    /// When the import was parked.
    pub fn scheduled_at(&self) -> DateTime<Utc> {
        self.scheduled_at
    }

    /// One-line description of the parked operation.
    pub fn describe(&self) -> String {
        self.op.describe()
    }

    /// Resolve the import now.
    ///
    /// The operation applies only when no judged submissions are in
    /// flight; otherwise it is abandoned. The report goes to the client
    /// if one is still bound. The judging-suspension flag is restored in
    /// every case, and submissions queued while suspended are released
    /// when suspension is thereby lifted.
    pub fn finalize(self, state: &mut dyn JudgingState) -> ImportOutcome {
        let Self {
            ticket,
            op: mut operation,
            reply,
            prior_testing_suspended,
            ..
        } = self;
        let contest_id = state.contest_id();

        let outcome = if state.transient_run_count() == 0 {
            let report = match operation.apply(state) {
                Ok(report) => report,
                Err(e) => {
                    error!(contest_id, ticket = %ticket, error = %e, "Import failed");
                    ImportReport {
                        success: false,
                        message: format!("import failed: {e}"),
                    }
                }
            };
            info!(
                contest_id,
                ticket = %ticket,
                success = report.success,
                "Import finalized"
            );
            ImportOutcome::Applied(report)
        } else {
            info!(
                contest_id,
                ticket = %ticket,
                in_flight = state.transient_run_count(),
                "Import abandoned"
            );
            ImportOutcome::Abandoned
        };

        if let Some(client) = reply.take() {
            match &outcome {
                ImportOutcome::Applied(report) => client.deliver(report),
                ImportOutcome::Abandoned => client.deliver(&ImportReport {
                    success: false,
                    message: "import abandoned: judged submissions still in flight".to_string(),
                }),
            }
        }

        state.set_testing_suspended(prior_testing_suspended);
        if !prior_testing_suspended {
            state.release_queued_runs();
        }
        outcome
    }
}
