// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Contest lifecycle state machine.
//!
//! A contest's position in time is derived, never stored: the stored
//! schedule timestamps plus the wall clock decide whether a start or stop
//! threshold has been crossed. The derivation is a pure function so the
//! machine can be tested without any loaded contest state; applying a
//! transition (recording timestamps, firing hooks) is layered on top.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::engine::{ContestHooks, JudgingState};
use crate::resolver::ContestDescription;

/// Schedule timestamps stored in a contest's state.
///
/// `duration` unset means the contest runs to `finish_at` (or forever);
/// `duration` set means it runs for that long from the recorded start,
/// and any `finish_at` is ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContestSchedule {
    /// When the contest is due to start automatically.
    pub scheduled_start: Option<DateTime<Utc>>,
    /// Official start, recorded once the contest has started.
    pub start: Option<DateTime<Utc>>,
    /// Official stop, recorded once the contest has finished.
    pub stop: Option<DateTime<Utc>>,
    /// Contest length measured from the official start.
    pub duration: Option<Duration>,
    /// Absolute finish deadline, honored only without a duration.
    pub finish_at: Option<DateTime<Utc>>,
}

/// A threshold crossing the lifecycle machine wants applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Start the contest; `at` becomes the official start time.
    Start {
        /// Scheduled start that was crossed.
        at: DateTime<Utc>,
    },
    /// Stop the contest; `at` becomes the official stop time.
    Stop {
        /// Deadline that was crossed.
        at: DateTime<Utc>,
    },
}

/// Derive the transition due at `now`, if any.
///
/// At most one transition fires per evaluation; the branches are mutually
/// exclusive by construction. Re-evaluating without a newly-crossed
/// threshold yields `None`.
pub fn pending_transition(schedule: &ContestSchedule, now: DateTime<Utc>) -> Option<Transition> {
    if let (Some(start), None) = (schedule.start, schedule.stop) {
        match schedule.duration {
            Some(duration) => {
                if let Some(deadline) = start.checked_add_signed(duration)
                    && now >= deadline
                {
                    return Some(Transition::Stop { at: deadline });
                }
            }
            None => {
                if let Some(finish) = schedule.finish_at {
                    // A deadline earlier than the recorded start is corrupt
                    // data; ignore it for this evaluation.
                    if finish >= start && now >= finish {
                        return Some(Transition::Stop { at: finish });
                    }
                }
            }
        }
        return None;
    }
    if schedule.start.is_none()
        && let Some(scheduled) = schedule.scheduled_start
        && now >= scheduled
    {
        return Some(Transition::Start { at: scheduled });
    }
    None
}

/// Run one lifecycle evaluation for a loaded contest.
///
/// Due contest-event timers are dispatched every call, virtual or not.
/// For non-virtual contests the derived transition (if any) is applied:
/// the official timestamp is recorded, the status file rewritten, and the
/// matching hook fired. Returns the transition that was applied.
pub fn advance_contest(
    state: &mut dyn JudgingState,
    description: &ContestDescription,
    hooks: &dyn ContestHooks,
    now: DateTime<Utc>,
) -> Option<Transition> {
    state.fire_due_timers(now);

    if description.virtual_mode {
        return None;
    }

    let contest_id = state.contest_id();
    let transition = pending_transition(&state.schedule(), now)?;
    match transition {
        Transition::Start { at } => {
            state.record_start(at);
            flush_after_transition(state);
            info!(contest_id, start = %at, "Contest started");
            hooks.contest_started(contest_id, description);
        }
        Transition::Stop { at } => {
            state.record_stop(at);
            flush_after_transition(state);
            info!(contest_id, stop = %at, "Contest finished");
            hooks.contest_finished(contest_id, description);
        }
    }
    Some(transition)
}

fn flush_after_transition(state: &mut dyn JudgingState) {
    // The status file is rewritten on every tick boundary anyway; a failed
    // write here is logged and retried then.
    if let Err(e) = state.flush_status() {
        warn!(contest_id = state.contest_id(), error = %e, "Status flush failed");
    }
}
