// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run events.
//!
//! Events are produced by a [`MatrixRunner`](crate::runner::MatrixRunner)
//! and consumed by the embedding UI's event sink. For a given run the runner
//! is the sole producer, and per-instance events always arrive in the order
//! {started, progress*, at most one payload, exactly one stop}. Cross-
//! instance ordering follows arrival, not enumeration order.

use crate::registry::RunId;
use chrono::{DateTime, Local};

/// A run event.
#[derive(Clone, Debug)]
pub struct RunEvent {
    /// The time at which the event was generated.
    pub timestamp: DateTime<Local>,

    /// The kind of run event this is.
    pub kind: RunEventKind,
}

/// The kind of run event this is.
///
/// Forms part of [`RunEvent`].
#[derive(Clone, Debug)]
pub enum RunEventKind {
    /// The matrix run started.
    RunStarted {
        /// The id of this run.
        run_id: RunId,

        /// Display names of every expected configuration instance, in
        /// enumeration order.
        expected_instances: Vec<String>,
    },

    /// A configuration instance was scheduled for execution.
    ConfigurationScheduled {
        /// The instance's display name.
        name: String,
    },

    /// A configuration instance showed its first signs of life in the
    /// results bucket.
    ConfigurationStarted {
        /// The instance's display name.
        name: String,
    },

    /// A configuration instance's progress text changed.
    ConfigurationProgress {
        /// The instance's display name.
        name: String,

        /// The full progress text as of this poll cycle.
        progress: String,
    },

    /// A configuration instance's raw result payload, transformed for the
    /// downstream parser. Published at most once per instance.
    RawResultPayload {
        /// The instance's display name.
        name: String,

        /// The CRLF-normalized payload with `configuration=` attribution
        /// fields injected.
        payload: String,
    },

    /// A configuration instance reached a terminal state. Fired exactly
    /// once per instance.
    ConfigurationStopped {
        /// The instance's display name.
        name: String,

        /// Why the instance stopped.
        reason: StopReason,

        /// Run statistics as of this event.
        current_stats: RunStats,
    },

    /// End of stream: no further events will arrive for this run.
    Flush {
        /// Final statistics for the run.
        run_stats: RunStats,
    },
}

// Note: the order here matters -- it is the precedence used when a result
// carries more than one terminal fact.
/// The reason a configuration instance stopped.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum StopReason {
    /// A DONE marker was observed for the instance.
    Finished,

    /// The backend reported an infrastructure failure.
    InfrastructureFailure,

    /// The backend rejected the instance at submit time.
    TriggeringError,

    /// The run deadline passed before the instance resolved.
    TimedOut,
}

impl StopReason {
    pub(crate) fn to_static_str(self) -> &'static str {
        match self {
            StopReason::Finished => "finished",
            StopReason::InfrastructureFailure => "infrastructure failure",
            StopReason::TriggeringError => "triggering error",
            StopReason::TimedOut => "timed out",
        }
    }
}

impl From<crate::results::TerminalState> for StopReason {
    fn from(state: crate::results::TerminalState) -> Self {
        use crate::results::TerminalState;
        match state {
            TerminalState::Finished => StopReason::Finished,
            TerminalState::InfrastructureFailure => StopReason::InfrastructureFailure,
            TerminalState::TriggeringError => StopReason::TriggeringError,
        }
    }
}

/// Statistics for a run, updated as configuration instances resolve.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RunStats {
    /// The number of configuration instances the run expects.
    pub expected: usize,

    /// Instances that have shown up in the results bucket.
    pub started: usize,

    /// Instances that finished normally.
    pub finished: usize,

    /// Instances that hit an infrastructure failure.
    pub infrastructure_failures: usize,

    /// Instances the backend rejected at submit time.
    pub triggering_errors: usize,

    /// Instances unresolved when the run deadline passed.
    pub timed_out: usize,
}

impl RunStats {
    /// Records one terminal stop.
    pub(crate) fn on_stopped(&mut self, reason: StopReason) {
        match reason {
            StopReason::Finished => self.finished += 1,
            StopReason::InfrastructureFailure => self.infrastructure_failures += 1,
            StopReason::TriggeringError => self.triggering_errors += 1,
            StopReason::TimedOut => self.timed_out += 1,
        }
    }

    /// Whether every expected instance finished normally.
    pub fn is_success(&self) -> bool {
        self.finished == self.expected
            && self.infrastructure_failures == 0
            && self.triggering_errors == 0
            && self.timed_out == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn stats_track_stop_reasons() {
        let mut stats = RunStats {
            expected: 3,
            ..RunStats::default()
        };
        stats.on_stopped(StopReason::Finished);
        stats.on_stopped(StopReason::Finished);
        stats.on_stopped(StopReason::TimedOut);
        assert_eq!(stats.finished, 2);
        assert_eq!(stats.timed_out, 1);
        assert!(!stats.is_success());
    }

    #[test]
    fn all_finished_is_success() {
        let mut stats = RunStats {
            expected: 1,
            ..RunStats::default()
        };
        stats.on_stopped(StopReason::Finished);
        assert!(stats.is_success());
        assert_eq!(StopReason::Finished.to_static_str(), "finished");
    }
}
