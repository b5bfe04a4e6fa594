// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A deadline that only ever moves forward.
//!
//! The run timeout is rolling, not absolute: every time the bucket yields
//! genuinely new data the deadline is pushed out, but it never moves
//! backwards. Built on the tokio clock so tests can drive it with paused
//! time.

use std::time::Duration;
use tokio::time::Instant;

pub(crate) fn rolling_deadline(initial: Duration) -> RollingDeadline {
    RollingDeadline {
        deadline: Instant::now() + initial,
    }
}

/// See [`rolling_deadline`].
#[derive(Clone, Debug)]
pub(crate) struct RollingDeadline {
    deadline: Instant,
}

impl RollingDeadline {
    /// Moves the deadline to `now + window` if that is later than the
    /// current deadline.
    pub(crate) fn extend(&mut self, window: Duration) {
        let candidate = Instant::now() + window;
        if candidate > self.deadline {
            self.deadline = candidate;
        }
    }

    pub(crate) fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}
