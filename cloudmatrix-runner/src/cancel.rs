// Copyright (c) The cloudmatrix Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cooperative cancellation for matrix runs.
//!
//! Cancellation comes from the embedding IDE (the user hit stop), not from
//! process signals. The runner observes the token at the top of every poll
//! cycle and during the inter-cycle sleep, so cancellation latency is
//! bounded by one cycle.

use tokio::sync::watch;

/// Creates a linked cancellation handle/watch pair.
pub fn cancellation_token() -> (CancellationHandle, CancellationWatch) {
    let (sender, receiver) = watch::channel(false);
    (CancellationHandle { sender }, CancellationWatch { receiver })
}

/// The caller-side handle used to cancel a run.
#[derive(Debug)]
pub struct CancellationHandle {
    sender: watch::Sender<bool>,
}

impl CancellationHandle {
    /// Cancels the run. Idempotent.
    pub fn cancel(&self) {
        // send only fails when every watch is gone, which just means
        // nobody is left to observe the cancellation.
        let _ = self.sender.send(true);
    }

    /// Whether the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

/// The runner-side view of a cancellation token.
#[derive(Clone, Debug)]
pub struct CancellationWatch {
    receiver: watch::Receiver<bool>,
}

impl CancellationWatch {
    /// Whether the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Waits until the run is cancelled. If the handle is dropped without
    /// cancelling, waits forever.
    pub async fn cancelled(&mut self) {
        if self
            .receiver
            .wait_for(|cancelled| *cancelled)
            .await
            .is_err()
        {
            std::future::pending::<()>().await;
        }
    }
}
