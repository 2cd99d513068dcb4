// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batch cancellation: an explicit cancel flag plus an optional deadline.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Why a batch stopped waiting on unfinished work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// `CancellationSignal::cancel` was called
    Signal,
    /// The signal's deadline elapsed
    Deadline,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Signal => write!(f, "cancellation requested"),
            CancelReason::Deadline => write!(f, "deadline exceeded"),
        }
    }
}

#[derive(Debug)]
struct SignalState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cloneable cancellation handle shared by everything working on one batch.
///
/// Clones observe the same flag, so the caller keeps one clone to trigger
/// `cancel()` while the executor waits on another.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    state: Arc<SignalState>,
    deadline: Option<Instant>,
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SignalState {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
            deadline: None,
        }
    }

    /// Create a signal that also fires once `deadline` is reached.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::new().deadline_at(deadline)
    }

    /// Return a handle sharing this signal's flag, with a deadline attached.
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Check whether the signal has fired, without waiting.
    pub fn fired(&self) -> Option<CancelReason> {
        if self.is_cancelled() {
            return Some(CancelReason::Signal);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::Deadline),
            _ => None,
        }
    }

    /// Resolve once the signal is cancelled or its deadline passes.
    pub async fn cancelled(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.wait_for_cancel() => CancelReason::Signal,
                    _ = tokio::time::sleep_until(deadline) => CancelReason::Deadline,
                }
            }
            None => {
                self.wait_for_cancel().await;
                CancelReason::Signal
            }
        }
    }

    async fn wait_for_cancel(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel() is not missed
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
