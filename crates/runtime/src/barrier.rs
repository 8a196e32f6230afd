// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Single-use initialization handoff between the loop thread and the caller.
//!
//! The loop thread holds the [`ReadySignal`] and fires it exactly once with the value it
//! produced. The caller blocks on the [`InitBarrier`] with a timeout. A timed-out wait does not
//! consume the handoff: a later wait still receives a value signalled late.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;
use tracing::debug;

/// Why a barrier wait returned without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// No value arrived within the timeout. The handoff is still pending.
    Timeout,
    /// The signal was dropped without firing, or the value was already taken.
    Disconnected,
}

/// The sending half, fired once by the loop thread.
pub struct ReadySignal<T> {
    tx: SyncSender<T>,
}

impl<T> ReadySignal<T> {
    pub fn signal(self, value: T) {
        if self.tx.send(value).is_err() {
            debug!("Initialization barrier dropped before the signal fired");
        }
    }
}

/// The receiving half, waited on by the caller.
pub struct InitBarrier<T> {
    rx: Receiver<T>,
    taken: bool,
}

impl<T> InitBarrier<T> {
    /// Blocks until the value arrives or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`WaitError::Timeout`] if nothing arrived in time and
    /// [`WaitError::Disconnected`] if nothing ever will.
    pub fn wait(&mut self, timeout: Duration) -> Result<T, WaitError> {
        if self.taken {
            return Err(WaitError::Disconnected);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(value) => {
                self.taken = true;
                Ok(value)
            },
            Err(RecvTimeoutError::Timeout) => Err(WaitError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(WaitError::Disconnected),
        }
    }

    /// Whether the value has already been received.
    pub const fn is_taken(&self) -> bool {
        self.taken
    }
}

/// Creates a linked signal/barrier pair.
pub fn init_barrier<T>() -> (ReadySignal<T>, InitBarrier<T>) {
    let (tx, rx) = mpsc::sync_channel(1);
    (ReadySignal { tx }, InitBarrier { rx, taken: false })
}
