// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Controller lifecycle state.
//!
//! ## State Machine
//!
//! ```text
//!       Created
//!          ↓ start
//!    ThreadStarted
//!          ↓
//!  ClientInitializing
//!          ↓ client handed over
//!     ClientReady
//!          ↓ client started
//!       Running ←──┐
//!          ↓ stop  │ start
//!       Stopped ───┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Observable lifecycle phase of a controller.
///
/// Derived from the controller's running flags; transitions are driven only by `start` and
/// `stop`. `Stopped` is not terminal: a later `start` returns to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Nothing started yet.
    Created,
    /// The background thread is running but no client handoff is awaited yet.
    ThreadStarted,
    /// `start` is waiting for (or gave up waiting for) the background client setup.
    ClientInitializing,
    /// The client is initialized but not started.
    ClientReady,
    /// The client is started and may deliver events.
    Running,
    /// The client was stopped after having run.
    Stopped,
}

impl LifecycleState {
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::ThreadStarted => "thread_started",
            Self::ClientInitializing => "client_initializing",
            Self::ClientReady => "client_ready",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
