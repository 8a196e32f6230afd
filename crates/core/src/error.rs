// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for sspkit.
//!
//! Only synchronous failures of the controller surface through this type. Faults that happen
//! while the streaming client is running are reported through the exception callback slot and
//! never become an `SspKitError`.

use std::time::Duration;
use thiserror::Error;

/// Main error type for sspkit operations.
#[derive(Debug, Error)]
pub enum SspKitError {
    /// Configuration or parameter validation error.
    ///
    /// Examples:
    /// - Zero receive buffer size
    /// - Unreadable configuration file
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The background thread (or its event loop) could not be created.
    ///
    /// This is fatal for the controller: nothing else can run without the loop thread.
    #[error("Failed to spawn background thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// The background thread did not hand over an initialized client in time.
    #[error("Streaming client was not initialized within {0:?}")]
    InitTimeout(Duration),

    /// The streaming client was constructed but its `init` step failed.
    #[error("Streaming client initialization failed: {0}")]
    ClientInit(String),

    /// The background setup finished without handing over a client.
    ///
    /// Examples:
    /// - The setup action panicked
    /// - A previous initialization failure already consumed the handoff
    #[error("Streaming client is unavailable")]
    ClientUnavailable,

    /// Runtime error during normal operation.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O error (file operations, device access).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using `SspKitError`.
pub type Result<T> = std::result::Result<T, SspKitError>;

impl From<SspKitError> for String {
    fn from(err: SspKitError) -> Self {
        err.to_string()
    }
}

// Generic string errors default to Runtime
impl From<String> for SspKitError {
    fn from(s: String) -> Self {
        Self::Runtime(s)
    }
}

impl From<&str> for SspKitError {
    fn from(s: &str) -> Self {
        Self::Runtime(s.to_string())
    }
}
