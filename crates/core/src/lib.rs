// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! sspkit Core - types and contracts shared by the lifecycle controller and its clients.
//!
//! ## Core Modules
//!
//! - [`types`]: Protocol constants (stream styles, encoders, error codes, capabilities) and
//!   [`ClientConfig`]
//! - [`events`]: Caller-facing event payloads and [`EventKind`]
//! - [`client`]: The [`StreamingClient`] contract the controller drives
//! - [`state`]: Controller lifecycle state
//! - [`error`]: Error types and handling

pub mod client;
pub mod error;
pub mod events;
pub mod state;
pub mod types;

// Error handling
pub use error::{Result, SspKitError};

// Client contract
pub use client::{ClientFactory, RawAudioFrame, RawVideoFrame, StreamingClient};

// Event payloads
pub use events::{
    AudioFrame, AudioMeta, EventKind, ExceptionEvent, StreamMeta, VideoFrame, VideoMeta,
};

// Lifecycle
pub use state::LifecycleState;

// Constants and configuration
pub use types::{
    AudioEncoder, Capability, ClientConfig, ErrorCode, StreamStyle, VideoEncoder, DEFAULT_PORT,
};
