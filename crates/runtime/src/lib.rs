// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! sspkit Runtime - drives a streaming client from a background thread without deadlocking
//! the caller.
//!
//! ## Core Modules
//!
//! - [`controller`]: [`SspController`], the public lifecycle surface
//! - [`thread_loop`]: The background thread and its event loop
//! - [`barrier`]: Single-use initialization handoff
//! - [`context`]: Caller execution context and release scopes
//! - [`callbacks`]: Handler slots and their wiring into the client
//! - [`synthetic`]: A camera-free client for tests and demos

pub mod barrier;
pub mod callbacks;
pub mod context;
pub mod controller;
pub mod synthetic;
pub mod thread_loop;

pub use barrier::{init_barrier, InitBarrier, ReadySignal, WaitError};
pub use callbacks::{CallbackRegistry, Handler, HandlerTable};
pub use context::{CallerContext, ContextGuard};
pub use controller::{
    ControllerOptions, PendingSettings, SspController, CONTROL_THREAD_NAME, DEFAULT_INIT_TIMEOUT,
    DEFAULT_THREAD_NAME,
};
pub use synthetic::{
    SyntheticClient, SyntheticEvent, SyntheticInjector, SyntheticProbe, SyntheticProfile,
    SyntheticSource,
};
pub use thread_loop::ThreadLoop;
