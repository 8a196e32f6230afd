// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Command-line runner around the sspkit controller.
//!
//! Loads layered configuration, wires logging and drives a streaming session against the
//! synthetic camera source, optionally dumping the video elementary stream to disk.

pub mod cli;
pub mod config;
pub mod dump;
pub mod logging;
pub mod session;

pub use config::Config;
pub use session::{SessionOptions, SessionReport, StopReason};
