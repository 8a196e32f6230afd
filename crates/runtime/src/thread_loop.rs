// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The dedicated background thread and the event loop it runs.
//!
//! A [`ThreadLoop`] owns one OS thread driving a current-thread Tokio runtime until it is
//! told to stop. A one-shot setup action runs on that thread, inside the runtime context,
//! before the loop begins servicing tasks. The setup action is consumed by the first start;
//! a restarted loop runs without it.

use sspkit_core::{Result, SspKitError};
use std::thread::{JoinHandle, ThreadId};
use tokio::runtime::{Handle, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Work performed once on the loop thread before the loop runs.
pub type SetupAction = Box<dyn FnOnce(&Handle) + Send>;

struct Worker {
    thread: JoinHandle<()>,
    shutdown: CancellationToken,
}

/// A background thread running an event loop.
pub struct ThreadLoop {
    name: String,
    setup: Option<SetupAction>,
    worker: Option<Worker>,
}

impl ThreadLoop {
    pub fn new<F>(name: impl Into<String>, setup: F) -> Self
    where
        F: FnOnce(&Handle) + Send + 'static,
    {
        Self { name: name.into(), setup: Some(Box::new(setup)), worker: None }
    }

    /// Spawns the thread and its event loop. Does nothing if the loop is already running.
    ///
    /// The runtime is built on the calling thread so that creation failures surface here.
    ///
    /// # Errors
    ///
    /// Returns [`SspKitError::ThreadSpawn`] if the runtime or the OS thread cannot be created.
    /// If the spawn fails after the setup action was handed over, the setup action is lost.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            debug!(thread = %self.name, "Loop thread already running");
            return Ok(());
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SspKitError::ThreadSpawn)?;

        let shutdown = CancellationToken::new();
        let shutdown_thread = shutdown.clone();
        let setup = self.setup.take();
        let name_thread = self.name.clone();

        let thread = std::thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run_loop(&name_thread, runtime, setup, &shutdown_thread))
            .map_err(SspKitError::ThreadSpawn)?;

        info!(thread = %self.name, "Loop thread started");
        self.worker = Some(Worker { thread, shutdown });
        Ok(())
    }

    /// Asks the loop to stop and joins the thread. Does nothing if the loop is not running.
    ///
    /// Tasks still pending on the loop are dropped together with the runtime.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        worker.shutdown.cancel();

        if worker.thread.thread().id() == std::thread::current().id() {
            warn!(thread = %self.name, "Loop stop requested from the loop thread; detaching");
            return;
        }

        if worker.thread.join().is_err() {
            error!(thread = %self.name, "Loop thread panicked");
        } else {
            debug!(thread = %self.name, "Loop thread joined");
        }
    }

    pub const fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Id of the loop thread while it runs.
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.worker.as_ref().map(|worker| worker.thread.thread().id())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ThreadLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    name: &str,
    runtime: Runtime,
    setup: Option<SetupAction>,
    shutdown: &CancellationToken,
) {
    if let Some(setup) = setup {
        let _enter = runtime.enter();
        setup(runtime.handle());
    }

    debug!(thread = name, "Loop running");
    runtime.block_on(shutdown.cancelled());
    debug!(thread = name, "Loop exiting");
}
