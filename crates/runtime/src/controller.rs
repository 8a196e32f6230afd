// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The lifecycle controller.
//!
//! [`SspController`] owns a background [`ThreadLoop`], the client that loop constructs, the
//! handler table and the settings queued for the client. It is the only type callers need:
//!
//! ```ignore
//! let controller = SspController::new(config, factory);
//! controller.set_on_video_data_callback(|frame| println!("{} bytes", frame.len));
//! controller.start()?;
//! // ...
//! controller.stop();
//! ```
//!
//! ## Threading
//!
//! The client is built and initialized on the loop thread. `start` blocks the caller on an
//! initialization barrier until that has happened (or the configured timeout elapses), then
//! applies settings, wires handlers and starts the client from the caller thread. Callers that
//! hold the shared [`CallerContext`] use [`SspController::start_with`] and
//! [`SspController::stop_with`], which release the context around the client calls that may
//! synchronously dispatch handlers.
//!
//! ## Calls from handlers
//!
//! A handler may call `start` or `stop` on the controller that dispatched it. Such a call
//! arrives either on the loop thread or on a thread that is itself inside a client
//! `start`/`stop`, and running it there would wait on work that cannot make progress. These
//! calls are queued instead: they run on a short-lived `ssp-control` thread once the
//! transition in flight has finished, and return immediately.

use crate::barrier::{init_barrier, InitBarrier, WaitError};
use crate::callbacks::{CallbackRegistry, Handler};
use crate::context::{panic_message, released, CallerContext, ContextGuard};
use crate::thread_loop::ThreadLoop;
use sspkit_core::{
    AudioFrame, AudioMeta, Capability, ClientConfig, ClientFactory, EventKind, ExceptionEvent,
    LifecycleState, Result, SspKitError, StreamMeta, StreamingClient, VideoFrame, VideoMeta,
};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::ThreadId;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// How long `start` waits for the background client setup by default.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

pub const DEFAULT_THREAD_NAME: &str = "ssp-loop";

/// Name of the threads that run `start`/`stop` calls issued from handlers.
pub const CONTROL_THREAD_NAME: &str = "ssp-control";

/// Tuning knobs for a controller.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub init_timeout: Duration,
    pub thread_name: String,
    /// Context to dispatch handlers in. A fresh private context is created when `None`.
    pub context: Option<CallerContext>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            init_timeout: DEFAULT_INIT_TIMEOUT,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            context: None,
        }
    }
}

/// Settings queued for the client and applied on every transition to running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingSettings {
    pub is_hlg: bool,
    pub capability: Capability,
    pub debug_print: bool,
}

type ClientHandoff = Result<Box<dyn StreamingClient>>;

struct Lifecycle {
    thread_loop: Option<ThreadLoop>,
    barrier: InitBarrier<ClientHandoff>,
    client: Option<Box<dyn StreamingClient>>,
}

#[derive(Default)]
struct Flags {
    thread_running: AtomicBool,
    awaiting_init: AtomicBool,
    initialized: AtomicBool,
    client_running: AtomicBool,
    stopped: AtomicBool,
}

#[derive(Debug, Clone, Copy)]
enum Request {
    Start,
    Stop,
}

/// State shared between the controller and its control threads.
struct Shared {
    config: ClientConfig,
    init_timeout: Duration,
    context: CallerContext,
    callbacks: CallbackRegistry,
    settings: Mutex<PendingSettings>,
    flags: Flags,
    lifecycle: Mutex<Lifecycle>,
    loop_thread: Mutex<Option<ThreadId>>,
    /// Thread currently inside a client `start`/`stop`.
    transition_owner: Mutex<Option<ThreadId>>,
}

/// Marks the current thread as inside a client transition until dropped.
struct TransitionMark<'a> {
    owner: &'a Mutex<Option<ThreadId>>,
}

impl<'a> TransitionMark<'a> {
    fn enter(owner: &'a Mutex<Option<ThreadId>>) -> Self {
        *owner.lock().unwrap_or_else(PoisonError::into_inner) = Some(std::thread::current().id());
        Self { owner }
    }
}

impl Drop for TransitionMark<'_> {
    fn drop(&mut self) {
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Shared {
    /// True when a blocking `start`/`stop` on this thread could never complete.
    fn is_reentrant(&self) -> bool {
        let current = Some(std::thread::current().id());
        *self.loop_thread.lock().unwrap_or_else(PoisonError::into_inner) == current
            || *self.transition_owner.lock().unwrap_or_else(PoisonError::into_inner) == current
    }

    fn start_inner(&self, guard: Option<&mut ContextGuard<'_>>) -> Result<()> {
        let mut lifecycle = self.lock_lifecycle();
        let lifecycle = &mut *lifecycle;

        let Some(thread_loop) = lifecycle.thread_loop.as_mut() else {
            return Err(SspKitError::ClientUnavailable);
        };
        if !thread_loop.is_running() {
            thread_loop.start()?;
            *self.loop_thread.lock().unwrap_or_else(PoisonError::into_inner) =
                thread_loop.thread_id();
            self.flags.thread_running.store(true, Ordering::SeqCst);
        }

        if lifecycle.client.is_none() {
            self.flags.awaiting_init.store(true, Ordering::SeqCst);
            debug!(timeout = ?self.init_timeout, "Waiting for streaming client initialization");

            match lifecycle.barrier.wait(self.init_timeout) {
                Ok(Ok(client)) => {
                    lifecycle.client = Some(client);
                    self.flags.awaiting_init.store(false, Ordering::SeqCst);
                    self.flags.initialized.store(true, Ordering::SeqCst);
                    info!("Streaming client initialized");
                },
                Ok(Err(e)) => {
                    self.flags.awaiting_init.store(false, Ordering::SeqCst);
                    return Err(e);
                },
                Err(WaitError::Timeout) => {
                    warn!(
                        timeout = ?self.init_timeout,
                        "Streaming client not initialized in time"
                    );
                    return Err(SspKitError::InitTimeout(self.init_timeout));
                },
                Err(WaitError::Disconnected) => {
                    self.flags.awaiting_init.store(false, Ordering::SeqCst);
                    return Err(SspKitError::ClientUnavailable);
                },
            }
        }

        if self.flags.client_running.load(Ordering::SeqCst) {
            debug!("Streaming client already running");
            return Ok(());
        }

        let Some(client) = lifecycle.client.as_mut() else {
            return Err(SspKitError::ClientUnavailable);
        };

        let settings = self.pending_settings();
        client.set_is_hlg(settings.is_hlg);
        client.set_capability(settings.capability);
        client.set_debug_print(settings.debug_print);

        let wired = self.callbacks.snapshot().wire_into(&mut **client, &self.context);
        debug!(wired, ?settings, "Applied settings and wired handlers");

        {
            let _mark = TransitionMark::enter(&self.transition_owner);
            released(guard, || client.start());
        }
        self.flags.client_running.store(true, Ordering::SeqCst);
        info!(host = %self.config.host(), "Streaming client started");
        Ok(())
    }

    fn stop_inner(&self, guard: Option<&mut ContextGuard<'_>>) {
        let mut lifecycle = self.lock_lifecycle();

        if !self.flags.client_running.load(Ordering::SeqCst) {
            debug!("Streaming client not running; nothing to stop");
            return;
        }

        if let Some(client) = lifecycle.client.as_mut() {
            info!("Stopping streaming client");
            let _mark = TransitionMark::enter(&self.transition_owner);
            released(guard, || client.stop());
        }

        self.flags.client_running.store(false, Ordering::SeqCst);
        self.flags.stopped.store(true, Ordering::SeqCst);
        info!("Streaming client stopped");
    }

    fn pending_settings(&self) -> PendingSettings {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_running(&self) -> bool {
        self.flags.client_running.load(Ordering::SeqCst)
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs `request` on a control thread. It waits for any transition in flight to finish first.
fn defer(shared: &Arc<Shared>, request: Request) {
    debug!(?request, "Controller called from a handler; running the request on a control thread");
    let shared = Arc::clone(shared);
    let spawned = std::thread::Builder::new().name(CONTROL_THREAD_NAME.to_string()).spawn(
        move || match request {
            Request::Start => {
                if let Err(e) = shared.start_inner(None) {
                    error!(error = %e, "Start requested by a handler failed");
                }
            },
            Request::Stop => shared.stop_inner(None),
        },
    );
    if let Err(e) = spawned {
        error!(error = %e, ?request, "Failed to spawn control thread; request dropped");
    }
}

/// Lifecycle and synchronization controller for one streaming client.
pub struct SspController {
    shared: Arc<Shared>,
}

impl SspController {
    /// Creates a controller with default options. Nothing runs until [`start`](Self::start).
    pub fn new<F>(config: ClientConfig, factory: F) -> Self
    where
        F: FnOnce(&ClientConfig, &Handle) -> Result<Box<dyn StreamingClient>> + Send + 'static,
    {
        Self::with_options(config, factory, ControllerOptions::default())
    }

    pub fn with_options<F>(config: ClientConfig, factory: F, options: ControllerOptions) -> Self
    where
        F: FnOnce(&ClientConfig, &Handle) -> Result<Box<dyn StreamingClient>> + Send + 'static,
    {
        let factory: ClientFactory = Box::new(factory);
        let (signal, barrier) = init_barrier::<ClientHandoff>();

        let setup_config = config.clone();
        let thread_loop = ThreadLoop::new(options.thread_name, move |handle: &Handle| {
            info!(
                host = %setup_config.host(),
                port = setup_config.port(),
                stream_style = ?setup_config.stream_style(),
                "Constructing streaming client"
            );
            let handoff = factory(&setup_config, handle).and_then(|mut client| {
                client.init().map_err(|e| SspKitError::ClientInit(e.to_string()))?;
                Ok(client)
            });
            if let Err(e) = &handoff {
                error!(error = %e, "Streaming client setup failed");
            }
            signal.signal(handoff);
        });

        let shared = Shared {
            config,
            init_timeout: options.init_timeout,
            context: options.context.unwrap_or_default(),
            callbacks: CallbackRegistry::new(),
            settings: Mutex::new(PendingSettings::default()),
            flags: Flags::default(),
            lifecycle: Mutex::new(Lifecycle {
                thread_loop: Some(thread_loop),
                barrier,
                client: None,
            }),
            loop_thread: Mutex::new(None),
            transition_owner: Mutex::new(None),
        };
        Self { shared: Arc::new(shared) }
    }

    /// Starts streaming, bringing up the background thread and client first if needed.
    ///
    /// Use [`start_with`](Self::start_with) instead when the current thread holds the caller
    /// context. Called from a handler, the start is queued and `Ok(())` is returned at once;
    /// failures of a queued start are logged.
    ///
    /// # Errors
    ///
    /// - [`SspKitError::ThreadSpawn`] if the background thread cannot be created
    /// - [`SspKitError::InitTimeout`] if the client is not handed over in time; a later call
    ///   waits again
    /// - the factory's error, [`SspKitError::ClientInit`] or [`SspKitError::ClientUnavailable`]
    ///   if the background setup produced no client
    pub fn start(&self) -> Result<()> {
        self.start_or_defer(None)
    }

    /// Like [`start`](Self::start), releasing `guard` while the client starts.
    ///
    /// # Errors
    ///
    /// See [`start`](Self::start).
    pub fn start_with(&self, guard: &mut ContextGuard<'_>) -> Result<()> {
        self.start_or_defer(Some(guard))
    }

    /// Stops streaming. Does nothing unless the client is running.
    ///
    /// Called from a handler, the stop is queued and this returns at once.
    pub fn stop(&self) {
        self.stop_or_defer(None);
    }

    /// Like [`stop`](Self::stop), releasing `guard` while the client stops.
    pub fn stop_with(&self, guard: &mut ContextGuard<'_>) {
        self.stop_or_defer(Some(guard));
    }

    fn start_or_defer(&self, guard: Option<&mut ContextGuard<'_>>) -> Result<()> {
        if self.shared.is_reentrant() {
            defer(&self.shared, Request::Start);
            return Ok(());
        }
        self.shared.start_inner(guard)
    }

    fn stop_or_defer(&self, guard: Option<&mut ContextGuard<'_>>) {
        if self.shared.is_reentrant() {
            defer(&self.shared, Request::Stop);
            return;
        }
        self.shared.stop_inner(guard);
    }

    // --- Settings ---

    /// Queues the HLG flag. Applied on the next transition to running.
    pub fn set_is_hlg(&self, is_hlg: bool) {
        self.update_settings(|settings| settings.is_hlg = is_hlg);
    }

    /// Queues the capability bit-set. Applied on the next transition to running.
    pub fn set_capability(&self, capability: Capability) {
        self.update_settings(|settings| settings.capability = capability);
    }

    /// Queues the client's protocol tracing switch. Applied on the next transition to running.
    pub fn set_debug_print(&self, enabled: bool) {
        self.update_settings(|settings| settings.debug_print = enabled);
    }

    pub fn pending_settings(&self) -> PendingSettings {
        self.shared.pending_settings()
    }

    fn update_settings(&self, update: impl FnOnce(&mut PendingSettings)) {
        let mut settings = self.shared.settings.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut settings);
        if self.is_running() {
            debug!(settings = ?*settings, "Settings queued; they apply on the next start");
        }
    }

    // --- Handler registration ---

    pub fn set_on_video_data_callback<F>(&self, callback: F)
    where
        F: Fn(&VideoFrame) + Send + Sync + 'static,
    {
        self.set_callback(Handler::VideoData(Arc::new(callback)));
    }

    pub fn set_on_audio_data_callback<F>(&self, callback: F)
    where
        F: Fn(&AudioFrame) + Send + Sync + 'static,
    {
        self.set_callback(Handler::AudioData(Arc::new(callback)));
    }

    pub fn set_on_meta_callback<F>(&self, callback: F)
    where
        F: Fn(&VideoMeta, &AudioMeta, &StreamMeta) + Send + Sync + 'static,
    {
        self.set_callback(Handler::Meta(Arc::new(callback)));
    }

    pub fn set_on_connected_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.set_callback(Handler::Connected(Arc::new(callback)));
    }

    pub fn set_on_disconnected_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.set_callback(Handler::Disconnected(Arc::new(callback)));
    }

    pub fn set_on_exception_callback<F>(&self, callback: F)
    where
        F: Fn(&ExceptionEvent) + Send + Sync + 'static,
    {
        self.set_callback(Handler::Exception(Arc::new(callback)));
    }

    pub fn set_on_recv_buffer_full_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.set_callback(Handler::RecvBufferFull(Arc::new(callback)));
    }

    /// Stores `handler` in its slot, replacing any previous handler for that kind.
    ///
    /// Handlers are wired when the client transitions to running. A handler stored while the
    /// client is already running takes effect after the next stop/start cycle.
    pub fn set_callback(&self, handler: Handler) {
        let kind = handler.kind();
        self.shared.callbacks.set(handler);
        if self.is_running() {
            debug!(event = %kind, "Handler stored while running; it is wired on the next start");
        }
    }

    /// Empties the slot for `kind`. Takes effect on the next start.
    pub fn clear_callback(&self, kind: EventKind) {
        self.shared.callbacks.clear(kind);
    }

    pub fn has_callback(&self, kind: EventKind) -> bool {
        self.shared.callbacks.is_set(kind)
    }

    // --- Observers ---

    pub fn state(&self) -> LifecycleState {
        let flags = &self.shared.flags;
        if flags.client_running.load(Ordering::SeqCst) {
            LifecycleState::Running
        } else if flags.stopped.load(Ordering::SeqCst) {
            LifecycleState::Stopped
        } else if flags.initialized.load(Ordering::SeqCst) {
            LifecycleState::ClientReady
        } else if flags.awaiting_init.load(Ordering::SeqCst) {
            LifecycleState::ClientInitializing
        } else if flags.thread_running.load(Ordering::SeqCst) {
            LifecycleState::ThreadStarted
        } else {
            LifecycleState::Created
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.flags.initialized.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// The context handlers are dispatched in.
    pub fn context(&self) -> &CallerContext {
        &self.shared.context
    }
}

impl Drop for SspController {
    fn drop(&mut self) {
        let shared = &self.shared;
        if shared.is_reentrant() {
            // The loop cannot serve a blocking stop from here; the client is released stopped
            // or not.
            warn!("Controller dropped from a handler; skipping the client stop");
        } else if let Err(panic) =
            std::panic::catch_unwind(AssertUnwindSafe(|| shared.stop_inner(None)))
        {
            error!(panic = %panic_message(panic.as_ref()), "Streaming client panicked while stopping");
        }

        let mut lifecycle = shared.lock_lifecycle();
        if let Some(thread_loop) = lifecycle.thread_loop.as_mut() {
            thread_loop.stop();
        }
        shared.flags.thread_running.store(false, Ordering::SeqCst);
        *shared.loop_thread.lock().unwrap_or_else(PoisonError::into_inner) = None;

        let client = lifecycle.client.take();
        if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(move || drop(client))) {
            error!(panic = %panic_message(panic.as_ref()), "Streaming client panicked while dropping");
        }
        drop(lifecycle.thread_loop.take());
        debug!("Controller released");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sspkit_core::client::{OnAudioData, OnException, OnMeta, OnNotify, OnVideoData};
    use std::sync::atomic::AtomicUsize;

    /// A client that only counts lifecycle calls and remembers its last settings.
    #[derive(Default)]
    struct CountingClient {
        counters: Arc<Counters>,
        connected: Option<OnNotify>,
        disconnected: Option<OnNotify>,
    }

    #[derive(Default)]
    struct Counters {
        starts: AtomicUsize,
        stops: AtomicUsize,
        hlg: AtomicBool,
    }

    impl StreamingClient for CountingClient {
        fn init(&mut self) -> Result<()> {
            Ok(())
        }
        fn start(&mut self) {
            self.counters.starts.fetch_add(1, Ordering::SeqCst);
            if let Some(connected) = self.connected.as_mut() {
                connected();
            }
        }
        fn stop(&mut self) {
            self.counters.stops.fetch_add(1, Ordering::SeqCst);
            if let Some(disconnected) = self.disconnected.as_mut() {
                disconnected();
            }
        }
        fn set_is_hlg(&mut self, is_hlg: bool) {
            self.counters.hlg.store(is_hlg, Ordering::SeqCst);
        }
        fn set_capability(&mut self, _capability: Capability) {}
        fn set_on_video_data(&mut self, _callback: OnVideoData) {}
        fn set_on_audio_data(&mut self, _callback: OnAudioData) {}
        fn set_on_meta(&mut self, _callback: OnMeta) {}
        fn set_on_connected(&mut self, callback: OnNotify) {
            self.connected = Some(callback);
        }
        fn set_on_disconnected(&mut self, callback: OnNotify) {
            self.disconnected = Some(callback);
        }
        fn set_on_exception(&mut self, _callback: OnException) {}
        fn set_on_recv_buffer_full(&mut self, _callback: OnNotify) {}
    }

    fn counting_controller() -> (SspController, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let client_counters = counters.clone();
        let config = ClientConfig::new("127.0.0.1", 1024).unwrap();
        let controller = SspController::new(config, move |_config: &ClientConfig, _handle: &Handle| {
            let client = CountingClient { counters: client_counters, ..CountingClient::default() };
            Ok(Box::new(client) as Box<dyn StreamingClient>)
        });
        (controller, counters)
    }

    #[test]
    fn test_state_progression() {
        let (controller, counters) = counting_controller();
        assert_eq!(controller.state(), LifecycleState::Created);

        controller.start().unwrap();
        assert_eq!(controller.state(), LifecycleState::Running);
        assert!(controller.is_initialized());

        controller.stop();
        assert_eq!(controller.state(), LifecycleState::Stopped);

        controller.start().unwrap();
        assert_eq!(controller.state(), LifecycleState::Running);
        assert_eq!(counters.starts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stop_before_start_is_noop() {
        let (controller, counters) = counting_controller();
        controller.stop();
        controller.stop();
        assert_eq!(counters.stops.load(Ordering::SeqCst), 0);
        assert_eq!(controller.state(), LifecycleState::Created);
    }

    #[test]
    fn test_settings_apply_on_next_start() {
        let (controller, counters) = counting_controller();
        controller.start().unwrap();
        assert!(!counters.hlg.load(Ordering::SeqCst));

        controller.set_is_hlg(true);
        assert!(controller.pending_settings().is_hlg);
        assert!(!counters.hlg.load(Ordering::SeqCst));

        controller.stop();
        controller.start().unwrap();
        assert!(counters.hlg.load(Ordering::SeqCst));
    }

    #[test]
    fn test_factory_error_is_returned() {
        let config = ClientConfig::new("10.0.0.1", 1024).unwrap();
        let controller = SspController::new(config, |_config: &ClientConfig, _handle: &Handle| {
            Err(SspKitError::Configuration("no camera".to_string()))
        });

        let err = controller.start().unwrap_err();
        assert!(matches!(err, SspKitError::Configuration(_)));
        // The handoff is consumed; nothing will ever arrive
        assert!(matches!(controller.start().unwrap_err(), SspKitError::ClientUnavailable));
        assert_eq!(controller.state(), LifecycleState::ThreadStarted);
    }

    #[test]
    fn test_stop_with_releases_context_for_disconnected_handler() {
        let (controller, counters) = counting_controller();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_handler = fired.clone();
        controller.set_on_disconnected_callback(move || {
            fired_handler.fetch_add(1, Ordering::SeqCst);
        });

        let mut guard = controller.context().enter();
        controller.start_with(&mut guard).unwrap();
        controller.stop_with(&mut guard);
        assert!(guard.is_locked());
        drop(guard);

        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    fn wait_for_state(controller: &SspController, expected: LifecycleState) -> bool {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while std::time::Instant::now() < deadline {
            if controller.state() == expected {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_handler_can_stop_controller_during_start() {
        let (controller, counters) = counting_controller();
        let controller = Arc::new(controller);
        let weak = Arc::downgrade(&controller);
        controller.set_on_connected_callback(move || {
            if let Some(controller) = weak.upgrade() {
                controller.stop();
            }
        });

        // The connected handler runs on this thread, inside the client start
        controller.start().unwrap();
        assert!(wait_for_state(&controller, LifecycleState::Stopped));
        assert_eq!(counters.starts.load(Ordering::SeqCst), 1);
        assert_eq!(counters.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_can_restart_controller_during_stop() {
        let (controller, counters) = counting_controller();
        let controller = Arc::new(controller);
        let restarts = Arc::new(AtomicUsize::new(0));
        let weak = Arc::downgrade(&controller);
        let handler_restarts = restarts.clone();
        controller.set_on_disconnected_callback(move || {
            if handler_restarts.fetch_add(1, Ordering::SeqCst) == 0 {
                if let Some(controller) = weak.upgrade() {
                    controller.start().unwrap();
                }
            }
        });

        controller.start().unwrap();
        controller.stop();
        assert!(wait_for_state(&controller, LifecycleState::Running));
        assert_eq!(counters.starts.load(Ordering::SeqCst), 2);
    }
}
