// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! An in-process streaming client that needs no camera.
//!
//! [`SyntheticSource`] produces a [`ClientFactory`](sspkit_core::ClientFactory)-compatible
//! closure. The client it builds runs a command loop as a task on the controller's background
//! loop, so every native callback fires on the loop thread exactly like a network client would.
//! Events come from two places:
//!
//! - a frame generator paced by the [`SyntheticProfile`] (disabled in [`SyntheticProfile::silent`])
//! - a [`SyntheticInjector`] held by the caller, which can push any event kind on demand
//!
//! Events are only delivered while the client is started and only to callbacks that were
//! installed; everything else is dropped. A [`SyntheticProbe`] records what the controller did
//! to the client.

use bytes::{BufMut, Bytes, BytesMut};
use sspkit_core::client::{OnAudioData, OnException, OnMeta, OnNotify, OnVideoData};
use sspkit_core::{
    AudioEncoder, AudioMeta, Capability, ClientConfig, ClientFactory, EventKind, RawAudioFrame,
    RawVideoFrame, Result, StreamMeta, StreamingClient, VideoEncoder, VideoMeta,
};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::ThreadId;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace, warn};

/// Frame type reported for key frames.
pub const FRAME_TYPE_I: u32 = 1;
/// Frame type reported for predicted frames.
pub const FRAME_TYPE_P: u32 = 2;

const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// Pacing and stream description of a synthetic camera.
#[derive(Debug, Clone)]
pub struct SyntheticProfile {
    /// Generated video frames per second. Zero disables video generation.
    pub fps: u32,
    pub video_frame_size: usize,
    /// Generated audio frames per second. Zero disables audio generation.
    pub audio_frames_per_second: u32,
    pub audio_frame_size: usize,
    /// Deliver the meta event right after connecting.
    pub announce_meta: bool,
    pub video_meta: VideoMeta,
    pub audio_meta: AudioMeta,
    pub stream_meta: StreamMeta,
}

impl SyntheticProfile {
    /// A source that only emits connection notifications and injected events.
    pub fn silent() -> Self {
        Self {
            fps: 0,
            video_frame_size: 0,
            audio_frames_per_second: 0,
            audio_frame_size: 0,
            announce_meta: false,
            video_meta: VideoMeta::default(),
            audio_meta: AudioMeta::default(),
            stream_meta: StreamMeta::default(),
        }
    }

    /// A 1080p camera with AAC audio.
    pub fn camera(fps: u32, encoder: VideoEncoder) -> Self {
        let timescale = 90_000;
        Self {
            fps,
            video_frame_size: 16 * 1024,
            audio_frames_per_second: 47,
            audio_frame_size: 384,
            announce_meta: true,
            video_meta: VideoMeta {
                width: 1920,
                height: 1080,
                timescale,
                unit: timescale / fps.max(1),
                gop: fps.max(1),
                encoder: encoder.as_raw(),
            },
            audio_meta: AudioMeta {
                timescale: 48_000,
                unit: 1024,
                sample_rate: 48_000,
                sample_size: 2,
                channel: 2,
                bitrate: 128_000,
                encoder: AudioEncoder::Aac.as_raw(),
            },
            stream_meta: StreamMeta { pts_is_wall_clock: false },
        }
    }
}

impl Default for SyntheticProfile {
    fn default() -> Self {
        Self::camera(30, VideoEncoder::H264)
    }
}

/// An event the synthetic client can deliver.
#[derive(Debug, Clone)]
pub enum SyntheticEvent {
    VideoData { data: Bytes, pts: u64, ntp_timestamp: u64, frame_number: u32, frame_type: u32 },
    AudioData { data: Bytes, pts: u64, ntp_timestamp: u64 },
    Meta { video: VideoMeta, audio: AudioMeta, stream: StreamMeta },
    Connected,
    Disconnected,
    Exception { code: i32, description: String },
    RecvBufferFull,
}

impl SyntheticEvent {
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::VideoData { .. } => EventKind::VideoData,
            Self::AudioData { .. } => EventKind::AudioData,
            Self::Meta { .. } => EventKind::Meta,
            Self::Connected => EventKind::Connected,
            Self::Disconnected => EventKind::Disconnected,
            Self::Exception { .. } => EventKind::Exception,
            Self::RecvBufferFull => EventKind::RecvBufferFull,
        }
    }
}

/// What the controller did to a synthetic client.
#[derive(Debug, Default)]
pub struct SyntheticProbe {
    constructed_on: Mutex<Option<ThreadId>>,
    constructed: AtomicBool,
    init_calls: AtomicUsize,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    is_hlg: AtomicBool,
    capability: AtomicU32,
    debug_print: AtomicBool,
    registrations: [AtomicUsize; EventKind::COUNT],
    delivered: [AtomicUsize; EventKind::COUNT],
    dropped: AtomicUsize,
}

impl SyntheticProbe {
    /// The thread the client was constructed on, once it has been.
    pub fn constructed_on(&self) -> Option<ThreadId> {
        *self.constructed_on.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_constructed(&self) -> bool {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// The last HLG flag the client received.
    pub fn is_hlg(&self) -> bool {
        self.is_hlg.load(Ordering::SeqCst)
    }

    pub fn capability(&self) -> Capability {
        Capability::from_bits(self.capability.load(Ordering::SeqCst))
    }

    pub fn debug_print(&self) -> bool {
        self.debug_print.load(Ordering::SeqCst)
    }

    /// How many times a native callback was installed for `kind`.
    pub fn registrations(&self, kind: EventKind) -> usize {
        self.registrations[kind.index()].load(Ordering::SeqCst)
    }

    /// How many `kind` events reached an installed native callback.
    pub fn delivered(&self, kind: EventKind) -> usize {
        self.delivered[kind.index()].load(Ordering::SeqCst)
    }

    /// Events discarded because the client was stopped or had no callback for them.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    fn record_construction(&self) {
        *self.constructed_on.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(std::thread::current().id());
        self.constructed.store(true, Ordering::SeqCst);
    }
}

enum NativeCallback {
    VideoData(OnVideoData),
    AudioData(OnAudioData),
    Meta(OnMeta),
    Connected(OnNotify),
    Disconnected(OnNotify),
    Exception(OnException),
    RecvBufferFull(OnNotify),
}

impl NativeCallback {
    const fn kind(&self) -> EventKind {
        match self {
            Self::VideoData(_) => EventKind::VideoData,
            Self::AudioData(_) => EventKind::AudioData,
            Self::Meta(_) => EventKind::Meta,
            Self::Connected(_) => EventKind::Connected,
            Self::Disconnected(_) => EventKind::Disconnected,
            Self::Exception(_) => EventKind::Exception,
            Self::RecvBufferFull(_) => EventKind::RecvBufferFull,
        }
    }
}

enum Command {
    Install(NativeCallback),
    Start(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
    Emit(SyntheticEvent),
    DebugPrint(bool),
    Flush(oneshot::Sender<()>),
}

/// Builder for a synthetic client. Consumed by [`into_factory`](Self::into_factory).
pub struct SyntheticSource {
    profile: SyntheticProfile,
    commands_tx: mpsc::UnboundedSender<Command>,
    commands_rx: mpsc::UnboundedReceiver<Command>,
    probe: Arc<SyntheticProbe>,
}

impl SyntheticSource {
    pub fn new(profile: SyntheticProfile) -> (Self, SyntheticInjector) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let probe = Arc::new(SyntheticProbe::default());
        let injector = SyntheticInjector { commands: commands_tx.clone(), probe: probe.clone() };
        (Self { profile, commands_tx, commands_rx, probe }, injector)
    }

    pub fn probe(&self) -> Arc<SyntheticProbe> {
        self.probe.clone()
    }

    /// A client factory suitable for [`SspController::new`](crate::SspController::new).
    pub fn into_factory(self) -> ClientFactory {
        Box::new(move |config: &ClientConfig, handle: &Handle| {
            Ok(Box::new(self.build(config, handle)) as Box<dyn StreamingClient>)
        })
    }

    /// Builds the client and spawns its command loop on `handle`.
    pub fn build(self, config: &ClientConfig, handle: &Handle) -> SyntheticClient {
        self.probe.record_construction();
        debug!(
            host = %config.host(),
            buffer_size = config.buffer_size(),
            "Building synthetic streaming client"
        );

        let source_loop = SourceLoop {
            commands: self.commands_rx,
            callbacks: NativeCallbacks::default(),
            generator: FrameGenerator::new(&self.profile),
            profile: self.profile,
            probe: self.probe.clone(),
            streaming: false,
            debug_print: false,
        };
        handle.spawn(source_loop.run());

        SyntheticClient { commands: self.commands_tx, probe: self.probe }
    }
}

/// The client handed to the controller.
///
/// `start`, `stop` and `flush`-style requests block until the command loop acknowledges them,
/// so they must not be called from inside an async context.
pub struct SyntheticClient {
    commands: mpsc::UnboundedSender<Command>,
    probe: Arc<SyntheticProbe>,
}

impl SyntheticClient {
    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Synthetic source loop is gone; command dropped");
        }
    }

    fn request(&self, command: impl FnOnce(oneshot::Sender<()>) -> Command) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(command(ack_tx)).is_err() {
            warn!("Synthetic source loop is gone; request dropped");
            return;
        }
        if ack_rx.blocking_recv().is_err() {
            warn!("Synthetic source loop exited before acknowledging a request");
        }
    }

    fn install(&self, callback: NativeCallback) {
        self.probe.registrations[callback.kind().index()].fetch_add(1, Ordering::SeqCst);
        self.send(Command::Install(callback));
    }
}

impl StreamingClient for SyntheticClient {
    fn init(&mut self) -> Result<()> {
        self.probe.init_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn start(&mut self) {
        self.probe.start_calls.fetch_add(1, Ordering::SeqCst);
        self.request(Command::Start);
    }

    fn stop(&mut self) {
        self.probe.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.request(Command::Stop);
    }

    fn set_is_hlg(&mut self, is_hlg: bool) {
        self.probe.is_hlg.store(is_hlg, Ordering::SeqCst);
    }

    fn set_capability(&mut self, capability: Capability) {
        self.probe.capability.store(capability.bits(), Ordering::SeqCst);
    }

    fn set_debug_print(&mut self, enabled: bool) {
        self.probe.debug_print.store(enabled, Ordering::SeqCst);
        self.send(Command::DebugPrint(enabled));
    }

    fn set_on_video_data(&mut self, callback: OnVideoData) {
        self.install(NativeCallback::VideoData(callback));
    }

    fn set_on_audio_data(&mut self, callback: OnAudioData) {
        self.install(NativeCallback::AudioData(callback));
    }

    fn set_on_meta(&mut self, callback: OnMeta) {
        self.install(NativeCallback::Meta(callback));
    }

    fn set_on_connected(&mut self, callback: OnNotify) {
        self.install(NativeCallback::Connected(callback));
    }

    fn set_on_disconnected(&mut self, callback: OnNotify) {
        self.install(NativeCallback::Disconnected(callback));
    }

    fn set_on_exception(&mut self, callback: OnException) {
        self.install(NativeCallback::Exception(callback));
    }

    fn set_on_recv_buffer_full(&mut self, callback: OnNotify) {
        self.install(NativeCallback::RecvBufferFull(callback));
    }
}

/// Caller-side handle for pushing events into a synthetic client.
#[derive(Clone)]
pub struct SyntheticInjector {
    commands: mpsc::UnboundedSender<Command>,
    probe: Arc<SyntheticProbe>,
}

impl SyntheticInjector {
    /// Queues `event` for delivery. Returns `false` if the client is gone.
    pub fn inject(&self, event: SyntheticEvent) -> bool {
        self.commands.send(Command::Emit(event)).is_ok()
    }

    pub fn video_frame(&self, data: impl Into<Bytes>, frame_number: u32) -> bool {
        self.inject(SyntheticEvent::VideoData {
            data: data.into(),
            pts: u64::from(frame_number) * 3000,
            ntp_timestamp: 0,
            frame_number,
            frame_type: FRAME_TYPE_P,
        })
    }

    pub fn exception(&self, code: i32, description: impl Into<String>) -> bool {
        self.inject(SyntheticEvent::Exception { code, description: description.into() })
    }

    /// Blocks until every previously queued command has been processed.
    ///
    /// Returns `false` if the client has not been constructed yet or its loop is gone. Must not
    /// be called while holding the caller context that handlers are dispatched in.
    pub fn flush(&self) -> bool {
        if !self.probe.is_constructed() {
            return false;
        }
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Flush(ack_tx)).is_err() {
            return false;
        }
        ack_rx.blocking_recv().is_ok()
    }

    pub fn probe(&self) -> &SyntheticProbe {
        &self.probe
    }
}

#[derive(Default)]
struct NativeCallbacks {
    video_data: Option<OnVideoData>,
    audio_data: Option<OnAudioData>,
    meta: Option<OnMeta>,
    connected: Option<OnNotify>,
    disconnected: Option<OnNotify>,
    exception: Option<OnException>,
    recv_buffer_full: Option<OnNotify>,
}

impl NativeCallbacks {
    fn install(&mut self, callback: NativeCallback) {
        match callback {
            NativeCallback::VideoData(cb) => self.video_data = Some(cb),
            NativeCallback::AudioData(cb) => self.audio_data = Some(cb),
            NativeCallback::Meta(cb) => self.meta = Some(cb),
            NativeCallback::Connected(cb) => self.connected = Some(cb),
            NativeCallback::Disconnected(cb) => self.disconnected = Some(cb),
            NativeCallback::Exception(cb) => self.exception = Some(cb),
            NativeCallback::RecvBufferFull(cb) => self.recv_buffer_full = Some(cb),
        }
    }

    /// Invokes the callback for `event`. Returns `false` if none is installed.
    fn deliver(&mut self, event: &SyntheticEvent) -> bool {
        match event {
            SyntheticEvent::VideoData { data, pts, ntp_timestamp, frame_number, frame_type } => {
                self.video_data.as_mut().map(|cb| {
                    cb(&RawVideoFrame {
                        data: &data[..],
                        pts: *pts,
                        ntp_timestamp: *ntp_timestamp,
                        frame_number: *frame_number,
                        frame_type: *frame_type,
                    });
                })
            },
            SyntheticEvent::AudioData { data, pts, ntp_timestamp } => {
                self.audio_data.as_mut().map(|cb| {
                    cb(&RawAudioFrame { data: &data[..], pts: *pts, ntp_timestamp: *ntp_timestamp });
                })
            },
            SyntheticEvent::Meta { video, audio, stream } => {
                self.meta.as_mut().map(|cb| cb(video, audio, stream))
            },
            SyntheticEvent::Connected => self.connected.as_mut().map(|cb| cb()),
            SyntheticEvent::Disconnected => self.disconnected.as_mut().map(|cb| cb()),
            SyntheticEvent::Exception { code, description } => {
                self.exception.as_mut().map(|cb| cb(*code, description.as_str()))
            },
            SyntheticEvent::RecvBufferFull => self.recv_buffer_full.as_mut().map(|cb| cb()),
        }
        .is_some()
    }
}

struct FrameGenerator {
    encoder: VideoEncoder,
    video_frame_size: usize,
    audio_frame_size: usize,
    video_unit: u64,
    audio_unit: u64,
    gop: u32,
    frame_number: u32,
    video_pts: u64,
    audio_pts: u64,
}

impl FrameGenerator {
    fn new(profile: &SyntheticProfile) -> Self {
        Self {
            encoder: profile.video_meta.video_encoder(),
            video_frame_size: profile.video_frame_size.max(START_CODE.len() + 2),
            audio_frame_size: profile.audio_frame_size,
            video_unit: u64::from(profile.video_meta.unit),
            audio_unit: u64::from(profile.audio_meta.unit),
            gop: profile.video_meta.gop,
            frame_number: 0,
            video_pts: 0,
            audio_pts: 0,
        }
    }

    fn next_video(&mut self) -> SyntheticEvent {
        let frame_number = self.frame_number;
        let key_frame = if self.gop == 0 { frame_number == 0 } else { frame_number % self.gop == 0 };

        let mut data = BytesMut::with_capacity(self.video_frame_size);
        data.put_slice(&START_CODE);
        data.put_slice(&self.nal_header(key_frame));
        // Filler varies per frame so consecutive frames differ.
        let filler = frame_number.to_le_bytes()[0];
        data.put_bytes(filler, self.video_frame_size.saturating_sub(data.len()));

        let event = SyntheticEvent::VideoData {
            data: data.freeze(),
            pts: self.video_pts,
            ntp_timestamp: wall_clock_micros(),
            frame_number,
            frame_type: if key_frame { FRAME_TYPE_I } else { FRAME_TYPE_P },
        };
        self.frame_number = self.frame_number.wrapping_add(1);
        self.video_pts += self.video_unit;
        event
    }

    fn next_audio(&mut self) -> SyntheticEvent {
        let mut data = BytesMut::with_capacity(self.audio_frame_size);
        data.put_bytes(0, self.audio_frame_size);
        let event = SyntheticEvent::AudioData {
            data: data.freeze(),
            pts: self.audio_pts,
            ntp_timestamp: wall_clock_micros(),
        };
        self.audio_pts += self.audio_unit;
        event
    }

    const fn nal_header(&self, key_frame: bool) -> [u8; 2] {
        match (self.encoder, key_frame) {
            // IDR_W_RADL / TRAIL_R
            (VideoEncoder::H265, true) => [19 << 1, 0x01],
            (VideoEncoder::H265, false) => [1 << 1, 0x01],
            // IDR slice / non-IDR slice
            (_, true) => [0x65, 0x88],
            (_, false) => [0x41, 0x9a],
        }
    }
}

fn wall_clock_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

fn tick_period(per_second: u32) -> Duration {
    Duration::from_secs(1) / per_second.max(1)
}

struct SourceLoop {
    commands: mpsc::UnboundedReceiver<Command>,
    callbacks: NativeCallbacks,
    generator: FrameGenerator,
    profile: SyntheticProfile,
    probe: Arc<SyntheticProbe>,
    streaming: bool,
    debug_print: bool,
}

impl SourceLoop {
    async fn run(mut self) {
        let generate_video = self.profile.fps > 0;
        let generate_audio = self.profile.audio_frames_per_second > 0;

        let mut video_tick = interval(tick_period(self.profile.fps));
        video_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut audio_tick = interval(tick_period(self.profile.audio_frames_per_second));
        audio_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    self.handle_command(command);
                }
                _ = video_tick.tick(), if self.streaming && generate_video => {
                    let event = self.generator.next_video();
                    self.deliver(&event);
                }
                _ = audio_tick.tick(), if self.streaming && generate_audio => {
                    let event = self.generator.next_audio();
                    self.deliver(&event);
                }
            }
        }

        debug!("Synthetic source loop finished");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Install(callback) => self.callbacks.install(callback),
            Command::Start(ack) => {
                if !self.streaming {
                    self.streaming = true;
                    self.deliver(&SyntheticEvent::Connected);
                    if self.profile.announce_meta {
                        self.deliver(&SyntheticEvent::Meta {
                            video: self.profile.video_meta,
                            audio: self.profile.audio_meta,
                            stream: self.profile.stream_meta,
                        });
                    }
                }
                let _ = ack.send(());
            },
            Command::Stop(ack) => {
                if self.streaming {
                    self.deliver(&SyntheticEvent::Disconnected);
                    self.streaming = false;
                }
                let _ = ack.send(());
            },
            Command::Emit(event) => self.deliver(&event),
            Command::DebugPrint(enabled) => self.debug_print = enabled,
            Command::Flush(ack) => {
                let _ = ack.send(());
            },
        }
    }

    fn deliver(&mut self, event: &SyntheticEvent) {
        let kind = event.kind();
        if !self.streaming {
            trace!(event = %kind, "Not streaming; event dropped");
            self.probe.dropped.fetch_add(1, Ordering::SeqCst);
            return;
        }

        if self.debug_print {
            debug!(event = %kind, "Delivering synthetic event");
        }

        if self.callbacks.deliver(event) {
            self.probe.delivered[kind.index()].fetch_add(1, Ordering::SeqCst);
        } else {
            trace!(event = %kind, "No callback installed; event dropped");
            self.probe.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::thread_loop::ThreadLoop;
    use std::sync::mpsc as std_mpsc;

    fn spawn_client(
        profile: SyntheticProfile,
    ) -> (ThreadLoop, std_mpsc::Receiver<SyntheticClient>, SyntheticInjector) {
        let (source, injector) = SyntheticSource::new(profile);
        let (tx, rx) = std_mpsc::channel();
        let mut thread_loop = ThreadLoop::new("synthetic-test", move |handle: &Handle| {
            let config = ClientConfig::new("127.0.0.1", 1024).unwrap();
            tx.send(source.build(&config, handle)).unwrap();
        });
        thread_loop.start().unwrap();
        (thread_loop, rx, injector)
    }

    #[test]
    fn test_events_delivered_only_while_streaming() {
        let (_thread_loop, rx, injector) = spawn_client(SyntheticProfile::silent());
        let mut client = rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let frames = Arc::new(AtomicUsize::new(0));
        let frames_cb = frames.clone();
        client.set_on_video_data(Box::new(move |raw: &RawVideoFrame<'_>| {
            assert_eq!(raw.data, b"abc");
            frames_cb.fetch_add(1, Ordering::SeqCst);
        }));

        injector.video_frame(&b"abc"[..], 0);
        assert!(injector.flush());
        assert_eq!(frames.load(Ordering::SeqCst), 0);

        client.start();
        injector.video_frame(&b"abc"[..], 1);
        injector.inject(SyntheticEvent::RecvBufferFull);
        assert!(injector.flush());

        assert_eq!(frames.load(Ordering::SeqCst), 1);
        let probe = injector.probe();
        assert_eq!(probe.delivered(EventKind::VideoData), 1);
        // One before start, one without a callback, plus the connected notification
        assert_eq!(probe.dropped(), 3);

        client.stop();
        assert_eq!(probe.start_calls(), 1);
        assert_eq!(probe.stop_calls(), 1);
    }

    #[test]
    fn test_start_and_stop_notify_synchronously() {
        let (_thread_loop, rx, injector) = spawn_client(SyntheticProfile::silent());
        let mut client = rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let connected_log = log.clone();
        client.set_on_connected(Box::new(move || connected_log.lock().unwrap().push("connected")));
        let disconnected_log = log.clone();
        client.set_on_disconnected(Box::new(move || {
            disconnected_log.lock().unwrap().push("disconnected");
        }));

        client.start();
        assert_eq!(log.lock().unwrap().as_slice(), &["connected"]);
        client.stop();
        assert_eq!(log.lock().unwrap().as_slice(), &["connected", "disconnected"]);

        // Stopping again does not repeat the notification
        client.stop();
        assert_eq!(log.lock().unwrap().len(), 2);
        assert_eq!(injector.probe().registrations(EventKind::Connected), 1);
    }

    #[test]
    fn test_generator_paces_frames_and_announces_meta() {
        let profile = SyntheticProfile::camera(100, VideoEncoder::H265);
        let (_thread_loop, rx, injector) = spawn_client(profile);
        let mut client = rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let (frame_tx, frame_rx) = std_mpsc::channel();
        client.set_on_video_data(Box::new(move |raw: &RawVideoFrame<'_>| {
            let _ = frame_tx.send((raw.frame_number, raw.frame_type, raw.data[4]));
        }));
        let (meta_tx, meta_rx) = std_mpsc::channel();
        client.set_on_meta(Box::new(move |video: &VideoMeta, _audio: &AudioMeta, _stream: &StreamMeta| {
            let _ = meta_tx.send(video.video_encoder());
        }));

        client.start();
        assert_eq!(meta_rx.recv_timeout(Duration::from_secs(5)).unwrap(), VideoEncoder::H265);

        let (number, frame_type, nal) = frame_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(number, 0);
        assert_eq!(frame_type, FRAME_TYPE_I);
        assert_eq!(nal, 19 << 1);

        let (number, frame_type, _) = frame_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(number, 1);
        assert_eq!(frame_type, FRAME_TYPE_P);

        client.stop();
        assert!(injector.flush());
    }

    #[test]
    fn test_flush_before_construction_returns_false() {
        let (_source, injector) = SyntheticSource::new(SyntheticProfile::silent());
        assert!(!injector.flush());
    }

    #[test]
    fn test_settings_are_recorded() {
        let (_thread_loop, rx, injector) = spawn_client(SyntheticProfile::silent());
        let mut client = rx.recv_timeout(Duration::from_secs(5)).unwrap();

        client.set_is_hlg(true);
        client.set_capability(Capability::IGNORE_HEARTBEAT_DISABLE_ENC);
        client.set_debug_print(true);

        let probe = injector.probe();
        assert!(probe.is_hlg());
        assert!(probe.capability().contains(Capability::IGNORE_HEARTBEAT_DISABLE_ENC));
        assert!(probe.debug_print());
        assert!(probe.is_constructed());
        assert_ne!(probe.constructed_on(), Some(std::thread::current().id()));
    }
}
