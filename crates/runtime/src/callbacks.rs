// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! User handler slots and their wiring into a streaming client.
//!
//! There is one slot per [`EventKind`]. Registering replaces the slot's handler. Wiring takes a
//! snapshot of the table and installs one native callback per populated slot; slots that are
//! empty at wiring time get no native callback at all, so their events are dropped by the
//! client.

use crate::context::CallerContext;
use sspkit_core::{
    AudioFrame, AudioMeta, EventKind, ExceptionEvent, RawAudioFrame, RawVideoFrame, StreamMeta,
    StreamingClient, VideoFrame, VideoMeta,
};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

pub type VideoDataHandler = Arc<dyn Fn(&VideoFrame) + Send + Sync>;
pub type AudioDataHandler = Arc<dyn Fn(&AudioFrame) + Send + Sync>;
pub type MetaHandler = Arc<dyn Fn(&VideoMeta, &AudioMeta, &StreamMeta) + Send + Sync>;
pub type ExceptionHandler = Arc<dyn Fn(&ExceptionEvent) + Send + Sync>;
pub type NotifyHandler = Arc<dyn Fn() + Send + Sync>;

/// A user handler bound to the event kind it serves.
#[derive(Clone)]
pub enum Handler {
    VideoData(VideoDataHandler),
    AudioData(AudioDataHandler),
    Meta(MetaHandler),
    Connected(NotifyHandler),
    Disconnected(NotifyHandler),
    Exception(ExceptionHandler),
    RecvBufferFull(NotifyHandler),
}

impl Handler {
    pub const fn kind(&self) -> EventKind {
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

    /// Installs the native callback for this handler on `client`.
    ///
    /// The native callback translates the borrowed event into its owned payload and invokes the
    /// handler inside `context`.
    fn wire(self, client: &mut dyn StreamingClient, context: &CallerContext) {
        let context = context.clone();
        match self {
            Self::VideoData(handler) => {
                client.set_on_video_data(Box::new(move |raw: &RawVideoFrame<'_>| {
                    context.dispatch(EventKind::VideoData, || handler(&VideoFrame::from(raw)));
                }));
            },
            Self::AudioData(handler) => {
                client.set_on_audio_data(Box::new(move |raw: &RawAudioFrame<'_>| {
                    context.dispatch(EventKind::AudioData, || handler(&AudioFrame::from(raw)));
                }));
            },
            Self::Meta(handler) => {
                client.set_on_meta(Box::new(
                    move |video: &VideoMeta, audio: &AudioMeta, stream: &StreamMeta| {
                        context.dispatch(EventKind::Meta, || handler(video, audio, stream));
                    },
                ));
            },
            Self::Connected(handler) => {
                client.set_on_connected(Box::new(move || {
                    context.dispatch(EventKind::Connected, &*handler);
                }));
            },
            Self::Disconnected(handler) => {
                client.set_on_disconnected(Box::new(move || {
                    context.dispatch(EventKind::Disconnected, &*handler);
                }));
            },
            Self::Exception(handler) => {
                client.set_on_exception(Box::new(move |code: i32, description: &str| {
                    context.dispatch(EventKind::Exception, || {
                        handler(&ExceptionEvent::new(code, description));
                    });
                }));
            },
            Self::RecvBufferFull(handler) => {
                client.set_on_recv_buffer_full(Box::new(move || {
                    context.dispatch(EventKind::RecvBufferFull, &*handler);
                }));
            },
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.kind()).finish()
    }
}

/// One optional handler per event kind.
#[derive(Debug, Clone, Default)]
pub struct HandlerTable {
    slots: [Option<Handler>; EventKind::COUNT],
}

impl HandlerTable {
    /// Puts `handler` in its slot, returning the handler it replaced.
    pub fn insert(&mut self, handler: Handler) -> Option<Handler> {
        self.slots[handler.kind().index()].replace(handler)
    }

    pub fn remove(&mut self, kind: EventKind) -> Option<Handler> {
        self.slots[kind.index()].take()
    }

    pub fn get(&self, kind: EventKind) -> Option<&Handler> {
        self.slots[kind.index()].as_ref()
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    /// Event kinds that currently have a handler, in slot order.
    pub fn populated(&self) -> impl Iterator<Item = EventKind> + '_ {
        EventKind::ALL.into_iter().filter(|kind| self.contains(*kind))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Installs a native callback on `client` for every populated slot.
    ///
    /// Returns the number of callbacks installed.
    pub fn wire_into(self, client: &mut dyn StreamingClient, context: &CallerContext) -> usize {
        let mut wired = 0;
        for handler in self.slots.into_iter().flatten() {
            trace!(event = %handler.kind(), "Wiring handler");
            handler.wire(client, context);
            wired += 1;
        }
        wired
    }
}

/// Thread-safe handler storage owned by a controller.
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    table: Mutex<HandlerTable>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, handler: Handler) -> Option<Handler> {
        self.with_table(|table| table.insert(handler))
    }

    pub fn clear(&self, kind: EventKind) -> Option<Handler> {
        self.with_table(|table| table.remove(kind))
    }

    pub fn is_set(&self, kind: EventKind) -> bool {
        self.with_table(|table| table.contains(kind))
    }

    /// A copy of the current table, used for wiring.
    pub fn snapshot(&self) -> HandlerTable {
        self.with_table(|table| table.clone())
    }

    fn with_table<R>(&self, f: impl FnOnce(&mut HandlerTable) -> R) -> R {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut table)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sspkit_core::client::{OnAudioData, OnException, OnMeta, OnNotify, OnVideoData};
    use sspkit_core::{Capability, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records installed callbacks so tests can fire them directly.
    #[derive(Default)]
    struct RecordingClient {
        video: Option<OnVideoData>,
        exception: Option<OnException>,
        connected: Option<OnNotify>,
        installed: Vec<EventKind>,
    }

    impl StreamingClient for RecordingClient {
        fn init(&mut self) -> Result<()> {
            Ok(())
        }
        fn start(&mut self) {}
        fn stop(&mut self) {}
        fn set_is_hlg(&mut self, _is_hlg: bool) {}
        fn set_capability(&mut self, _capability: Capability) {}
        fn set_on_video_data(&mut self, callback: OnVideoData) {
            self.installed.push(EventKind::VideoData);
            self.video = Some(callback);
        }
        fn set_on_audio_data(&mut self, _callback: OnAudioData) {
            self.installed.push(EventKind::AudioData);
        }
        fn set_on_meta(&mut self, _callback: OnMeta) {
            self.installed.push(EventKind::Meta);
        }
        fn set_on_connected(&mut self, callback: OnNotify) {
            self.installed.push(EventKind::Connected);
            self.connected = Some(callback);
        }
        fn set_on_disconnected(&mut self, _callback: OnNotify) {
            self.installed.push(EventKind::Disconnected);
        }
        fn set_on_exception(&mut self, callback: OnException) {
            self.installed.push(EventKind::Exception);
            self.exception = Some(callback);
        }
        fn set_on_recv_buffer_full(&mut self, _callback: OnNotify) {
            self.installed.push(EventKind::RecvBufferFull);
        }
    }

    #[test]
    fn test_insert_replaces_slot() {
        let mut table = HandlerTable::default();
        assert!(table.is_empty());

        let first = table.insert(Handler::Connected(Arc::new(|| {})));
        assert!(first.is_none());
        let replaced = table.insert(Handler::Connected(Arc::new(|| {})));
        assert_eq!(replaced.map(|handler| handler.kind()), Some(EventKind::Connected));
        assert_eq!(table.len(), 1);

        table.insert(Handler::Exception(Arc::new(|_event: &ExceptionEvent| {})));
        let kinds: Vec<_> = table.populated().collect();
        assert_eq!(kinds, vec![EventKind::Connected, EventKind::Exception]);

        assert!(table.remove(EventKind::Connected).is_some());
        assert!(!table.contains(EventKind::Connected));
        assert!(table.get(EventKind::Exception).is_some());
    }

    #[test]
    fn test_wiring_installs_only_populated_slots() {
        let registry = CallbackRegistry::new();
        registry.set(Handler::VideoData(Arc::new(|_frame: &VideoFrame| {})));
        registry.set(Handler::Connected(Arc::new(|| {})));

        let mut client = RecordingClient::default();
        let wired = registry.snapshot().wire_into(&mut client, &CallerContext::new());

        assert_eq!(wired, 2);
        assert_eq!(client.installed, vec![EventKind::VideoData, EventKind::Connected]);
    }

    #[test]
    fn test_wired_callbacks_translate_payloads() {
        let registry = CallbackRegistry::new();
        let frames = Arc::new(AtomicUsize::new(0));
        let frames_handler = frames.clone();
        registry.set(Handler::VideoData(Arc::new(move |frame: &VideoFrame| {
            assert_eq!(frame.len, 3);
            assert_eq!(frame.frame_number, 9);
            frames_handler.fetch_add(1, Ordering::SeqCst);
        })));

        let codes = Arc::new(Mutex::new(Vec::new()));
        let codes_handler = codes.clone();
        registry.set(Handler::Exception(Arc::new(move |event: &ExceptionEvent| {
            codes_handler.lock().unwrap().push((event.code, event.description.clone()));
        })));

        let context = CallerContext::new();
        let mut client = RecordingClient::default();
        registry.snapshot().wire_into(&mut client, &context);

        let data = [1u8, 2, 3];
        let raw =
            RawVideoFrame { data: &data, pts: 0, ntp_timestamp: 0, frame_number: 9, frame_type: 1 };
        (client.video.as_mut().unwrap())(&raw);
        (client.exception.as_mut().unwrap())(-1002, "refused");

        assert_eq!(frames.load(Ordering::SeqCst), 1);
        assert_eq!(codes.lock().unwrap().as_slice(), &[(-1002, "refused".to_string())]);
        assert!(!context.is_held());
    }

    #[test]
    fn test_snapshot_is_detached_from_registry() {
        let registry = CallbackRegistry::new();
        let snapshot = registry.snapshot();
        registry.set(Handler::RecvBufferFull(Arc::new(|| {})));

        assert!(snapshot.is_empty());
        assert!(registry.is_set(EventKind::RecvBufferFull));
        assert!(registry.clear(EventKind::RecvBufferFull).is_some());
        assert!(!registry.is_set(EventKind::RecvBufferFull));
    }

    #[test]
    fn test_handler_runs_inside_context() {
        let context = CallerContext::new();
        let observed = Arc::new(AtomicUsize::new(0));
        let observed_handler = observed.clone();
        let probe_context = context.clone();

        let mut table = HandlerTable::default();
        table.insert(Handler::Connected(Arc::new(move || {
            if probe_context.is_held() {
                observed_handler.fetch_add(1, Ordering::SeqCst);
            }
        })));

        let mut client = RecordingClient::default();
        table.wire_into(&mut client, &context);
        (client.connected.as_mut().unwrap())();

        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }
}
