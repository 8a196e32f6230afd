// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The streaming-client contract.
//!
//! The wire protocol, sockets and framing live behind [`StreamingClient`]. The controller only
//! drives its lifecycle, hands it configuration and registers one native callback per event
//! kind. Native callbacks run on the background loop thread and receive borrowed data that is
//! only valid for the duration of the call.

use crate::error::Result;
use crate::events::{AudioMeta, StreamMeta, VideoMeta};
use crate::types::{Capability, ClientConfig};
use tokio::runtime::Handle;

/// A video frame as produced by the client, borrowing the client's receive buffer.
#[derive(Debug, Clone, Copy)]
pub struct RawVideoFrame<'a> {
    pub data: &'a [u8],
    /// Presentation timestamp in the stream's timescale.
    pub pts: u64,
    pub ntp_timestamp: u64,
    pub frame_number: u32,
    /// Frame type as reported by the camera (I/P/...).
    pub frame_type: u32,
}

/// An audio frame as produced by the client, borrowing the client's receive buffer.
#[derive(Debug, Clone, Copy)]
pub struct RawAudioFrame<'a> {
    pub data: &'a [u8],
    pub pts: u64,
    pub ntp_timestamp: u64,
}

pub type OnVideoData = Box<dyn FnMut(&RawVideoFrame<'_>) + Send>;
pub type OnAudioData = Box<dyn FnMut(&RawAudioFrame<'_>) + Send>;
pub type OnMeta = Box<dyn FnMut(&VideoMeta, &AudioMeta, &StreamMeta) + Send>;
pub type OnException = Box<dyn FnMut(i32, &str) + Send>;
/// Payload-less notifications: connected, disconnected and receive-buffer-full.
pub type OnNotify = Box<dyn FnMut() + Send>;

/// Lifecycle and registration surface of a streaming client.
///
/// Implementations are constructed on the background loop thread by a [`ClientFactory`] and
/// afterwards driven from the caller thread. `start` and `stop` may invoke registered callbacks
/// synchronously from the loop thread before they return.
pub trait StreamingClient: Send {
    /// Prepares the client; called once on the loop thread right after construction.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be prepared.
    fn init(&mut self) -> Result<()>;

    /// Begins connecting and streaming.
    fn start(&mut self);

    /// Disconnects. Returns once the shutdown sequence has completed.
    fn stop(&mut self);

    fn set_is_hlg(&mut self, is_hlg: bool);

    fn set_capability(&mut self, capability: Capability);

    /// Enables verbose protocol tracing inside the client.
    fn set_debug_print(&mut self, _enabled: bool) {}

    fn set_on_video_data(&mut self, callback: OnVideoData);
    fn set_on_audio_data(&mut self, callback: OnAudioData);
    fn set_on_meta(&mut self, callback: OnMeta);
    fn set_on_connected(&mut self, callback: OnNotify);
    fn set_on_disconnected(&mut self, callback: OnNotify);
    fn set_on_exception(&mut self, callback: OnException);
    fn set_on_recv_buffer_full(&mut self, callback: OnNotify);
}

/// Builds the streaming client on the background thread.
///
/// Receives the connection parameters and a handle to the loop the client must schedule its
/// I/O on. The loop exists but is not yet running when the factory is called.
pub type ClientFactory =
    Box<dyn FnOnce(&ClientConfig, &Handle) -> Result<Box<dyn StreamingClient>> + Send>;
