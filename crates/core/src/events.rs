// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Caller-facing event payloads.
//!
//! These are the owned, serializable shapes handed to user callbacks. Native events coming out
//! of the client borrow their bytes; they are translated into these types on the loop thread
//! while the caller context is held.

use crate::client::{RawAudioFrame, RawVideoFrame};
use crate::types::{AudioEncoder, ErrorCode, VideoEncoder};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The seven event kinds a client can report. Each has exactly one callback slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    VideoData,
    AudioData,
    Meta,
    Connected,
    Disconnected,
    Exception,
    RecvBufferFull,
}

impl EventKind {
    pub const COUNT: usize = 7;

    pub const ALL: [Self; Self::COUNT] = [
        Self::VideoData,
        Self::AudioData,
        Self::Meta,
        Self::Connected,
        Self::Disconnected,
        Self::Exception,
        Self::RecvBufferFull,
    ];

    /// Position of this kind's slot in a handler table.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VideoData => "video_data",
            Self::AudioData => "audio_data",
            Self::Meta => "meta",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Exception => "exception",
            Self::RecvBufferFull => "recv_buffer_full",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An encoded video frame (H.264/H.265 elementary stream data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoFrame {
    #[serde(serialize_with = "serialize_bytes")]
    pub data: Bytes,
    pub len: usize,
    pub pts: u64,
    pub ntp_timestamp: u64,
    pub frame_number: u32,
    pub frame_type: u32,
}

impl From<&RawVideoFrame<'_>> for VideoFrame {
    fn from(raw: &RawVideoFrame<'_>) -> Self {
        Self {
            data: Bytes::copy_from_slice(raw.data),
            len: raw.data.len(),
            pts: raw.pts,
            ntp_timestamp: raw.ntp_timestamp,
            frame_number: raw.frame_number,
            frame_type: raw.frame_type,
        }
    }
}

/// An encoded audio frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioFrame {
    #[serde(serialize_with = "serialize_bytes")]
    pub data: Bytes,
    pub len: usize,
    pub pts: u64,
    pub ntp_timestamp: u64,
}

impl From<&RawAudioFrame<'_>> for AudioFrame {
    fn from(raw: &RawAudioFrame<'_>) -> Self {
        Self {
            data: Bytes::copy_from_slice(raw.data),
            len: raw.data.len(),
            pts: raw.pts,
            ntp_timestamp: raw.ntp_timestamp,
        }
    }
}

/// Video stream description, delivered once per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    pub timescale: u32,
    pub unit: u32,
    pub gop: u32,
    /// Raw encoder id, see [`VideoEncoder`].
    pub encoder: u32,
}

impl VideoMeta {
    pub const fn video_encoder(&self) -> VideoEncoder {
        VideoEncoder::from_raw(self.encoder)
    }
}

/// Audio stream description, delivered once per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioMeta {
    pub timescale: u32,
    pub unit: u32,
    pub sample_rate: u32,
    /// Bytes per sample unit.
    pub sample_size: u32,
    pub channel: u32,
    pub bitrate: u32,
    /// Raw encoder id, see [`AudioEncoder`].
    pub encoder: u32,
}

impl AudioMeta {
    pub const fn audio_encoder(&self) -> AudioEncoder {
        AudioEncoder::from_raw(self.encoder)
    }

    /// Bits per sample, or `None` when `unit` is zero.
    #[allow(clippy::cast_precision_loss)]
    pub fn bits_per_sample(&self) -> Option<f64> {
        (self.unit != 0).then(|| 8.0 * f64::from(self.sample_size) / f64::from(self.unit))
    }
}

/// Stream-wide metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamMeta {
    pub pts_is_wall_clock: bool,
}

/// A runtime fault reported by the client, passed through unaltered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionEvent {
    pub code: i32,
    pub description: String,
}

impl ExceptionEvent {
    pub fn new(code: i32, description: &str) -> Self {
        Self { code, description: description.to_string() }
    }

    /// The named protocol error, if the code is one the protocol defines.
    pub const fn known_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }
}

fn serialize_bytes<S>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    // Serialize as base64 for JSON compatibility
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes.as_ref())
        .serialize(serializer)
}
