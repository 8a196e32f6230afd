// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Protocol constants and the client configuration.
//!
//! - [`StreamStyle`]: which camera stream the client subscribes to
//! - [`VideoEncoder`] / [`AudioEncoder`]: encoder identifiers carried in metadata
//! - [`ErrorCode`]: well-known exception codes reported by the client
//! - [`Capability`]: capability bit flags negotiated at start
//! - [`ClientConfig`]: connection parameters, fixed at construction

use crate::error::{Result, SspKitError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Default TCP port of the stream service.
pub const DEFAULT_PORT: u16 = 9999;

/// Selects which encoder stream of the camera is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u32)]
pub enum StreamStyle {
    /// Whatever the camera currently sends (stream 1 on most models).
    #[default]
    Default = 0,
    /// Main stream (stream 0).
    Main = 1,
    /// Secondary stream.
    Sec = 2,
}

impl StreamStyle {
    /// Maps a raw value onto a stream style.
    ///
    /// Unknown values fall back to [`StreamStyle::Default`] instead of being rejected.
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Main,
            2 => Self::Sec,
            _ => Self::Default,
        }
    }

    pub const fn as_raw(self) -> u32 {
        self as u32
    }
}

/// Video encoder identifiers as they appear in [`crate::events::VideoMeta::encoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum VideoEncoder {
    Unknown = 0,
    H264 = 96,
    H265 = 265,
}

impl VideoEncoder {
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            96 => Self::H264,
            265 => Self::H265,
            _ => Self::Unknown,
        }
    }

    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    /// Human-readable codec name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::H264 => "H.264",
            Self::H265 => "H.265",
            Self::Unknown => "Unknown",
        }
    }
}

/// Audio encoder identifiers as they appear in [`crate::events::AudioMeta::encoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum AudioEncoder {
    Unknown = 0,
    Pcm = 23,
    Aac = 37,
}

impl AudioEncoder {
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            23 => Self::Pcm,
            37 => Self::Aac,
            _ => Self::Unknown,
        }
    }

    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Aac => "AAC",
            Self::Pcm => "PCM",
            Self::Unknown => "Unknown",
        }
    }
}

/// Well-known codes delivered through the exception callback.
///
/// The callback always receives the raw `i32`; this enum only names the codes the protocol
/// defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    /// The client speaks a newer protocol version than the camera.
    ProtocolVersionGtServer = -1000,
    /// The client speaks an older protocol version than the camera.
    ProtocolVersionLtServer = -1001,
    /// The TCP connection could not be established or was lost.
    ConnectionFailed = -1002,
    /// Another client already holds the stream connection.
    ConnectionExist = -1003,
}

impl ErrorCode {
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -1000 => Some(Self::ProtocolVersionGtServer),
            -1001 => Some(Self::ProtocolVersionLtServer),
            -1002 => Some(Self::ConnectionFailed),
            -1003 => Some(Self::ConnectionExist),
            _ => None,
        }
    }

    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ProtocolVersionGtServer => "protocol version is newer than the server's",
            Self::ProtocolVersionLtServer => "protocol version is older than the server's",
            Self::ConnectionFailed => "connection failed",
            Self::ConnectionExist => "connection already exists",
        };
        f.write_str(text)
    }
}

/// Capability bit flags handed to the client before it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(u32);

impl Capability {
    pub const NONE: Self = Self(0);
    /// Skip heartbeats and disable stream encryption.
    pub const IGNORE_HEARTBEAT_DISABLE_ENC: Self = Self(1 << 0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Capability {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Capability {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Connection parameters of a streaming client.
///
/// Fixed once the controller is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
    host: String,
    buffer_size: usize,
    port: u16,
    stream_style: StreamStyle,
}

impl ClientConfig {
    /// Creates a configuration for `host` with a receive buffer of `buffer_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `buffer_size` is zero.
    pub fn new(host: impl Into<String>, buffer_size: usize) -> Result<Self> {
        if buffer_size == 0 {
            return Err(SspKitError::Configuration(
                "receive buffer size must be positive".to_string(),
            ));
        }
        Ok(Self {
            host: host.into(),
            buffer_size,
            port: DEFAULT_PORT,
            stream_style: StreamStyle::Default,
        })
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub const fn with_stream_style(mut self, stream_style: StreamStyle) -> Self {
        self.stream_style = stream_style;
        self
    }

    /// Sets the stream style from its raw protocol value, coercing unknown values.
    #[must_use]
    pub fn with_raw_stream_style(mut self, raw: u32) -> Self {
        let style = StreamStyle::from_raw(raw);
        if style.as_raw() != raw {
            tracing::debug!(raw, "Unknown stream style, using default");
        }
        self.stream_style = style;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub const fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub const fn stream_style(&self) -> StreamStyle {
        self.stream_style
    }
}
