// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use sspkit_core::{
    Capability, ClientConfig, Result as SspResult, StreamStyle, VideoEncoder, DEFAULT_PORT,
};
use sspkit_runtime::SyntheticProfile;
use std::time::Duration;
use tracing::{debug, Level};

const DEFAULT_CAMERA_HOST: &str = "192.168.1.84";

/// 4 MiB, the receive buffer the camera vendor recommends.
const DEFAULT_BUFFER_SIZE: usize = 0x40_0000;

const fn default_init_timeout_secs() -> u64 {
    30
}

/// Connection and client settings.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ClientSection {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub buffer_size: usize,
    /// `default`, `main`, `sec` or the raw protocol value. Unknown styles fall back to
    /// `default`.
    #[serde(default, deserialize_with = "deserialize_stream_style")]
    pub stream_style: StreamStyle,
    #[serde(default)]
    pub is_hlg: bool,
    /// Raw capability bits, see `Capability`.
    #[serde(default)]
    pub capability: u32,
    #[serde(default)]
    pub debug_print: bool,
    /// How long `start` waits for the client to come up.
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StreamStyleValue {
    Raw(u32),
    Name(String),
}

fn deserialize_stream_style<'de, D>(deserializer: D) -> Result<StreamStyle, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let style = match StreamStyleValue::deserialize(deserializer)? {
        StreamStyleValue::Raw(raw) => {
            let style = StreamStyle::from_raw(raw);
            if style.as_raw() != raw {
                debug!(raw, "Unknown stream style, using default");
            }
            style
        },
        StreamStyleValue::Name(name) => match name.to_ascii_lowercase().as_str() {
            "default" => StreamStyle::Default,
            "main" => StreamStyle::Main,
            "sec" => StreamStyle::Sec,
            _ => {
                debug!(name = %name, "Unknown stream style, using default");
                StreamStyle::Default
            },
        },
    };
    Ok(style)
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_CAMERA_HOST.to_string(),
            port: DEFAULT_PORT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            stream_style: StreamStyle::Default,
            is_hlg: false,
            capability: 0,
            debug_print: false,
            init_timeout_secs: default_init_timeout_secs(),
        }
    }
}

impl ClientSection {
    /// Builds the validated client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `buffer_size` is zero.
    pub fn client_config(&self) -> SspResult<ClientConfig> {
        Ok(ClientConfig::new(self.host.clone(), self.buffer_size)?
            .with_port(self.port)
            .with_stream_style(self.stream_style))
    }

    pub const fn capability(&self) -> Capability {
        Capability::from_bits(self.capability)
    }

    pub const fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }
}

/// Codec the synthetic source pretends to encode.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceCodec {
    #[default]
    H264,
    H265,
}

impl From<SourceCodec> for VideoEncoder {
    fn from(codec: SourceCodec) -> Self {
        match codec {
            SourceCodec::H264 => Self::H264,
            SourceCodec::H265 => Self::H265,
        }
    }
}

/// Synthetic camera used in place of a network client.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SourceConfig {
    pub fps: u32,
    #[serde(default)]
    pub codec: SourceCodec,
    pub video_frame_size: usize,
    /// Generate audio frames alongside video.
    #[serde(default)]
    pub audio: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self { fps: 30, codec: SourceCodec::H264, video_frame_size: 16 * 1024, audio: true }
    }
}

impl SourceConfig {
    pub fn profile(&self) -> SyntheticProfile {
        let mut profile = SyntheticProfile::camera(self.fps, self.codec.into());
        profile.video_frame_size = self.video_frame_size;
        if !self.audio {
            profile.audio_frames_per_second = 0;
        }
        profile
    }
}

/// Raw elementary stream dump.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DumpConfig {
    /// Output file; dumping is disabled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Frames buffered between the loop thread and the writer.
    #[serde(default = "default_dump_queue")]
    pub queue_capacity: usize,
}

const fn default_dump_queue() -> usize {
    256
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self { path: None, queue_capacity: default_dump_queue() }
    }
}

/// Log level for filtering messages.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
}

/// Root configuration for the sspkit runner.
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    pub client: ClientSection,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub dump: DumpConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
    pub file_missing: Option<String>,
}

/// Loads the configuration from defaults, a TOML file, and `SSP_`-prefixed environment
/// variables (`SSP_CLIENT__HOST=10.0.0.2`).
///
/// # Errors
///
/// Returns an error if:
/// - The configuration file exists but contains invalid TOML syntax
/// - Environment variables are set but contain invalid values
pub fn load(config_path: &str) -> Result<ConfigLoadResult, Box<figment::Error>> {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

    let mut file_missing = None;

    if std::path::Path::new(config_path).exists() {
        figment = figment.merge(Toml::file(config_path));
    } else {
        file_missing = Some(config_path.to_string());
    }

    let config: Config =
        figment.merge(Env::prefixed("SSP_").split("__")).extract().map_err(Box::new)?;

    Ok(ConfigLoadResult { config, file_missing })
}

/// Generates the default configuration as a pretty-printed TOML string.
///
/// # Errors
///
/// Returns an error if the default configuration cannot be serialized to TOML.
pub fn generate_default() -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&Config::default())
}
