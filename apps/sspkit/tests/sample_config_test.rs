// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

#![allow(clippy::unwrap_used, clippy::expect_used)]

use sspkit_cli::config::{self, LogFormat, LogLevel, SourceCodec};
use sspkit_core::{StreamStyle, DEFAULT_PORT};
use std::path::PathBuf;

fn sample_path() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let repo_root = manifest_dir
        .parent()
        .and_then(|parent| parent.parent())
        .expect("sspkit-cli should live under workspace_root/apps/sspkit");
    repo_root.join("samples/sspkit.toml")
}

#[test]
fn samples_sspkit_toml_parses_and_matches_expected_values() {
    let path = sample_path();
    let result = config::load(path.to_str().unwrap())
        .unwrap_or_else(|e| panic!("samples/sspkit.toml should parse: {e}"));
    assert!(result.file_missing.is_none());

    let config = result.config;
    assert_eq!(config.client.host, "192.168.1.84");
    assert_eq!(config.client.port, 9876);
    assert_eq!(config.client.buffer_size, 4_194_304);
    assert_eq!(config.client.stream_style, StreamStyle::Main);
    assert_eq!(config.client.init_timeout_secs, 10);

    assert_eq!(config.source.fps, 25);
    assert_eq!(config.source.codec, SourceCodec::H265);
    assert!(config.source.audio);

    assert_eq!(config.dump.path.as_deref(), Some("recordings/camera.h265"));
    assert_eq!(config.dump.queue_capacity, 512);

    assert_eq!(config.log.level, LogLevel::Info);
    assert_eq!(config.log.format, LogFormat::Text);

    let client = config.client.client_config().unwrap();
    assert_eq!(client.port(), 9876);
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let result = config::load(path.to_str().unwrap()).unwrap();

    assert_eq!(result.file_missing.as_deref(), path.to_str());
    assert_eq!(result.config.client.port, DEFAULT_PORT);
    assert_eq!(result.config.client.stream_style, StreamStyle::Default);
    assert!(result.config.dump.path.is_none());
    assert_eq!(result.config.dump.queue_capacity, 256);
}

#[test]
fn partial_file_keeps_defaults_for_missing_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.toml");
    std::fs::write(&path, "[client]\nhost = \"10.0.0.9\"\n\n[log]\nlevel = \"debug\"\n").unwrap();

    let config = config::load(path.to_str().unwrap()).unwrap().config;
    assert_eq!(config.client.host, "10.0.0.9");
    assert_eq!(config.client.port, DEFAULT_PORT);
    assert_eq!(config.client.buffer_size, 0x40_0000);
    assert_eq!(config.source.fps, 30);
    assert_eq!(config.log.level, LogLevel::Debug);
}

fn load_client_style(dir: &tempfile::TempDir, name: &str, value: &str) -> StreamStyle {
    let path = dir.path().join(name);
    std::fs::write(&path, format!("[client]\nstream_style = {value}\n")).unwrap();
    config::load(path.to_str().unwrap()).unwrap().config.client.stream_style
}

#[test]
fn stream_style_accepts_names_and_raw_values() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(load_client_style(&dir, "named.toml", "\"sec\""), StreamStyle::Sec);
    assert_eq!(load_client_style(&dir, "raw.toml", "1"), StreamStyle::Main);
    assert_eq!(load_client_style(&dir, "raw_default.toml", "0"), StreamStyle::Default);
}

#[test]
fn unknown_stream_style_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(load_client_style(&dir, "raw.toml", "42"), StreamStyle::Default);
    assert_eq!(load_client_style(&dir, "named.toml", "\"tertiary\""), StreamStyle::Default);
}
