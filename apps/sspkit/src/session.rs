// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! A single streaming run: start the controller, report events, stop on disconnect, on
//! Ctrl-C/SIGTERM or when the requested duration has elapsed.

use crate::config::Config;
use crate::dump::{DumpSummary, FrameDumper};
use anyhow::{Context, Result};
use serde::Serialize;
use sspkit_core::{
    AudioFrame, AudioMeta, ExceptionEvent, LifecycleState, StreamMeta, VideoFrame, VideoMeta,
};
use sspkit_runtime::{ControllerOptions, SspController, SyntheticSource};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Stop after this long. Runs until disconnected or interrupted when `None`.
    pub duration: Option<Duration>,
    /// Print every event as a JSON line on stdout.
    pub json_events: bool,
    /// Stop on Ctrl-C or SIGTERM.
    pub handle_signals: bool,
    /// Cancelling this token ends the session with [`StopReason::Interrupted`].
    pub interrupt: CancellationToken,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Disconnected,
    DurationElapsed,
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub stop_reason: StopReason,
    pub video_frames: u64,
    pub audio_frames: u64,
    pub exceptions: u64,
    pub final_state: LifecycleState,
    pub dump: Option<DumpSummary>,
}

#[derive(Default)]
struct SessionStats {
    video_frames: AtomicU64,
    audio_frames: AtomicU64,
    exceptions: AtomicU64,
    last_video_pts: Mutex<Option<u64>>,
}

impl SessionStats {
    /// Records a video frame, returning the pts distance to the previous one.
    fn record_video(&self, pts: u64) -> u64 {
        self.video_frames.fetch_add(1, Ordering::Relaxed);
        let mut last = self.last_video_pts.lock().unwrap_or_else(PoisonError::into_inner);
        let interval = last.map_or(0, |previous| pts.saturating_sub(previous));
        *last = Some(pts);
        interval
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum EventRecord<'a> {
    VideoData(&'a VideoFrame),
    AudioData(&'a AudioFrame),
    Meta { video: &'a VideoMeta, audio: &'a AudioMeta, stream: &'a StreamMeta },
    Connected,
    Disconnected,
    Exception(&'a ExceptionEvent),
    RecvBufferFull,
}

// Allow println for JSON-lines output to stdout (intentional)
#[allow(clippy::disallowed_macros)]
fn emit(enabled: bool, record: &EventRecord<'_>) {
    if !enabled {
        return;
    }
    match serde_json::to_string(record) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(error = %e, "Failed to serialize event"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL-C signal, stopping session");
        },
        () = terminate => {
            info!("Received SIGTERM signal, stopping session");
        },
    }
}

/// Turns OS signals and the caller's interrupt token into a [`StopReason::Interrupted`].
struct InterruptWatcher {
    done: CancellationToken,
    thread: JoinHandle<()>,
}

impl InterruptWatcher {
    fn spawn(options: &SessionOptions, stop_tx: mpsc::Sender<StopReason>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build signal runtime")?;

        let done = CancellationToken::new();
        let done_watch = done.clone();
        let interrupt = options.interrupt.clone();
        let handle_signals = options.handle_signals;

        let thread = std::thread::Builder::new()
            .name("ssp-signal".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    let signal = async {
                        if handle_signals {
                            shutdown_signal().await;
                        } else {
                            std::future::pending::<()>().await;
                        }
                    };
                    tokio::select! {
                        () = signal => {
                            let _ = stop_tx.send(StopReason::Interrupted);
                        },
                        () = interrupt.cancelled() => {
                            info!("Session interrupted");
                            let _ = stop_tx.send(StopReason::Interrupted);
                        },
                        () = done_watch.cancelled() => {},
                    }
                });
            })
            .context("Failed to spawn signal thread")?;

        Ok(Self { done, thread })
    }

    fn finish(self) {
        self.done.cancel();
        if self.thread.join().is_err() {
            warn!("Signal watcher thread panicked");
        }
    }
}

/// One-line human summary of the stream metadata.
pub fn describe_meta(video: &VideoMeta, audio: &AudioMeta, stream: &StreamMeta) -> String {
    let bits = audio
        .bits_per_sample()
        .map_or_else(|| "n/a".to_string(), |bits| format!("{bits}"));
    format!(
        "video {}x{} {} gop={} timescale={}/{}, audio {} {}Hz ch={} bits={} bitrate={}, wall_clock_pts={}",
        video.width,
        video.height,
        video.video_encoder().name(),
        video.gop,
        video.timescale,
        video.unit,
        audio.audio_encoder().name(),
        audio.sample_rate,
        audio.channel,
        bits,
        audio.bitrate,
        stream.pts_is_wall_clock,
    )
}

fn register_handlers(
    controller: &SspController,
    stats: &Arc<SessionStats>,
    dumper: Option<&Arc<FrameDumper>>,
    stop_tx: &mpsc::Sender<StopReason>,
    json: bool,
) {
    let video_stats = stats.clone();
    let video_dumper = dumper.cloned();
    controller.set_on_video_data_callback(move |frame: &VideoFrame| {
        let interval = video_stats.record_video(frame.pts);
        debug!(
            frame_number = frame.frame_number,
            pts = frame.pts,
            interval,
            frame_type = frame.frame_type,
            size = frame.len,
            ntp = frame.ntp_timestamp,
            "Video frame"
        );
        if let Some(dumper) = &video_dumper {
            dumper.write_frame(frame.data.clone());
        }
        emit(json, &EventRecord::VideoData(frame));
    });

    let audio_stats = stats.clone();
    controller.set_on_audio_data_callback(move |frame: &AudioFrame| {
        audio_stats.audio_frames.fetch_add(1, Ordering::Relaxed);
        debug!(pts = frame.pts, size = frame.len, ntp = frame.ntp_timestamp, "Audio frame");
        emit(json, &EventRecord::AudioData(frame));
    });

    controller.set_on_meta_callback(
        move |video: &VideoMeta, audio: &AudioMeta, stream: &StreamMeta| {
            info!(meta = %describe_meta(video, audio, stream), "Received metadata");
            emit(json, &EventRecord::Meta { video, audio, stream });
        },
    );

    controller.set_on_connected_callback(move || {
        info!("Connection established");
        emit(json, &EventRecord::Connected);
    });

    let disconnected_tx = stop_tx.clone();
    controller.set_on_disconnected_callback(move || {
        info!("Connection closed");
        emit(json, &EventRecord::Disconnected);
        // The run loop may already be gone when the stop was ours.
        let _ = disconnected_tx.send(StopReason::Disconnected);
    });

    let exception_stats = stats.clone();
    controller.set_on_exception_callback(move |event: &ExceptionEvent| {
        exception_stats.exceptions.fetch_add(1, Ordering::Relaxed);
        let known = event.known_code().map(|code| code.to_string());
        warn!(
            code = event.code,
            known = known.as_deref().unwrap_or("unknown"),
            description = %event.description,
            "Client exception"
        );
        emit(json, &EventRecord::Exception(event));
    });

    controller.set_on_recv_buffer_full_callback(move || {
        warn!("Receive buffer is full");
        emit(json, &EventRecord::RecvBufferFull);
    });
}

/// Runs one session against the configured source.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the dump file cannot be created or the
/// client fails to start.
pub fn run(config: &Config, options: &SessionOptions) -> Result<SessionReport> {
    let client_config = config.client.client_config().context("Invalid client configuration")?;

    let dumper = match &config.dump.path {
        Some(path) => {
            let dumper = Arc::new(FrameDumper::new(path, config.dump.queue_capacity));
            dumper.start()?;
            Some(dumper)
        },
        None => None,
    };

    let (source, _injector) = SyntheticSource::new(config.source.profile());
    let controller_options = ControllerOptions {
        init_timeout: config.client.init_timeout(),
        ..ControllerOptions::default()
    };
    let controller =
        SspController::with_options(client_config, source.into_factory(), controller_options);

    controller.set_is_hlg(config.client.is_hlg);
    controller.set_capability(config.client.capability());
    controller.set_debug_print(config.client.debug_print);

    let stats = Arc::new(SessionStats::default());
    let (stop_tx, stop_rx) = mpsc::channel();
    register_handlers(&controller, &stats, dumper.as_ref(), &stop_tx, options.json_events);
    let watcher = InterruptWatcher::spawn(options, stop_tx)?;

    info!(
        host = %controller.config().host(),
        port = controller.config().port(),
        stream_style = ?controller.config().stream_style(),
        "Connecting"
    );
    controller.start().context("Failed to start streaming client")?;

    let stop_reason = match options.duration {
        Some(duration) => stop_rx.recv_timeout(duration).unwrap_or(StopReason::DurationElapsed),
        // The watcher keeps a sender alive, so this only returns on disconnect or interrupt.
        None => stop_rx.recv().unwrap_or(StopReason::Disconnected),
    };
    watcher.finish();
    info!(reason = ?stop_reason, "Stopping client");

    controller.stop();
    let final_state = controller.state();
    drop(controller);

    let dump = dumper.and_then(|dumper| dumper.stop());

    let report = SessionReport {
        stop_reason,
        video_frames: stats.video_frames.load(Ordering::Relaxed),
        audio_frames: stats.audio_frames.load(Ordering::Relaxed),
        exceptions: stats.exceptions.load(Ordering::Relaxed),
        final_state,
        dump,
    };
    info!(
        video_frames = report.video_frames,
        audio_frames = report.audio_frames,
        exceptions = report.exceptions,
        "Session finished"
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_video_interval_tracks_previous_pts() {
        let stats = SessionStats::default();
        assert_eq!(stats.record_video(3000), 0);
        assert_eq!(stats.record_video(6000), 3000);
        assert_eq!(stats.record_video(9000), 3000);
        assert_eq!(stats.video_frames.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_describe_meta_names_encoders() {
        let video = VideoMeta {
            width: 3840,
            height: 2160,
            timescale: 90_000,
            unit: 3000,
            gop: 30,
            encoder: 265,
        };
        let audio = AudioMeta {
            sample_rate: 48_000,
            channel: 2,
            sample_size: 2,
            unit: 1,
            encoder: 23,
            ..AudioMeta::default()
        };
        let summary = describe_meta(&video, &audio, &StreamMeta { pts_is_wall_clock: true });

        assert!(summary.contains("3840x2160 H.265"));
        assert!(summary.contains("PCM 48000Hz"));
        assert!(summary.contains("bits=16"));
        assert!(summary.ends_with("wall_clock_pts=true"));
    }

    #[test]
    fn test_event_record_json_shape() {
        let event = ExceptionEvent::new(-1003, "already connected");
        let json = serde_json::to_value(EventRecord::Exception(&event)).unwrap();
        assert_eq!(json["event"], "exception");
        assert_eq!(json["code"], -1003);

        let json = serde_json::to_value(EventRecord::RecvBufferFull).unwrap();
        assert_eq!(json, serde_json::json!({ "event": "recv_buffer_full" }));
    }
}
