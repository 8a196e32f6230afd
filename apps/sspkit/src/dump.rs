// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Raw H.264/H.265 elementary stream dump.
//!
//! Video handlers run on the client's loop thread and must not block on disk I/O, so frames
//! are handed to a dedicated writer thread through a bounded queue. A full queue drops the
//! frame with a warning.

use anyhow::{Context, Result};
use bytes::Bytes;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

const PROGRESS_EVERY: u64 = 100;

/// Totals reported when a dump stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DumpSummary {
    pub frames_written: u64,
    pub bytes_written: u64,
    pub frames_dropped: u64,
}

struct Writer {
    tx: SyncSender<Bytes>,
    thread: JoinHandle<std::io::Result<(u64, u64)>>,
}

/// Writes video frames to a file on a background thread.
pub struct FrameDumper {
    path: PathBuf,
    capacity: usize,
    writer: Mutex<Option<Writer>>,
    dropped: AtomicU64,
}

impl FrameDumper {
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity: capacity.max(1),
            writer: Mutex::new(None),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the output file and spawns the writer thread. Does nothing if already running.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its parent directory cannot be created, or the writer
    /// thread cannot be spawned.
    pub fn start(&self) -> Result<()> {
        let mut writer = self.lock_writer();
        if writer.is_some() {
            debug!(path = %self.path.display(), "Frame dump already running");
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create dump directory {}", parent.display()))?;
        }
        let file = File::create(&self.path)
            .with_context(|| format!("Failed to create dump file {}", self.path.display()))?;

        let (tx, rx) = mpsc::sync_channel(self.capacity);
        let path = self.path.clone();
        let thread = std::thread::Builder::new()
            .name("ssp-dump".to_string())
            .spawn(move || write_frames(&path, file, &rx))
            .context("Failed to spawn dump writer thread")?;

        self.dropped.store(0, Ordering::Relaxed);
        *writer = Some(Writer { tx, thread });
        info!(path = %self.path.display(), "Frame dump started");
        Ok(())
    }

    /// Queues a frame for writing. Returns `false` if the frame was dropped.
    pub fn write_frame(&self, data: Bytes) -> bool {
        let writer = self.lock_writer();
        let Some(writer) = writer.as_ref() else {
            warn!("Frame dump is not running, frame dropped");
            return false;
        };

        match writer.tx.try_send(data) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Frame dump queue is full, frame dropped");
                false
            },
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Frame dump writer has exited, frame dropped");
                false
            },
        }
    }

    /// Flushes queued frames, closes the file and joins the writer.
    ///
    /// Returns `None` if the dump was not running.
    pub fn stop(&self) -> Option<DumpSummary> {
        let Writer { tx, thread } = self.lock_writer().take()?;
        // Closing the queue lets the writer drain what is left and exit.
        drop(tx);

        let frames_dropped = self.dropped.load(Ordering::Relaxed);
        let (frames_written, bytes_written) = match thread.join() {
            Ok(Ok(totals)) => totals,
            Ok(Err(e)) => {
                error!(error = %e, path = %self.path.display(), "Frame dump failed");
                (0, 0)
            },
            Err(_) => {
                error!(path = %self.path.display(), "Frame dump writer panicked");
                (0, 0)
            },
        };

        let summary = DumpSummary { frames_written, bytes_written, frames_dropped };
        info!(
            path = %self.path.display(),
            frames_written,
            bytes_written,
            frames_dropped,
            "Frame dump stopped"
        );
        Some(summary)
    }

    pub fn is_running(&self) -> bool {
        self.lock_writer().is_some()
    }

    fn lock_writer(&self) -> std::sync::MutexGuard<'_, Option<Writer>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for FrameDumper {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn write_frames(path: &Path, file: File, rx: &Receiver<Bytes>) -> std::io::Result<(u64, u64)> {
    let mut out = BufWriter::new(file);
    let mut frames = 0u64;
    let mut bytes = 0u64;

    while let Ok(frame) = rx.recv() {
        out.write_all(&frame)?;
        frames += 1;
        bytes += frame.len() as u64;
        if frames % PROGRESS_EVERY == 0 {
            out.flush()?;
            debug!(path = %path.display(), frames, "Frame dump progress");
        }
    }

    out.flush()?;
    Ok((frames, bytes))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_written_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.h264");
        let dumper = FrameDumper::new(&path, 16);

        assert!(!dumper.write_frame(Bytes::from_static(b"early")));

        dumper.start().unwrap();
        dumper.start().unwrap();
        assert!(dumper.is_running());

        assert!(dumper.write_frame(Bytes::from_static(&[0, 0, 0, 1, 0x67])));
        assert!(dumper.write_frame(Bytes::from_static(&[0, 0, 0, 1, 0x65, 0x88])));

        let summary = dumper.stop().unwrap();
        assert_eq!(summary.frames_written, 2);
        assert_eq!(summary.bytes_written, 11);
        assert_eq!(summary.frames_dropped, 0);
        assert!(dumper.stop().is_none());

        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, vec![0, 0, 0, 1, 0x67, 0, 0, 0, 1, 0x65, 0x88]);
    }

    #[test]
    fn test_restart_truncates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.h265");
        let dumper = FrameDumper::new(&path, 4);

        dumper.start().unwrap();
        dumper.write_frame(Bytes::from_static(b"first run"));
        dumper.stop();

        dumper.start().unwrap();
        dumper.write_frame(Bytes::from_static(b"second"));
        dumper.stop();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn test_unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let dumper = FrameDumper::new(dir.path(), 4);
        assert!(dumper.start().is_err());
        assert!(!dumper.is_running());
    }
}
