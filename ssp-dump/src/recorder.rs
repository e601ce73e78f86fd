// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Queue-to-file recorder for the elementary video stream.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::mpsc,
    thread::{self, JoinHandle},
};

use ssp::VideoEncoder;
use tracing::{debug, info, warn};

/// Progress is logged every this many frames.
const PROGRESS_INTERVAL: u64 = 100;

/// File name for a dump of `address`'s stream `stream_index`.
///
/// `camera_<address>_stream<index>_<uuid>.<h264|h265>`
pub fn dump_file_name(address: &str, stream_index: u32, encoder: VideoEncoder) -> String {
    format!(
        "camera_{}_stream{}_{}.{}",
        address.replace([':', '/'], "_"),
        stream_index,
        uuid::Uuid::new_v4(),
        encoder.file_extension()
    )
}

/// Totals of a finished recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecorderStats {
    pub frames: u64,
    pub bytes: u64,
}

/// Appends frames to a file on a dedicated thread.
///
/// Frames queued before [`Recorder::stop`] are all written; the file is
/// flushed after every frame so a killed process leaves a playable prefix.
pub struct Recorder {
    path: PathBuf,
    sender: Option<mpsc::Sender<Vec<u8>>>,
    worker: Option<JoinHandle<io::Result<RecorderStats>>>,
}

impl Recorder {
    /// Creates (truncates) the file at `path` and starts the writer thread.
    pub fn start(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        let (sender, receiver) = mpsc::channel();
        let worker_path = path.clone();
        let worker = thread::Builder::new()
            .name("ssp-dump-writer".to_string())
            .spawn(move || write_frames(file, receiver, &worker_path))?;
        info!(path = %path.display(), "Recording started");
        Ok(Self {
            path,
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_running(&self) -> bool {
        self.sender.is_some()
    }

    /// Queues a frame. Returns `false` (and drops the frame) once stopped.
    pub fn write_frame(&self, data: Vec<u8>) -> bool {
        match &self.sender {
            Some(sender) => sender.send(data).is_ok(),
            None => {
                warn!("Recorder is not running, frame dropped");
                false
            }
        }
    }

    /// Writes every queued frame, closes the file and joins the writer.
    pub fn stop(&mut self) -> io::Result<RecorderStats> {
        drop(self.sender.take());
        let Some(worker) = self.worker.take() else {
            debug!("Recorder already stopped");
            return Ok(RecorderStats::default());
        };
        let stats = worker
            .join()
            .map_err(|_| io::Error::other("recorder thread panicked"))??;
        info!(
            path = %self.path.display(),
            frames = stats.frames,
            bytes = stats.bytes,
            "Recording finished"
        );
        Ok(stats)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(path = %self.path.display(), "Recorder failed: {}", e);
        }
    }
}

fn write_frames(
    file: File,
    receiver: mpsc::Receiver<Vec<u8>>,
    path: &Path,
) -> io::Result<RecorderStats> {
    let mut out = BufWriter::new(file);
    let mut stats = RecorderStats::default();
    // Ends once the sender is dropped and the queue is empty.
    for frame in receiver {
        out.write_all(&frame)?;
        out.flush()?;
        stats.frames += 1;
        stats.bytes += frame.len() as u64;
        if stats.frames % PROGRESS_INTERVAL == 0 {
            debug!(path = %path.display(), frames = stats.frames, "Recording progress");
        }
    }
    out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(stats)
}
