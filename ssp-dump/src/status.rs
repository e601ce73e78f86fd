// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Status lines printed while streaming.

use ssp::{AudioFrame, StreamMeta, VideoFrame};

/// Tracks the presentation timestamp of the previous frame to report the
/// frame interval.
#[derive(Debug, Default)]
pub struct FrameClock {
    last_pts: Option<u64>,
}

impl FrameClock {
    /// Interval since the previous frame, 0 for the first one.
    pub fn tick(&mut self, pts: u64) -> u64 {
        let interval = self.last_pts.map_or(0, |last| pts.saturating_sub(last));
        self.last_pts = Some(pts);
        interval
    }
}

pub fn video_status(frame: &VideoFrame, interval: u64) -> String {
    format!(
        "Video: frm_no={}, PTS={}, interval={}, type={}, size={} bytes, NTP={}",
        frame.frame_no,
        frame.pts,
        interval,
        frame.frame_type,
        frame.len(),
        frame.ntp_timestamp
    )
}

pub fn audio_status(frame: &AudioFrame) -> String {
    format!(
        "Audio: PTS={}, size={} bytes, NTP={}",
        frame.pts,
        frame.len(),
        frame.ntp_timestamp
    )
}

/// Multi-line description of the stream metadata.
pub fn describe_meta(meta: &StreamMeta) -> Vec<String> {
    let video = &meta.video;
    let audio = &meta.audio;
    let bits = audio
        .bits_per_sample()
        .map_or_else(|| "unknown".to_string(), |bits| bits.to_string());
    vec![
        format!("Wall clock: {}", meta.meta.pts_is_wall_clock),
        format!(
            "Video: {}x{} timescale={}/{}",
            video.width, video.height, video.timescale, video.unit
        ),
        format!(
            "Video: gop={}, encoder={}",
            video.gop,
            video.encoder().name()
        ),
        format!(
            "Audio: sample rate={}Hz, channel={}",
            audio.sample_rate, audio.channel
        ),
        format!(
            "Audio: bits per sample={}, encoder={}, bitrate={}",
            bits,
            audio.encoder().name(),
            audio.bitrate
        ),
    ]
}
