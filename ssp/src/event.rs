// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Event payloads crossing the session boundary.
//!
//! A session hands out borrowed views ([`VideoFrameRef`], [`AudioFrameRef`])
//! whose bytes belong to the session and may be reused as soon as the callback
//! returns. Trampolines copy them into owned values ([`VideoFrame`],
//! [`AudioFrame`]) before the event leaves the session's call stack.

use std::fmt;

use crate::{AudioEncoder, ExceptionCode, VideoEncoder};

/// The kinds of events a client can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    VideoFrame,
    AudioFrame,
    Metadata,
    Connected,
    Disconnected,
    Exception,
    RecvBufferFull,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::VideoFrame,
        EventKind::AudioFrame,
        EventKind::Metadata,
        EventKind::Connected,
        EventKind::Disconnected,
        EventKind::Exception,
        EventKind::RecvBufferFull,
    ];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::VideoFrame => "video_frame",
            EventKind::AudioFrame => "audio_frame",
            EventKind::Metadata => "metadata",
            EventKind::Connected => "connected",
            EventKind::Disconnected => "disconnected",
            EventKind::Exception => "exception",
            EventKind::RecvBufferFull => "recv_buffer_full",
        };
        f.write_str(name)
    }
}

/// Borrowed view of an encoded video frame, valid only during the callback.
#[derive(Debug, Clone, Copy)]
pub struct VideoFrameRef<'a> {
    pub data: &'a [u8],
    /// Presentation timestamp.
    pub pts: u64,
    pub ntp_timestamp: u64,
    pub frame_no: u32,
    /// Frame type tag as reported by the camera (key/delta).
    pub frame_type: u32,
}

impl VideoFrameRef<'_> {
    /// Creates an owned copy of this frame.
    pub fn to_owned(&self) -> VideoFrame {
        self.into()
    }
}

/// Owned copy of an encoded video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub pts: u64,
    pub ntp_timestamp: u64,
    pub frame_no: u32,
    pub frame_type: u32,
}

impl VideoFrame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<'a> From<&VideoFrameRef<'a>> for VideoFrame {
    fn from(value: &VideoFrameRef<'a>) -> Self {
        Self {
            data: value.data.to_vec(),
            pts: value.pts,
            ntp_timestamp: value.ntp_timestamp,
            frame_no: value.frame_no,
            frame_type: value.frame_type,
        }
    }
}

/// Borrowed view of an encoded audio frame, valid only during the callback.
#[derive(Debug, Clone, Copy)]
pub struct AudioFrameRef<'a> {
    pub data: &'a [u8],
    pub pts: u64,
    pub ntp_timestamp: u64,
}

impl AudioFrameRef<'_> {
    pub fn to_owned(&self) -> AudioFrame {
        self.into()
    }
}

/// Owned copy of an encoded audio frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub data: Vec<u8>,
    pub pts: u64,
    pub ntp_timestamp: u64,
}

impl AudioFrame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<'a> From<&AudioFrameRef<'a>> for AudioFrame {
    fn from(value: &AudioFrameRef<'a>) -> Self {
        Self {
            data: value.data.to_vec(),
            pts: value.pts,
            ntp_timestamp: value.ntp_timestamp,
        }
    }
}

/// Video stream description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    pub timescale: u32,
    pub unit: u32,
    /// Group-of-pictures length.
    pub gop: u32,
    /// Raw encoder tag, see [`VideoMeta::encoder`].
    pub encoder: u32,
}

impl VideoMeta {
    pub fn encoder(&self) -> VideoEncoder {
        self.encoder.into()
    }
}

impl From<&ssp_sys::VideoMeta> for VideoMeta {
    fn from(value: &ssp_sys::VideoMeta) -> Self {
        Self {
            width: value.width,
            height: value.height,
            timescale: value.timescale,
            unit: value.unit,
            gop: value.gop,
            encoder: value.encoder,
        }
    }
}

/// Audio stream description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioMeta {
    pub timescale: u32,
    pub unit: u32,
    pub sample_rate: u32,
    /// Bytes per sample per `unit`.
    pub sample_size: u32,
    pub channel: u32,
    pub bitrate: u32,
    pub encoder: u32,
}

impl AudioMeta {
    pub fn encoder(&self) -> AudioEncoder {
        self.encoder.into()
    }

    /// Bits per sample, or `None` when the camera reports a zero unit.
    pub fn bits_per_sample(&self) -> Option<u32> {
        (self.unit != 0).then(|| 8 * self.sample_size / self.unit)
    }
}

impl From<&ssp_sys::AudioMeta> for AudioMeta {
    fn from(value: &ssp_sys::AudioMeta) -> Self {
        Self {
            timescale: value.timescale,
            unit: value.unit,
            sample_rate: value.sample_rate,
            sample_size: value.sample_size,
            channel: value.channel,
            bitrate: value.bitrate,
            encoder: value.encoder,
        }
    }
}

/// Stream-wide metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Meta {
    /// Timestamps are wall-clock rather than stream-relative.
    pub pts_is_wall_clock: bool,
}

/// Metadata bundle delivered once per connection, before any frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamMeta {
    pub video: VideoMeta,
    pub audio: AudioMeta,
    pub meta: Meta,
}

/// Exception event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionEvent {
    /// Raw code, see [`ExceptionEvent::kind`].
    pub code: i32,
    pub description: String,
}

impl ExceptionEvent {
    pub fn new(code: ExceptionCode, description: impl Into<String>) -> Self {
        Self {
            code: code.as_raw(),
            description: description.into(),
        }
    }

    pub fn kind(&self) -> ExceptionCode {
        ExceptionCode::from_raw(self.code)
    }
}

impl fmt::Display for ExceptionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code={}, description={}", self.code, self.description)
    }
}
