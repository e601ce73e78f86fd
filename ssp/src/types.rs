// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Connection parameters and the enumerations exposed by the SSP protocol.

use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Which of the camera's output streams to receive.
///
/// The camera encodes two independent streams: stream 0 (main, high quality)
/// and stream 1 (secondary, configurable). `Default` lets the camera pick,
/// which in practice selects stream 1.
///
/// Configuration files may give either the lowercase name or the raw protocol
/// value. Unknown values of either form fall back to `Default` with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStyle {
    /// Camera default (stream 1).
    #[default]
    Default,
    /// Stream 0.
    Main,
    /// Stream 1, requested explicitly.
    Secondary,
}

impl StreamStyle {
    /// Converts a raw selector, falling back to [`StreamStyle::Default`] with a
    /// warning for values the protocol does not define.
    pub fn from_raw(value: u32) -> Self {
        match value {
            ssp_sys::STREAM_DEFAULT => StreamStyle::Default,
            ssp_sys::STREAM_MAIN => StreamStyle::Main,
            ssp_sys::STREAM_SEC => StreamStyle::Secondary,
            other => {
                warn!(
                    stream_style = other,
                    "Unknown stream style, falling back to STREAM_DEFAULT"
                );
                StreamStyle::Default
            }
        }
    }

    /// Parses the lowercase name, falling back to [`StreamStyle::Default`]
    /// with a warning for unknown names.
    pub fn from_name(name: &str) -> Self {
        match name {
            "default" => StreamStyle::Default,
            "main" => StreamStyle::Main,
            "secondary" => StreamStyle::Secondary,
            other => {
                warn!(
                    stream_style = other,
                    "Unknown stream style, falling back to STREAM_DEFAULT"
                );
                StreamStyle::Default
            }
        }
    }

    /// Maps a camera stream index (0 or 1) to a selector, the way the camera
    /// HTTP API numbers its streams.
    pub fn from_index(index: u32) -> Self {
        match index {
            0 => StreamStyle::Main,
            1 => StreamStyle::Default,
            other => {
                warn!(stream_index = other, "Unknown stream index, using stream 1");
                StreamStyle::Default
            }
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            StreamStyle::Default => ssp_sys::STREAM_DEFAULT,
            StreamStyle::Main => ssp_sys::STREAM_MAIN,
            StreamStyle::Secondary => ssp_sys::STREAM_SEC,
        }
    }
}

impl From<u32> for StreamStyle {
    fn from(value: u32) -> Self {
        StreamStyle::from_raw(value)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StreamStyleRepr {
    Raw(i64),
    Name(String),
}

impl<'de> Deserialize<'de> for StreamStyle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match StreamStyleRepr::deserialize(deserializer)? {
            StreamStyleRepr::Raw(value) => match u32::try_from(value) {
                Ok(value) => StreamStyle::from_raw(value),
                Err(_) => {
                    warn!(
                        stream_style = value,
                        "Unknown stream style, falling back to STREAM_DEFAULT"
                    );
                    StreamStyle::Default
                }
            },
            StreamStyleRepr::Name(name) => StreamStyle::from_name(&name),
        })
    }
}

/// Video codec announced in the stream metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoEncoder {
    Unknown,
    H264,
    H265,
}

impl From<u32> for VideoEncoder {
    fn from(value: u32) -> Self {
        match value {
            ssp_sys::VIDEO_ENCODER_H264 => VideoEncoder::H264,
            ssp_sys::VIDEO_ENCODER_H265 => VideoEncoder::H265,
            _ => VideoEncoder::Unknown,
        }
    }
}

impl VideoEncoder {
    /// Human readable codec name.
    pub fn name(self) -> &'static str {
        match self {
            VideoEncoder::H264 => "H.264",
            VideoEncoder::H265 => "H.265",
            VideoEncoder::Unknown => "Unknown",
        }
    }

    /// File extension players expect for a raw elementary stream of this codec.
    pub fn file_extension(self) -> &'static str {
        match self {
            VideoEncoder::H265 => "h265",
            _ => "h264",
        }
    }
}

/// Audio codec announced in the stream metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEncoder {
    Unknown,
    Aac,
    Pcm,
}

impl From<u32> for AudioEncoder {
    fn from(value: u32) -> Self {
        match value {
            ssp_sys::AUDIO_ENCODER_AAC => AudioEncoder::Aac,
            ssp_sys::AUDIO_ENCODER_PCM => AudioEncoder::Pcm,
            _ => AudioEncoder::Unknown,
        }
    }
}

impl AudioEncoder {
    pub fn name(self) -> &'static str {
        match self {
            AudioEncoder::Aac => "AAC",
            AudioEncoder::Pcm => "PCM",
            AudioEncoder::Unknown => "Unknown",
        }
    }
}

/// Session capability bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(u32);

impl Capability {
    pub const NONE: Capability = Capability(0);

    /// Keep the camera encoder running when heartbeats are lost.
    pub const IGNORE_HEARTBEAT_DISABLE_ENC: Capability =
        Capability(ssp_sys::SSP_CAPABILITY_IGNORE_HEARTBEAT_DISABLE_ENC);

    pub const fn from_bits(bits: u32) -> Self {
        Capability(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Capability) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Capability {
    type Output = Capability;

    fn bitor(self, rhs: Self) -> Self::Output {
        Capability(self.0 | rhs.0)
    }
}

impl BitOrAssign for Capability {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Codes carried by exception events.
///
/// The first four come from the native protocol engine. The remaining ones are
/// raised by the client itself when it cannot reach, start, or feed the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionCode {
    /// The client speaks a newer protocol version than the camera.
    ProtocolVersionGreaterThanServer,
    /// The client speaks an older protocol version than the camera.
    ProtocolVersionLessThanServer,
    ConnectionFailed,
    /// Another client already holds the stream connection.
    ConnectionExists,
    /// No session exists (initialisation pending, timed out, or failed).
    SessionUnavailable,
    /// A consumer handler returned an error or panicked.
    HandlerFailed,
    /// The session refused to start.
    StartFailed,
    Other(i32),
}

/// Raw code of [`ExceptionCode::SessionUnavailable`].
pub const ERROR_SESSION_UNAVAILABLE: i32 = -2000;
/// Raw code of [`ExceptionCode::HandlerFailed`].
pub const ERROR_HANDLER_FAILED: i32 = -2001;
/// Raw code of [`ExceptionCode::StartFailed`].
pub const ERROR_START_FAILED: i32 = -2002;

impl ExceptionCode {
    pub fn from_raw(code: i32) -> Self {
        match code {
            ssp_sys::ERROR_SSP_PROTOCOL_VERSION_GT_SERVER => {
                ExceptionCode::ProtocolVersionGreaterThanServer
            }
            ssp_sys::ERROR_SSP_PROTOCOL_VERSION_LT_SERVER => {
                ExceptionCode::ProtocolVersionLessThanServer
            }
            ssp_sys::ERROR_SSP_CONNECTION_FAILED => ExceptionCode::ConnectionFailed,
            ssp_sys::ERROR_SSP_CONNECTION_EXIST => ExceptionCode::ConnectionExists,
            ERROR_SESSION_UNAVAILABLE => ExceptionCode::SessionUnavailable,
            ERROR_HANDLER_FAILED => ExceptionCode::HandlerFailed,
            ERROR_START_FAILED => ExceptionCode::StartFailed,
            other => ExceptionCode::Other(other),
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            ExceptionCode::ProtocolVersionGreaterThanServer => {
                ssp_sys::ERROR_SSP_PROTOCOL_VERSION_GT_SERVER
            }
            ExceptionCode::ProtocolVersionLessThanServer => {
                ssp_sys::ERROR_SSP_PROTOCOL_VERSION_LT_SERVER
            }
            ExceptionCode::ConnectionFailed => ssp_sys::ERROR_SSP_CONNECTION_FAILED,
            ExceptionCode::ConnectionExists => ssp_sys::ERROR_SSP_CONNECTION_EXIST,
            ExceptionCode::SessionUnavailable => ERROR_SESSION_UNAVAILABLE,
            ExceptionCode::HandlerFailed => ERROR_HANDLER_FAILED,
            ExceptionCode::StartFailed => ERROR_START_FAILED,
            ExceptionCode::Other(code) => code,
        }
    }
}

/// Immutable connection parameters a client is constructed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Camera IP address or host name.
    pub address: String,
    /// Receive buffer capacity in bytes.
    pub buffer_size: usize,
    pub port: u16,
    pub stream_style: StreamStyle,
}

impl ConnectParams {
    /// Receive buffer size used by the camera vendor's own tools (4 MiB).
    pub const DEFAULT_BUFFER_SIZE: usize = 0x40_0000;

    pub fn new(
        address: impl Into<String>,
        buffer_size: usize,
        port: u16,
        stream_style: StreamStyle,
    ) -> Self {
        Self {
            address: address.into(),
            buffer_size,
            port,
            stream_style,
        }
    }

    /// Parameters with the default buffer size, port and stream.
    pub fn with_defaults(address: impl Into<String>) -> Self {
        Self::new(
            address,
            Self::DEFAULT_BUFFER_SIZE,
            ssp_sys::SSP_DEFAULT_PORT,
            StreamStyle::Default,
        )
    }
}
