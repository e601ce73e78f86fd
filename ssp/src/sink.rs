// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Consumer handler table.
//!
//! [`EventSink`] holds one optional handler per [`EventKind`]. It is plain
//! data: the client keeps one behind a mutex for the setters and takes a clone
//! at `start()`, which is the only moment handlers are wired into a session.

use std::{fmt, sync::Arc};

use crate::{AudioFrame, EventKind, ExceptionEvent, StreamMeta, VideoFrame};

/// Error type handlers may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by every handler. An `Err` (or a panic) is caught at the
/// trampoline and reported as an [`crate::ExceptionCode::HandlerFailed`] event.
pub type HandlerResult = core::result::Result<(), HandlerError>;

pub type VideoFrameHandler = Arc<dyn Fn(&VideoFrame) -> HandlerResult + Send + Sync>;
pub type AudioFrameHandler = Arc<dyn Fn(&AudioFrame) -> HandlerResult + Send + Sync>;
pub type MetaHandler = Arc<dyn Fn(&StreamMeta) -> HandlerResult + Send + Sync>;
pub type NotifyHandler = Arc<dyn Fn() -> HandlerResult + Send + Sync>;
pub type ExceptionHandler = Arc<dyn Fn(&ExceptionEvent) -> HandlerResult + Send + Sync>;

/// One optional handler slot per event kind. Unset slots drop their events.
#[derive(Clone, Default)]
pub struct EventSink {
    pub video_frame: Option<VideoFrameHandler>,
    pub audio_frame: Option<AudioFrameHandler>,
    pub metadata: Option<MetaHandler>,
    pub connected: Option<NotifyHandler>,
    pub disconnected: Option<NotifyHandler>,
    pub exception: Option<ExceptionHandler>,
    pub recv_buffer_full: Option<NotifyHandler>,
}

impl EventSink {
    pub fn is_set(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::VideoFrame => self.video_frame.is_some(),
            EventKind::AudioFrame => self.audio_frame.is_some(),
            EventKind::Metadata => self.metadata.is_some(),
            EventKind::Connected => self.connected.is_some(),
            EventKind::Disconnected => self.disconnected.is_some(),
            EventKind::Exception => self.exception.is_some(),
            EventKind::RecvBufferFull => self.recv_buffer_full.is_some(),
        }
    }

    /// Kinds with a handler, in [`EventKind::ALL`] order.
    pub fn registered_kinds(&self) -> Vec<EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(|kind| self.is_set(*kind))
            .collect()
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("registered", &self.registered_kinds())
            .finish()
    }
}
