// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Boundary to the protocol engine.
//!
//! The SSP protocol itself (handshake, heartbeat, reconnection, framing) lives
//! in an external engine. The client only relies on the capabilities listed in
//! [`StreamingSession`] and makes no assumption about the engine's internal
//! threading: callbacks may arrive on any thread, concurrently with `stop()`.
//!
//! - [`SessionFactory`]: constructs a session on the run-loop thread
//! - [`StreamingSession`]: init, configure, register callbacks, start, stop
//! - [`Trampoline`]: a callback the client registers for one event kind
//! - [`native`]: the implementation backed by the native library

pub mod native;

use crate::{
    AudioFrameRef, AudioMeta, Capability, ConnectParams, EventKind, LoopHandle, Meta, Result,
    VideoFrameRef, VideoMeta,
};

pub type VideoFrameCallback = Box<dyn Fn(&VideoFrameRef<'_>) + Send + Sync>;
pub type AudioFrameCallback = Box<dyn Fn(&AudioFrameRef<'_>) + Send + Sync>;
pub type MetaCallback = Box<dyn Fn(&VideoMeta, &AudioMeta, &Meta) + Send + Sync>;
pub type NotifyCallback = Box<dyn Fn() + Send + Sync>;
pub type ExceptionCallback = Box<dyn Fn(i32, &str) + Send + Sync>;

/// A callback registered on a session for a single event kind.
///
/// Payload references are only valid for the duration of the call.
pub enum Trampoline {
    VideoFrame(VideoFrameCallback),
    AudioFrame(AudioFrameCallback),
    Metadata(MetaCallback),
    Connected(NotifyCallback),
    Disconnected(NotifyCallback),
    Exception(ExceptionCallback),
    RecvBufferFull(NotifyCallback),
}

impl Trampoline {
    pub fn kind(&self) -> EventKind {
        match self {
            Trampoline::VideoFrame(_) => EventKind::VideoFrame,
            Trampoline::AudioFrame(_) => EventKind::AudioFrame,
            Trampoline::Metadata(_) => EventKind::Metadata,
            Trampoline::Connected(_) => EventKind::Connected,
            Trampoline::Disconnected(_) => EventKind::Disconnected,
            Trampoline::Exception(_) => EventKind::Exception,
            Trampoline::RecvBufferFull(_) => EventKind::RecvBufferFull,
        }
    }
}

impl std::fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Trampoline").field(&self.kind()).finish()
    }
}

/// A protocol-level streaming session.
///
/// Sessions are created and destroyed on the run-loop thread. `register` and
/// `stop` must be safe to call from any thread, including while `start` is
/// blocked on another one.
pub trait StreamingSession: Send + Sync {
    /// One-time setup, called once right after construction.
    fn init(&self) -> Result<()>;

    fn set_hlg(&self, enabled: bool);

    fn set_capability(&self, capability: Capability);

    /// Toggles the engine's own diagnostic output.
    fn set_debug_print(&self, _enabled: bool) {}

    fn register(&self, trampoline: Trampoline);

    /// Begins network activity. May block for the whole connection setup and
    /// may invoke registered callbacks before returning.
    fn start(&self) -> Result<()>;

    /// Halts network activity. May synchronously invoke the disconnected or
    /// exception callback before returning.
    fn stop(&self);
}

/// Constructs sessions bound to a run loop.
pub trait SessionFactory: Send + Sync {
    fn create(
        &self,
        params: &ConnectParams,
        handle: &LoopHandle,
    ) -> Result<Box<dyn StreamingSession>>;
}

impl<F> SessionFactory for F
where
    F: Fn(&ConnectParams, &LoopHandle) -> Result<Box<dyn StreamingSession>> + Send + Sync,
{
    fn create(
        &self,
        params: &ConnectParams,
        handle: &LoopHandle,
    ) -> Result<Box<dyn StreamingSession>> {
        self(params, handle)
    }
}
