// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Bridges session callbacks onto the run loop.
//!
//! A trampoline runs on whatever thread the session calls back on. It copies
//! the borrowed payload into an owned value, posts a delivery task to the run
//! loop and returns. The delivery task invokes the consumer handler with the
//! execution gate held. A handler that returns `Err` or panics is turned into
//! exactly one `HandlerFailed` exception event; a failing exception handler is
//! only logged.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use tracing::{error, trace};

use crate::{
    AudioFrameRef, AudioMeta, EventKind, EventSink, ExceptionCode, ExceptionEvent, ExecutionGate,
    HandlerResult, LoopHandle, Meta, StreamMeta, VideoFrameRef, VideoMeta,
    gate::with_gate,
    run_loop::panic_message,
    session::Trampoline,
    sink::ExceptionHandler,
};

/// Shared state of every trampoline built for one session.
pub(crate) struct Dispatcher {
    handle: LoopHandle,
    gate: Arc<dyn ExecutionGate>,
    exception: Option<ExceptionHandler>,
}

impl Dispatcher {
    pub(crate) fn new(
        handle: LoopHandle,
        gate: Arc<dyn ExecutionGate>,
        exception: Option<ExceptionHandler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            handle,
            gate,
            exception,
        })
    }

    /// Queues a handler invocation on the run loop.
    fn deliver<F>(self: &Arc<Self>, kind: EventKind, invoke: F)
    where
        F: FnOnce() -> HandlerResult + Send + 'static,
    {
        let dispatcher = self.clone();
        let posted = self
            .handle
            .post(move |_| dispatcher.invoke(kind, invoke));
        if !posted {
            trace!(%kind, "Run loop has exited, event dropped");
        }
    }

    fn invoke<F>(&self, kind: EventKind, invoke: F)
    where
        F: FnOnce() -> HandlerResult,
    {
        let Some(failure) = run_handler(self.gate.as_ref(), invoke) else {
            return;
        };
        error!(%kind, "Event handler failed: {}", failure);
        if kind == EventKind::Exception {
            return;
        }
        let event = ExceptionEvent::new(
            ExceptionCode::HandlerFailed,
            format!("{kind} handler failed: {failure}"),
        );
        report_exception(self.gate.as_ref(), self.exception.as_ref(), &event);
    }
}

/// Invokes a handler under the gate. Returns the failure description if it
/// returned `Err` or panicked.
fn run_handler<F>(gate: &dyn ExecutionGate, invoke: F) -> Option<String>
where
    F: FnOnce() -> HandlerResult,
{
    match with_gate(gate, || catch_unwind(AssertUnwindSafe(invoke))) {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(panic) => Some(format!("panicked: {}", panic_message(&panic))),
    }
}

/// Delivers `event` to the exception handler on the current thread.
pub(crate) fn report_exception(
    gate: &dyn ExecutionGate,
    handler: Option<&ExceptionHandler>,
    event: &ExceptionEvent,
) {
    let Some(handler) = handler else {
        trace!(%event, "No exception handler set, exception dropped");
        return;
    };
    if let Some(failure) = run_handler(gate, || handler(event)) {
        error!(%event, "Exception handler failed: {}", failure);
    }
}

/// Builds one trampoline per handler set in `sink`.
pub(crate) fn build(sink: &EventSink, dispatcher: &Arc<Dispatcher>) -> Vec<Trampoline> {
    let mut trampolines = Vec::new();

    if let Some(handler) = sink.video_frame.clone() {
        let dispatcher = dispatcher.clone();
        trampolines.push(Trampoline::VideoFrame(Box::new(move |frame: &VideoFrameRef<'_>| {
            let frame = frame.to_owned();
            let handler = handler.clone();
            dispatcher.deliver(EventKind::VideoFrame, move || handler(&frame));
        })));
    }

    if let Some(handler) = sink.audio_frame.clone() {
        let dispatcher = dispatcher.clone();
        trampolines.push(Trampoline::AudioFrame(Box::new(move |frame: &AudioFrameRef<'_>| {
            let frame = frame.to_owned();
            let handler = handler.clone();
            dispatcher.deliver(EventKind::AudioFrame, move || handler(&frame));
        })));
    }

    if let Some(handler) = sink.metadata.clone() {
        let dispatcher = dispatcher.clone();
        trampolines.push(Trampoline::Metadata(Box::new(
            move |video: &VideoMeta, audio: &AudioMeta, meta: &Meta| {
                let bundle = StreamMeta {
                    video: *video,
                    audio: *audio,
                    meta: *meta,
                };
                let handler = handler.clone();
                dispatcher.deliver(EventKind::Metadata, move || handler(&bundle));
            },
        )));
    }

    for (kind, handler) in [
        (EventKind::Connected, sink.connected.clone()),
        (EventKind::Disconnected, sink.disconnected.clone()),
        (EventKind::RecvBufferFull, sink.recv_buffer_full.clone()),
    ] {
        let Some(handler) = handler else {
            continue;
        };
        let dispatcher = dispatcher.clone();
        let notify: crate::session::NotifyCallback = Box::new(move || {
            let handler = handler.clone();
            dispatcher.deliver(kind, move || handler());
        });
        trampolines.push(match kind {
            EventKind::Connected => Trampoline::Connected(notify),
            EventKind::Disconnected => Trampoline::Disconnected(notify),
            _ => Trampoline::RecvBufferFull(notify),
        });
    }

    if let Some(handler) = sink.exception.clone() {
        let dispatcher = dispatcher.clone();
        trampolines.push(Trampoline::Exception(Box::new(
            move |code: i32, description: &str| {
                let event = ExceptionEvent {
                    code,
                    description: description.to_owned(),
                };
                let handler = handler.clone();
                dispatcher.deliver(EventKind::Exception, move || handler(&event));
            },
        )));
    }

    trampolines
}
