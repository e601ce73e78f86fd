// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! The consumer-facing client.
//!
//! [`SspClient`] ties a [`RunLoop`], a [`SessionFactory`] and an [`EventSink`]
//! together and owns the start/stop lifecycle:
//!
//! - `start()` spawns the run loop, waits (bounded) for the session to be
//!   created on the loop thread, applies the configured options, registers one
//!   trampoline per set handler and finally calls the blocking session start
//! - `stop()` stops the session, destroys it on the loop thread and joins the
//!   loop; it is safe to call from any thread, including from inside a handler
//!
//! No internal lock is held across a blocking session call or a handler
//! invocation, and every blocking call runs with the [`ExecutionGate`]
//! released.

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    AudioFrame, Capability, ConnectParams, EventSink, ExceptionCode, ExceptionEvent,
    ExecutionGate, FreeGate, HandlerResult, LoopHandle, Result, RunLoop, SessionFactory,
    SspApiHandle, StreamMeta, StreamingSession, VideoFrame,
    gate::allow_blocking,
    session::native::NativeSessionFactory,
    trampoline::{self, Dispatcher},
};

/// How long `start()` waits for the session to be constructed by default.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Construction options of an [`SspClient`].
#[derive(Clone)]
pub struct ClientOptions {
    /// Lock the consumer runtime needs around handler code.
    pub gate: Arc<dyn ExecutionGate>,
    /// Upper bound on the wait for session construction in `start()`.
    pub init_timeout: Duration,
    /// Name of the run-loop thread.
    pub thread_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            gate: Arc::new(FreeGate),
            init_timeout: DEFAULT_INIT_TIMEOUT,
            thread_name: "ssp-loop".to_string(),
        }
    }
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("init_timeout", &self.init_timeout)
            .field("thread_name", &self.thread_name)
            .finish_non_exhaustive()
    }
}

type InitResult = Result<(Arc<dyn StreamingSession>, LoopHandle)>;

enum InitState {
    Pending,
    Ready(InitResult),
    /// `start()` stopped waiting; a late session must be discarded.
    Abandoned,
    Finished,
}

/// Hand-off slot between the init task and the `start()` call waiting on it.
struct InitSlot {
    state: Mutex<InitState>,
}

impl InitSlot {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(InitState::Pending),
        })
    }

    fn lock(&self) -> MutexGuard<'_, InitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores the init result. Hands it back if nobody is waiting anymore.
    fn fulfil(&self, result: InitResult) -> Option<InitResult> {
        let mut state = self.lock();
        match *state {
            InitState::Abandoned => {
                *state = InitState::Finished;
                Some(result)
            }
            _ => {
                *state = InitState::Ready(result);
                None
            }
        }
    }

    /// Takes the result if there is one, otherwise marks the slot abandoned.
    fn take_or_abandon(&self) -> Option<InitResult> {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, InitState::Finished) {
            InitState::Ready(result) => Some(result),
            InitState::Pending => {
                *state = InitState::Abandoned;
                None
            }
            other => {
                *state = other;
                None
            }
        }
    }

    fn is_finished(&self) -> bool {
        matches!(*self.lock(), InitState::Finished)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Starting,
    Running,
}

#[derive(Default)]
struct Lifecycle {
    phase: Phase,
    session: Option<Arc<dyn StreamingSession>>,
    session_id: Option<Uuid>,
    /// Bumped by every `stop()`, so a `start()` can tell it was overtaken.
    generation: u64,
    /// Init task of a timed-out `start()` that has not finished yet.
    pending_init: Option<Arc<InitSlot>>,
}

/// Options applied to the next session right before its callbacks are wired.
struct SessionOptions {
    hlg: AtomicBool,
    capability: AtomicU32,
    debug_print: AtomicBool,
}

struct ClientCore {
    params: ConnectParams,
    factory: Arc<dyn SessionFactory>,
    gate: Arc<dyn ExecutionGate>,
    init_timeout: Duration,
    options: SessionOptions,
    sink: Mutex<EventSink>,
    lifecycle: Mutex<Lifecycle>,
    run_loop: RunLoop,
}

/// A streaming client for one camera stream.
///
/// Handlers are configured with the `on_*` setters and take effect at the
/// next [`SspClient::start`]. Dropping the client stops it.
pub struct SspClient {
    core: Arc<ClientCore>,
}

/// Non-owning handle to an [`SspClient`], for use inside handlers.
///
/// Capturing the client itself in one of its handlers would keep it alive
/// forever; capture a handle instead.
#[derive(Clone)]
pub struct ClientHandle {
    core: Weak<ClientCore>,
}

impl ClientHandle {
    /// Stops the client if it still exists.
    pub fn stop(&self) {
        if let Some(core) = self.core.upgrade() {
            core.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.core.upgrade().is_some_and(|core| core.is_running())
    }
}

impl SspClient {
    /// Creates a stopped client. Nothing touches the network until
    /// [`SspClient::start`].
    pub fn new(factory: impl SessionFactory + 'static, params: ConnectParams) -> Self {
        Self::with_options(factory, params, ClientOptions::default())
    }

    pub fn with_options(
        factory: impl SessionFactory + 'static,
        params: ConnectParams,
        options: ClientOptions,
    ) -> Self {
        Self {
            core: Arc::new(ClientCore {
                params,
                factory: Arc::new(factory),
                gate: options.gate,
                init_timeout: options.init_timeout,
                options: SessionOptions {
                    hlg: AtomicBool::new(false),
                    capability: AtomicU32::new(Capability::NONE.bits()),
                    debug_print: AtomicBool::new(false),
                },
                sink: Mutex::new(EventSink::default()),
                lifecycle: Mutex::new(Lifecycle::default()),
                run_loop: RunLoop::with_name(options.thread_name),
            }),
        }
    }

    /// Creates a client whose sessions are driven by the native library.
    pub fn native(api: SspApiHandle, params: ConnectParams) -> Self {
        Self::new(NativeSessionFactory::new(api), params)
    }

    pub fn native_with_options(
        api: SspApiHandle,
        params: ConnectParams,
        options: ClientOptions,
    ) -> Self {
        Self::with_options(NativeSessionFactory::new(api), params, options)
    }

    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            core: Arc::downgrade(&self.core),
        }
    }

    pub fn params(&self) -> &ConnectParams {
        &self.core.params
    }

    /// Starts streaming. No-op if already started.
    ///
    /// Blocks until the session is constructed (bounded by the init timeout)
    /// and for as long as the session's own start blocks. Failures are
    /// reported through the exception handler, never returned.
    pub fn start(&self) {
        self.core.start();
    }

    /// Stops streaming and joins the run loop. No-op if not running.
    ///
    /// Safe to call from any thread, including from inside a handler. Once it
    /// returns (from a thread other than the run loop's), no further handler
    /// invocation will happen.
    pub fn stop(&self) {
        self.core.stop();
    }

    /// Whether a session is currently running.
    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    /// Whether the run-loop thread is alive.
    pub fn is_loop_running(&self) -> bool {
        self.core.run_loop.is_running()
    }

    /// Identifier of the running session, used in log records.
    pub fn session_id(&self) -> Option<Uuid> {
        self.core.lock_lifecycle().session_id
    }

    /// Enables HLG (hybrid log-gamma) mode. Applied at the next start.
    pub fn set_hlg(&self, enabled: bool) {
        self.core.options.hlg.store(enabled, Ordering::Release);
    }

    pub fn hlg(&self) -> bool {
        self.core.options.hlg.load(Ordering::Acquire)
    }

    /// Sets the capability flags. Applied at the next start.
    pub fn set_capability(&self, capability: Capability) {
        self.core
            .options
            .capability
            .store(capability.bits(), Ordering::Release);
    }

    pub fn capability(&self) -> Capability {
        Capability::from_bits(self.core.options.capability.load(Ordering::Acquire))
    }

    /// Enables the engine's diagnostic output. Applied at the next start.
    pub fn set_debug_print(&self, enabled: bool) {
        self.core.options.debug_print.store(enabled, Ordering::Release);
    }

    pub fn debug_print(&self) -> bool {
        self.core.options.debug_print.load(Ordering::Acquire)
    }

    pub fn on_video_frame<F>(&self, handler: F)
    where
        F: Fn(&VideoFrame) -> HandlerResult + Send + Sync + 'static,
    {
        self.core.lock_sink().video_frame = Some(Arc::new(handler));
    }

    pub fn on_audio_frame<F>(&self, handler: F)
    where
        F: Fn(&AudioFrame) -> HandlerResult + Send + Sync + 'static,
    {
        self.core.lock_sink().audio_frame = Some(Arc::new(handler));
    }

    pub fn on_meta<F>(&self, handler: F)
    where
        F: Fn(&StreamMeta) -> HandlerResult + Send + Sync + 'static,
    {
        self.core.lock_sink().metadata = Some(Arc::new(handler));
    }

    pub fn on_connected<F>(&self, handler: F)
    where
        F: Fn() -> HandlerResult + Send + Sync + 'static,
    {
        self.core.lock_sink().connected = Some(Arc::new(handler));
    }

    pub fn on_disconnected<F>(&self, handler: F)
    where
        F: Fn() -> HandlerResult + Send + Sync + 'static,
    {
        self.core.lock_sink().disconnected = Some(Arc::new(handler));
    }

    /// Handler for exceptions raised by the session and by the client itself
    /// (failed start, failed handlers, unavailable session).
    pub fn on_exception<F>(&self, handler: F)
    where
        F: Fn(&ExceptionEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.core.lock_sink().exception = Some(Arc::new(handler));
    }

    pub fn on_recv_buffer_full<F>(&self, handler: F)
    where
        F: Fn() -> HandlerResult + Send + Sync + 'static,
    {
        self.core.lock_sink().recv_buffer_full = Some(Arc::new(handler));
    }

    /// Replaces every handler at once.
    pub fn set_sink(&self, sink: EventSink) {
        *self.core.lock_sink() = sink;
    }

    /// A copy of the current handler table.
    pub fn sink(&self) -> EventSink {
        self.core.lock_sink().clone()
    }
}

impl std::fmt::Debug for SspClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SspClient")
            .field("params", &self.core.params)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl ClientCore {
    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_sink(&self) -> MutexGuard<'_, EventSink> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_running(&self) -> bool {
        self.lock_lifecycle().phase == Phase::Running
    }

    /// Delivers a client-originated exception on the calling thread.
    fn report(&self, code: ExceptionCode, description: impl Into<String>) {
        let event = ExceptionEvent::new(code, description);
        warn!(address = %self.params.address, %event, "Reporting client exception");
        let handler = self.lock_sink().exception.clone();
        trampoline::report_exception(self.gate.as_ref(), handler.as_ref(), &event);
    }

    fn init_task(&self, slot: Arc<InitSlot>) -> impl FnOnce(&LoopHandle) + Send + 'static {
        let factory = self.factory.clone();
        let params = self.params.clone();
        move |handle: &LoopHandle| {
            let result = factory.create(&params, handle).and_then(|session| {
                let session: Arc<dyn StreamingSession> = Arc::from(session);
                session.init()?;
                Ok((session, handle.clone()))
            });
            if let Some(late) = slot.fulfil(result) {
                debug!(
                    ok = late.is_ok(),
                    "Session initialisation finished after start() gave up, discarding it"
                );
            }
        }
    }

    fn start(&self) {
        let generation = {
            let mut lifecycle = self.lock_lifecycle();
            if lifecycle.phase != Phase::Idle {
                debug!(phase = ?lifecycle.phase, "Client already started");
                return;
            }
            match lifecycle.pending_init.as_ref().map(|slot| slot.is_finished()) {
                Some(false) => {
                    drop(lifecycle);
                    self.report(
                        ExceptionCode::SessionUnavailable,
                        "initialisation of a previous start() has not finished",
                    );
                    return;
                }
                Some(true) => lifecycle.pending_init = None,
                None => {}
            }
            lifecycle.phase = Phase::Starting;
            lifecycle.generation
        };

        // A loop left behind by an earlier lifetime is idle; join it first.
        allow_blocking(self.gate.as_ref(), || self.run_loop.stop());

        let slot = InitSlot::new();
        if !self.run_loop.start(self.init_task(slot.clone())) {
            self.finish_failed_start(generation);
            self.report(
                ExceptionCode::SessionUnavailable,
                "run loop thread could not be started",
            );
            return;
        }

        let init_done = allow_blocking(self.gate.as_ref(), || {
            self.run_loop.wait_init(self.init_timeout)
        });

        let (session, handle) = match slot.take_or_abandon() {
            Some(Ok(ready)) => ready,
            Some(Err(e)) => {
                error!(address = %self.params.address, "Session initialisation failed: {}", e);
                self.finish_failed_start(generation);
                allow_blocking(self.gate.as_ref(), || self.run_loop.stop());
                self.report(
                    e.exception_code(),
                    format!("session initialisation failed: {e}"),
                );
                return;
            }
            None if init_done => {
                // The init task ended without a result, i.e. it panicked.
                self.finish_failed_start(generation);
                allow_blocking(self.gate.as_ref(), || self.run_loop.stop());
                self.report(
                    ExceptionCode::SessionUnavailable,
                    "session initialisation aborted",
                );
                return;
            }
            None => {
                warn!(
                    address = %self.params.address,
                    timeout = ?self.init_timeout,
                    "Session initialisation timed out"
                );
                {
                    let mut lifecycle = self.lock_lifecycle();
                    if lifecycle.generation == generation {
                        lifecycle.phase = Phase::Idle;
                    }
                    lifecycle.pending_init = Some(slot);
                }
                self.report(
                    ExceptionCode::SessionUnavailable,
                    format!(
                        "session was not initialised within {:?}",
                        self.init_timeout
                    ),
                );
                return;
            }
        };

        session.set_hlg(self.options.hlg.load(Ordering::Acquire));
        session.set_capability(Capability::from_bits(
            self.options.capability.load(Ordering::Acquire),
        ));
        session.set_debug_print(self.options.debug_print.load(Ordering::Acquire));

        let sink = self.lock_sink().clone();
        let dispatcher = Dispatcher::new(handle, self.gate.clone(), sink.exception.clone());
        for trampoline in trampoline::build(&sink, &dispatcher) {
            debug!(kind = %trampoline.kind(), "Registering callback");
            session.register(trampoline);
        }

        let session_id = Uuid::new_v4();
        {
            let mut lifecycle = self.lock_lifecycle();
            if lifecycle.generation != generation {
                drop(lifecycle);
                debug!("start() was overtaken by stop(), discarding the new session");
                self.discard_session(session);
                allow_blocking(self.gate.as_ref(), || self.run_loop.stop());
                return;
            }
            lifecycle.phase = Phase::Running;
            lifecycle.session = Some(session.clone());
            lifecycle.session_id = Some(session_id);
        }

        info!(
            %session_id,
            address = %self.params.address,
            port = self.params.port,
            stream = ?self.params.stream_style,
            "Starting session"
        );
        let started = allow_blocking(self.gate.as_ref(), || session.start());
        self.discard_session(session);

        if let Err(e) = started {
            error!(%session_id, "Session start failed: {}", e);
            self.stop();
            self.report(
                ExceptionCode::StartFailed,
                format!("session start failed: {e}"),
            );
        }
    }

    /// Returns to `Idle` after a start that never produced a running session.
    fn finish_failed_start(&self, generation: u64) {
        let mut lifecycle = self.lock_lifecycle();
        if lifecycle.generation == generation {
            lifecycle.phase = Phase::Idle;
        }
    }

    /// Drops `session` on the loop thread, or right here if that is not
    /// possible anymore.
    fn discard_session(&self, session: Arc<dyn StreamingSession>) {
        if self.run_loop.is_loop_thread() {
            drop(session);
        } else if !self.run_loop.post(move |_| drop(session)) {
            debug!("Run loop is gone, session destroyed on the calling thread");
        }
    }

    fn stop(&self) {
        let (session, session_id, pending) = {
            let mut lifecycle = self.lock_lifecycle();
            match lifecycle.phase {
                Phase::Starting => {
                    // start() notices the new generation once its wait ends.
                    lifecycle.generation += 1;
                    lifecycle.phase = Phase::Idle;
                    debug!("stop() cancelled a start() in progress");
                    return;
                }
                Phase::Running => {
                    lifecycle.generation += 1;
                    lifecycle.phase = Phase::Idle;
                    (
                        lifecycle.session.take(),
                        lifecycle.session_id.take(),
                        None,
                    )
                }
                Phase::Idle => (None, None, lifecycle.pending_init.take()),
            }
        };

        if pending.is_some_and(|slot| !slot.is_finished()) {
            // The init task may never return; joining would hang.
            self.run_loop.detach();
            return;
        }

        if let Some(session) = session {
            info!(session_id = ?session_id, address = %self.params.address, "Stopping session");
            allow_blocking(self.gate.as_ref(), || session.stop());
            self.discard_session(session);
        }

        allow_blocking(self.gate.as_ref(), || self.run_loop.stop());
        if let Some(session_id) = session_id {
            info!(%session_id, "Session stopped");
        }
    }
}

impl Drop for ClientCore {
    fn drop(&mut self) {
        self.stop();
    }
}
