// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! In-process session backend for client tests.
//!
//! [`MockBackend`] plays the protocol engine: it records what the client does
//! to each session (options, registrations, start/stop, destruction thread)
//! and lets tests raise events through the registered trampolines from any
//! thread, the way a real engine would from its network threads.

#![allow(dead_code)]

use std::{
    sync::{
        Arc, Condvar, Mutex,
        atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
        mpsc,
    },
    thread::{self, ThreadId},
    time::{Duration, Instant},
};

use ssp::{
    AudioFrameRef, AudioMeta, Capability, ClientOptions, ConnectParams, Error, EventKind,
    LoopHandle, Meta, Result, SessionFactory, SspClient, StreamingSession, Trampoline,
    VideoFrameRef, VideoMeta,
};

/// Ensures logging is initialized only once across all tests.
static LOG_ONCE: std::sync::Once = std::sync::Once::new();

pub fn setup_logging() {
    LOG_ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .with_test_writer()
            .init();
    });
}

pub fn params() -> ConnectParams {
    ConnectParams::with_defaults("127.0.0.1")
}

/// Creates a stopped client backed by a fresh [`MockBackend`].
pub fn mock_client() -> (SspClient, Arc<MockBackend>) {
    mock_client_with(ClientOptions::default())
}

pub fn mock_client_with(options: ClientOptions) -> (SspClient, Arc<MockBackend>) {
    setup_logging();
    let backend = Arc::new(MockBackend::default());
    let client = SspClient::with_options(MockFactory(backend.clone()), params(), options);
    (client, backend)
}

/// Polls `condition` until it holds or `timeout` expires.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Shared, thread-safe event log.
#[derive(Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<String>>>,
    threads: Arc<Mutex<Vec<ThreadId>>>,
}

impl EventLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
        self.threads.lock().unwrap().push(thread::current().id());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn threads(&self) -> Vec<ThreadId> {
        self.threads.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().unwrap().iter().filter(|e| *e == entry).count()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

/// Behaviour knobs and session registry of the mock engine.
#[derive(Default)]
pub struct MockBackend {
    sessions: Mutex<Vec<Arc<SessionProbe>>>,
    init_blocker: Mutex<Option<mpsc::Receiver<()>>>,
    pub fail_init: AtomicBool,
    pub fail_start: AtomicBool,
    /// `start()` blocks until `stop()` is called.
    pub block_start: AtomicBool,
    /// `start()` raises `connected` before returning.
    pub connect_on_start: AtomicBool,
}

impl MockBackend {
    /// Makes the next session construction block until the returned sender
    /// sends or is dropped.
    pub fn block_next_init(&self) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        *self.init_blocker.lock().unwrap() = Some(rx);
        tx
    }

    pub fn created(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn session(&self, index: usize) -> Arc<SessionProbe> {
        self.sessions.lock().unwrap()[index].clone()
    }

    pub fn last_session(&self) -> Arc<SessionProbe> {
        self.sessions
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no session was created")
    }
}

struct MockFactory(Arc<MockBackend>);

impl SessionFactory for MockFactory {
    fn create(
        &self,
        _params: &ConnectParams,
        _handle: &LoopHandle,
    ) -> Result<Box<dyn StreamingSession>> {
        let blocker = self.0.init_blocker.lock().unwrap().take();
        if let Some(blocker) = blocker {
            let _ = blocker.recv();
        }
        let probe = Arc::new(SessionProbe::new(self.0.created()));
        self.0.sessions.lock().unwrap().push(probe.clone());
        Ok(Box::new(MockSession {
            probe,
            fail_init: self.0.fail_init.load(Ordering::SeqCst),
            fail_start: self.0.fail_start.load(Ordering::SeqCst),
            block_start: self.0.block_start.load(Ordering::SeqCst),
            connect_on_start: self.0.connect_on_start.load(Ordering::SeqCst),
        }))
    }
}

/// What the client did to one session, plus handles to raise its events.
pub struct SessionProbe {
    pub index: usize,
    pub created_on: ThreadId,
    trampolines: Mutex<Vec<Trampoline>>,
    dropped_on: Mutex<Option<ThreadId>>,
    pub hlg: AtomicBool,
    pub capability: AtomicU32,
    pub debug_print: AtomicBool,
    pub connected: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    stop_requested: Mutex<bool>,
    stop_signal: Condvar,
}

impl SessionProbe {
    fn new(index: usize) -> Self {
        Self {
            index,
            created_on: thread::current().id(),
            trampolines: Mutex::new(Vec::new()),
            dropped_on: Mutex::new(None),
            hlg: AtomicBool::new(false),
            capability: AtomicU32::new(0),
            debug_print: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            stop_requested: Mutex::new(false),
            stop_signal: Condvar::new(),
        }
    }

    pub fn registered_kinds(&self) -> Vec<EventKind> {
        self.trampolines
            .lock()
            .unwrap()
            .iter()
            .map(Trampoline::kind)
            .collect()
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn dropped_on(&self) -> Option<ThreadId> {
        *self.dropped_on.lock().unwrap()
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped_on().is_some()
    }

    pub fn capability(&self) -> Capability {
        Capability::from_bits(self.capability.load(Ordering::SeqCst))
    }

    fn fire(&self, kind: EventKind, f: impl FnOnce(&Trampoline)) {
        let trampolines = self.trampolines.lock().unwrap();
        if let Some(trampoline) = trampolines.iter().find(|t| t.kind() == kind) {
            f(trampoline);
        }
    }

    pub fn fire_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.fire(EventKind::Connected, |t| {
            if let Trampoline::Connected(cb) = t {
                cb();
            }
        });
    }

    /// Simulates the camera dropping the connection.
    pub fn fire_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.fire(EventKind::Disconnected, |t| {
            if let Trampoline::Disconnected(cb) = t {
                cb();
            }
        });
    }

    pub fn fire_video(&self, frame_no: u32, data: &[u8]) {
        self.fire(EventKind::VideoFrame, |t| {
            if let Trampoline::VideoFrame(cb) = t {
                cb(&VideoFrameRef {
                    data,
                    pts: u64::from(frame_no) * 40,
                    ntp_timestamp: 0,
                    frame_no,
                    frame_type: 0,
                });
            }
        });
    }

    pub fn fire_audio(&self, pts: u64, data: &[u8]) {
        self.fire(EventKind::AudioFrame, |t| {
            if let Trampoline::AudioFrame(cb) = t {
                cb(&AudioFrameRef {
                    data,
                    pts,
                    ntp_timestamp: 0,
                });
            }
        });
    }

    pub fn fire_meta(&self, video: VideoMeta, audio: AudioMeta) {
        self.fire(EventKind::Metadata, |t| {
            if let Trampoline::Metadata(cb) = t {
                cb(&video, &audio, &Meta::default());
            }
        });
    }

    pub fn fire_exception(&self, code: i32, description: &str) {
        self.fire(EventKind::Exception, |t| {
            if let Trampoline::Exception(cb) = t {
                cb(code, description);
            }
        });
    }

    pub fn fire_recv_buffer_full(&self) {
        self.fire(EventKind::RecvBufferFull, |t| {
            if let Trampoline::RecvBufferFull(cb) = t {
                cb();
            }
        });
    }
}

struct MockSession {
    probe: Arc<SessionProbe>,
    fail_init: bool,
    fail_start: bool,
    block_start: bool,
    connect_on_start: bool,
}

impl StreamingSession for MockSession {
    fn init(&self) -> Result<()> {
        if self.fail_init {
            return Err(Error::SessionCreation("mock init failure".to_string()));
        }
        Ok(())
    }

    fn set_hlg(&self, enabled: bool) {
        self.probe.hlg.store(enabled, Ordering::SeqCst);
    }

    fn set_capability(&self, capability: Capability) {
        self.probe
            .capability
            .store(capability.bits(), Ordering::SeqCst);
    }

    fn set_debug_print(&self, enabled: bool) {
        self.probe.debug_print.store(enabled, Ordering::SeqCst);
    }

    fn register(&self, trampoline: Trampoline) {
        self.probe.trampolines.lock().unwrap().push(trampoline);
    }

    fn start(&self) -> Result<()> {
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(Error::InvalidState);
        }
        if self.connect_on_start {
            self.probe.fire_connected();
        }
        if self.block_start {
            let mut stopped = self.probe.stop_requested.lock().unwrap();
            while !*stopped {
                stopped = self.probe.stop_signal.wait(stopped).unwrap();
            }
        }
        Ok(())
    }

    fn stop(&self) {
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
        *self.probe.stop_requested.lock().unwrap() = true;
        self.probe.stop_signal.notify_all();
        if self.probe.connected.swap(false, Ordering::SeqCst) {
            self.probe.fire(EventKind::Disconnected, |t| {
                if let Trampoline::Disconnected(cb) = t {
                    cb();
                }
            });
        }
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        *self.probe.dropped_on.lock().unwrap() = Some(thread::current().id());
    }
}
