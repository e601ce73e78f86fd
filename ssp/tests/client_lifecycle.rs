// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle tests for the SSP client against an in-process session backend.
//!
//! # Test Coverage
//!
//! - start/stop pairs, restarts and drop-while-running
//! - stopping from inside a handler and while holding the execution gate
//! - handler failures turned into exception events
//! - registration of set handlers only, event ordering and payload copies
//! - bounded session initialisation and late sessions, including a restart
//!   after a detached initialisation
//! - no delivery after stop() returns while the engine keeps firing
//! - session options applied at start

mod common;

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use common::{EventLog, mock_client, mock_client_with, wait_until};
use ssp::{
    Capability, ClientOptions, EventKind, ExceptionCode, ExceptionEvent, ExecutionGate,
    InterpreterLock, VideoMeta,
};

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn start_then_stop_completes() {
    let (client, backend) = mock_client();
    assert!(!client.is_running());

    client.start();
    assert!(client.is_running());
    assert!(client.is_loop_running());
    assert!(client.session_id().is_some());
    let session = backend.last_session();
    assert_eq!(session.starts(), 1);

    client.stop();
    assert!(!client.is_running());
    assert!(!client.is_loop_running());
    assert_eq!(session.stops(), 1);
    assert_eq!(session.dropped_on(), Some(session.created_on));
    assert_ne!(session.created_on, thread::current().id());

    // Idempotent.
    client.stop();
    assert_eq!(session.stops(), 1);
}

#[test]
fn start_is_a_no_op_while_running() {
    let (client, backend) = mock_client();
    client.start();
    client.start();
    assert_eq!(backend.created(), 1);
    assert_eq!(backend.last_session().starts(), 1);
}

#[test]
fn restart_builds_a_fresh_session() {
    let (client, backend) = mock_client();
    let log = EventLog::default();
    let handler_log = log.clone();
    client.on_video_frame(move |frame| {
        handler_log.push(format!("video {}", frame.frame_no));
        Ok(())
    });

    client.start();
    let first = backend.last_session();
    first.fire_video(1, b"first");
    client.stop();
    let first_id = client.session_id();
    assert!(first_id.is_none());

    client.start();
    assert_eq!(backend.created(), 2);
    let second = backend.last_session();
    assert_eq!(second.registered_kinds(), vec![EventKind::VideoFrame]);
    second.fire_video(2, b"second");
    // The stopped session's trampolines lead nowhere.
    first.fire_video(99, b"stale");
    client.stop();

    assert!(first.is_dropped());
    assert!(second.is_dropped());
    assert_eq!(log.entries(), vec!["video 1", "video 2"]);
}

#[test]
fn stop_from_disconnected_handler() {
    let (client, backend) = mock_client();
    let handle = client.handle();
    let log = EventLog::default();
    let handler_log = log.clone();
    client.on_disconnected(move || {
        handler_log.push("disconnected");
        handle.stop();
        handler_log.push("stopped");
        Ok(())
    });

    client.start();
    let session = backend.last_session();
    session.fire_connected();

    // The engine reports the drop from one of its own threads.
    let probe = session.clone();
    thread::spawn(move || probe.fire_disconnected())
        .join()
        .unwrap();

    assert!(wait_until(TIMEOUT, || !client.is_running()));
    assert!(wait_until(TIMEOUT, || session.is_dropped()));
    assert_eq!(log.entries(), vec!["disconnected", "stopped"]);
    assert_eq!(session.stops(), 1);
    assert_eq!(session.dropped_on(), Some(session.created_on));

    // Joins the loop thread that stopped itself.
    client.stop();
    assert!(!client.is_loop_running());
}

#[test]
fn stop_while_holding_the_gate() {
    let lock = Arc::new(InterpreterLock::new());
    let options = ClientOptions {
        gate: lock.clone(),
        ..ClientOptions::default()
    };
    let (client, backend) = mock_client_with(options);
    backend.connect_on_start.store(true, Ordering::SeqCst);

    let log = EventLog::default();
    let connected_log = log.clone();
    let gate = lock.clone();
    client.on_connected(move || {
        assert!(gate.is_held_by_current_thread());
        connected_log.push("connected");
        Ok(())
    });
    let disconnected_log = log.clone();
    client.on_disconnected(move || {
        disconnected_log.push("disconnected");
        Ok(())
    });

    let _guard = lock.lock();
    client.start();
    client.stop();

    // stop() only returns after the final event was delivered.
    assert_eq!(log.entries(), vec!["connected", "disconnected"]);
    assert!(lock.is_held_by_current_thread());
    assert!(backend.last_session().is_dropped());
}

#[test]
fn handlers_run_serially_on_the_loop_thread() {
    let (client, backend) = mock_client();
    let log = EventLog::default();
    let active = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));

    let (video_log, video_active, video_overlaps) = (log.clone(), active.clone(), overlaps.clone());
    client.on_video_frame(move |frame| {
        if video_active.fetch_add(1, Ordering::SeqCst) != 0 {
            video_overlaps.fetch_add(1, Ordering::SeqCst);
        }
        video_log.push(format!("video {}", frame.frame_no));
        video_active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    });
    let (audio_log, audio_active, audio_overlaps) = (log.clone(), active.clone(), overlaps.clone());
    client.on_audio_frame(move |frame| {
        if audio_active.fetch_add(1, Ordering::SeqCst) != 0 {
            audio_overlaps.fetch_add(1, Ordering::SeqCst);
        }
        audio_log.push(format!("audio {}", frame.pts));
        audio_active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    });

    client.start();
    let session = backend.last_session();
    let video_probe = session.clone();
    let audio_probe = session.clone();
    let video = thread::spawn(move || {
        for n in 0..200u32 {
            video_probe.fire_video(n, &[n as u8; 16]);
        }
    });
    let audio = thread::spawn(move || {
        for n in 0..200u64 {
            audio_probe.fire_audio(n, &[0; 8]);
        }
    });
    video.join().unwrap();
    audio.join().unwrap();
    client.stop();

    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(log.len(), 400);
    assert!(log.threads().iter().all(|id| *id == session.created_on));

    // Per-source order is preserved.
    let video_order: Vec<String> = log
        .entries()
        .into_iter()
        .filter(|e| e.starts_with("video"))
        .collect();
    let expected: Vec<String> = (0..200).map(|n| format!("video {n}")).collect();
    assert_eq!(video_order, expected);
}

#[test]
fn frame_payloads_are_owned_copies() {
    let (client, backend) = mock_client();
    let frames = Arc::new(Mutex::new(Vec::new()));
    let sink_frames = frames.clone();
    client.on_video_frame(move |frame| {
        sink_frames.lock().unwrap().push(frame.clone());
        Ok(())
    });

    client.start();
    let session = backend.last_session();
    let mut buffer = vec![0u8; 4];
    for n in 0..3u32 {
        buffer.fill(n as u8 + 1);
        session.fire_video(n, &buffer);
    }
    client.stop();

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 3);
    for (n, frame) in frames.iter().enumerate() {
        assert_eq!(frame.frame_no, n as u32);
        assert_eq!(frame.data, vec![n as u8 + 1; 4]);
    }
}

#[test]
fn handler_failures_become_exception_events() {
    let (client, backend) = mock_client();
    let exceptions = Arc::new(Mutex::new(Vec::<ExceptionEvent>::new()));
    let seen = Arc::new(AtomicUsize::new(0));

    client.on_connected(|| Err("refusing connection".into()));
    let video_seen = seen.clone();
    client.on_video_frame(move |_| {
        if video_seen.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("first frame is cursed");
        }
        Ok(())
    });
    let sink_exceptions = exceptions.clone();
    client.on_exception(move |event| {
        sink_exceptions.lock().unwrap().push(event.clone());
        Ok(())
    });

    client.start();
    let session = backend.last_session();
    session.fire_connected();
    session.fire_video(0, b"a");
    session.fire_video(1, b"b");
    client.stop();

    // The loop survived the panic and delivered the next frame.
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    let exceptions = exceptions.lock().unwrap();
    assert_eq!(exceptions.len(), 2);
    assert!(
        exceptions
            .iter()
            .all(|e| e.kind() == ExceptionCode::HandlerFailed)
    );
    assert!(exceptions[0].description.contains("refusing connection"));
    assert!(exceptions[1].description.contains("first frame is cursed"));
}

#[test]
fn only_set_handlers_are_registered() {
    let (client, backend) = mock_client();
    client.on_video_frame(|_| Ok(()));
    client.on_exception(|_| Ok(()));

    client.start();
    let session = backend.last_session();
    assert_eq!(
        session.registered_kinds(),
        vec![EventKind::VideoFrame, EventKind::Exception]
    );

    // Takes effect at the next start only.
    client.on_meta(|_| Ok(()));
    assert_eq!(session.registered_kinds().len(), 2);
    client.stop();

    client.start();
    assert_eq!(
        backend.last_session().registered_kinds(),
        vec![
            EventKind::VideoFrame,
            EventKind::Metadata,
            EventKind::Exception
        ]
    );
    client.stop();
}

#[test]
fn unset_handlers_drop_their_events() {
    let (client, backend) = mock_client();
    let log = EventLog::default();
    let handler_log = log.clone();
    client.on_meta(move |meta| {
        handler_log.push(format!("{}x{}", meta.video.width, meta.video.height));
        Ok(())
    });

    client.start();
    let session = backend.last_session();
    session.fire_recv_buffer_full();
    session.fire_video(0, b"dropped");
    session.fire_meta(
        VideoMeta {
            width: 1920,
            height: 1080,
            ..VideoMeta::default()
        },
        Default::default(),
    );
    client.stop();

    assert_eq!(log.entries(), vec!["1920x1080"]);
}

#[test]
fn engine_exceptions_reach_the_exception_handler() {
    let (client, backend) = mock_client();
    let exceptions = Arc::new(Mutex::new(Vec::<ExceptionEvent>::new()));
    let sink_exceptions = exceptions.clone();
    client.on_exception(move |event| {
        sink_exceptions.lock().unwrap().push(event.clone());
        Ok(())
    });

    client.start();
    backend
        .last_session()
        .fire_exception(-1002, "connection refused");
    client.stop();

    let exceptions = exceptions.lock().unwrap();
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].kind(), ExceptionCode::ConnectionFailed);
    assert_eq!(exceptions[0].description, "connection refused");
}

#[test]
fn init_timeout_reports_session_unavailable() {
    let options = ClientOptions {
        init_timeout: Duration::from_millis(100),
        ..ClientOptions::default()
    };
    let (client, backend) = mock_client_with(options);
    let log = EventLog::default();
    let handler_log = log.clone();
    client.on_exception(move |event| {
        handler_log.push(format!("{:?}", event.kind()));
        Ok(())
    });
    let release = backend.block_next_init();

    let started = Instant::now();
    client.start();
    assert!(started.elapsed() < TIMEOUT);
    assert!(!client.is_running());
    assert_eq!(log.entries(), vec!["SessionUnavailable"]);
    // Delivered on the caller's thread, the run loop is stuck.
    assert_eq!(log.threads(), vec![thread::current().id()]);

    // Still pending: no second session is attempted.
    client.start();
    assert_eq!(log.count("SessionUnavailable"), 2);
    assert_eq!(backend.created(), 0);

    // The late session is discarded on the loop thread.
    release.send(()).unwrap();
    assert!(wait_until(TIMEOUT, || backend.created() == 1
        && backend.session(0).is_dropped()));
    let late = backend.session(0);
    assert_eq!(late.dropped_on(), Some(late.created_on));
    assert_eq!(late.starts(), 0);

    // A fresh start now succeeds.
    client.start();
    assert!(client.is_running());
    assert_eq!(backend.created(), 2);
    client.stop();
    assert_eq!(log.len(), 2);
}

#[test]
fn stop_after_init_timeout_does_not_hang() {
    let options = ClientOptions {
        init_timeout: Duration::from_millis(50),
        ..ClientOptions::default()
    };
    let (client, backend) = mock_client_with(options);
    let release = backend.block_next_init();

    client.start();
    assert!(!client.is_running());
    client.stop();
    drop(client);

    // The detached loop thread finishes on its own once init returns.
    drop(release);
    assert!(wait_until(TIMEOUT, || backend.created() == 1
        && backend.session(0).is_dropped()));
}

#[test]
fn restart_after_detached_init_gets_a_working_session() {
    let options = ClientOptions {
        init_timeout: Duration::from_millis(500),
        ..ClientOptions::default()
    };
    let (client, backend) = mock_client_with(options);
    let log = EventLog::default();
    let handler_log = log.clone();
    client.on_exception(move |event| {
        handler_log.push(format!("{:?}: {}", event.kind(), event.description));
        Ok(())
    });

    let wedged = backend.block_next_init();
    client.start();
    assert!(!client.is_running());
    // Detaches the wedged loop thread.
    client.stop();

    // The wedged init finishes while the next one is still in progress.
    let next = backend.block_next_init();
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        wedged.send(()).unwrap();
        thread::sleep(Duration::from_millis(200));
        next.send(()).unwrap();
    });
    client.start();
    releaser.join().unwrap();

    assert!(client.is_running());
    assert_eq!(log.len(), 1, "unexpected exceptions: {:?}", log.entries());
    assert_eq!(backend.created(), 2);
    let running: Vec<_> = (0..2)
        .map(|i| backend.session(i))
        .filter(|s| s.starts() == 1)
        .collect();
    assert_eq!(running.len(), 1);
    assert!(!running[0].is_dropped());

    client.stop();
    assert!(running[0].is_dropped());
    assert!(wait_until(TIMEOUT, || (0..2).all(|i| backend.session(i).is_dropped())));
}

#[test]
fn no_event_is_delivered_after_stop_returns() {
    let (client, backend) = mock_client();
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    client.on_video_frame(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_micros(200));
        Ok(())
    });

    client.start();
    let session = backend.last_session();

    // The engine keeps pushing frames from its own thread throughout stop().
    let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let engine = {
        let session = session.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut frame_no = 0u32;
            while !done.load(Ordering::SeqCst) {
                session.fire_video(frame_no, b"frame");
                frame_no = frame_no.wrapping_add(1);
                thread::sleep(Duration::from_micros(50));
            }
            frame_no
        })
    };

    assert!(wait_until(TIMEOUT, || delivered.load(Ordering::SeqCst) >= 20));
    client.stop();
    let at_stop = delivered.load(Ordering::SeqCst);

    thread::sleep(Duration::from_millis(100));
    done.store(true, Ordering::SeqCst);
    let fired = engine.join().unwrap();

    assert_eq!(delivered.load(Ordering::SeqCst), at_stop);
    assert!(fired as usize > at_stop);
    assert!(session.is_dropped());
}

#[test]
fn init_failure_is_reported() {
    let (client, backend) = mock_client();
    backend.fail_init.store(true, Ordering::SeqCst);
    let log = EventLog::default();
    let handler_log = log.clone();
    client.on_exception(move |event| {
        handler_log.push(format!("{:?}", event.kind()));
        Ok(())
    });

    client.start();
    assert!(!client.is_running());
    assert!(!client.is_loop_running());
    assert_eq!(log.entries(), vec!["SessionUnavailable"]);
    assert!(backend.last_session().is_dropped());

    backend.fail_init.store(false, Ordering::SeqCst);
    client.start();
    assert!(client.is_running());
}

#[test]
fn start_failure_is_reported_and_cleaned_up() {
    let (client, backend) = mock_client();
    backend.fail_start.store(true, Ordering::SeqCst);
    let log = EventLog::default();
    let handler_log = log.clone();
    client.on_exception(move |event| {
        handler_log.push(format!("{:?}", event.kind()));
        Ok(())
    });

    client.start();
    assert!(!client.is_running());
    assert!(!client.is_loop_running());
    assert_eq!(log.entries(), vec!["StartFailed"]);
    let session = backend.last_session();
    assert_eq!(session.stops(), 1);
    assert!(session.is_dropped());
}

#[test]
fn stop_during_blocking_start() {
    let (client, backend) = mock_client();
    backend.block_start.store(true, Ordering::SeqCst);
    let client = Arc::new(client);

    let starter = {
        let client = client.clone();
        thread::spawn(move || client.start())
    };
    assert!(wait_until(TIMEOUT, || backend.created() == 1
        && backend.session(0).starts() == 1));

    client.stop();
    starter.join().unwrap();
    assert!(!client.is_running());
    assert!(wait_until(TIMEOUT, || backend.session(0).is_dropped()));
}

#[test]
fn options_are_applied_at_start() {
    let (client, backend) = mock_client();
    client.set_hlg(true);
    client.set_capability(Capability::IGNORE_HEARTBEAT_DISABLE_ENC);
    client.set_debug_print(true);

    client.start();
    let session = backend.last_session();
    assert!(session.hlg.load(Ordering::SeqCst));
    assert_eq!(session.capability(), Capability::IGNORE_HEARTBEAT_DISABLE_ENC);
    assert!(session.debug_print.load(Ordering::SeqCst));

    // Latest write wins, at the next start.
    client.set_hlg(false);
    assert!(session.hlg.load(Ordering::SeqCst));
    client.stop();
    client.start();
    assert!(!backend.last_session().hlg.load(Ordering::SeqCst));
    client.stop();
}

#[test]
fn dropping_a_running_client_stops_it() {
    let (client, backend) = mock_client();
    backend.connect_on_start.store(true, Ordering::SeqCst);
    let log = EventLog::default();
    let handler_log = log.clone();
    client.on_disconnected(move || {
        handler_log.push("disconnected");
        Ok(())
    });

    client.start();
    let session = backend.last_session();
    drop(client);

    assert_eq!(session.stops(), 1);
    assert!(session.is_dropped());
    assert_eq!(log.entries(), vec!["disconnected"]);
}

#[test]
fn handle_outliving_the_client_is_inert() {
    let (client, _backend) = mock_client();
    let handle = client.handle();
    client.start();
    assert!(handle.is_running());
    drop(client);
    assert!(!handle.is_running());
    handle.stop();
}
