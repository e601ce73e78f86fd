// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! # SSP - Simple Stream Protocol client
//!
//! Lifecycle-safe client core for receiving encoded video and audio from
//! cameras speaking SSP. The protocol engine itself is an external component
//! (the native `libssp` client, wrapped by [`ssp_sys`]); this crate owns what
//! sits between that engine and the consumer's code: threads, callbacks and
//! teardown.
//!
//! ## Overview
//!
//! - **Run loop**: a dedicated thread ([`RunLoop`]) on which the session is
//!   created, destroyed, and on which every consumer handler runs
//! - **Session**: a protocol-level connection behind [`StreamingSession`],
//!   created by a [`SessionFactory`]
//! - **Trampoline**: a callback registered on the session that copies the event
//!   payload and re-posts it onto the run loop
//! - **Sink**: the consumer's handlers, one optional slot per [`EventKind`]
//! - **Gate**: the consumer runtime's exclusive lock ([`ExecutionGate`]),
//!   held around handlers and released around every blocking call
//!
//! ## Architecture
//!
//! ```text
//!  engine threads            run-loop thread              consumer
//! ┌──────────────┐  post   ┌─────────────────┐  gate   ┌──────────┐
//! │  Trampoline  │ ──────► │  FIFO task loop │ ──────► │ handlers │
//! └──────────────┘         └─────────────────┘         └──────────┘
//!        ▲                        │ create/destroy
//!        └──── StreamingSession ◄─┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use ssp::{ConnectParams, SspClient, config::get_libssp_path, load_api};
//!
//! # fn main() -> Result<(), ssp::Error> {
//! let api = load_api(get_libssp_path())?;
//! let client = SspClient::native(api, ConnectParams::with_defaults("192.168.1.20"));
//! let handle = client.handle();
//!
//! client.on_video_frame(|frame| {
//!     println!("frame {} ({} bytes)", frame.frame_no, frame.len());
//!     Ok(())
//! });
//! client.on_disconnected(move || {
//!     handle.stop();
//!     Ok(())
//! });
//!
//! client.start();
//! std::thread::sleep(std::time::Duration::from_secs(10));
//! client.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! - [`SspClient`] is `Send + Sync`; `start()` and `stop()` may be called from
//!   any thread, `stop()` also from inside a handler
//! - Handlers never run concurrently with each other and always run on the
//!   run-loop thread, in the order the session raised the events
//! - Failures while running are never returned; they reach the exception
//!   handler (see [`ExceptionCode`])

mod api;
mod client;
mod error;
mod event;
mod gate;
mod run_loop;
mod sink;
mod trampoline;
mod types;

pub mod config;
pub mod session;

pub use api::{SspApi, SspApiHandle, load_api};
pub use client::{ClientHandle, ClientOptions, DEFAULT_INIT_TIMEOUT, SspClient};
pub use error::{Error, Result};
pub use event::*;
pub use gate::{ExecutionGate, FreeGate, InterpreterLock, InterpreterLockGuard};
pub use run_loop::{LoopHandle, RunLoop};
pub use session::{
    SessionFactory, StreamingSession, Trampoline,
    native::{NativeSession, NativeSessionFactory},
};
pub use sink::*;
pub use types::*;
