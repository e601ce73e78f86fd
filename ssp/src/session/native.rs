// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Session backed by the native SSP client library.
//!
//! The native client calls back through plain `extern "C"` functions with a
//! `user_data` pointer. Each [`NativeSession`] owns a boxed [`CallbackTable`]
//! whose address is that pointer; the box is only freed after the native
//! client has been destroyed, so the pointer never dangles while callbacks
//! can fire.

use std::{
    ffi::{CStr, CString, c_char, c_int, c_void},
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{PoisonError, RwLock},
};

use tracing::{debug, error, warn};

use crate::{
    AudioFrameRef, AudioMeta, Capability, ConnectParams, Error, LoopHandle, Meta, Result,
    SspApiHandle, VideoFrameRef, VideoMeta,
    run_loop::panic_message,
    session::{
        AudioFrameCallback, ExceptionCallback, MetaCallback, NotifyCallback, SessionFactory,
        StreamingSession, Trampoline, VideoFrameCallback,
    },
};

/// Creates [`NativeSession`]s from a loaded library.
#[derive(Clone)]
pub struct NativeSessionFactory {
    api: SspApiHandle,
}

impl NativeSessionFactory {
    pub fn new(api: SspApiHandle) -> Self {
        Self { api }
    }
}

impl SessionFactory for NativeSessionFactory {
    fn create(
        &self,
        params: &ConnectParams,
        _handle: &LoopHandle,
    ) -> Result<Box<dyn StreamingSession>> {
        Ok(Box::new(NativeSession::new(self.api.clone(), params)?))
    }
}

#[derive(Default)]
struct CallbackTable {
    video_frame: RwLock<Option<VideoFrameCallback>>,
    audio_frame: RwLock<Option<AudioFrameCallback>>,
    metadata: RwLock<Option<MetaCallback>>,
    connected: RwLock<Option<NotifyCallback>>,
    disconnected: RwLock<Option<NotifyCallback>>,
    exception: RwLock<Option<ExceptionCallback>>,
    recv_buffer_full: RwLock<Option<NotifyCallback>>,
}

/// A session driving one native client object.
pub struct NativeSession {
    api: SspApiHandle,
    client: ssp_sys::Client,
    callbacks: Box<CallbackTable>,
}

// Safety: the native client serialises access internally; `register` and
// `stop` are documented as callable from any thread, and the callback table
// is only touched through locks.
unsafe impl Send for NativeSession {}
unsafe impl Sync for NativeSession {}

impl NativeSession {
    /// Creates the native client object. Network activity only begins with
    /// [`StreamingSession::start`].
    pub fn new(api: SspApiHandle, params: &ConnectParams) -> Result<Self> {
        let address = CString::new(params.address.as_str())?;
        let client = unsafe {
            api.create(
                address.as_ptr(),
                params.buffer_size,
                params.port,
                params.stream_style.as_raw(),
            )
        };
        if client.is_null() {
            return Err(Error::SessionCreation(format!(
                "native client for {}:{} could not be created",
                params.address, params.port
            )));
        }
        debug!(address = %params.address, port = params.port, "Native client created");
        Ok(Self {
            api,
            client,
            callbacks: Box::default(),
        })
    }

    fn user_data(&self) -> *mut c_void {
        self.callbacks.as_ref() as *const CallbackTable as *mut c_void
    }
}

impl StreamingSession for NativeSession {
    fn init(&self) -> Result<()> {
        Error::from_status(unsafe { self.api.init(self.client) })
    }

    fn set_hlg(&self, enabled: bool) {
        unsafe { self.api.set_hlg(self.client, enabled) }
    }

    fn set_capability(&self, capability: Capability) {
        unsafe { self.api.set_capability(self.client, capability.bits()) }
    }

    fn set_debug_print(&self, enabled: bool) {
        unsafe { self.api.set_debug_print(self.client, enabled) }
    }

    fn register(&self, trampoline: Trampoline) {
        let table = &self.callbacks;
        let user_data = self.user_data();
        unsafe {
            match trampoline {
                Trampoline::VideoFrame(cb) => {
                    store(&table.video_frame, cb);
                    self.api
                        .set_on_h264_data(self.client, Some(on_h264_data), user_data);
                }
                Trampoline::AudioFrame(cb) => {
                    store(&table.audio_frame, cb);
                    self.api
                        .set_on_audio_data(self.client, Some(on_audio_data), user_data);
                }
                Trampoline::Metadata(cb) => {
                    store(&table.metadata, cb);
                    self.api.set_on_meta(self.client, Some(on_meta), user_data);
                }
                Trampoline::Connected(cb) => {
                    store(&table.connected, cb);
                    self.api
                        .set_on_connected(self.client, Some(on_connected), user_data);
                }
                Trampoline::Disconnected(cb) => {
                    store(&table.disconnected, cb);
                    self.api
                        .set_on_disconnected(self.client, Some(on_disconnected), user_data);
                }
                Trampoline::Exception(cb) => {
                    store(&table.exception, cb);
                    self.api
                        .set_on_exception(self.client, Some(on_exception), user_data);
                }
                Trampoline::RecvBufferFull(cb) => {
                    store(&table.recv_buffer_full, cb);
                    self.api.set_on_recv_buffer_full(
                        self.client,
                        Some(on_recv_buffer_full),
                        user_data,
                    );
                }
            }
        }
    }

    fn start(&self) -> Result<()> {
        Error::from_status(unsafe { self.api.start(self.client) })
    }

    fn stop(&self) {
        if let Err(e) = Error::from_status(unsafe { self.api.stop(self.client) }) {
            warn!("Native client stop reported an error: {}", e);
        }
    }
}

impl Drop for NativeSession {
    /// Destroys the native client before the callback table is freed.
    fn drop(&mut self) {
        if !self.client.is_null() {
            unsafe { self.api.destroy(self.client) };
            self.client = std::ptr::null_mut();
        }
    }
}

fn store<T>(slot: &RwLock<Option<T>>, value: T) {
    *slot.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
}

/// Runs `f` for the callback stored in `slot`, never unwinding into C.
fn with_callback<T>(slot: &RwLock<Option<T>>, name: &str, f: impl FnOnce(&T)) {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        if let Some(cb) = slot.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            f(cb);
        }
    }));
    if let Err(panic) = outcome {
        error!(callback = name, "Panic in native callback: {}", panic_message(&panic));
    }
}

/// Rebuilds the callback table reference from `user_data`.
///
/// # Safety
///
/// `user_data` must be null or the pointer registered by [`NativeSession`].
unsafe fn table<'a>(user_data: *mut c_void) -> Option<&'a CallbackTable> {
    unsafe { (user_data as *const CallbackTable).as_ref() }
}

/// # Safety
///
/// `data` must be null or point to `len` readable bytes for the lifetime `'a`.
unsafe fn bytes<'a>(data: *const u8, len: usize) -> &'a [u8] {
    if data.is_null() || len == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(data, len) }
    }
}

unsafe extern "C" fn on_h264_data(user_data: *mut c_void, data: *const ssp_sys::H264Data) {
    let (Some(table), Some(data)) = (unsafe { table(user_data) }, unsafe { data.as_ref() }) else {
        return;
    };
    let frame = VideoFrameRef {
        data: unsafe { bytes(data.data, data.len) },
        pts: data.pts,
        ntp_timestamp: data.ntp_timestamp,
        frame_no: data.frm_no,
        frame_type: data.type_,
    };
    with_callback(&table.video_frame, "h264_data", |cb| cb(&frame));
}

unsafe extern "C" fn on_audio_data(user_data: *mut c_void, data: *const ssp_sys::AudioData) {
    let (Some(table), Some(data)) = (unsafe { table(user_data) }, unsafe { data.as_ref() }) else {
        return;
    };
    let frame = AudioFrameRef {
        data: unsafe { bytes(data.data, data.len) },
        pts: data.pts,
        ntp_timestamp: data.ntp_timestamp,
    };
    with_callback(&table.audio_frame, "audio_data", |cb| cb(&frame));
}

unsafe extern "C" fn on_meta(
    user_data: *mut c_void,
    video: *const ssp_sys::VideoMeta,
    audio: *const ssp_sys::AudioMeta,
    meta: *const ssp_sys::Meta,
) {
    let Some(table) = (unsafe { table(user_data) }) else {
        return;
    };
    let video = unsafe { video.as_ref() }.map(VideoMeta::from).unwrap_or_default();
    let audio = unsafe { audio.as_ref() }.map(AudioMeta::from).unwrap_or_default();
    let meta = Meta {
        pts_is_wall_clock: unsafe { meta.as_ref() }.is_some_and(|m| m.pts_is_wall_clock),
    };
    with_callback(&table.metadata, "meta", |cb| cb(&video, &audio, &meta));
}

unsafe extern "C" fn on_connected(user_data: *mut c_void) {
    if let Some(table) = unsafe { table(user_data) } {
        with_callback(&table.connected, "connected", |cb| cb());
    }
}

unsafe extern "C" fn on_disconnected(user_data: *mut c_void) {
    if let Some(table) = unsafe { table(user_data) } {
        with_callback(&table.disconnected, "disconnected", |cb| cb());
    }
}

unsafe extern "C" fn on_exception(user_data: *mut c_void, code: c_int, description: *const c_char) {
    let Some(table) = (unsafe { table(user_data) }) else {
        return;
    };
    let description = if description.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(description) }
            .to_string_lossy()
            .into_owned()
    };
    with_callback(&table.exception, "exception", |cb| cb(code, &description));
}

unsafe extern "C" fn on_recv_buffer_full(user_data: *mut c_void) {
    if let Some(table) = unsafe { table(user_data) } {
        with_callback(&table.recv_buffer_full, "recv_buffer_full", |cb| cb());
    }
}
