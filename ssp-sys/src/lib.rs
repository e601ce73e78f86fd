// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! # ssp-sys: Raw FFI description of the native SSP client library
//!
//! This crate describes the flat C ABI exported by the native SSP client shim
//! (`libssp_c`), a thin `extern "C"` layer over the vendor `imf::SspClient`
//! class. The library is opened at runtime with `libloading`, so nothing is
//! linked at build time and the crate builds on machines without the vendor
//! SDK.
//!
//! ## Overview
//!
//! `ssp-sys` exposes:
//! - `#[repr(C)]` payload structures passed to callbacks ([`H264Data`],
//!   [`AudioData`], [`VideoMeta`], [`AudioMeta`], [`Meta`])
//! - Callback typedefs and the opaque [`Client`] handle
//! - Constants for stream styles, encoders, protocol error codes and capabilities
//! - The [`libssp`] function table, in the shape bindgen's dynamic-library mode
//!   produces
//!
//! ## Usage
//!
//! **Most users should NOT use this crate directly.** Use the safe `ssp`
//! wrapper crate instead, which owns the background run loop, marshals
//! payloads and guarantees deadlock-free teardown.
//!
//! ## Safety
//!
//! Every function in the table is `unsafe` and requires the caller to uphold
//! the native library's invariants:
//! - A client must be initialised (`init`) before callbacks are set or it is started
//! - `start` and `stop` block; `stop` may invoke the disconnected callback
//!   synchronously on the calling thread
//! - Payload pointers handed to callbacks are only valid for the duration of
//!   the callback
//! - `user_data` pointers must outlive the client they are registered on

#![allow(non_camel_case_types)]
#![allow(clippy::missing_safety_doc)]

use std::ffi::{c_char, c_int, c_void};

/// Status code returned by fallible shim functions.
pub type Status = c_int;

pub const SSPC_STATUS_OK: Status = 0;
pub const SSPC_ERR_UNKNOWN: Status = 1;
pub const SSPC_ERR_INVALID_ARG: Status = 2;
pub const SSPC_ERR_INVALID_STATE: Status = 3;

pub const STREAM_DEFAULT: u32 = 0;
pub const STREAM_MAIN: u32 = 1;
pub const STREAM_SEC: u32 = 2;

pub const VIDEO_ENCODER_UNKNOWN: u32 = 0;
pub const VIDEO_ENCODER_H264: u32 = 96;
pub const VIDEO_ENCODER_H265: u32 = 265;

pub const AUDIO_ENCODER_UNKNOWN: u32 = 0;
pub const AUDIO_ENCODER_AAC: u32 = 37;
pub const AUDIO_ENCODER_PCM: u32 = 23;

pub const ERROR_SSP_PROTOCOL_VERSION_GT_SERVER: c_int = -1000;
pub const ERROR_SSP_PROTOCOL_VERSION_LT_SERVER: c_int = -1001;
pub const ERROR_SSP_CONNECTION_FAILED: c_int = -1002;
pub const ERROR_SSP_CONNECTION_EXIST: c_int = -1003;

pub const SSP_CAPABILITY_IGNORE_HEARTBEAT_DISABLE_ENC: u32 = 1 << 0;

/// Default TCP port of the SSP service on the camera.
pub const SSP_DEFAULT_PORT: u16 = 9999;

/// Encoded video frame as delivered by the native client.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct H264Data {
    pub data: *mut u8,
    pub len: usize,
    pub pts: u64,
    pub ntp_timestamp: u64,
    pub frm_no: u32,
    pub type_: u32,
}

impl Default for H264Data {
    fn default() -> Self {
        Self {
            data: std::ptr::null_mut(),
            len: 0,
            pts: 0,
            ntp_timestamp: 0,
            frm_no: 0,
            type_: 0,
        }
    }
}

/// Encoded audio frame as delivered by the native client.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct AudioData {
    pub data: *mut u8,
    pub len: usize,
    pub pts: u64,
    pub ntp_timestamp: u64,
}

impl Default for AudioData {
    fn default() -> Self {
        Self {
            data: std::ptr::null_mut(),
            len: 0,
            pts: 0,
            ntp_timestamp: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    pub timescale: u32,
    pub unit: u32,
    pub gop: u32,
    pub encoder: u32,
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct AudioMeta {
    pub timescale: u32,
    pub unit: u32,
    pub sample_rate: u32,
    pub sample_size: u32,
    pub channel: u32,
    pub bitrate: u32,
    pub encoder: u32,
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct Meta {
    pub pts_is_wall_clock: bool,
}

/// Opaque native client object.
#[repr(C)]
pub struct ClientOpaque {
    _unused: [u8; 0],
}

/// Handle to a native client created by [`libssp::create`].
pub type Client = *mut ClientOpaque;

pub type H264DataCallback =
    Option<unsafe extern "C" fn(user_data: *mut c_void, data: *const H264Data)>;
pub type AudioDataCallback =
    Option<unsafe extern "C" fn(user_data: *mut c_void, data: *const AudioData)>;
pub type MetaCallback = Option<
    unsafe extern "C" fn(
        user_data: *mut c_void,
        video: *const VideoMeta,
        audio: *const AudioMeta,
        meta: *const Meta,
    ),
>;
pub type NotifyCallback = Option<unsafe extern "C" fn(user_data: *mut c_void)>;
pub type ExceptionCallback =
    Option<unsafe extern "C" fn(user_data: *mut c_void, code: c_int, description: *const c_char)>;

/// Function table of the dynamically loaded native client library.
pub struct libssp {
    __library: ::libloading::Library,
    pub sspc_create: unsafe extern "C" fn(
        ip: *const c_char,
        buf_size: usize,
        port: u16,
        stream_style: u32,
    ) -> Client,
    pub sspc_destroy: unsafe extern "C" fn(client: Client),
    pub sspc_init: unsafe extern "C" fn(client: Client) -> Status,
    pub sspc_set_hlg: unsafe extern "C" fn(client: Client, enabled: bool),
    pub sspc_set_capability: unsafe extern "C" fn(client: Client, capability: u32),
    pub sspc_set_debug_print: unsafe extern "C" fn(client: Client, enabled: bool),
    pub sspc_set_on_h264_data:
        unsafe extern "C" fn(client: Client, cb: H264DataCallback, user_data: *mut c_void),
    pub sspc_set_on_audio_data:
        unsafe extern "C" fn(client: Client, cb: AudioDataCallback, user_data: *mut c_void),
    pub sspc_set_on_meta:
        unsafe extern "C" fn(client: Client, cb: MetaCallback, user_data: *mut c_void),
    pub sspc_set_on_connected:
        unsafe extern "C" fn(client: Client, cb: NotifyCallback, user_data: *mut c_void),
    pub sspc_set_on_disconnected:
        unsafe extern "C" fn(client: Client, cb: NotifyCallback, user_data: *mut c_void),
    pub sspc_set_on_exception:
        unsafe extern "C" fn(client: Client, cb: ExceptionCallback, user_data: *mut c_void),
    pub sspc_set_on_recv_buffer_full:
        unsafe extern "C" fn(client: Client, cb: NotifyCallback, user_data: *mut c_void),
    pub sspc_start: unsafe extern "C" fn(client: Client) -> Status,
    pub sspc_stop: unsafe extern "C" fn(client: Client) -> Status,
}

impl libssp {
    pub unsafe fn new<P>(path: P) -> Result<Self, ::libloading::Error>
    where
        P: AsRef<::std::ffi::OsStr>,
    {
        let library = unsafe { ::libloading::Library::new(path)? };
        unsafe { Self::from_library(library) }
    }

    pub unsafe fn from_library<L>(library: L) -> Result<Self, ::libloading::Error>
    where
        L: Into<::libloading::Library>,
    {
        let __library = library.into();
        unsafe {
            let sspc_create = __library.get(b"sspc_create\0").map(|sym| *sym)?;
            let sspc_destroy = __library.get(b"sspc_destroy\0").map(|sym| *sym)?;
            let sspc_init = __library.get(b"sspc_init\0").map(|sym| *sym)?;
            let sspc_set_hlg = __library.get(b"sspc_set_hlg\0").map(|sym| *sym)?;
            let sspc_set_capability = __library.get(b"sspc_set_capability\0").map(|sym| *sym)?;
            let sspc_set_debug_print = __library.get(b"sspc_set_debug_print\0").map(|sym| *sym)?;
            let sspc_set_on_h264_data =
                __library.get(b"sspc_set_on_h264_data\0").map(|sym| *sym)?;
            let sspc_set_on_audio_data =
                __library.get(b"sspc_set_on_audio_data\0").map(|sym| *sym)?;
            let sspc_set_on_meta = __library.get(b"sspc_set_on_meta\0").map(|sym| *sym)?;
            let sspc_set_on_connected =
                __library.get(b"sspc_set_on_connected\0").map(|sym| *sym)?;
            let sspc_set_on_disconnected =
                __library.get(b"sspc_set_on_disconnected\0").map(|sym| *sym)?;
            let sspc_set_on_exception =
                __library.get(b"sspc_set_on_exception\0").map(|sym| *sym)?;
            let sspc_set_on_recv_buffer_full = __library
                .get(b"sspc_set_on_recv_buffer_full\0")
                .map(|sym| *sym)?;
            let sspc_start = __library.get(b"sspc_start\0").map(|sym| *sym)?;
            let sspc_stop = __library.get(b"sspc_stop\0").map(|sym| *sym)?;
            Ok(libssp {
                __library,
                sspc_create,
                sspc_destroy,
                sspc_init,
                sspc_set_hlg,
                sspc_set_capability,
                sspc_set_debug_print,
                sspc_set_on_h264_data,
                sspc_set_on_audio_data,
                sspc_set_on_meta,
                sspc_set_on_connected,
                sspc_set_on_disconnected,
                sspc_set_on_exception,
                sspc_set_on_recv_buffer_full,
                sspc_start,
                sspc_stop,
            })
        }
    }

    pub unsafe fn create(
        &self,
        ip: *const c_char,
        buf_size: usize,
        port: u16,
        stream_style: u32,
    ) -> Client {
        unsafe { (self.sspc_create)(ip, buf_size, port, stream_style) }
    }

    pub unsafe fn destroy(&self, client: Client) {
        unsafe { (self.sspc_destroy)(client) }
    }

    pub unsafe fn init(&self, client: Client) -> Status {
        unsafe { (self.sspc_init)(client) }
    }

    pub unsafe fn set_hlg(&self, client: Client, enabled: bool) {
        unsafe { (self.sspc_set_hlg)(client, enabled) }
    }

    pub unsafe fn set_capability(&self, client: Client, capability: u32) {
        unsafe { (self.sspc_set_capability)(client, capability) }
    }

    pub unsafe fn set_debug_print(&self, client: Client, enabled: bool) {
        unsafe { (self.sspc_set_debug_print)(client, enabled) }
    }

    pub unsafe fn set_on_h264_data(
        &self,
        client: Client,
        cb: H264DataCallback,
        user_data: *mut c_void,
    ) {
        unsafe { (self.sspc_set_on_h264_data)(client, cb, user_data) }
    }

    pub unsafe fn set_on_audio_data(
        &self,
        client: Client,
        cb: AudioDataCallback,
        user_data: *mut c_void,
    ) {
        unsafe { (self.sspc_set_on_audio_data)(client, cb, user_data) }
    }

    pub unsafe fn set_on_meta(&self, client: Client, cb: MetaCallback, user_data: *mut c_void) {
        unsafe { (self.sspc_set_on_meta)(client, cb, user_data) }
    }

    pub unsafe fn set_on_connected(
        &self,
        client: Client,
        cb: NotifyCallback,
        user_data: *mut c_void,
    ) {
        unsafe { (self.sspc_set_on_connected)(client, cb, user_data) }
    }

    pub unsafe fn set_on_disconnected(
        &self,
        client: Client,
        cb: NotifyCallback,
        user_data: *mut c_void,
    ) {
        unsafe { (self.sspc_set_on_disconnected)(client, cb, user_data) }
    }

    pub unsafe fn set_on_exception(
        &self,
        client: Client,
        cb: ExceptionCallback,
        user_data: *mut c_void,
    ) {
        unsafe { (self.sspc_set_on_exception)(client, cb, user_data) }
    }

    pub unsafe fn set_on_recv_buffer_full(
        &self,
        client: Client,
        cb: NotifyCallback,
        user_data: *mut c_void,
    ) {
        unsafe { (self.sspc_set_on_recv_buffer_full)(client, cb, user_data) }
    }

    pub unsafe fn start(&self, client: Client) -> Status {
        unsafe { (self.sspc_start)(client) }
    }

    pub unsafe fn stop(&self, client: Client) -> Status {
        unsafe { (self.sspc_stop)(client) }
    }
}
