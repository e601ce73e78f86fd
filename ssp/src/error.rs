// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for SSP client operations.
//!
//! These errors describe failures at API boundaries that return a `Result`:
//! loading the native library, creating and initialising a session, reading
//! configuration. Failures that happen asynchronously while a client is
//! running never surface as [`Error`]; they are reported through the
//! exception event kind (see [`crate::ExceptionCode`]).

use crate::ExceptionCode;

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur when using the SSP client API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An unknown or unrecognized native status code.
    #[error("Unknown error: {0}")]
    Unknown(ssp_sys::Status),

    /// An argument passed to a native function was rejected.
    #[error("Invalid argument")]
    InvalidArg,

    /// The native client was used in a state that does not allow the call
    /// (e.g. started before `init`).
    #[error("Invalid state")]
    InvalidState,

    /// No session exists: initialisation has not finished, timed out, or failed.
    #[error("Session unavailable")]
    SessionUnavailable,

    /// The session factory failed to construct a session.
    #[error("Session creation failed: {0}")]
    SessionCreation(String),

    /// A generic error for Rust-level failures not mapped to a native status.
    #[error("Other error: {0}")]
    Other(String),

    /// Failed to convert a Rust string to a C-compatible null-terminated string.
    #[error("Null string: {0}")]
    NulString(#[from] std::ffi::NulError),

    /// Failed to load or interact with the native dynamic library.
    #[error("Loading library: {0}")]
    LibLoading(#[from] libloading::Error),

    /// Failed to read a configuration file.
    #[error("Reading configuration: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration document could not be parsed.
    #[error("Parsing configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Converts a native status code to a Rust [`Result`].
    ///
    /// - `Ok(())` if `status == SSPC_STATUS_OK`
    /// - `Err(Error::...)` for any other status code
    pub fn from_status(status: ssp_sys::Status) -> Result<()> {
        match status {
            ssp_sys::SSPC_STATUS_OK => Ok(()),
            ssp_sys::SSPC_ERR_UNKNOWN => Err(Error::Unknown(ssp_sys::SSPC_ERR_UNKNOWN)),
            ssp_sys::SSPC_ERR_INVALID_ARG => Err(Error::InvalidArg),
            ssp_sys::SSPC_ERR_INVALID_STATE => Err(Error::InvalidState),
            other => Err(Error::Unknown(other)),
        }
    }

    /// The exception code used when this error is reported as an event.
    pub fn exception_code(&self) -> ExceptionCode {
        match self {
            Error::SessionUnavailable | Error::SessionCreation(_) => {
                ExceptionCode::SessionUnavailable
            }
            _ => ExceptionCode::StartFailed,
        }
    }
}
