// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Building blocks of the `ssp-dump` tool.
//!
//! - [`Recorder`]: writes the received elementary video stream to a file from
//!   a worker thread, so the client's run loop never waits on disk I/O
//! - [`status`]: human readable descriptions of stream metadata and frames

pub mod recorder;
pub mod status;

pub use recorder::{Recorder, RecorderStats, dump_file_name};

/// Errors that end the tool.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Ssp(#[from] ssp::Error),

    #[error("Dump file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),
}

pub type Result<T> = core::result::Result<T, Error>;
