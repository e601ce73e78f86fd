// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Dynamic loading of the native SSP client library.

use std::{ffi::OsStr, sync::Arc};

use tracing::debug;

use crate::Result;

/// The loaded native function table.
pub type SspApi = ssp_sys::libssp;

/// Shared handle to the loaded library, kept alive by every native session.
pub type SspApiHandle = Arc<SspApi>;

/// Loads the native library at `path` and resolves every `sspc_*` symbol.
pub fn load_api(path: impl AsRef<OsStr>) -> Result<SspApiHandle> {
    let path = path.as_ref();
    let api = unsafe { SspApi::new(path)? };
    debug!(path = ?path, "Loaded native SSP library");
    Ok(Arc::new(api))
}
