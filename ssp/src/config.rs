// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration and library path resolution.
//!
//! A [`ClientConfig`] is a small JSON document holding everything needed to
//! build and tune a client:
//!
//! ```json
//! {
//!     "address": "192.168.1.20",
//!     "port": 9999,
//!     "stream_style": "main",
//!     "hlg": false,
//!     "capability": 1,
//!     "init_timeout_ms": 10000
//! }
//! ```
//!
//! Every field except `address` is optional.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{Capability, ClientOptions, ConnectParams, Result, SspClient, StreamStyle};

/// Environment variable overriding the native library location.
pub const LIBSSP_PATH_ENV: &str = "LIBSSP_PATH";

/// Returns the path of the native SSP client library.
///
/// Uses `LIBSSP_PATH` when set, otherwise the platform library name
/// (`libssp_c.so` on Linux), leaving the lookup to the dynamic loader.
///
/// # Examples
///
/// ```no_run
/// use ssp::config::get_libssp_path;
/// use ssp::load_api;
///
/// # fn main() -> Result<(), ssp::Error> {
/// let api = load_api(get_libssp_path())?;
/// # Ok(())
/// # }
/// ```
pub fn get_libssp_path() -> std::path::PathBuf {
    match std::env::var_os(LIBSSP_PATH_ENV) {
        Some(path) if !path.is_empty() => path.into(),
        _ => format!(
            "{}ssp_c{}",
            std::env::consts::DLL_PREFIX,
            std::env::consts::DLL_SUFFIX
        )
        .into(),
    }
}

/// Serializable client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Camera IP address or host name.
    pub address: String,
    pub port: u16,
    /// Receive buffer capacity in bytes.
    pub buffer_size: usize,
    pub stream_style: StreamStyle,
    pub hlg: bool,
    pub capability: Capability,
    pub debug_print: bool,
    /// Upper bound on the wait for session construction, in milliseconds.
    pub init_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            port: ssp_sys::SSP_DEFAULT_PORT,
            buffer_size: ConnectParams::DEFAULT_BUFFER_SIZE,
            stream_style: StreamStyle::Default,
            hlg: false,
            capability: Capability::NONE,
            debug_print: false,
            init_timeout_ms: crate::client::DEFAULT_INIT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn connect_params(&self) -> ConnectParams {
        ConnectParams::new(
            self.address.clone(),
            self.buffer_size,
            self.port,
            self.stream_style,
        )
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    /// Default client options with this configuration's init timeout.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            init_timeout: self.init_timeout(),
            ..ClientOptions::default()
        }
    }

    /// Copies the session options (HLG, capability, debug output) onto `client`.
    pub fn apply(&self, client: &SspClient) {
        client.set_hlg(self.hlg);
        client.set_capability(self.capability);
        client.set_debug_print(self.debug_print);
    }
}
