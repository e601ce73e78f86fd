// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Helpers for the `ssp` examples.

/// Logs to stdout at INFO unless `RUST_LOG` says otherwise.
///
/// Thread names are printed so handler output (on the `ssp-loop` thread) can
/// be told apart from the main thread's.
pub fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_thread_names(true)
        .init();
}
