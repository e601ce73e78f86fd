// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Connects to a camera, logs the stream description and frame statistics,
//! and exits when the camera disconnects or after `--seconds`.

mod common;

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
        mpsc,
    },
    time::Duration,
};

use clap::Parser;
use ssp::{ConnectParams, SspClient, StreamStyle, config::get_libssp_path, load_api};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Camera IP address.
    address: String,

    /// Camera stream index (0 or 1).
    #[arg(long, default_value_t = 1)]
    stream: u32,

    /// How long to stay connected.
    #[arg(long, default_value_t = 10)]
    seconds: u64,
}

fn main() -> Result<(), ssp::Error> {
    common::setup_logging();
    let args = Args::parse();

    let api = load_api(get_libssp_path())?;
    let params = ConnectParams {
        stream_style: StreamStyle::from_index(args.stream),
        ..ConnectParams::with_defaults(args.address)
    };
    let client = SspClient::native(api, params);

    let frames = Arc::new(AtomicU64::new(0));
    let bytes = Arc::new(AtomicU64::new(0));
    let (done_tx, done_rx) = mpsc::channel::<()>();

    client.on_meta(|meta| {
        info!(
            width = meta.video.width,
            height = meta.video.height,
            codec = meta.video.encoder().name(),
            audio = meta.audio.encoder().name(),
            sample_rate = meta.audio.sample_rate,
            "Stream description"
        );
        Ok(())
    });
    let (frame_count, byte_count) = (frames.clone(), bytes.clone());
    client.on_video_frame(move |frame| {
        frame_count.fetch_add(1, Ordering::Relaxed);
        byte_count.fetch_add(frame.len() as u64, Ordering::Relaxed);
        Ok(())
    });
    client.on_connected(|| {
        info!("Connected");
        Ok(())
    });
    let disconnected_tx = done_tx.clone();
    client.on_disconnected(move || {
        info!("Disconnected");
        let _ = disconnected_tx.send(());
        Ok(())
    });
    client.on_exception(|event| {
        warn!(code = event.code, "Exception: {}", event.description);
        Ok(())
    });

    client.start();
    let _ = done_rx.recv_timeout(Duration::from_secs(args.seconds));
    client.stop();

    info!(
        frames = frames.load(Ordering::Relaxed),
        bytes = bytes.load(Ordering::Relaxed),
        "Done"
    );
    Ok(())
}
