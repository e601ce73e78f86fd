// SPDX-FileCopyrightText: 2025 Contributors to the libssp-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Connects to an SSP camera, logs the stream status and optionally records
//! the elementary video stream.
//!
//! ```text
//! ssp-dump 192.168.1.84 --stream 0 --dump ./dump --duration 30
//! ```
//!
//! Runs until the camera disconnects or `--duration` seconds have passed.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError, mpsc},
    time::Duration,
};

use clap::Parser;
use ssp::{
    Capability, StreamStyle, SspClient,
    config::{ClientConfig, get_libssp_path},
    load_api,
};
use ssp_dump::{
    Error, Recorder, Result, dump_file_name,
    status::{FrameClock, audio_status, describe_meta, video_status},
};
use tracing::{debug, error, info, warn};

/// Frame status is logged at INFO level every this many frames.
const STATUS_INTERVAL: u32 = 100;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Camera IP address. Overrides the address of `--config`.
    address: Option<String>,

    /// Camera stream index.
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=1))]
    stream: Option<u32>,

    /// Camera SSP port.
    #[arg(long)]
    port: Option<u16>,

    /// Receive buffer size in bytes.
    #[arg(long = "buf-size")]
    buf_size: Option<usize>,

    /// JSON client configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path of the native SSP client library.
    #[arg(long, env = "LIBSSP_PATH")]
    lib: Option<PathBuf>,

    /// Enable HLG mode.
    #[arg(long)]
    hlg: bool,

    /// Keep the camera encoder running when heartbeats are lost.
    #[arg(long)]
    ignore_heartbeat: bool,

    /// Enable the native library's diagnostic output.
    #[arg(long)]
    debug_print: bool,

    /// Directory to record the video elementary stream into.
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Stop after this many seconds.
    #[arg(long)]
    duration: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();
    let config = client_config(&args)?;
    let stream_index = match config.stream_style {
        StreamStyle::Main => 0,
        _ => 1,
    };

    let api = load_api(args.lib.clone().unwrap_or_else(get_libssp_path))?;
    let client = SspClient::native_with_options(
        api,
        config.connect_params(),
        config.client_options(),
    );
    config.apply(&client);

    let recorder: Arc<Mutex<Option<Recorder>>> = Arc::new(Mutex::new(None));
    let (done_tx, done_rx) = mpsc::channel::<()>();

    let meta_recorder = recorder.clone();
    let dump_dir = args.dump.clone();
    let address = config.address.clone();
    client.on_meta(move |meta| {
        info!("Received metadata");
        for line in describe_meta(meta) {
            info!("  {}", line);
        }
        let Some(dir) = &dump_dir else {
            return Ok(());
        };
        let mut recorder = meta_recorder
            .lock()
            .map_err(|_| "recorder lock poisoned")?;
        if recorder.is_none() {
            let name = dump_file_name(&address, stream_index, meta.video.encoder());
            *recorder = Some(Recorder::start(dir.join(name))?);
        }
        Ok(())
    });

    let video_recorder = recorder.clone();
    let clock = Mutex::new(FrameClock::default());
    client.on_video_frame(move |frame| {
        let interval = clock
            .lock()
            .map_err(|_| "frame clock lock poisoned")?
            .tick(frame.pts);
        let status = video_status(frame, interval);
        if frame.frame_no % STATUS_INTERVAL == 0 {
            info!("{}", status);
        } else {
            debug!("{}", status);
        }
        let recorder = video_recorder
            .lock()
            .map_err(|_| "recorder lock poisoned")?;
        if let Some(recorder) = recorder.as_ref() {
            recorder.write_frame(frame.data.clone());
        }
        Ok(())
    });

    client.on_audio_frame(|frame| {
        debug!("{}", audio_status(frame));
        Ok(())
    });
    client.on_connected(|| {
        info!("Connection established");
        Ok(())
    });
    client.on_disconnected(move || {
        info!("Connection disconnected");
        let _ = done_tx.send(());
        Ok(())
    });
    client.on_exception(|event| {
        error!(code = event.code, kind = ?event.kind(), "Exception: {}", event.description);
        Ok(())
    });
    client.on_recv_buffer_full(|| {
        warn!("Receive buffer is full");
        Ok(())
    });

    info!(address = %config.address, stream = stream_index, "Connecting to camera");
    client.start();

    match args.duration {
        Some(seconds) => {
            let _ = done_rx.recv_timeout(Duration::from_secs(seconds));
        }
        None => {
            let _ = done_rx.recv();
        }
    }

    info!("Stopping client");
    client.stop();

    let recorder = recorder
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(mut recorder) = recorder {
        let stats = recorder.stop()?;
        info!(
            path = %recorder.path().display(),
            frames = stats.frames,
            bytes = stats.bytes,
            "Dump written"
        );
    }
    Ok(())
}

/// Merges the configuration file (if any) with the command line.
fn client_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_json_file(path)?,
        None => ClientConfig::default(),
    };
    if let Some(address) = &args.address {
        config.address = address.clone();
    }
    if config.address.is_empty() {
        return Err(Error::InvalidArgs(
            "no camera address given on the command line or in --config".to_string(),
        ));
    }
    if let Some(index) = args.stream {
        config.stream_style = StreamStyle::from_index(index);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(buf_size) = args.buf_size {
        config.buffer_size = buf_size;
    }
    config.hlg |= args.hlg;
    config.debug_print |= args.debug_print;
    if args.ignore_heartbeat {
        config.capability |= Capability::IGNORE_HEARTBEAT_DISABLE_ENC;
    }
    Ok(config)
}
