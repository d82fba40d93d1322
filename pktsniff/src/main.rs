use anyhow::Context;
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod capture;
mod config;
mod display;
mod error;
mod output;
mod record;
mod sink;
mod socket;
mod storage;

use capture::{CancelToken, CaptureSession};
use config::{CliArgs, Config};
use error::CaptureError;
use output::Outputs;
use record::PacketRecord;
use sink::ChannelSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();

    // Load config from file if provided, otherwise use defaults.
    let mut config = if let Some(ref config_path) = cli.config {
        Config::from_file(Path::new(config_path))?
    } else {
        Config::default()
    };
    config.merge_cli(&cli);

    // Logging.
    if config.quiet {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new("error"))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
            ))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let capture_config = config.capture_config()?;

    // ── Socket ────────────────────────────────────────────────────────
    let session = CaptureSession::open(capture_config)?;

    // ── Outputs ───────────────────────────────────────────────────────
    let mut outputs = Outputs::default();
    if config.display {
        outputs.display = Some(Box::new(std::io::stdout()));
    }
    if let Some(ref path) = config.output {
        let file = File::create(path).with_context(|| format!("creating output {}", path))?;
        outputs.json = Some(Box::new(BufWriter::new(file)));
        tracing::info!("Writing JSON lines to {}", path);
    }
    let storage = match config.db_path {
        Some(ref path) => {
            let storage = storage::Storage::new(path)
                .with_context(|| format!("opening database {}", path))?;
            tracing::info!("Storing packets in {}", path);
            Some(storage)
        }
        None => None,
    };
    outputs.storage = storage.clone();

    // ── Cancellation ──────────────────────────────────────────────────
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, stopping capture...");
        handler_token.cancel();
    })?;

    // ── Channel & Writer Task ─────────────────────────────────────────
    let (tx, rx) = mpsc::channel::<PacketRecord>(config.channel_capacity.max(1));
    let writer = tokio::spawn(output::run_writer(rx, outputs));

    // ── Capture Thread ────────────────────────────────────────────────
    // The loop blocks on socket reads and on `blocking_send`, so it gets a
    // thread of its own. The sender drops with the sink when it returns.
    let capture = tokio::task::spawn_blocking(move || {
        let mut sink = ChannelSink::new(tx);
        session.run(&mut sink, &cancel)
    });

    let captured = capture.await.context("capture thread panicked")?;
    let written = writer.await.context("writer task panicked")?;

    let summary = match (captured, written) {
        (Ok(summary), Ok(_)) => summary,
        // A dead writer shows up in the capture loop as a closed sink; the
        // writer's own error says why.
        (Err(CaptureError::SinkClosed), Err(e)) | (Ok(_), Err(e)) => return Err(e.into()),
        (Err(e), _) => return Err(e.into()),
    };

    tracing::info!(
        state = ?summary.state,
        "Captured {} packets ({} observed, {} filtered)",
        summary.records_emitted,
        summary.frames_observed,
        summary.frames_filtered
    );
    for (protocol, count) in &summary.per_protocol {
        tracing::info!("  {}: {}", protocol, count);
    }
    if let Some(storage) = storage {
        match storage.count() {
            Ok(total) => tracing::info!("Database now holds {} packets", total),
            Err(e) => tracing::warn!("Could not count stored packets: {}", e),
        }
    }

    Ok(())
}
