use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use pktsniff_common::{CaptureMode, ProtocolFilter};

use crate::capture::CaptureConfig;

/// Application configuration, loadable from CLI or YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Network interface to capture on (None = all interfaces).
    #[serde(default)]
    pub interface: Option<String>,

    /// `link` (frames include the Ethernet header) or `ip` (IP datagrams).
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Only emit this protocol (TCP, UDP, ICMP).
    #[serde(default)]
    pub filter_protocol: Option<String>,

    /// Stop after this many emitted records.
    #[serde(default)]
    pub count: Option<u64>,

    /// JSON lines output path.
    #[serde(default)]
    pub output: Option<String>,

    /// SQLite database path (None = no database).
    #[serde(default)]
    pub db_path: Option<String>,

    /// Print each decoded packet to stdout.
    #[serde(default = "default_display")]
    pub display: bool,

    /// Quiet mode (suppress non-error logs).
    #[serde(default)]
    pub quiet: bool,

    /// Socket read timeout in milliseconds; bounds how long Ctrl-C takes to
    /// be noticed.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Capacity of the queue between the capture thread and the writers.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_mode() -> String {
    "link".to_string()
}

fn default_display() -> bool {
    true
}

fn default_read_timeout_ms() -> u64 {
    500
}

fn default_channel_capacity() -> usize {
    1024
}

/// Receive buffer per read; large enough for any frame the socket hands back.
const RECV_BUFFER_SIZE: usize = 65535;

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: None,
            mode: default_mode(),
            filter_protocol: None,
            count: None,
            output: None,
            db_path: None,
            display: default_display(),
            quiet: false,
            read_timeout_ms: default_read_timeout_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Merge CLI args into config (CLI takes precedence).
    pub fn merge_cli(&mut self, cli: &CliArgs) {
        if cli.interface.is_some() {
            self.interface = cli.interface.clone();
        }
        if let Some(ref mode) = cli.mode {
            self.mode = mode.clone();
        }
        if cli.filter.is_some() {
            self.filter_protocol = cli.filter.clone();
        }
        if cli.count.is_some() {
            self.count = cli.count;
        }
        if cli.output.is_some() {
            self.output = cli.output.clone();
        }
        if cli.db_path.is_some() {
            self.db_path = cli.db_path.clone();
        }
        if cli.no_display {
            self.display = false;
        }
        if cli.quiet {
            self.quiet = true;
        }
        if let Some(ms) = cli.read_timeout_ms {
            self.read_timeout_ms = ms;
        }
        if let Some(capacity) = cli.channel_capacity {
            self.channel_capacity = capacity;
        }
    }

    /// Validate and resolve the settings the capture loop runs with.
    pub fn capture_config(&self) -> anyhow::Result<CaptureConfig> {
        let mode: CaptureMode = self
            .mode
            .parse()
            .map_err(|e| anyhow!("invalid mode {:?}: {}", self.mode, e))?;

        let filter = self
            .filter_protocol
            .as_deref()
            .map(|f| {
                f.parse::<ProtocolFilter>()
                    .map_err(|e| anyhow!("invalid filter {:?}: {}", f, e))
            })
            .transpose()?;

        if self.count == Some(0) {
            anyhow::bail!("count must be a positive number");
        }
        if self.read_timeout_ms == 0 {
            anyhow::bail!("read timeout must be at least 1 ms");
        }

        Ok(CaptureConfig {
            interface: self.interface.clone(),
            mode,
            filter,
            count: self.count,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            buffer_size: RECV_BUFFER_SIZE,
        })
    }
}

use clap::Parser;

/// pktsniff: raw socket packet sniffer (Ethernet / IPv4 / TCP / UDP / ICMP)
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Network interface to capture on (e.g., eth0). All interfaces if not set.
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Capture mode: `link` (Ethernet frames) or `ip` (IP datagrams, no link header).
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Only keep this protocol (TCP, UDP, ICMP).
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Stop after this many packets.
    #[arg(short, long)]
    pub count: Option<u64>,

    /// Write decoded packets as JSON lines to this file.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Also store decoded packets in this SQLite database.
    #[arg(long)]
    pub db_path: Option<String>,

    /// Path to YAML config file.
    #[arg(long)]
    pub config: Option<String>,

    /// Do not print packets to stdout.
    #[arg(long)]
    pub no_display: bool,

    /// Quiet mode (suppress non-error logs).
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Socket read timeout in milliseconds.
    #[arg(long)]
    pub read_timeout_ms: Option<u64>,

    /// Queue capacity between capture and output.
    #[arg(long)]
    pub channel_capacity: Option<usize>,
}
