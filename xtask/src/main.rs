use std::process::Command;

use anyhow::Context as _;
use clap::Parser;

#[derive(Parser)]
enum Cli {
    /// Build the workspace.
    Build {
        /// Build in release mode.
        #[arg(long)]
        release: bool,
    },
    /// Run the unit tests of every crate.
    Test,
    /// Build and run the sniffer with sudo (raw sockets need CAP_NET_RAW).
    Run {
        /// Build in release mode.
        #[arg(long)]
        release: bool,
        /// Extra arguments passed to the binary.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli {
        Cli::Build { release } => build(release),
        Cli::Test => cargo(&["test", "--workspace"], "workspace tests failed"),
        Cli::Run { release, args } => {
            build(release)?;
            run(release, &args)
        }
    }
}

fn exec(mut cmd: Command, failure: &str) -> anyhow::Result<()> {
    let status = cmd
        .status()
        .with_context(|| format!("failed to spawn {:?}", cmd.get_program()))?;
    anyhow::ensure!(status.success(), "{}", failure);
    Ok(())
}

fn cargo(args: &[&str], failure: &str) -> anyhow::Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.args(args);
    exec(cmd, failure)
}

fn build(release: bool) -> anyhow::Result<()> {
    let mut args = vec!["build", "--workspace"];
    if release {
        args.push("--release");
    }
    cargo(&args, "workspace build failed")
}

/// Raw sockets need CAP_NET_RAW, so the sniffer goes through sudo.
fn run(release: bool, extra_args: &[String]) -> anyhow::Result<()> {
    let mut cmd = Command::new("sudo");
    cmd.arg(binary_path(release)).args(extra_args);
    exec(cmd, "pktsniff exited with error")
}

fn binary_path(release: bool) -> String {
    let profile = if release { "release" } else { "debug" };
    format!("target/{profile}/pktsniff")
}
