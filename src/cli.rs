// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines the run and detect subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "cairn")]
#[command(about = "Start throwaway Docker and Podman containers and wait until they are ready")]
#[command(version)]
pub struct Cli {
    /// Log lifecycle steps at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a container, print where to reach it, then remove it
    Run(RunArgs),

    /// Show which container engine would be used
    Detect,
}

#[derive(Args)]
pub struct RunArgs {
    /// Image to run; without it a spec file is used
    pub image: Option<String>,

    /// Spec file (default: cairn.yml in the current directory)
    #[arg(short, long, conflicts_with = "image")]
    pub file: Option<PathBuf>,

    /// Container port to expose, e.g. 6379 or 53/udp
    #[arg(short, long = "port")]
    pub ports: Vec<String>,

    /// Environment variable as KEY=VALUE
    #[arg(short, long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub network: Option<String>,

    #[arg(long)]
    pub privileged: bool,

    #[command(flatten)]
    pub wait: WaitArgs,

    /// Readiness deadline, e.g. 30s or 2m
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Keep the container until Ctrl-C
    #[arg(long)]
    pub hold: bool,

    /// Command to run instead of the image default
    #[arg(last = true)]
    pub command: Vec<String>,
}

#[derive(Args, Default)]
#[group(multiple = false)]
pub struct WaitArgs {
    /// Wait for a log message
    #[arg(long)]
    pub wait_log: Option<String>,

    /// Wait for a log line matching a regular expression
    #[arg(long)]
    pub wait_regex: Option<String>,

    /// Wait for HTTP 200 from GET / on this mapped container port
    #[arg(long)]
    pub wait_http: Option<u16>,

    /// Wait until this mapped container port accepts TCP connections
    #[arg(long)]
    pub wait_tcp: Option<u16>,

    /// Wait for the engine health check to pass
    #[arg(long)]
    pub wait_healthy: bool,

    /// Return as soon as the container is started
    #[arg(long)]
    pub no_wait: bool,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty variable name in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}
