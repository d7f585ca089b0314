// ABOUTME: Entry point for the cairn CLI application.
// ABOUTME: Parses arguments, sets up logging, and dispatches to the subcommands.

mod cli;

use cairn::config::SpecFile;
use cairn::container::{ContainerBuilder, Orchestrator, StartedContainer};
use cairn::error::{Error, Result};
use cairn::runtime::{
    BollardRuntime, ClientKind, CliRuntime, RuntimeError, RuntimeInfo, config_from_env,
    detect_local,
};
use cairn::wait::{HttpCheck, TcpPortOpen, WaitStrategy};
use clap::Parser;
use cli::{Cli, Commands, RunArgs, WaitArgs};
use std::env;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => run_container(args).await,
        Commands::Detect => detect().await,
    }
}

/// Print the engine the environment resolves to.
async fn detect() -> Result<()> {
    let config = config_from_env()?;

    match config.client {
        ClientKind::Api => {
            let detected = detect_local(Some(&config)).map_err(RuntimeError::from)?;
            println!("runtime: {}", detected.runtime_type);
            println!("socket:  {}", detected.socket_path);
            println!("client:  api");

            let runtime = BollardRuntime::connect(&detected).map_err(RuntimeError::from)?;
            print_version(&runtime).await;
        }
        ClientKind::Cli => {
            let runtime_type = match config.runtime {
                Some(runtime_type) => runtime_type,
                None => detect_local(Some(&config))
                    .map_err(RuntimeError::from)?
                    .runtime_type,
            };
            let runtime = match config.binary {
                Some(ref binary) => CliRuntime::with_binary(runtime_type, binary.clone()),
                None => CliRuntime::new(runtime_type),
            };
            println!("runtime: {}", runtime_type);
            println!("client:  cli");
            print_version(&runtime).await;
        }
    }
    Ok(())
}

async fn print_version(runtime: &impl RuntimeInfo) {
    match runtime.info().await {
        Ok(meta) => println!(
            "version: {} {} (API {}, {}/{})",
            meta.name, meta.version, meta.api_version, meta.os, meta.arch
        ),
        Err(e) => println!("version: unavailable ({})", e),
    }
}

async fn run_container(args: RunArgs) -> Result<()> {
    let spec = build_spec(&args)?.build()?;

    let orchestrator = Orchestrator::connect_local()?;
    // Ctrl-C at any point ends the wait or the hold, and the container is
    // still removed below.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => on_interrupt.cancel(),
            Err(e) => tracing::warn!(error = %e, "cannot listen for Ctrl-C"),
        }
    });

    println!("Starting {}...", spec.image());
    let container = orchestrator.start_with(spec, &cancel).await?;

    let held = match report(&container).await {
        Ok(()) if args.hold => {
            println!("Holding container; press Ctrl-C to remove it");
            cancel.cancelled().await;
            Ok(())
        }
        other => other,
    };

    match container.remove().await {
        Ok(()) => {
            println!("Removed {}", container.id().short());
            held
        }
        Err(e) => held.and(Err(e.into())),
    }
}

/// Spec file or image, with command-line flags layered on top.
fn build_spec(args: &RunArgs) -> Result<ContainerBuilder> {
    let mut builder = match (&args.image, &args.file) {
        (Some(image), _) => ContainerBuilder::new(image.clone()),
        (None, Some(path)) => SpecFile::load(path)?.into_builder()?,
        (None, None) => {
            let cwd = env::current_dir()?;
            SpecFile::discover(&cwd)?.into_builder()?
        }
    };

    builder = builder
        .with_exposed_ports(args.ports.iter())
        .with_envs(args.env.iter().cloned());
    if !args.command.is_empty() {
        builder = builder.with_command(args.command.iter().cloned());
    }
    if let Some(name) = &args.name {
        builder = builder.with_name(name.clone());
    }
    if let Some(network) = &args.network {
        builder = builder.with_network(network.clone());
    }
    if args.privileged {
        builder = builder.with_privileged(true);
    }

    if let Some(strategy) = wait_strategy(&args.wait)? {
        builder = builder.with_wait(strategy);
    }
    if let Some(timeout) = args.timeout {
        builder = builder.with_wait_timeout(timeout);
    }
    Ok(builder)
}

/// Network probes target mapped ports; the container network is often not
/// routable from the host.
fn wait_strategy(args: &WaitArgs) -> Result<Option<WaitStrategy>> {
    let strategy = if let Some(message) = &args.wait_log {
        WaitStrategy::log(message.clone())
    } else if let Some(pattern) = &args.wait_regex {
        WaitStrategy::log_regex(pattern)
            .map_err(|e| Error::InvalidSpec(format!("--wait-regex: {}", e)))?
    } else if let Some(port) = args.wait_http {
        WaitStrategy::new(HttpCheck::new(port).using_mapped_port())
    } else if let Some(port) = args.wait_tcp {
        WaitStrategy::new(TcpPortOpen::new(port).using_mapped_port())
    } else if args.wait_healthy {
        WaitStrategy::healthy()
    } else if args.no_wait {
        WaitStrategy::none()
    } else {
        return Ok(None);
    };
    Ok(Some(strategy))
}

async fn report(container: &StartedContainer) -> Result<()> {
    println!("Container {} is ready", container.id().short());
    for port in container.exposed_ports() {
        let host_port = container.mapped_port(*port).await?;
        println!("  {} -> {}:{}", port, container.host(), host_port);
    }
    if let Ok(address) = container.address().await {
        println!("  address: {}", address);
    }
    Ok(())
}
