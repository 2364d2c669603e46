use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use opa_rate_agent::appliance::Session;
use opa_rate_agent::config::{Config, Overrides};
use opa_rate_agent::policy::{self, OpaClient};
use opa_rate_agent::reconcile::Reconciler;

/// Rate-limit policy agent
///
/// Polls an Open Policy Agent data store for bandwidth and connection-rate
/// tiers and reconciles the matching rate-limit templates onto a managed
/// appliance.
#[derive(Parser, Debug)]
#[command(name = "opa-rate-agent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/agent.yaml")]
    config: PathBuf,

    /// IP or FQDN of the policy source (overrides the config file)
    #[arg(long)]
    policy_host: Option<String>,

    /// Policy source API port
    #[arg(long)]
    policy_port: Option<u16>,

    /// IP or FQDN of the managed appliance
    #[arg(long)]
    appliance_host: Option<String>,

    /// Appliance API port
    #[arg(long)]
    appliance_port: Option<u16>,

    /// Identifier this appliance is listed under in the policy document
    #[arg(long)]
    device_id: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

const EXIT_OK: i32 = 0;
const EXIT_STARTUP_FAILURE: i32 = 1;
const EXIT_SIGNALLED: i32 = 2;

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: failed to start async runtime: {err}");
            std::process::exit(EXIT_STARTUP_FAILURE);
        }
    };

    match runtime.block_on(run(args)) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(EXIT_STARTUP_FAILURE);
        }
    }
}

/// Initialize logging
fn init_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

async fn run(args: Args) -> Result<i32> {
    tracing::info!("Rate-limit policy agent starting");

    // Config file first, then command-line overrides, then validation.
    // Anything wrong here is fatal before a single connection is opened.
    let mut config = Config::load(&args.config)?;
    config.apply_overrides(&Overrides {
        policy_host: args.policy_host,
        policy_port: args.policy_port,
        appliance_host: args.appliance_host,
        appliance_port: args.appliance_port,
        device_id: args.device_id,
    });
    config.validate().context("Invalid configuration")?;

    // Connect to the appliance.
    let mut session = Session::login(
        &config.appliance.address(),
        &config.appliance.username,
        &config.appliance.password,
    )
    .await
    .with_context(|| format!("Failed to log in to appliance {}", config.appliance.address()))?;
    tracing::info!("Connected to appliance at {}", session.address());

    match session.version_info().await {
        Ok(info) => tracing::info!(
            "Appliance software {} on {}",
            info.software_version,
            info.hardware_platform
        ),
        Err(err) => tracing::warn!("Could not read appliance version: {err}"),
    }

    // Connect to the policy source and make sure the network policy
    // sections are there. Missing sections only warn (the store may carry
    // other policies), but an unreachable store is a startup failure.
    let opa = OpaClient::new(&config.policy_source.host, config.policy_source.port)?;
    policy::rules::check_network_sections(&opa)
        .await
        .context("Failed initial policy fetch")?;

    let reconciler = Reconciler::new(session.clone(), opa, config.clone());

    tokio::select! {
        _ = reconciler.run() => Ok(EXIT_OK),
        _ = shutdown_signal() => {
            tracing::info!("Shutdown requested, logging off appliance session");
            if let Err(err) = session.logoff().await {
                tracing::warn!("Logoff failed: {err}");
            }
            tracing::info!("Rate-limit policy agent ending");
            Ok(EXIT_SIGNALLED)
        }
    }
}

/// Wait for an interrupt or termination signal.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(err) => {
            tracing::warn!("Could not install SIGTERM handler: {err}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
