#![allow(missing_docs)]

//! VIP Relay binary.
//!
//! `serve` (the default) runs the webhook server; `check` logs in once and
//! prints what the relay can see of its configured guild.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use vip_relay::config::RelayConfig;
use vip_relay::logging;
use vip_relay::relay::Relay;
use vip_relay::server;

#[derive(Debug, Parser)]
#[command(name = "vip-relay", version, about = "Grant and revoke Discord VIP roles from payment webhooks")]
struct Cli {
    /// Config file (default: $VIP_RELAY_CONFIG_PATH or ./vip-relay.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the webhook server.
    Serve,
    /// Log in once and report the configured guild, roles and channels.
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is normal outside local development.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(cli.config).await,
        Command::Check => run_check(cli.config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("vip-relay: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<RelayConfig> {
    let config = RelayConfig::load(path.as_deref()).context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run_server(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let _logging = logging::init_server(config.server.logs_dir.as_deref(), &config.server.log_level)?;

    info!(version = env!("CARGO_PKG_VERSION"), "VIP relay starting");
    info!(?config, "configuration loaded");

    let relay = Arc::new(Relay::from_config(&config)?);

    // Warm the session so the first webhook does not pay for the login.
    // Failure is not fatal: the next request retries.
    if let Err(e) = relay.session().ensure_session().await {
        error!(error = %e, "initial platform login failed, will retry on demand");
    }

    server::serve(relay, &config.server.bind).await
}

async fn run_check(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    logging::init_cli(&config.server.log_level);

    let relay = Relay::from_config(&config)?;
    relay
        .session()
        .ensure_session()
        .await
        .context("platform login failed")?;
    let report = relay.diagnostics().await?;

    // A lookup rejected with 401 during diagnostics drops the session.
    let session = relay
        .session()
        .current()
        .await
        .context("platform session was revoked during the check")?;

    println!("bot:      {}", session.bot.tag());
    println!("since:    {}", session.established_at.to_rfc3339());
    println!("guild:    {}", report.info.guild);
    println!("monthly:  {}", report.info.roles.monthly);
    println!("lifetime: {}", report.info.roles.lifetime);
    println!("logs:     {}", report.info.channels.logs);
    println!("commands: {}", report.info.channels.commands);
    Ok(())
}
