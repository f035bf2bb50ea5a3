//! cdnet - collectd network protocol tool
//!
//! # Usage
//!
//! ```bash
//! # Send one value list
//! cdnet send --plugin load --type load --gauge 0.42 --gauge 0.38 --gauge 0.30
//!
//! # Print everything received on the configured port
//! cdnet listen --config cdnet.toml
//!
//! # Receive and forward to [client].server
//! cdnet relay --config cdnet.toml
//! ```

mod cmd;

use anyhow::Result;
use cdnet_config::{LogFormat, LogLevel};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// cdnet - send, receive and relay collectd network packets
#[derive(Parser, Debug)]
#[command(name = "cdnet")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true, env = "CDNET_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<LogLevel>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one value list
    Send(cmd::send::SendArgs),

    /// Print received value lists on stdout
    Listen(cmd::listen::ListenArgs),

    /// Forward received value lists to another server
    Relay(cmd::relay::RelayArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = cmd::load_config(cli.config.as_deref())?;
    init_logging(&config.log.filter(cli.log_level), config.log.format)?;

    match cli.command {
        Command::Send(args) => cmd::send::run(args, config).await,
        Command::Listen(args) => cmd::listen::run(args, config).await,
        Command::Relay(args) => cmd::relay::run(args, config).await,
    }
}

/// Install the global subscriber, writing to stderr
fn init_logging(directives: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(directives)
        .map_err(|e| anyhow::anyhow!("invalid log filter '{directives}': {e}"))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Console => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    Ok(())
}
