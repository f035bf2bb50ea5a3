//! Listen command - print received value lists
//!
//! One line per value list on stdout:
//!
//! ```text
//! web-01/cpu-0/percent-idle 2024-01-01T00:00:00+00:00 gauge=97.5
//! ```

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use cdnet_config::Config;
use cdnet_protocol::{ValueList, Writer};
use cdnet_sources::CollectdUdpSource;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cmd::{source_config, wait_for_shutdown};

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Bind address (overrides [server].address)
    #[arg(short, long)]
    address: Option<String>,

    /// Listen port (overrides [server].port)
    #[arg(short, long)]
    port: Option<u16>,
}

/// Writes value lists to stdout
struct StdoutWriter;

#[async_trait]
impl Writer for StdoutWriter {
    type Error = io::Error;

    async fn write(&self, vl: &ValueList) -> Result<(), io::Error> {
        let mut out = io::stdout().lock();
        writeln!(out, "{vl}")?;
        out.flush()
    }
}

pub async fn run(args: ListenArgs, mut config: Config) -> Result<()> {
    if let Some(address) = args.address {
        config.server.address = address;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let source = Arc::new(CollectdUdpSource::new(
        source_config(&config.server),
        Arc::new(StdoutWriter),
    ));
    let cancel = CancellationToken::new();

    let mut task = tokio::spawn({
        let source = Arc::clone(&source);
        let cancel = cancel.clone();
        async move { source.run(cancel).await }
    });

    tokio::select! {
        // Source exited on its own: bind failure
        result = &mut task => result??,
        _ = wait_for_shutdown() => {
            info!("shutdown signal received");
            cancel.cancel();
            task.await??;
        }
    }

    let snapshot = source.metrics().snapshot();
    info!(
        packets = snapshot.packets_received,
        value_lists = snapshot.value_lists_decoded,
        decode_errors = snapshot.decode_errors,
        "listen finished"
    );

    Ok(())
}
