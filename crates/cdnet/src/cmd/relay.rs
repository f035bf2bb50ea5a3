//! Relay command - receive on [server], forward through [client]
//!
//! Value lists are re-encoded, so the relay can change the security level
//! between the two sides (e.g. accept plain text locally, forward
//! encrypted). Partially filled datagrams are flushed every
//! `client.flush_interval`.

use std::sync::Arc;

use anyhow::{Context, Result};
use cdnet_client::Client;
use cdnet_config::Config;
use cdnet_sources::CollectdUdpSource;
use clap::Args;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cmd::{client_options, source_config, wait_for_shutdown};

#[derive(Args, Debug)]
pub struct RelayArgs {
    /// Forward to this server (overrides [client].server)
    #[arg(short, long)]
    server: Option<String>,

    /// Listen port (overrides [server].port)
    #[arg(short, long)]
    port: Option<u16>,
}

pub async fn run(args: RelayArgs, mut config: Config) -> Result<()> {
    if let Some(server) = args.server {
        config.client.server = server;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let client = Arc::new(
        Client::connect(&config.client.server, client_options(&config.client))
            .await
            .with_context(|| format!("failed to connect to {}", config.client.server))?,
    );
    let source = Arc::new(CollectdUdpSource::new(
        source_config(&config.server),
        Arc::clone(&client),
    ));
    let cancel = CancellationToken::new();

    info!(
        listen = %config.server.bind_address(),
        forward = %client.server_addr(),
        flush_interval = ?config.client.flush_interval,
        "relay starting"
    );

    let mut source_task = tokio::spawn({
        let source = Arc::clone(&source);
        let cancel = cancel.clone();
        async move { source.run(cancel).await }
    });

    let flush_task = tokio::spawn({
        let client = Arc::clone(&client);
        let cancel = cancel.clone();
        let period = config.client.flush_interval;
        async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = client.flush().await {
                            warn!(error = %e, "periodic flush failed");
                        }
                    }
                }
            }
        }
    });

    let result = tokio::select! {
        // Source exited on its own: bind failure
        result = &mut source_task => result.map_err(anyhow::Error::from),
        _ = wait_for_shutdown() => {
            info!("shutdown signal received");
            cancel.cancel();
            (&mut source_task).await.map_err(anyhow::Error::from)
        }
    };
    cancel.cancel();
    flush_task.await?;
    result??;

    client.flush().await.context("final flush failed")?;

    let received = source.metrics().snapshot();
    let sent = client.metrics().snapshot();
    info!(
        packets_received = received.packets_received,
        value_lists_received = received.value_lists_decoded,
        decode_errors = received.decode_errors,
        datagrams_sent = sent.datagrams_sent,
        send_errors = sent.send_errors,
        "relay finished"
    );

    Ok(())
}
