//! Send command - write one value list to a collectd server
//!
//! # Usage
//!
//! ```bash
//! # Defaults: [client] section of the config, host "localhost"
//! cdnet send --plugin cpu --type percent --type-instance idle --gauge 97.5
//!
//! # Custom server, signed with the configured credentials
//! cdnet send --server 192.168.1.100:25826 --plugin interface \
//!     --plugin-instance eth0 --type if_octets --derive 1024 --derive 2048
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use cdnet_client::Client;
use cdnet_config::Config;
use cdnet_protocol::{Identifier, Value, ValueList};
use clap::Args;
use tracing::info;

use crate::cmd::client_options;

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Server address (overrides [client].server)
    #[arg(short, long)]
    server: Option<String>,

    /// Host name
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Plugin name
    #[arg(short, long)]
    plugin: String,

    /// Plugin instance
    #[arg(long, default_value = "")]
    plugin_instance: String,

    /// Type name (from collectd's types.db)
    #[arg(short = 't', long = "type")]
    type_: String,

    /// Type instance
    #[arg(long, default_value = "")]
    type_instance: String,

    /// Collection interval in seconds
    #[arg(short, long, default_value = "10")]
    interval: u64,

    /// Gauge values
    #[arg(long, allow_negative_numbers = true)]
    gauge: Vec<f64>,

    /// Derive values
    #[arg(long, allow_negative_numbers = true)]
    derive: Vec<i64>,

    /// Counter values
    #[arg(long)]
    counter: Vec<u64>,
}

impl SendArgs {
    /// Values in order: gauges, then derives, then counters
    fn values(&self) -> Vec<Value> {
        self.gauge
            .iter()
            .copied()
            .map(Value::Gauge)
            .chain(self.derive.iter().copied().map(Value::Derive))
            .chain(self.counter.iter().copied().map(Value::Counter))
            .collect()
    }

    fn value_list(&self) -> Result<ValueList> {
        let values = self.values();
        if values.is_empty() {
            anyhow::bail!("at least one of --gauge, --derive or --counter is required");
        }

        let identifier = Identifier::new(&self.host, &self.plugin, &self.type_)
            .with_plugin_instance(&self.plugin_instance)
            .with_type_instance(&self.type_instance);

        Ok(ValueList::new(identifier)
            .with_interval(Duration::from_secs(self.interval))
            .with_values(values))
    }
}

pub async fn run(args: SendArgs, config: Config) -> Result<()> {
    let vl = args.value_list()?;
    let server = args.server.as_deref().unwrap_or(&config.client.server);

    let client = Client::connect(server, client_options(&config.client))
        .await
        .with_context(|| format!("failed to connect to {server}"))?;

    client.write(&vl).await.context("failed to encode value list")?;
    let metrics = client.metrics().clone();
    client.close().await.context("failed to send datagram")?;

    let snapshot = metrics.snapshot();
    info!(
        server = %server,
        identifier = %vl.identifier,
        bytes = snapshot.bytes_sent,
        "value list sent"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        args: SendArgs,
    }

    fn parse(argv: &[&str]) -> SendArgs {
        Cli::try_parse_from(std::iter::once("send").chain(argv.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn test_value_list_from_args() {
        let args = parse(&[
            "--host",
            "web-01",
            "--plugin",
            "interface",
            "--plugin-instance",
            "eth0",
            "--type",
            "if_octets",
            "--derive",
            "1024",
            "--derive",
            "-5",
        ]);

        let vl = args.value_list().unwrap();

        assert_eq!(vl.identifier.to_string(), "web-01/interface-eth0/if_octets");
        assert_eq!(vl.values, vec![Value::Derive(1024), Value::Derive(-5)]);
        assert_eq!(vl.interval, Duration::from_secs(10));
    }

    #[test]
    fn test_value_order() {
        let args = parse(&[
            "-p", "x", "-t", "y", "--counter", "3", "--gauge", "1.5", "--derive", "2",
        ]);

        assert_eq!(
            args.values(),
            vec![Value::Gauge(1.5), Value::Derive(2), Value::Counter(3)]
        );
    }

    #[test]
    fn test_no_values_rejected() {
        let args = parse(&["--plugin", "cpu", "--type", "percent"]);
        assert!(args.value_list().is_err());
    }
}
