//! Command implementations for the cdnet CLI

pub mod listen;
pub mod relay;
pub mod send;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use cdnet_client::ClientOptions;
use cdnet_config::{ClientConfig, Config, ServerConfig};
use cdnet_protocol::{AuthFile, ParseOptions, SecurityLevel};
use cdnet_sources::CollectdUdpSourceConfig;
use tokio::signal;
use tracing::info;

/// Config files tried when `--config` is not given
const DEFAULT_CONFIG_PATHS: &[&str] = &["cdnet.toml", "configs/cdnet.toml"];

/// Load configuration
///
/// An explicit path must exist; otherwise the default paths are tried and
/// built-in defaults used if none exists.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        return Config::from_file(path).context("failed to load configuration");
    }

    for path in DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from) {
        if path.exists() {
            return Config::from_file(&path)
                .with_context(|| format!("failed to load configuration from {}", path.display()));
        }
    }

    Ok(Config::default())
}

/// Map the config security level onto the protocol one
pub fn security_level(level: cdnet_config::SecurityLevel) -> SecurityLevel {
    match level {
        cdnet_config::SecurityLevel::None => SecurityLevel::None,
        cdnet_config::SecurityLevel::Sign => SecurityLevel::Sign,
        cdnet_config::SecurityLevel::Encrypt => SecurityLevel::Encrypt,
    }
}

/// Client options from `[client]`
pub fn client_options(config: &ClientConfig) -> ClientOptions {
    ClientOptions {
        buffer_size: config.buffer_size,
        security_level: security_level(config.security_level),
        username: config.username.clone(),
        password: config.password.clone(),
    }
}

/// Source configuration from `[server]`
pub fn source_config(config: &ServerConfig) -> CollectdUdpSourceConfig {
    let mut parse_options =
        ParseOptions::new().with_security_level(security_level(config.security_level));
    if let Some(path) = &config.auth_file {
        info!(auth_file = %path.display(), "using auth file");
        parse_options = parse_options.with_password_lookup(Arc::new(AuthFile::new(path)));
    }

    CollectdUdpSourceConfig {
        address: config.address.clone(),
        port: config.port,
        max_packet_size: config.max_packet_size,
        parse_options,
        ..Default::default()
    }
}

/// Wait for SIGINT or SIGTERM
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
