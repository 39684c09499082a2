//! hass-socket
//!
//! Connects to a Home Assistant instance, authenticates, and reports the
//! server version.
//!
//! ## Usage
//!
//! ```bash
//! # Use the default config file (~/.config/hass-socket/config.toml)
//! hass-socket
//!
//! # Override the instance and token
//! hass-socket --url http://homeassistant.local:8123 --token "$HASS_TOKEN"
//!
//! # Self-signed certificate, retry forever
//! hass-socket --url https://ha.lan --ignore-certificates --max-retries -1
//! ```
//!
//! Ctrl-C raises the reconnect signal; the current attempt finishes and the
//! connection is abandoned with `ERR_CONNECTION_LOST`.

use anyhow::Context;
use clap::Parser;
use hass_socket::config::default_config_path;
use hass_socket::socket::WsConnector;
use hass_socket::{create_socket, Config, Host, TracingStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hass-socket")]
#[command(about = "Authenticate against the Home Assistant websocket API")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Home Assistant URL
    #[arg(long, env = "HASS_URL")]
    url: Option<String>,

    /// Long-lived access token
    #[arg(long, env = "HASS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Accept invalid server certificates
    #[arg(long)]
    ignore_certificates: bool,

    /// Retries after the first attempt (-1 = unlimited)
    #[arg(long, allow_negative_numbers = true)]
    max_retries: Option<i64>,

    /// Delay between attempts in milliseconds
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Write the effective config to the config path and exit
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hass_socket=info".parse()?))
        .init();

    let args = Args::parse();

    // Load config
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut config = if config_path.exists() {
        Config::load(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?
    } else {
        if args.config.is_some() {
            warn!(path = %config_path.display(), "Config file not found, using defaults");
        }
        Config::default()
    };

    // Apply CLI overrides
    if let Some(url) = args.url {
        config.hass_url = url;
    }
    if let Some(token) = args.token {
        config.access_token = token;
    }
    if args.ignore_certificates {
        config.ignore_certificates = true;
    }
    if let Some(retries) = args.max_retries {
        config.max_retries = retries;
    }
    if let Some(delay) = args.retry_delay_ms {
        config.retry_delay_ms = delay;
    }

    if args.save_config {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Config saved");
        return Ok(());
    }

    let mut auth = config
        .auth()
        .with_context(|| format!("No usable Home Assistant URL: {:?}", config.hass_url))?;
    let options = config.connect_options();

    let (reconnect_tx, reconnect_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, abandoning connection");
            let _ = reconnect_tx.send(true);
        }
    });

    let host = Host::new(Arc::new(TracingStatus), reconnect_rx);

    match create_socket(&mut auth, &WsConnector::default(), &options, &host).await {
        Ok(session) => {
            info!(ha_version = %session.ha_version(), "Connected to Home Assistant");
            println!("{}", session.ha_version());
            session.close().await;
            Ok(())
        }
        Err(e) => {
            error!(code = e.code(), error = %e, "{}", e.name());
            Err(e.into())
        }
    }
}
