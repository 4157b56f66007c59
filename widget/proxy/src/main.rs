//! Navian Proxy
//!
//! Relays chat requests from the widget to the backend, adding the secret
//! API key on the way so it never reaches the client.
//!
//! # Usage
//!
//! ```bash
//! # Defaults from ~/.config/navian/widget.toml, key from $OPENAI_API_KEY
//! navian-proxy
//!
//! # Explicit upstream and bind address
//! navian-proxy --listen 0.0.0.0:3000 --upstream https://backend.example.com/chat
//!
//! # With verbose logging
//! RUST_LOG=debug navian-proxy
//! ```
//!
//! # Signals
//!
//! - SIGTERM/SIGINT: Graceful shutdown (in-flight streams are allowed to finish)

mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use navian_core::{load_config_from_path, default_config_path, ConfigOverrides};

use crate::server::{router, ProxyState};

/// Key-injecting SSE relay for the Navian chat widget
#[derive(Debug, Parser)]
#[command(name = "navian-proxy", version, about)]
struct Args {
    /// Config file (defaults to ~/.config/navian/widget.toml)
    #[arg(long, env = "NAVIAN_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    listen: Option<String>,

    /// Backend URL requests are forwarded to
    #[arg(long)]
    upstream: Option<String>,

    /// Route to serve
    #[arg(long)]
    path: Option<String>,

    /// Environment variable holding the API key
    #[arg(long)]
    api_key_env: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref listen) = self.listen {
            overrides = overrides.with_listen(listen.clone());
        }
        if let Some(ref upstream) = self.upstream {
            overrides = overrides.with_upstream_url(upstream.clone());
        }
        if let Some(ref path) = self.path {
            overrides = overrides.with_path(path.clone());
        }
        if let Some(ref var) = self.api_key_env {
            overrides = overrides.with_api_key_env(var.clone());
        }
        overrides
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("navian_proxy=info".parse()?)
                .add_directive("navian_core=info".parse()?),
        )
        .with_target(true)
        .init();

    let args = Args::parse();

    let mut config = load_config_from_path(args.config.clone().or_else(default_config_path))
        .context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let proxy = &config.proxy;
    let api_key = std::env::var(&proxy.api_key_env).ok();
    if api_key.as_deref().map_or(true, str::is_empty) {
        warn!(
            variable = %proxy.api_key_env,
            "API key variable is not set; requests will fail until it is"
        );
    }

    let state = Arc::new(ProxyState::new(proxy.upstream_url.clone(), api_key));
    let app = router(state, &proxy.path);

    let listener = tokio::net::TcpListener::bind(&proxy.listen)
        .await
        .with_context(|| format!("Failed to bind {}", proxy.listen))?;

    info!(
        listen = %proxy.listen,
        path = %proxy.path,
        upstream = %proxy.upstream_url,
        source = %config.source(),
        "Navian proxy listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        () = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
