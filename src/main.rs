// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! MT5 Trail Bridge - trailing stops and trade signals for an MT5 account

mod api;
mod config;
mod gateway;
mod notify;
mod position;
mod signals;
mod supervisor;
mod telegram;

use anyhow::{anyhow, Context};
use api::AppState;
use clap::Parser;
use config::Config;
use gateway::client::GatewayConfig;
use gateway::{GatewayClient, TradingFacade};
use notify::{NotificationSink, SettingsStore};
use position::{JobRegistry, TrailingStopConfig};
use signals::SignalConfig;
use std::path::PathBuf;
use std::sync::Arc;
use supervisor::WorkerSupervisor;
use telegram::TelegramNotifier;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "mt5-trail-bridge", about = "Trailing stop and trade signal bridge for MT5")]
struct Cli {
    /// Address the HTTP API listens on (overrides BIND_ADDR)
    #[arg(long)]
    bind: Option<String>,

    /// Notification settings file (overrides SIGNAL_CONFIG_PATH)
    #[arg(long)]
    signal_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    info!("🚀 MT5 Trail Bridge starting...");

    let mut config = Config::from_env().map_err(|e| anyhow!(e))?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(path) = cli.signal_config {
        config.signal_config_path = path;
    }

    info!("📡 Gateway: {}", config.gateway_url);
    info!(
        "📉 Trailing every {:?}, signals every {:?}",
        config.trailing_interval(),
        config.signal_interval()
    );
    if config.api_auth_token.is_none() {
        warn!("⚠️ MT5_API_AUTH_TOKEN not set, authenticated endpoints will refuse requests");
    }

    let facade: Arc<dyn TradingFacade> = Arc::new(
        GatewayClient::new(&GatewayConfig {
            base_url: config.gateway_url.clone(),
            timeout: config.gateway_timeout(),
        })
        .context("failed to build gateway client")?,
    );

    let seed = config
        .telegram_token
        .clone()
        .zip(config.telegram_chat_id.clone());
    let settings = SettingsStore::load(config.signal_config_path.clone(), seed);
    let sink: Arc<dyn NotificationSink> = Arc::new(TelegramNotifier::new(settings.clone()));
    let registry = Arc::new(JobRegistry::new(Arc::clone(&facade)));

    let supervisor = WorkerSupervisor::new(
        Arc::clone(&facade),
        Arc::clone(&registry),
        Arc::clone(&sink),
        settings.clone(),
        TrailingStopConfig::from_config(&config),
        SignalConfig::from_config(&config),
    );
    supervisor.start().await;

    let state = Arc::new(AppState {
        registry,
        facade,
        settings,
        sink,
        auth_token: config.api_auth_token.clone(),
        register_attempts: config.register_retry_attempts,
        register_delay: config.register_retry_delay(),
    });

    let served = api::serve(&config.bind_addr, state, shutdown_signal()).await;

    supervisor.stop().await;
    served.with_context(|| format!("API server on {} failed", config.bind_addr))?;

    info!("👋 Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("🛑 Received Ctrl+C, shutting down..."),
        _ = terminate => info!("🛑 Received SIGTERM, shutting down..."),
    }
}
