// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Starts and stops the background workers as one unit.

use crate::gateway::TradingFacade;
use crate::notify::{NotificationSink, SettingsStore};
use crate::position::{JobRegistry, TrailingStopConfig, TrailingStopWorker};
use crate::signals::{SignalConfig, SignalWorker};
use futures_util::future::join_all;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

struct Running {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

pub struct WorkerSupervisor {
    facade: Arc<dyn TradingFacade>,
    registry: Arc<JobRegistry>,
    sink: Arc<dyn NotificationSink>,
    settings: SettingsStore,
    trailing: TrailingStopConfig,
    signals: SignalConfig,
    running: Mutex<Option<Running>>,
}

impl WorkerSupervisor {
    pub fn new(
        facade: Arc<dyn TradingFacade>,
        registry: Arc<JobRegistry>,
        sink: Arc<dyn NotificationSink>,
        settings: SettingsStore,
        trailing: TrailingStopConfig,
        signals: SignalConfig,
    ) -> Self {
        Self {
            facade,
            registry,
            sink,
            settings,
            trailing,
            signals,
            running: Mutex::new(None),
        }
    }

    /// Spawn both workers. A second call while running is a no-op.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            warn!("Workers already running, start ignored");
            return;
        }

        let shutdown = CancellationToken::new();
        let trailing = TrailingStopWorker::new(
            Arc::clone(&self.facade),
            Arc::clone(&self.registry),
            self.trailing.clone(),
        );
        let signals = SignalWorker::new(
            Arc::clone(&self.facade),
            Arc::clone(&self.sink),
            self.settings.clone(),
            self.signals.clone(),
        );

        let handles = vec![
            tokio::spawn(trailing.run(shutdown.clone())),
            tokio::spawn(signals.run(shutdown.clone())),
        ];
        *running = Some(Running { shutdown, handles });
        info!("✅ Background workers started");
    }

    /// Signal both workers and wait for them to exit.
    ///
    /// A job already being processed finishes first; nothing new starts.
    pub async fn stop(&self) {
        let Some(Running { shutdown, handles }) = self.running.lock().await.take() else {
            return;
        };

        info!("🛑 Stopping background workers...");
        shutdown.cancel();
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!("Worker task ended abnormally: {}", e);
            }
        }
        info!("Background workers stopped");
    }

    #[cfg(test)]
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}
