// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Trade signal worker: polls positions, diffs snapshots, notifies.

use super::message::format_event;
use super::snapshot::{diff, NotificationEvent, PositionSnapshot};
use crate::config::Config;
use crate::gateway::{FacadeError, TradingFacade};
use crate::notify::{NotificationSink, SettingsStore};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SignalConfig {
    pub interval: Duration,
    /// How far back deal history is requested each cycle.
    pub deal_lookback: chrono::Duration,
    pub price_decimals: u32,
}

impl SignalConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.signal_interval(),
            deal_lookback: config.deal_lookback(),
            price_decimals: config.price_decimals,
        }
    }
}

pub struct SignalWorker {
    facade: Arc<dyn TradingFacade>,
    sink: Arc<dyn NotificationSink>,
    settings: SettingsStore,
    config: SignalConfig,
    baseline: Option<PositionSnapshot>,
}

impl SignalWorker {
    pub fn new(
        facade: Arc<dyn TradingFacade>,
        sink: Arc<dyn NotificationSink>,
        settings: SettingsStore,
        config: SignalConfig,
    ) -> Self {
        Self {
            facade,
            sink,
            settings,
            config,
            baseline: None,
        }
    }

    /// Snapshot the next cycle will diff against.
    #[cfg(test)]
    pub fn baseline(&self) -> Option<&PositionSnapshot> {
        self.baseline.as_ref()
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            "📡 Trade signal worker started (polling every {:?})",
            self.config.interval
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.run_cycle().await {
                warn!("⚠️ Signal cycle skipped, baseline kept: {}", e);
            }
        }

        info!("📡 Trade signal worker stopped");
    }

    /// Poll, diff against the baseline, deliver and advance the baseline.
    ///
    /// The first successful cycle only records the baseline. A failed fetch
    /// leaves the baseline untouched so nothing is lost or invented.
    pub async fn run_cycle(&mut self) -> Result<Vec<NotificationEvent>, FacadeError> {
        let now = Utc::now();
        let positions = self.facade.list_open_positions().await?;
        let deals = self
            .facade
            .list_recent_deals(now - self.config.deal_lookback)
            .await?;
        let current = PositionSnapshot::new(positions);

        let events = match self.baseline.take() {
            Some(previous) => diff(&previous, &current, &deals, now),
            None => {
                info!(
                    "📡 Signal baseline established with {} open positions",
                    current.len()
                );
                Vec::new()
            }
        };
        self.baseline = Some(current);

        if !events.is_empty() {
            self.deliver(&events).await;
        }
        Ok(events)
    }

    async fn deliver(&self, events: &[NotificationEvent]) {
        let settings = self.settings.current().await;
        let now = Utc::now();

        for event in events {
            if !settings.allows(event.kind()) {
                debug!(
                    "{:?} signal for #{} not sent (disabled)",
                    event.kind(),
                    event.position_id()
                );
                continue;
            }
            let Some(message) = format_event(event, self.config.price_decimals, now) else {
                debug!("No visible change for #{}, nothing sent", event.position_id());
                continue;
            };
            if !self.sink.send(&message).await {
                warn!(
                    "Failed to deliver {:?} signal for #{}",
                    event.kind(),
                    event.position_id()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{deal, position, Call, FakeFacade};
    use crate::gateway::types::DealKind;
    use crate::gateway::{DealEntry, Side};
    use crate::notify::testing::RecordingSink;
    use crate::notify::CredentialsUpdate;

    struct Harness {
        facade: Arc<FakeFacade>,
        sink: Arc<RecordingSink>,
        settings: SettingsStore,
        worker: SignalWorker,
        _dir: tempfile::TempDir,
    }

    async fn harness(enabled: bool) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let settings = SettingsStore::load(dir.path().join("signal_config.json"), None);
        if enabled {
            settings
                .update_credentials(CredentialsUpdate {
                    bot_token: "t".to_string(),
                    chat_id: "1".to_string(),
                    ..CredentialsUpdate::default()
                })
                .await
                .unwrap();
            settings.set_enabled(true).await.unwrap();
        }
        let facade = Arc::new(FakeFacade::new());
        let sink = Arc::new(RecordingSink::new());
        let worker = SignalWorker::new(
            facade.clone(),
            sink.clone(),
            settings.clone(),
            SignalConfig {
                interval: Duration::from_millis(10),
                deal_lookback: chrono::Duration::days(36_500),
                price_decimals: 5,
            },
        );
        Harness {
            facade,
            sink,
            settings,
            worker,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_first_cycle_only_sets_baseline() {
        let mut h = harness(true).await;
        for ticket in 1..=3 {
            h.facade.insert_position(position(ticket, "EURUSD", Side::Buy, 1.1));
        }

        let events = h.worker.run_cycle().await.unwrap();

        assert!(events.is_empty());
        assert!(h.sink.messages().is_empty());
        let baseline = h.worker.baseline().unwrap();
        assert_eq!(baseline.tickets().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_open_modify_close_are_notified() {
        let mut h = harness(true).await;
        let mut p = position(1, "EURUSD", Side::Buy, 1.1);
        p.stop_loss = Some(1.0950);
        h.facade.insert_position(p);
        h.worker.run_cycle().await.unwrap();

        h.facade.set_stop_loss(1, Some(1.0970));
        h.facade.insert_position(position(2, "GBPUSD", Side::Sell, 1.27));
        h.facade.set_deals(vec![deal(2, DealEntry::In, DealKind::Sell, 1.27, 0.0)]);
        let events = h.worker.run_cycle().await.unwrap();
        assert_eq!(events.len(), 2);

        h.facade.remove_position(1);
        h.facade.set_deals(vec![deal(1, DealEntry::Out, DealKind::Sell, 1.1070, 70.0)]);
        let events = h.worker.run_cycle().await.unwrap();
        assert_eq!(events.len(), 1);

        let messages = h.sink.messages();
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().any(|m| m.contains("New Trade Opened") && m.contains("#ES2")));
        assert!(messages.iter().any(|m| m.contains("New SL</b>: 1.09700 (was 1.09500)")));
        assert!(messages.iter().any(|m| m.contains("Trade Closed") && m.contains("70.00")));
    }

    #[tokio::test]
    async fn test_disabled_kind_is_not_sent() {
        let mut h = harness(true).await;
        h.settings
            .update_credentials(CredentialsUpdate {
                bot_token: "t".to_string(),
                chat_id: "1".to_string(),
                send_open: Some(false),
                ..CredentialsUpdate::default()
            })
            .await
            .unwrap();
        h.worker.run_cycle().await.unwrap();

        h.facade.insert_position(position(4, "EURUSD", Side::Buy, 1.1));
        let events = h.worker.run_cycle().await.unwrap();

        assert_eq!(events.len(), 1);
        assert!(h.sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_globally_disabled_sends_nothing_but_advances_baseline() {
        let mut h = harness(false).await;
        h.worker.run_cycle().await.unwrap();
        h.facade.insert_position(position(4, "EURUSD", Side::Buy, 1.1));

        assert_eq!(h.worker.run_cycle().await.unwrap().len(), 1);
        assert!(h.sink.messages().is_empty());
        assert!(h.worker.run_cycle().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_baseline() {
        let mut h = harness(true).await;
        h.facade.insert_position(position(1, "EURUSD", Side::Buy, 1.1));
        h.worker.run_cycle().await.unwrap();

        h.facade.fail_listing(true);
        assert!(h.worker.run_cycle().await.is_err());
        assert_eq!(h.worker.baseline().unwrap().len(), 1);

        h.facade.fail_listing(false);
        assert!(h.worker.run_cycle().await.unwrap().is_empty());
        assert!(h.sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_listing_emits_nothing() {
        let mut h = harness(true).await;
        h.facade.insert_position(position(1, "EURUSD", Side::Buy, 1.1));
        h.facade.insert_position(position(2, "GBPUSD", Side::Sell, 1.27));
        h.worker.run_cycle().await.unwrap();

        h.facade.invalid_listing(true);
        assert!(matches!(
            h.worker.run_cycle().await,
            Err(FacadeError::InvalidRecord { .. })
        ));
        h.facade.invalid_listing(false);
        let events = h.worker.run_cycle().await.unwrap();

        assert!(events.is_empty());
        assert!(h.sink.messages().is_empty());
        assert_eq!(h.worker.baseline().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_stop_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SettingsStore::load(dir.path().join("signal_config.json"), None);
        settings
            .update_credentials(CredentialsUpdate {
                bot_token: "t".to_string(),
                chat_id: "1".to_string(),
                ..CredentialsUpdate::default()
            })
            .await
            .unwrap();
        settings.set_enabled(true).await.unwrap();
        let facade = Arc::new(FakeFacade::new());
        let sink = Arc::new(RecordingSink::failing());
        let mut worker = SignalWorker::new(
            facade.clone(),
            sink.clone(),
            settings,
            SignalConfig {
                interval: Duration::from_millis(10),
                deal_lookback: chrono::Duration::days(36_500),
                price_decimals: 5,
            },
        );

        worker.run_cycle().await.unwrap();
        facade.insert_position(position(1, "EURUSD", Side::Buy, 1.1));
        facade.insert_position(position(2, "EURUSD", Side::Buy, 1.1));

        assert_eq!(worker.run_cycle().await.unwrap().len(), 2);
        assert_eq!(sink.messages().len(), 2);
        assert_eq!(worker.baseline().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let h = harness(false).await;
        let facade = h.facade.clone();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(h.worker.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(35)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let polls = facade.calls().len();
        assert!(polls >= 2);
        assert!(facade.calls().contains(&Call::ListPositions));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(facade.calls().len(), polls);
    }
}
