// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Trailing stop-loss worker.

use crate::config::Config;
use crate::gateway::{FacadeError, TradingFacade};
use crate::position::{JobRegistry, TrailingStopJob};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Trailing stop worker configuration.
#[derive(Debug, Clone)]
pub struct TrailingStopConfig {
    /// Time between scans.
    pub interval: Duration,
    /// Decimals stop prices are rounded to before comparison and submission.
    pub price_decimals: u32,
}

impl TrailingStopConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.trailing_interval(),
            price_decimals: config.price_decimals,
        }
    }
}

/// What happened to one job during a scan.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Position closed externally, job dropped.
    Pruned,
    /// No usable quote this cycle.
    NoQuote,
    /// Job was removed or replaced while the scan was running.
    Detached,
    /// Candidate stop is not better than the current one.
    Held { candidate: f64 },
    /// Stop-loss moved.
    Moved { from: Option<f64>, to: f64 },
}

/// Per-scan counters.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScanSummary {
    pub jobs: usize,
    pub moved: usize,
    pub pruned: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub fn round_price(price: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (price * factor).round() / factor
}

/// Periodically ratchets the stop-loss of every registered position.
pub struct TrailingStopWorker {
    facade: Arc<dyn TradingFacade>,
    registry: Arc<JobRegistry>,
    config: TrailingStopConfig,
}

impl TrailingStopWorker {
    pub fn new(
        facade: Arc<dyn TradingFacade>,
        registry: Arc<JobRegistry>,
        config: TrailingStopConfig,
    ) -> Self {
        Self {
            facade,
            registry,
            config,
        }
    }

    /// Run scans on the configured interval until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "📊 Trailing stop worker started (checking every {:?})",
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

            let summary = self.scan(&shutdown).await;
            if summary.jobs > 0 {
                debug!("Trailing scan finished: {:?}", summary);
            }
        }

        info!("📊 Trailing stop worker stopped");
    }

    /// One pass over the registry. Stops between jobs once `shutdown` fires.
    pub async fn scan(&self, shutdown: &CancellationToken) -> ScanSummary {
        let jobs = self.registry.snapshot().await;
        let mut summary = ScanSummary {
            jobs: jobs.len(),
            ..ScanSummary::default()
        };

        for job in jobs {
            if shutdown.is_cancelled() {
                debug!("Stop requested, leaving remaining jobs for the next run");
                break;
            }

            match self.process_job(&job).await {
                Ok(JobOutcome::Moved { .. }) => summary.moved += 1,
                Ok(JobOutcome::Pruned) => summary.pruned += 1,
                Ok(JobOutcome::Held { .. }) => {}
                Ok(JobOutcome::NoQuote | JobOutcome::Detached) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        "⚠️ Trailing stop for #{} ({}) failed, retrying next cycle: {}",
                        job.position_id, job.symbol, e
                    );
                }
            }
        }

        summary
    }

    /// Recompute and, if it improves, submit the stop for a single job.
    pub async fn process_job(&self, job: &TrailingStopJob) -> Result<JobOutcome, FacadeError> {
        let Some(position) = self.facade.get_position(job.position_id).await? else {
            self.registry.prune(job).await;
            return Ok(JobOutcome::Pruned);
        };

        let Some(tick) = self.facade.get_tick(&position.symbol).await? else {
            debug!("No quote for {}, skipping #{}", position.symbol, job.position_id);
            return Ok(JobOutcome::NoQuote);
        };

        let price = job.direction.reference_price(&tick);
        let Some(mark) = self.registry.advance_high_water_mark(job, price).await else {
            return Ok(JobOutcome::Detached);
        };

        let candidate = round_price(
            job.direction.trail(mark, job.trailing_distance),
            self.config.price_decimals,
        );
        if !job.direction.improves(candidate, position.stop_loss) {
            return Ok(JobOutcome::Held { candidate });
        }

        self.facade
            .modify_stop_loss(
                job.position_id,
                &position.symbol,
                candidate,
                position.take_profit,
            )
            .await?;

        info!(
            "🔒 Stop moved for #{} {}: {:?} -> {} (mark {})",
            job.position_id, position.symbol, position.stop_loss, candidate, mark
        );
        Ok(JobOutcome::Moved {
            from: position.stop_loss,
            to: candidate,
        })
    }
}
