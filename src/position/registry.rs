// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Registry of active trailing-stop jobs keyed by position ticket.

use crate::gateway::{Side, Tick, TradingFacade};
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Which way the protective stop trails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl From<Side> for Direction {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => Direction::Long,
            Side::Sell => Direction::Short,
        }
    }
}

impl Direction {
    /// Price a position on this side would be closed at.
    pub fn reference_price(self, tick: &Tick) -> f64 {
        match self {
            Direction::Long => tick.bid,
            Direction::Short => tick.ask,
        }
    }

    /// Monotonic high-water mark update.
    pub fn advance(self, mark: f64, price: f64) -> f64 {
        match self {
            Direction::Long => mark.max(price),
            Direction::Short => mark.min(price),
        }
    }

    /// Stop level `distance` behind the mark.
    pub fn trail(self, mark: f64, distance: f64) -> f64 {
        match self {
            Direction::Long => mark - distance,
            Direction::Short => mark + distance,
        }
    }

    /// True when `candidate` protects more than `current`; an unset stop is
    /// always improved upon.
    pub fn improves(self, candidate: f64, current: Option<f64>) -> bool {
        match (self, current) {
            (_, None) => true,
            (Direction::Long, Some(current)) => candidate > current,
            (Direction::Short, Some(current)) => candidate < current,
        }
    }
}

/// A registered trailing stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrailingStopJob {
    pub position_id: u64,
    pub symbol: String,
    pub trailing_distance: f64,
    pub direction: Direction,
    pub high_water_mark: f64,
    /// Distinguishes a re-added job from the one a scan started with.
    #[serde(skip)]
    generation: u64,
}

/// What the HTTP layer lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub position_ticket: u64,
    pub trailing_distance: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("trailing stop job already exists for position {0}")]
    AlreadyExists(u64),

    #[error("position {0} not found")]
    PositionNotFound(u64),

    #[error("trailing distance must be a positive number, got {0}")]
    InvalidDistance(f64),
}

/// Thread-safe mapping from position ticket to trailing-stop job.
///
/// The lock is only held for in-memory work; the facade lookup done by `add`
/// happens before it is taken.
pub struct JobRegistry {
    facade: Arc<dyn TradingFacade>,
    jobs: Mutex<BTreeMap<u64, TrailingStopJob>>,
    generations: AtomicU64,
}

impl JobRegistry {
    pub fn new(facade: Arc<dyn TradingFacade>) -> Self {
        Self {
            facade,
            jobs: Mutex::new(BTreeMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    /// Register a trailing stop, seeding direction and mark from the live position.
    pub async fn add(
        &self,
        position_id: u64,
        trailing_distance: f64,
    ) -> Result<TrailingStopJob, RegistryError> {
        if !(trailing_distance.is_finite() && trailing_distance > 0.0) {
            return Err(RegistryError::InvalidDistance(trailing_distance));
        }
        if self.contains(position_id).await {
            return Err(RegistryError::AlreadyExists(position_id));
        }

        let position = match self.facade.get_position(position_id).await {
            Ok(Some(position)) => position,
            Ok(None) => return Err(RegistryError::PositionNotFound(position_id)),
            Err(e) => {
                warn!("Failed to read position #{} for registration: {}", position_id, e);
                return Err(RegistryError::PositionNotFound(position_id));
            }
        };

        let mut jobs = self.jobs.lock().await;
        match jobs.entry(position_id) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyExists(position_id)),
            Entry::Vacant(slot) => {
                let job = TrailingStopJob {
                    position_id,
                    symbol: position.symbol,
                    trailing_distance,
                    direction: position.side.into(),
                    high_water_mark: position.price_current,
                    generation: self.generations.fetch_add(1, Ordering::Relaxed),
                };
                info!(
                    "📌 Trailing stop registered for #{} {} ({:?}, distance {}, mark {})",
                    job.position_id, job.symbol, job.direction, job.trailing_distance, job.high_water_mark
                );
                slot.insert(job.clone());
                Ok(job)
            }
        }
    }

    /// `add`, retried while the position is not yet visible.
    ///
    /// Used right after an order fill, when the platform's position lookup may
    /// lag the fill.
    pub async fn add_with_retry(
        &self,
        position_id: u64,
        trailing_distance: f64,
        attempts: u32,
        delay: Duration,
    ) -> Result<TrailingStopJob, RegistryError> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.add(position_id, trailing_distance).await {
                Err(RegistryError::PositionNotFound(_)) if attempt < attempts => {
                    debug!(
                        "Position #{} not visible yet (attempt {}/{}), retrying",
                        position_id, attempt, attempts
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    /// Remove a job. Returns whether one existed.
    pub async fn remove(&self, position_id: u64) -> bool {
        let removed = self.jobs.lock().await.remove(&position_id).is_some();
        if removed {
            info!("🗑️ Trailing stop removed for #{}", position_id);
        }
        removed
    }

    pub async fn contains(&self, position_id: u64) -> bool {
        self.jobs.lock().await.contains_key(&position_id)
    }

    /// Point-in-time copy ordered by ticket.
    pub async fn snapshot(&self) -> Vec<TrailingStopJob> {
        self.jobs.lock().await.values().cloned().collect()
    }

    pub async fn list_jobs(&self) -> Vec<JobSummary> {
        self.jobs
            .lock()
            .await
            .values()
            .map(|job| JobSummary {
                position_ticket: job.position_id,
                trailing_distance: job.trailing_distance,
            })
            .collect()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    /// Fold `price` into the job's mark and return the new mark.
    ///
    /// `None` when the job scanned has since been removed or replaced.
    pub(crate) async fn advance_high_water_mark(
        &self,
        job: &TrailingStopJob,
        price: f64,
    ) -> Option<f64> {
        let mut jobs = self.jobs.lock().await;
        let current = jobs
            .get_mut(&job.position_id)
            .filter(|current| current.generation == job.generation)?;
        let mark = current.direction.advance(current.high_water_mark, price);
        if mark != current.high_water_mark {
            debug!(
                "New mark for #{}: {} -> {}",
                current.position_id, current.high_water_mark, mark
            );
            current.high_water_mark = mark;
        }
        Some(mark)
    }

    /// Drop the job for a position that no longer exists, unless it was
    /// replaced meanwhile.
    pub(crate) async fn prune(&self, job: &TrailingStopJob) -> bool {
        let mut jobs = self.jobs.lock().await;
        match jobs.get(&job.position_id) {
            Some(current) if current.generation == job.generation => {
                jobs.remove(&job.position_id);
                info!(
                    "🧹 Position #{} ({}) is gone, trailing stop pruned",
                    job.position_id, job.symbol
                );
                true
            }
            _ => false,
        }
    }
}
