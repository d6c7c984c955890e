// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Trading platform gateway: records, the facade trait and its HTTP client.

pub mod client;
pub mod types;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use client::GatewayClient;
pub use types::{Deal, DealEntry, OrderFill, OrderRequest, Position, Side, Tick};

/// Errors surfaced by a trading facade call.
#[derive(Debug, Error)]
pub enum FacadeError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid {kind} record: {reason}")]
    InvalidRecord { kind: &'static str, reason: String },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("invalid gateway url: {0}")]
    InvalidUrl(String),
}

/// Everything the core needs from the trading platform.
///
/// `Ok(None)` means the object does not exist (or, for ticks, has no usable
/// quote); `Err` means the call itself failed and may be retried later.
#[async_trait]
pub trait TradingFacade: Send + Sync {
    async fn get_position(&self, position_id: u64) -> Result<Option<Position>, FacadeError>;

    async fn get_tick(&self, symbol: &str) -> Result<Option<Tick>, FacadeError>;

    /// Replace the protective levels of an open position.
    async fn modify_stop_loss(
        &self,
        position_id: u64,
        symbol: &str,
        stop_loss: f64,
        take_profit: Option<f64>,
    ) -> Result<(), FacadeError>;

    async fn list_open_positions(&self) -> Result<Vec<Position>, FacadeError>;

    async fn list_recent_deals(&self, since: DateTime<Utc>) -> Result<Vec<Deal>, FacadeError>;

    async fn place_market_order(&self, request: &OrderRequest) -> Result<OrderFill, FacadeError>;
}
