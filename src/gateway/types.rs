// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Typed trading records.
//!
//! Wire payloads from the gateway are loosely typed (integer enums, zero for
//! "unset", unix timestamps). They are validated once here and the rest of the
//! crate only sees the structured records.

use super::FacadeError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// An open position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub ticket: u64,
    pub symbol: String,
    pub side: Side,
    pub volume: f64,
    pub price_open: f64,
    pub price_current: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub profit: f64,
    pub time_open: DateTime<Utc>,
}

/// Best bid/ask quote for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tick {
    pub bid: f64,
    pub ask: f64,
}

/// Deal direction as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DealKind {
    Buy,
    Sell,
    /// Balance, credit, commission and other non-trade deals.
    Other,
}

/// Whether a deal opened, closed or reversed a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DealEntry {
    In,
    Out,
    InOut,
    OutBy,
}

impl DealEntry {
    pub fn is_closing(self) -> bool {
        matches!(self, DealEntry::Out | DealEntry::OutBy)
    }
}

/// An executed deal from the account history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deal {
    pub ticket: u64,
    pub order: u64,
    pub position_id: u64,
    pub symbol: String,
    pub kind: DealKind,
    pub entry: DealEntry,
    pub volume: f64,
    pub price: f64,
    pub profit: f64,
    pub time: DateTime<Utc>,
}

/// Market order submitted on behalf of an API caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub volume: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub deviation: u32,
    pub magic: u64,
    pub comment: String,
}

/// Result of a filled market order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFill {
    pub order: u64,
    pub deal: u64,
    /// Position opened by the fill, when the platform linked one.
    pub position_id: Option<u64>,
    pub price: f64,
    pub volume: f64,
}

// ---------------------------------------------------------------------------
// Wire records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPosition {
    pub ticket: u64,
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: i32,
    pub volume: f64,
    pub price_open: f64,
    pub price_current: f64,
    #[serde(default)]
    pub sl: f64,
    #[serde(default)]
    pub tp: f64,
    #[serde(default)]
    pub profit: f64,
    pub time: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawTick {
    pub bid: f64,
    pub ask: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawDeal {
    pub ticket: u64,
    #[serde(default)]
    pub order: u64,
    #[serde(default)]
    pub position_id: u64,
    #[serde(default)]
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: i32,
    pub entry: i32,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub profit: f64,
    pub time: i64,
}

fn invalid(kind: &'static str, reason: impl Into<String>) -> FacadeError {
    FacadeError::InvalidRecord {
        kind,
        reason: reason.into(),
    }
}

fn timestamp(kind: &'static str, secs: i64) -> Result<DateTime<Utc>, FacadeError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| invalid(kind, format!("bad timestamp {}", secs)))
}

/// Zero means "no level set" on the platform.
fn level(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

impl TryFrom<RawPosition> for Position {
    type Error = FacadeError;

    fn try_from(raw: RawPosition) -> Result<Self, Self::Error> {
        let side = match raw.kind {
            0 => Side::Buy,
            1 => Side::Sell,
            other => return Err(invalid("position", format!("unknown type {}", other))),
        };
        if raw.symbol.is_empty() {
            return Err(invalid("position", "empty symbol"));
        }
        if !(raw.volume.is_finite() && raw.volume > 0.0) {
            return Err(invalid("position", format!("volume {}", raw.volume)));
        }
        if !(raw.price_current.is_finite() && raw.price_current > 0.0) {
            return Err(invalid("position", format!("current price {}", raw.price_current)));
        }

        Ok(Self {
            ticket: raw.ticket,
            symbol: raw.symbol,
            side,
            volume: raw.volume,
            price_open: raw.price_open,
            price_current: raw.price_current,
            stop_loss: level(raw.sl),
            take_profit: level(raw.tp),
            profit: raw.profit,
            time_open: timestamp("position", raw.time)?,
        })
    }
}

impl RawTick {
    /// A quote with a zero side is treated as unavailable.
    pub fn into_tick(self) -> Option<Tick> {
        match (level(self.bid), level(self.ask)) {
            (Some(bid), Some(ask)) => Some(Tick { bid, ask }),
            _ => None,
        }
    }
}

impl TryFrom<RawDeal> for Deal {
    type Error = FacadeError;

    fn try_from(raw: RawDeal) -> Result<Self, Self::Error> {
        let kind = match raw.kind {
            0 => DealKind::Buy,
            1 => DealKind::Sell,
            _ => DealKind::Other,
        };
        let entry = match raw.entry {
            0 => DealEntry::In,
            1 => DealEntry::Out,
            2 => DealEntry::InOut,
            3 => DealEntry::OutBy,
            other => return Err(invalid("deal", format!("unknown entry {}", other))),
        };

        Ok(Self {
            ticket: raw.ticket,
            order: raw.order,
            position_id: raw.position_id,
            symbol: raw.symbol,
            kind,
            entry,
            volume: raw.volume,
            price: raw.price,
            profit: raw.profit,
            time: timestamp("deal", raw.time)?,
        })
    }
}
