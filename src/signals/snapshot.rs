// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Position snapshots and the lifecycle events derived from diffing them.

use crate::gateway::{Deal, DealEntry, Position, Side};
use crate::notify::SignalKind;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Open positions at one point in time, keyed by ticket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionSnapshot {
    positions: BTreeMap<u64, Position>,
}

impl PositionSnapshot {
    pub fn new(positions: Vec<Position>) -> Self {
        Self {
            positions: positions.into_iter().map(|p| (p.ticket, p)).collect(),
        }
    }

    pub fn get(&self, ticket: u64) -> Option<&Position> {
        self.positions.get(&ticket)
    }

    #[cfg(test)]
    pub fn tickets(&self) -> impl Iterator<Item = u64> + '_ {
        self.positions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }
}

/// A position lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    Opened {
        position_id: u64,
        symbol: String,
        side: Side,
        volume: f64,
        price: f64,
        time: DateTime<Utc>,
    },
    Closed {
        position_id: u64,
        symbol: String,
        side: Side,
        volume: f64,
        close_price: f64,
        profit: f64,
        time: DateTime<Utc>,
    },
    Modified {
        position_id: u64,
        symbol: String,
        old_sl: Option<f64>,
        new_sl: Option<f64>,
        old_tp: Option<f64>,
        new_tp: Option<f64>,
    },
}

impl NotificationEvent {
    pub fn kind(&self) -> SignalKind {
        match self {
            NotificationEvent::Opened { .. } => SignalKind::Open,
            NotificationEvent::Closed { .. } => SignalKind::Close,
            NotificationEvent::Modified { .. } => SignalKind::Modify,
        }
    }

    pub fn position_id(&self) -> u64 {
        match self {
            NotificationEvent::Opened { position_id, .. }
            | NotificationEvent::Closed { position_id, .. }
            | NotificationEvent::Modified { position_id, .. } => *position_id,
        }
    }
}

/// Deal that opened `ticket`; the position ticket usually equals the
/// opening order, so that linkage is accepted too.
fn opening_deal(deals: &[Deal], ticket: u64) -> Option<&Deal> {
    deals
        .iter()
        .filter(|d| d.entry == DealEntry::In)
        .find(|d| d.position_id == ticket)
        .or_else(|| {
            deals
                .iter()
                .find(|d| d.entry == DealEntry::In && d.position_id == 0 && d.order == ticket)
        })
}

/// Most recent deal that closed `ticket`.
fn closing_deal(deals: &[Deal], ticket: u64) -> Option<&Deal> {
    deals
        .iter()
        .filter(|d| d.position_id == ticket && d.entry.is_closing())
        .max_by_key(|d| (d.time, d.ticket))
}

/// Events that explain the change from `previous` to `current`.
///
/// Missing deal records fall back to the last observed position state.
pub fn diff(
    previous: &PositionSnapshot,
    current: &PositionSnapshot,
    deals: &[Deal],
    now: DateTime<Utc>,
) -> Vec<NotificationEvent> {
    let mut events = Vec::new();

    for (ticket, position) in &current.positions {
        match previous.get(*ticket) {
            None => {
                let event = match opening_deal(deals, *ticket) {
                    Some(deal) => NotificationEvent::Opened {
                        position_id: *ticket,
                        symbol: position.symbol.clone(),
                        side: position.side,
                        volume: deal.volume,
                        price: deal.price,
                        time: deal.time,
                    },
                    None => NotificationEvent::Opened {
                        position_id: *ticket,
                        symbol: position.symbol.clone(),
                        side: position.side,
                        volume: position.volume,
                        price: position.price_open,
                        time: position.time_open,
                    },
                };
                events.push(event);
            }
            Some(before) => {
                if before.stop_loss != position.stop_loss
                    || before.take_profit != position.take_profit
                {
                    events.push(NotificationEvent::Modified {
                        position_id: *ticket,
                        symbol: position.symbol.clone(),
                        old_sl: before.stop_loss,
                        new_sl: position.stop_loss,
                        old_tp: before.take_profit,
                        new_tp: position.take_profit,
                    });
                }
            }
        }
    }

    for (ticket, before) in &previous.positions {
        if current.get(*ticket).is_some() {
            continue;
        }
        let event = match closing_deal(deals, *ticket) {
            Some(deal) => NotificationEvent::Closed {
                position_id: *ticket,
                symbol: before.symbol.clone(),
                side: before.side,
                volume: deal.volume,
                close_price: deal.price,
                profit: deal.profit,
                time: deal.time,
            },
            None => NotificationEvent::Closed {
                position_id: *ticket,
                symbol: before.symbol.clone(),
                side: before.side,
                volume: before.volume,
                close_price: before.price_current,
                profit: before.profit,
                time: now,
            },
        };
        events.push(event);
    }

    events
}
