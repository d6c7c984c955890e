// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! In-memory facade that records every call, for unit tests.

use super::types::DealKind;
use super::{
    Deal, DealEntry, FacadeError, OrderFill, OrderRequest, Position, Side, Tick, TradingFacade,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetPosition(u64),
    GetTick(String),
    Modify(u64),
    ListPositions,
    ListDeals,
    PlaceOrder,
}

#[derive(Default)]
struct State {
    positions: BTreeMap<u64, Position>,
    ticks: HashMap<String, Tick>,
    deals: Vec<Deal>,
    broken_ticks: HashSet<String>,
    rejected_modifies: HashSet<u64>,
    fail_listing: bool,
    invalid_listing: bool,
    hidden_lookups: u32,
    next_ticket: u64,
    calls: Vec<Call>,
    modifications: Vec<(u64, f64)>,
}

#[derive(Default)]
pub struct FakeFacade {
    state: Mutex<State>,
    delay: Mutex<Option<Duration>>,
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn position(ticket: u64, symbol: &str, side: Side, price: f64) -> Position {
    Position {
        ticket,
        symbol: symbol.to_string(),
        side,
        volume: 0.1,
        price_open: price,
        price_current: price,
        stop_loss: None,
        take_profit: None,
        profit: 0.0,
        time_open: at(0),
    }
}

pub fn deal(position_id: u64, entry: DealEntry, kind: DealKind, price: f64, profit: f64) -> Deal {
    Deal {
        ticket: position_id * 10 + entry as u64,
        order: position_id,
        position_id,
        symbol: "EURUSD".to_string(),
        kind,
        entry,
        volume: 0.1,
        price,
        profit,
        time: at(60),
    }
}

impl FakeFacade {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn insert_position(&self, position: Position) {
        self.state().positions.insert(position.ticket, position);
    }

    pub fn remove_position(&self, ticket: u64) {
        self.state().positions.remove(&ticket);
    }

    pub fn set_stop_loss(&self, ticket: u64, stop_loss: Option<f64>) {
        if let Some(p) = self.state().positions.get_mut(&ticket) {
            p.stop_loss = stop_loss;
        }
    }

    pub fn position(&self, ticket: u64) -> Option<Position> {
        self.state().positions.get(&ticket).cloned()
    }

    pub fn set_tick(&self, symbol: &str, bid: f64, ask: f64) {
        let mut state = self.state();
        state.ticks.insert(symbol.to_string(), Tick { bid, ask });
        state.broken_ticks.remove(symbol);
    }

    /// Tick lookups for `symbol` fail with a transport-style error.
    pub fn break_tick(&self, symbol: &str) {
        self.state().broken_ticks.insert(symbol.to_string());
    }

    pub fn reject_modify(&self, ticket: u64) {
        self.state().rejected_modifies.insert(ticket);
    }

    pub fn accept_modify(&self, ticket: u64) {
        self.state().rejected_modifies.remove(&ticket);
    }

    pub fn set_deals(&self, deals: Vec<Deal>) {
        self.state().deals = deals;
    }

    pub fn fail_listing(&self, fail: bool) {
        self.state().fail_listing = fail;
    }

    /// Position listings fail the way a malformed record does.
    pub fn invalid_listing(&self, invalid: bool) {
        self.state().invalid_listing = invalid;
    }

    /// The next `n` position lookups report the position as absent.
    pub fn hide_positions_for(&self, n: u32) {
        self.state().hidden_lookups = n;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn modifications(&self) -> Vec<(u64, f64)> {
        self.state().modifications.clone()
    }

    fn record(&self, call: Call) {
        self.state().calls.push(call);
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl TradingFacade for FakeFacade {
    async fn get_position(&self, position_id: u64) -> Result<Option<Position>, FacadeError> {
        self.record(Call::GetPosition(position_id));
        self.pause().await;
        let mut state = self.state();
        if state.hidden_lookups > 0 {
            state.hidden_lookups -= 1;
            return Ok(None);
        }
        Ok(state.positions.get(&position_id).cloned())
    }

    async fn get_tick(&self, symbol: &str) -> Result<Option<Tick>, FacadeError> {
        self.record(Call::GetTick(symbol.to_string()));
        self.pause().await;
        let state = self.state();
        if state.broken_ticks.contains(symbol) {
            return Err(FacadeError::Status {
                status: 503,
                body: "quote feed down".to_string(),
            });
        }
        Ok(state.ticks.get(symbol).copied())
    }

    async fn modify_stop_loss(
        &self,
        position_id: u64,
        _symbol: &str,
        stop_loss: f64,
        take_profit: Option<f64>,
    ) -> Result<(), FacadeError> {
        self.record(Call::Modify(position_id));
        self.pause().await;
        let mut state = self.state();
        if state.rejected_modifies.contains(&position_id) {
            return Err(FacadeError::Rejected("retcode 10016 (invalid stops)".to_string()));
        }
        state.modifications.push((position_id, stop_loss));
        if let Some(p) = state.positions.get_mut(&position_id) {
            p.stop_loss = Some(stop_loss);
            p.take_profit = take_profit;
        }
        Ok(())
    }

    async fn list_open_positions(&self) -> Result<Vec<Position>, FacadeError> {
        self.record(Call::ListPositions);
        self.pause().await;
        let state = self.state();
        if state.fail_listing {
            return Err(FacadeError::Status {
                status: 502,
                body: "terminal offline".to_string(),
            });
        }
        if state.invalid_listing {
            return Err(FacadeError::InvalidRecord {
                kind: "position",
                reason: "current price 0".to_string(),
            });
        }
        Ok(state.positions.values().cloned().collect())
    }

    async fn list_recent_deals(&self, since: DateTime<Utc>) -> Result<Vec<Deal>, FacadeError> {
        self.record(Call::ListDeals);
        self.pause().await;
        let state = self.state();
        Ok(state
            .deals
            .iter()
            .filter(|d| d.time >= since)
            .cloned()
            .collect())
    }

    async fn place_market_order(&self, request: &OrderRequest) -> Result<OrderFill, FacadeError> {
        self.record(Call::PlaceOrder);
        let mut state = self.state();
        let quote = state
            .ticks
            .get(&request.symbol)
            .copied()
            .ok_or_else(|| FacadeError::Rejected("no quote".to_string()))?;
        let price = match request.side {
            Side::Buy => quote.ask,
            Side::Sell => quote.bid,
        };

        state.next_ticket += 1;
        let ticket = 9_000 + state.next_ticket;
        let mut opened = position(ticket, &request.symbol, request.side, price);
        opened.volume = request.volume;
        opened.stop_loss = request.stop_loss;
        opened.take_profit = request.take_profit;
        state.positions.insert(ticket, opened);

        Ok(OrderFill {
            order: ticket,
            deal: ticket + 1,
            position_id: Some(ticket),
            price,
            volume: request.volume,
        })
    }
}
