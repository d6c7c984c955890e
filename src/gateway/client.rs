// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! HTTP client for the trading platform gateway.

use super::types::{RawDeal, RawPosition, RawTick};
use super::{Deal, FacadeError, OrderFill, OrderRequest, Position, Tick, TradingFacade};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the gateway connection.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout: Duration,
}

/// `TradingFacade` backed by the gateway's JSON API.
pub struct GatewayClient {
    client: Client,
    base_url: Url,
}

#[derive(Debug, Serialize)]
struct ModifyRequest<'a> {
    position: u64,
    symbol: &'a str,
    sl: f64,
    tp: f64,
}

#[derive(Debug, Serialize)]
struct WireOrder<'a> {
    symbol: &'a str,
    #[serde(rename = "type")]
    side: &'static str,
    volume: f64,
    sl: f64,
    tp: f64,
    deviation: u32,
    magic: u64,
    comment: &'a str,
}

#[derive(Debug, Deserialize)]
struct OrderReply {
    retcode: u32,
    #[serde(default)]
    comment: String,
    order: u64,
    deal: u64,
    #[serde(default)]
    position_id: u64,
    price: f64,
    volume: f64,
}

/// Platform return code for a completed request.
const RETCODE_DONE: u32 = 10009;

impl GatewayClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, FacadeError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| FacadeError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(FacadeError::InvalidUrl(config.base_url.clone()));
        }
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, base_url })
    }

    /// Gateway URL for `segments`, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Map non-success statuses to errors, keeping 404 distinguishable.
    async fn check(response: Response) -> Result<Option<Response>, FacadeError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FacadeError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(Some(response))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, FacadeError> {
        let response = self.client.get(url).send().await?;
        match Self::check(response).await? {
            Some(response) => Ok(Some(response.json::<T>().await?)),
            None => Ok(None),
        }
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, FacadeError> {
        let path = url.path().to_string();
        let response = self.client.post(url).json(body).send().await?;
        match Self::check(response).await? {
            Some(response) => Ok(response.json::<T>().await?),
            None => Err(FacadeError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                body: format!("{} not found", path),
            }),
        }
    }
}

/// Validate a full position listing.
///
/// One bad record fails the whole listing: a partial list would make a
/// still-open position look closed.
fn positions_from_wire(raw: Vec<RawPosition>) -> Result<Vec<Position>, FacadeError> {
    raw.into_iter()
        .map(|record| {
            let ticket = record.ticket;
            Position::try_from(record).map_err(|e| {
                warn!("Position listing rejected at #{}: {}", ticket, e);
                e
            })
        })
        .collect()
}

#[async_trait]
impl TradingFacade for GatewayClient {
    async fn get_position(&self, position_id: u64) -> Result<Option<Position>, FacadeError> {
        let raw: Option<RawPosition> = self
            .get_json(self.endpoint(&["position", &position_id.to_string()]))
            .await?;
        raw.map(Position::try_from).transpose()
    }

    async fn get_tick(&self, symbol: &str) -> Result<Option<Tick>, FacadeError> {
        let raw: Option<RawTick> = self.get_json(self.endpoint(&["tick", symbol])).await?;
        Ok(raw.and_then(RawTick::into_tick))
    }

    async fn modify_stop_loss(
        &self,
        position_id: u64,
        symbol: &str,
        stop_loss: f64,
        take_profit: Option<f64>,
    ) -> Result<(), FacadeError> {
        let request = ModifyRequest {
            position: position_id,
            symbol,
            sl: stop_loss,
            tp: take_profit.unwrap_or(0.0),
        };
        debug!("Modify request for #{}: {:?}", position_id, request);

        let reply: serde_json::Value = self
            .post_json(self.endpoint(&["modify_sl_tp"]), &request)
            .await?;
        match reply.get("retcode").and_then(|c| c.as_u64()) {
            Some(code) if code as u32 == RETCODE_DONE => Ok(()),
            Some(code) => Err(FacadeError::Rejected(format!(
                "retcode {} ({})",
                code,
                reply.get("comment").and_then(|c| c.as_str()).unwrap_or("")
            ))),
            None => Ok(()),
        }
    }

    async fn list_open_positions(&self) -> Result<Vec<Position>, FacadeError> {
        let raw: Vec<RawPosition> = self
            .get_json(self.endpoint(&["positions"]))
            .await?
            .unwrap_or_default();
        positions_from_wire(raw)
    }

    async fn list_recent_deals(&self, since: DateTime<Utc>) -> Result<Vec<Deal>, FacadeError> {
        let mut url = self.endpoint(&["deals"]);
        url.query_pairs_mut()
            .append_pair("from", &since.timestamp().to_string());
        let raw: Vec<RawDeal> = self.get_json(url).await?.unwrap_or_default();
        let mut deals = Vec::with_capacity(raw.len());
        for record in raw {
            match Deal::try_from(record) {
                Ok(deal) => deals.push(deal),
                Err(e) => warn!("Skipping deal record: {}", e),
            }
        }
        Ok(deals)
    }

    async fn place_market_order(&self, request: &OrderRequest) -> Result<OrderFill, FacadeError> {
        let wire = WireOrder {
            symbol: &request.symbol,
            side: match request.side {
                super::Side::Buy => "BUY",
                super::Side::Sell => "SELL",
            },
            volume: request.volume,
            sl: request.stop_loss.unwrap_or(0.0),
            tp: request.take_profit.unwrap_or(0.0),
            deviation: request.deviation,
            magic: request.magic,
            comment: &request.comment,
        };

        let reply: OrderReply = self.post_json(self.endpoint(&["order"]), &wire).await?;
        if reply.retcode != RETCODE_DONE {
            return Err(FacadeError::Rejected(format!(
                "retcode {} ({})",
                reply.retcode, reply.comment
            )));
        }

        Ok(OrderFill {
            order: reply.order,
            deal: reply.deal,
            position_id: (reply.position_id != 0).then_some(reply.position_id),
            price: reply.price,
            volume: reply.volume,
        })
    }
}
