// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Market order placement with optional trailing stop activation.

use super::{ApiError, AppState};
use crate::gateway::{OrderFill, OrderRequest, Side};
use crate::position::RegistryError;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

const DEFAULT_DEVIATION: u32 = 20;

#[derive(Debug, Default, Deserialize)]
pub struct PlaceOrder {
    pub symbol: Option<String>,
    pub volume: Option<f64>,
    #[serde(rename = "type")]
    pub side: Option<String>,
    pub sl: Option<f64>,
    pub tp: Option<f64>,
    pub deviation: Option<u32>,
    pub magic: Option<u64>,
    pub comment: Option<String>,
    /// Trailing distance to register for the new position.
    pub ts: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct OrderPlaced {
    pub message: &'static str,
    pub result: OrderFill,
    pub trailing_stop_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_ticket: Option<u64>,
}

impl PlaceOrder {
    fn into_request(self) -> Result<(OrderRequest, Option<f64>), ApiError> {
        let (Some(symbol), Some(volume), Some(side)) = (self.symbol, self.volume, self.side) else {
            return Err(ApiError::BadRequest(
                "symbol, volume, and type are required".to_string(),
            ));
        };
        let side = match side.to_ascii_uppercase().as_str() {
            "BUY" => Side::Buy,
            "SELL" => Side::Sell,
            other => {
                return Err(ApiError::BadRequest(format!(
                    "Invalid order type: {}. Must be 'BUY' or 'SELL'.",
                    other
                )))
            }
        };
        if !(volume.is_finite() && volume > 0.0) {
            return Err(ApiError::BadRequest(format!("Invalid volume: {}", volume)));
        }

        let request = OrderRequest {
            symbol,
            side,
            volume,
            stop_loss: self.sl.filter(|v| *v > 0.0),
            take_profit: self.tp.filter(|v| *v > 0.0),
            deviation: self.deviation.unwrap_or(DEFAULT_DEVIATION),
            magic: self.magic.unwrap_or(0),
            comment: self.comment.unwrap_or_default(),
        };
        Ok((request, self.ts))
    }
}

pub async fn place_order(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PlaceOrder>,
) -> Result<Json<OrderPlaced>, ApiError> {
    let (request, ts) = body.into_request()?;

    info!(
        "📝 Placing {} {} {} (sl {:?}, tp {:?})",
        request.side, request.volume, request.symbol, request.stop_loss, request.take_profit
    );
    let fill = state.facade.place_market_order(&request).await.map_err(|e| {
        error!("Order for {} failed: {}", request.symbol, e);
        ApiError::from(e)
    })?;
    info!("✅ Order {} filled at {} (deal {})", fill.order, fill.price, fill.deal);

    let trailing_stop_status = match ts {
        None => "not requested".to_string(),
        Some(_) if fill.deal == 0 => {
            warn!("Order {} produced no deal, trailing stop not activated", fill.order);
            "not activated (no deal created)".to_string()
        }
        Some(distance) => match fill.position_id {
            None => {
                error!("Deal {} is not linked to a position", fill.deal);
                "failed to activate (position not linked to deal or order mismatch)".to_string()
            }
            Some(position_id) => activate(&state, position_id, distance).await,
        },
    };

    Ok(Json(OrderPlaced {
        message: "Order executed successfully",
        position_ticket: fill.position_id,
        result: fill,
        trailing_stop_status,
    }))
}

async fn activate(state: &AppState, position_id: u64, distance: f64) -> String {
    let result = state
        .registry
        .add_with_retry(
            position_id,
            distance,
            state.register_attempts,
            state.register_delay,
        )
        .await;

    match result {
        Ok(_) => "activated".to_string(),
        Err(RegistryError::PositionNotFound(_)) => {
            error!("Position #{} never became visible, trailing stop not activated", position_id);
            "failed to activate (position details not found)".to_string()
        }
        Err(e) => {
            error!("Trailing stop for #{} not activated: {}", position_id, e);
            format!("failed to activate ({})", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::app;
    use axum::http::StatusCode;

    fn buy(ts: Option<f64>) -> Json<PlaceOrder> {
        Json(PlaceOrder {
            symbol: Some("EURUSD".to_string()),
            volume: Some(0.2),
            side: Some("buy".to_string()),
            ts,
            ..PlaceOrder::default()
        })
    }

    #[tokio::test]
    async fn test_order_with_ts_registers_job() {
        let app = app();
        app.facade.set_tick("EURUSD", 1.1000, 1.1002);

        let Json(placed) = place_order(State(app.state.clone()), buy(Some(0.003)))
            .await
            .unwrap();

        assert_eq!(placed.trailing_stop_status, "activated");
        let ticket = placed.position_ticket.unwrap();
        let jobs = app.state.registry.snapshot().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].position_id, ticket);
        assert_eq!(jobs[0].high_water_mark, 1.1002);
    }

    #[tokio::test]
    async fn test_order_without_ts_leaves_registry_alone() {
        let app = app();
        app.facade.set_tick("EURUSD", 1.1000, 1.1002);

        let Json(placed) = place_order(State(app.state.clone()), buy(None)).await.unwrap();

        assert_eq!(placed.trailing_stop_status, "not requested");
        assert_eq!(app.state.registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_lagging_position_is_retried() {
        let app = app();
        app.facade.set_tick("EURUSD", 1.1000, 1.1002);
        app.facade.hide_positions_for(2);

        let Json(placed) = place_order(State(app.state.clone()), buy(Some(0.003)))
            .await
            .unwrap();
        assert_eq!(placed.trailing_stop_status, "activated");
    }

    #[tokio::test]
    async fn test_position_never_visible_reports_failure() {
        let app = app();
        app.facade.set_tick("EURUSD", 1.1000, 1.1002);
        app.facade.hide_positions_for(100);

        let Json(placed) = place_order(State(app.state.clone()), buy(Some(0.003)))
            .await
            .unwrap();
        assert_eq!(
            placed.trailing_stop_status,
            "failed to activate (position details not found)"
        );
        assert_eq!(app.state.registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_orders_are_rejected() {
        let app = app();

        let missing = place_order(State(app.state.clone()), Json(PlaceOrder::default()))
            .await
            .unwrap_err();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let mut body = buy(None);
        body.side = Some("HOLD".to_string());
        let bad_side = place_order(State(app.state.clone()), body).await.unwrap_err();
        assert!(bad_side.to_string().contains("Invalid order type: HOLD"));

        // No quote for the symbol: the fake rejects the order.
        let rejected = place_order(State(app.state.clone()), buy(None)).await.unwrap_err();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
    }
}
