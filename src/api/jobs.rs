// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Trailing stop job endpoints.

use super::{ApiError, AppState};
use crate::position::JobSummary;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ApplyTrailingStop {
    pub position_ticket: Option<u64>,
    pub trailing_distance: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ActiveJobs {
    pub active_jobs: Vec<JobSummary>,
}

pub async fn apply_trailing_stop(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ApplyTrailingStop>,
) -> Result<Json<Value>, ApiError> {
    let (Some(ticket), Some(distance)) = (body.position_ticket, body.trailing_distance) else {
        return Err(ApiError::BadRequest(
            "position_ticket and trailing_distance are required".to_string(),
        ));
    };

    state.registry.add(ticket, distance).await?;
    Ok(Json(json!({
        "message": "Trailing stop enabled successfully for position. Worker will now monitor.",
        "position_ticket": ticket,
    })))
}

pub async fn cancel_trailing_stop(
    State(state): State<Arc<AppState>>,
    Path(position_ticket): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    if !state.registry.remove(position_ticket).await {
        return Err(ApiError::NotFound(format!(
            "No active trailing stop job found for position {}",
            position_ticket
        )));
    }
    Ok(Json(json!({
        "message": format!(
            "Trailing stop for position {} disabled successfully.",
            position_ticket
        ),
    })))
}

pub async fn list_trailing_stop_jobs(State(state): State<Arc<AppState>>) -> Json<ActiveJobs> {
    Json(ActiveJobs {
        active_jobs: state.registry.list_jobs().await,
    })
}
