// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! HTTP API: trailing stop jobs, order placement and notification settings.

pub mod jobs;
pub mod order;
pub mod telegram;

use crate::gateway::{FacadeError, TradingFacade};
use crate::notify::{NotificationSink, SettingsError, SettingsStore};
use crate::position::{JobRegistry, RegistryError};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Shared state handed to every handler.
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub facade: Arc<dyn TradingFacade>,
    pub settings: SettingsStore,
    pub sink: Arc<dyn NotificationSink>,
    pub auth_token: Option<String>,
    /// Post-order registration retry policy.
    pub register_attempts: u32,
    pub register_delay: Duration,
}

/// Error returned by a handler, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Gateway(String),

    #[error("Server configuration error")]
    Misconfigured,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Misconfigured | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::InvalidDistance(_) => ApiError::BadRequest(e.to_string()),
            RegistryError::PositionNotFound(id) => {
                ApiError::NotFound(format!("Position with ticket {} not found.", id))
            }
            RegistryError::AlreadyExists(id) => ApiError::Conflict(format!(
                "Trailing stop job already exists for position {}",
                id
            )),
        }
    }
}

impl From<SettingsError> for ApiError {
    fn from(e: SettingsError) -> Self {
        match e {
            SettingsError::MissingCredentials => ApiError::BadRequest(
                "Cannot enable: bot_token and chat_id must be configured".to_string(),
            ),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<FacadeError> for ApiError {
    fn from(e: FacadeError) -> Self {
        match e {
            FacadeError::Rejected(reason) => ApiError::BadRequest(format!("Order failed: {}", reason)),
            other => ApiError::Gateway(other.to_string()),
        }
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/apply_trailing_stop", post(jobs::apply_trailing_stop))
        .route(
            "/cancel_trailing_stop/:position_ticket",
            delete(jobs::cancel_trailing_stop),
        )
        .route("/list_trailing_stop_jobs", get(jobs::list_trailing_stop_jobs))
        .route("/order", post(order::place_order))
        .route(
            "/telegram/config",
            get(telegram::get_config).post(telegram::set_config),
        )
        .route("/telegram/enable", post(telegram::enable))
        .route("/telegram/disable", post(telegram::disable))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), auth))
        .with_state(state)
}

/// Start serving until `shutdown` resolves.
pub async fn serve(
    bind_addr: &str,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = router(state);

    info!("🌐 Starting API server on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health_check() -> &'static str {
    "OK"
}

async fn auth(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    match check_token(state.auth_token.as_deref(), header) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

/// Accepts `Bearer <token>` or the raw token.
fn check_token(expected: Option<&str>, header: Option<&str>) -> Result<(), ApiError> {
    let Some(header) = header.filter(|h| !h.is_empty()) else {
        warn!("No Authorization header provided");
        return Err(ApiError::Unauthorized("Authorization header is required"));
    };
    let token = match header.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => &header[7..],
        _ => header,
    };

    let Some(expected) = expected else {
        error!("MT5_API_AUTH_TOKEN not set, rejecting request");
        return Err(ApiError::Misconfigured);
    };
    if token != expected {
        warn!("Invalid API token provided");
        return Err(ApiError::Unauthorized("Invalid API token"));
    }

    debug!("API token validated");
    Ok(())
}
