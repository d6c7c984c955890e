// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Notification settings endpoints.

use super::{ApiError, AppState};
use crate::notify::{CredentialsUpdate, NotificationSettings};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct ConfigReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub config: NotificationSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct SetConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub send_open: Option<bool>,
    pub send_close: Option<bool>,
    pub send_modify_tp_sl: Option<bool>,
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<ConfigReply> {
    Json(ConfigReply {
        message: None,
        config: state.settings.current().await,
    })
}

pub async fn set_config(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetConfig>,
) -> Result<Json<ConfigReply>, ApiError> {
    let (Some(bot_token), Some(chat_id)) = (body.bot_token, body.chat_id) else {
        return Err(ApiError::BadRequest(
            "bot_token and chat_id are required".to_string(),
        ));
    };

    let config = state
        .settings
        .update_credentials(CredentialsUpdate {
            bot_token,
            chat_id,
            send_open: body.send_open,
            send_close: body.send_close,
            send_modify_tp_sl: body.send_modify_tp_sl,
        })
        .await?;

    if config.enabled {
        let sent = state
            .sink
            .send("🔔 <b>MT5 Bot Configuration Updated</b>\nBot token, chat ID, and signal preferences configured successfully.")
            .await;
        if !sent {
            warn!("Telegram configuration saved but test message failed to send");
        }
    }

    Ok(Json(ConfigReply {
        message: Some("Telegram configuration updated successfully"),
        config,
    }))
}

pub async fn enable(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    state.settings.set_enabled(true).await?;
    state
        .sink
        .send("🔔 <b>MT5 Bot Notification</b>\nTelegram signal sending has been enabled.")
        .await;
    Ok(Json(json!({
        "message": "Telegram signal sending enabled",
        "enabled": true,
    })))
}

pub async fn disable(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    state.settings.set_enabled(false).await?;
    Ok(Json(json!({
        "message": "Telegram signal sending disabled",
        "enabled": false,
    })))
}
