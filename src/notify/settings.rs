// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Persisted notification settings (`signal_config.json`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Kind of trade signal, each independently toggleable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Open,
    Close,
    Modify,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub bot_token: String,
    pub chat_id: String,
    pub enabled: bool,
    pub send_open: bool,
    pub send_close: bool,
    pub send_modify_tp_sl: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            enabled: false,
            send_open: true,
            send_close: true,
            send_modify_tp_sl: true,
        }
    }
}

impl NotificationSettings {
    pub fn has_credentials(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }

    /// Global switch and per-kind toggle combined.
    pub fn allows(&self, kind: SignalKind) -> bool {
        self.enabled
            && match kind {
                SignalKind::Open => self.send_open,
                SignalKind::Close => self.send_close,
                SignalKind::Modify => self.send_modify_tp_sl,
            }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("bot_token and chat_id must be configured first")]
    MissingCredentials,

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Credential and toggle update from the API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsUpdate {
    pub bot_token: String,
    pub chat_id: String,
    pub send_open: Option<bool>,
    pub send_close: Option<bool>,
    pub send_modify_tp_sl: Option<bool>,
}

/// Shared handle to the current settings, written through to disk.
#[derive(Clone)]
pub struct SettingsStore {
    path: PathBuf,
    current: Arc<RwLock<NotificationSettings>>,
}

impl SettingsStore {
    /// Load settings from `path`.
    ///
    /// A missing file is created with defaults (seeded with `seed` credentials
    /// when given); an unreadable or invalid file is replaced by defaults.
    pub fn load(path: impl Into<PathBuf>, seed: Option<(String, String)>) -> Self {
        let path = path.into();
        let settings = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<NotificationSettings>(&content) {
                Ok(settings) => {
                    info!("Notification settings loaded from {}", path.display());
                    settings
                }
                Err(e) => {
                    error!("Invalid JSON in {}: {}, restoring defaults", path.display(), e);
                    Self::write_or_log(&path, &NotificationSettings::default())
                }
            },
            Err(_) => {
                info!("No {} found, using default notification settings", path.display());
                let mut settings = NotificationSettings::default();
                if let Some((token, chat_id)) = seed {
                    settings.bot_token = token;
                    settings.chat_id = chat_id;
                }
                Self::write_or_log(&path, &settings)
            }
        };

        Self {
            path,
            current: Arc::new(RwLock::new(settings)),
        }
    }

    fn write_or_log(path: &Path, settings: &NotificationSettings) -> NotificationSettings {
        if let Err(e) = write_settings(path, settings) {
            warn!("{}", e);
        }
        settings.clone()
    }

    pub async fn current(&self) -> NotificationSettings {
        self.current.read().await.clone()
    }

    pub async fn update_credentials(
        &self,
        update: CredentialsUpdate,
    ) -> Result<NotificationSettings, SettingsError> {
        let mut current = self.current.write().await;
        let mut next = current.clone();
        next.bot_token = update.bot_token;
        next.chat_id = update.chat_id;
        if let Some(v) = update.send_open {
            next.send_open = v;
        }
        if let Some(v) = update.send_close {
            next.send_close = v;
        }
        if let Some(v) = update.send_modify_tp_sl {
            next.send_modify_tp_sl = v;
        }

        write_settings(&self.path, &next)?;
        *current = next.clone();
        info!("Notification credentials updated");
        Ok(next)
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<NotificationSettings, SettingsError> {
        let mut current = self.current.write().await;
        if enabled && !current.has_credentials() {
            return Err(SettingsError::MissingCredentials);
        }
        let mut next = current.clone();
        next.enabled = enabled;

        write_settings(&self.path, &next)?;
        *current = next.clone();
        info!("Trade signal sending {}", if enabled { "enabled" } else { "disabled" });
        Ok(next)
    }
}

fn write_settings(path: &Path, settings: &NotificationSettings) -> Result<(), SettingsError> {
    let content = serde_json::to_string_pretty(settings)?;
    fs::write(path, content).map_err(|source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    })
}
