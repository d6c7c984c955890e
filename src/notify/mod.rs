// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Notification delivery seam and its settings.

pub mod settings;

use async_trait::async_trait;

pub use settings::{
    CredentialsUpdate, NotificationSettings, SettingsError, SettingsStore, SignalKind,
};

/// Best-effort delivery of a formatted message to an external channel.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Returns `false` when the message could not be delivered.
    async fn send(&self, message: &str) -> bool;
}
