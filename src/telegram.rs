// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Telegram notifier module.

use crate::notify::{NotificationSink, SettingsStore};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, Recipient};
use tokio::sync::Mutex;
use tracing::{error, info};

/// Delivers trade signals to the configured Telegram chat.
///
/// Credentials are read from the settings store on every send so API updates
/// take effect without a restart.
pub struct TelegramNotifier {
    settings: SettingsStore,
    bot: Mutex<Option<(String, Bot)>>,
}

impl TelegramNotifier {
    pub fn new(settings: SettingsStore) -> Self {
        Self {
            settings,
            bot: Mutex::new(None),
        }
    }

    /// Reuse the bot client while the token is unchanged.
    async fn bot_for(&self, token: &str) -> Bot {
        let mut cached = self.bot.lock().await;
        match cached.as_ref() {
            Some((current, bot)) if current == token => bot.clone(),
            _ => {
                let bot = Bot::new(token);
                *cached = Some((token.to_string(), bot.clone()));
                bot
            }
        }
    }
}

/// Numeric chat ids and `@channelusername` are both accepted.
fn recipient(chat_id: &str) -> Option<Recipient> {
    let chat_id = chat_id.trim();
    if chat_id.len() > 1 && chat_id.starts_with('@') {
        return Some(Recipient::ChannelUsername(chat_id.to_string()));
    }
    chat_id.parse::<i64>().ok().map(|id| Recipient::Id(ChatId(id)))
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn send(&self, message: &str) -> bool {
        let settings = self.settings.current().await;
        if !settings.has_credentials() {
            error!("Telegram bot token or chat ID not configured");
            return false;
        }
        let Some(recipient) = recipient(&settings.chat_id) else {
            error!("Invalid Telegram chat ID: {}", settings.chat_id);
            return false;
        };

        let bot = self.bot_for(&settings.bot_token).await;
        match bot
            .send_message(recipient, message)
            .parse_mode(ParseMode::Html)
            .await
        {
            Ok(_) => {
                info!("📤 Sent Telegram message");
                true
            }
            Err(e) => {
                error!("Failed to send Telegram message: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_without_credentials_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path().join("signal_config.json"), None);
        let notifier = TelegramNotifier::new(store);

        assert!(!notifier.send("hello").await);
    }

    #[test]
    fn test_recipient_accepts_ids_and_channel_usernames() {
        assert_eq!(recipient("-1001234"), Some(Recipient::Id(ChatId(-1001234))));
        assert_eq!(recipient(" 42 "), Some(Recipient::Id(ChatId(42))));
        assert_eq!(
            recipient("@mt5_signals"),
            Some(Recipient::ChannelUsername("@mt5_signals".to_string()))
        );
        assert_eq!(recipient("@"), None);
        assert_eq!(recipient("signals"), None);
    }

    #[tokio::test]
    async fn test_bot_is_rebuilt_on_token_change() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path().join("signal_config.json"), None);
        let notifier = TelegramNotifier::new(store);

        notifier.bot_for("111:aaa").await;
        notifier.bot_for("111:aaa").await;
        assert_eq!(notifier.bot.lock().await.as_ref().unwrap().0, "111:aaa");

        notifier.bot_for("222:bbb").await;
        assert_eq!(notifier.bot.lock().await.as_ref().unwrap().0, "222:bbb");
    }
}
