// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration module - loads settings from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the bridge.
#[derive(Debug, Clone)]
pub struct Config {
    // Trading gateway
    pub gateway_url: String,
    pub gateway_timeout_sec: u64,

    // HTTP API
    pub bind_addr: String,
    pub api_auth_token: Option<String>,

    // Trailing stop worker
    pub trailing_interval_sec: u64,
    pub price_decimals: u32,
    pub register_retry_attempts: u32,
    pub register_retry_delay_ms: u64,

    // Trade signal worker
    pub signal_interval_sec: u64,
    pub deal_lookback_sec: u64,
    pub signal_config_path: PathBuf,

    // Telegram seeds for a fresh signal config file
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        Ok(Self {
            // Trading gateway
            gateway_url: env_var("MT5_GATEWAY_URL")?
                .trim_end_matches('/')
                .to_string(),
            gateway_timeout_sec: env_var_or("MT5_GATEWAY_TIMEOUT_SEC", "10")
                .parse()
                .unwrap_or(10),

            // HTTP API
            bind_addr: env_var_or("BIND_ADDR", "0.0.0.0:5001"),
            api_auth_token: std::env::var("MT5_API_AUTH_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),

            // Trailing stop worker
            trailing_interval_sec: env_var_or("TRAILING_INTERVAL_SEC", "5")
                .parse()
                .unwrap_or(5),
            price_decimals: env_var_or("PRICE_DECIMALS", "5").parse().unwrap_or(5),
            register_retry_attempts: env_var_or("REGISTER_RETRY_ATTEMPTS", "5")
                .parse()
                .unwrap_or(5),
            register_retry_delay_ms: env_var_or("REGISTER_RETRY_DELAY_MS", "300")
                .parse()
                .unwrap_or(300),

            // Trade signal worker
            signal_interval_sec: env_var_or("SIGNAL_INTERVAL_SEC", "5")
                .parse()
                .unwrap_or(5),
            deal_lookback_sec: env_var_or("SIGNAL_DEAL_LOOKBACK_SEC", "3600")
                .parse()
                .unwrap_or(3600),
            signal_config_path: PathBuf::from(env_var_or(
                "SIGNAL_CONFIG_PATH",
                "signal_config.json",
            )),

            // Telegram
            telegram_token: std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            telegram_chat_id: std::env::var("TELEGRAM_CHAT_ID").ok(),
        })
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_sec.max(1))
    }

    pub fn trailing_interval(&self) -> Duration {
        Duration::from_secs(self.trailing_interval_sec.max(1))
    }

    pub fn signal_interval(&self) -> Duration {
        Duration::from_secs(self.signal_interval_sec.max(1))
    }

    pub fn deal_lookback(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.deal_lookback_sec as i64)
    }

    pub fn register_retry_delay(&self) -> Duration {
        Duration::from_millis(self.register_retry_delay_ms)
    }
}

fn env_var(name: &str) -> Result<String, String> {
    std::env::var(name).map_err(|_| format!("{} not set", name))
}

fn env_var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
impl Config {
    /// Configuration used by unit tests; never reads the environment.
    pub fn for_tests() -> Self {
        Self {
            gateway_url: "http://127.0.0.1:9".to_string(),
            gateway_timeout_sec: 1,
            bind_addr: "127.0.0.1:0".to_string(),
            api_auth_token: Some("secret".to_string()),
            trailing_interval_sec: 1,
            price_decimals: 5,
            register_retry_attempts: 3,
            register_retry_delay_ms: 1,
            signal_interval_sec: 1,
            deal_lookback_sec: 3600,
            signal_config_path: PathBuf::from("signal_config.json"),
            telegram_token: None,
            telegram_chat_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durations_are_derived_from_fields() {
        let mut config = Config::for_tests();
        config.deal_lookback_sec = 90;
        config.register_retry_delay_ms = 250;

        assert_eq!(config.deal_lookback(), chrono::Duration::seconds(90));
        assert_eq!(config.register_retry_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_zero_intervals_are_clamped() {
        let mut config = Config::for_tests();
        config.trailing_interval_sec = 0;
        config.signal_interval_sec = 0;
        config.gateway_timeout_sec = 0;

        assert_eq!(config.trailing_interval(), Duration::from_secs(1));
        assert_eq!(config.signal_interval(), Duration::from_secs(1));
        assert_eq!(config.gateway_timeout(), Duration::from_secs(1));
    }
}
