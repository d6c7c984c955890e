// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Telegram (HTML) rendering of trade signals.

use super::NotificationEvent;
use crate::position::trailing_sl::round_price;
use chrono::{DateTime, Utc};
use teloxide::utils::html::escape;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn level(value: Option<f64>, decimals: u32) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals as usize, v),
        None => "none".to_string(),
    }
}

fn same_level(a: Option<f64>, b: Option<f64>, decimals: u32) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => round_price(a, decimals) == round_price(b, decimals),
        (None, None) => true,
        _ => false,
    }
}

/// Render an event, or `None` when a modification vanishes after rounding.
pub fn format_event(event: &NotificationEvent, decimals: u32, now: DateTime<Utc>) -> Option<String> {
    let p = decimals as usize;
    let message = match event {
        NotificationEvent::Opened {
            position_id,
            symbol,
            side,
            volume,
            price,
            time,
        } => format!(
            "🎰 <b>New Trade Opened (MT5)</b>\n\
             <b>Symbol</b>: {}\n\
             <b>Type</b>: {}\n\
             <b>Volume</b>: {:.2}\n\
             <b>Price</b>: {:.*}\n\
             <b>Time</b>: {}\n\
             <b>Position Ticket</b>: #ES{}",
            escape(symbol),
            side,
            volume,
            p,
            price,
            time.format(TIME_FORMAT),
            position_id
        ),
        NotificationEvent::Closed {
            position_id,
            symbol,
            side,
            volume,
            close_price,
            profit,
            time,
        } => format!(
            "📬 <b>Trade Closed (MT5)</b>\n\
             <b>Symbol</b>: {}\n\
             <b>Type</b>: {}\n\
             <b>Volume</b>: {:.2}\n\
             <b>Close Price</b>: {:.*}\n\
             <b>Profit</b>: {:.2}\n\
             <b>Time</b>: {}\n\
             <b>Position Ticket</b>: #ES{}",
            escape(symbol),
            side,
            volume,
            p,
            close_price,
            profit,
            time.format(TIME_FORMAT),
            position_id
        ),
        NotificationEvent::Modified {
            position_id,
            symbol,
            old_sl,
            new_sl,
            old_tp,
            new_tp,
        } => {
            let mut changes = Vec::new();
            if !same_level(*old_tp, *new_tp, decimals) {
                changes.push(format!(
                    "<b>New TP</b>: {} (was {})",
                    level(*new_tp, decimals),
                    level(*old_tp, decimals)
                ));
            }
            if !same_level(*old_sl, *new_sl, decimals) {
                changes.push(format!(
                    "<b>New SL</b>: {} (was {})",
                    level(*new_sl, decimals),
                    level(*old_sl, decimals)
                ));
            }
            if changes.is_empty() {
                return None;
            }

            format!(
                "♻️ <b>TP/SL Modified (MT5)</b>\n\
                 <b>Symbol</b>: {}\n\
                 <b>Position Ticket</b>: #ES{}\n\
                 {}\n\
                 <b>Time</b>: {}",
                escape(symbol),
                position_id,
                changes.join("\n"),
                now.format(TIME_FORMAT)
            )
        }
    };

    Some(message)
}
