// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Trade signal notifications: detect position lifecycle changes and announce them.

pub mod message;
pub mod snapshot;
pub mod worker;

pub use snapshot::NotificationEvent;
pub use worker::{SignalConfig, SignalWorker};
