// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Trailing-stop job registry and worker.

pub mod registry;
pub mod trailing_sl;

pub use registry::{JobRegistry, JobSummary, RegistryError, TrailingStopJob};
pub use trailing_sl::{TrailingStopConfig, TrailingStopWorker};
