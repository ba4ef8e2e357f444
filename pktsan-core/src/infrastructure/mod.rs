// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Ambient infrastructure: configuration loading, logging setup, and metrics.

pub mod config;
pub mod logging;
pub mod metrics;

pub use config::{default_config, load_config};
pub use logging::{init_tracing, LogFormat};
pub use metrics::{serve_metrics, PipelineMetrics};
