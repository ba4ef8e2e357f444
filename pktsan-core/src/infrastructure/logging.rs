// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Logging
//!
//! Structured logging for the pipeline, built on `tracing` +
//! `tracing-subscriber`'s env-filter. This is the post-bootstrap logger:
//! once [`init_tracing`] has run, stages and the executor log through
//! `tracing::{info,warn,error,debug}!` directly rather than through a
//! trait object. Pre-bootstrap diagnostics (argument parsing, config-file
//! errors before a subscriber exists) use the bootstrap logger instead.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Controls whether [`init_tracing`] emits human-readable or JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Initializes the global `tracing` subscriber.
///
/// Safe to call more than once: only the first call installs a
/// subscriber, later calls are no-ops. The log level defaults to `info`
/// and is overridden by `RUST_LOG` when set.
pub fn init_tracing(format: LogFormat) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
        match format {
            LogFormat::Text => subscriber.init(),
            LogFormat::Json => subscriber.json().init(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing(LogFormat::Text);
        init_tracing(LogFormat::Text);
    }
}
