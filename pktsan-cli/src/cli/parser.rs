// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! `clap`-derived CLI structure. Parsing only — [`super::validator`] does
//! the security and range validation before any path reaches the pipeline.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pktsan")]
#[command(about = "Sanitizes captured network traffic: dedup, IP anonymization, TLS-aware payload masking")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Bind address for a `/metrics` Prometheus endpoint (disabled unless given)
    #[arg(long, global = true)]
    pub metrics_addr: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sanitize one capture file, or every capture file in a directory
    Sanitize {
        /// Input .pcap/.pcapng file, or a directory of them
        input: PathBuf,

        /// Output file (single-file mode) or directory (directory mode)
        #[arg(short, long)]
        output: PathBuf,

        /// Layered configuration file (TOML/YAML/JSON); CLI flags override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Include the Dedup stage
        #[arg(long)]
        dedup: bool,

        /// Include the Anon stage
        #[arg(long)]
        anon: bool,

        /// Include the Mask stage
        #[arg(long)]
        mask: bool,

        /// Preserve TLS handshake records in full (default true)
        #[arg(long)]
        preserve_handshake: Option<bool>,

        /// Preserve TLS alert records in full (default true)
        #[arg(long)]
        preserve_alert: Option<bool>,

        /// Preserve TLS change_cipher_spec records in full (default true)
        #[arg(long)]
        preserve_ccs: Option<bool>,

        /// Preserve TLS heartbeat records in full (default true)
        #[arg(long)]
        preserve_heartbeat: Option<bool>,

        /// Preserve entire application_data records instead of zeroing payload (default false)
        #[arg(long)]
        preserve_app_data: Option<bool>,

        /// Write the frozen IP mapping table out as a JSON report alongside the output
        #[arg(long)]
        dump_mapping: Option<PathBuf>,

        /// Number of parallel worker threads for directory-mode batches
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Report per-file packet/flow/TLS-record counts without mutating anything
    Inspect {
        /// Input .pcap/.pcapng file
        input: PathBuf,

        /// Emit the report as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },

    /// Load and validate a configuration file without running a pipeline
    ValidateConfig {
        /// Configuration file (TOML/YAML/JSON)
        config: PathBuf,
    },
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
