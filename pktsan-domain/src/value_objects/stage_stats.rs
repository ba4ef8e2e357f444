// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Per-stage and per-run statistics.

use std::collections::BTreeMap;
use std::time::Duration;

/// Statistics produced by a single stage's `process_file` call.
#[derive(Debug, Clone, PartialEq)]
pub struct StageStats {
    pub stage_name: String,
    pub packets_processed: u64,
    pub packets_modified: u64,
    pub duration: Duration,
    /// Stage-specific counters: bytes masked, IPs anonymized, duplicates
    /// removed, and so on.
    pub counters: BTreeMap<String, u64>,
}

impl StageStats {
    pub fn new(stage_name: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            packets_processed: 0,
            packets_modified: 0,
            duration: Duration::ZERO,
            counters: BTreeMap::new(),
        }
    }

    pub fn with_counter(mut self, key: impl Into<String>, value: u64) -> Self {
        self.counters.insert(key.into(), value);
        self
    }

    pub fn record_counter(&mut self, key: impl Into<String>, value: u64) {
        self.counters.insert(key.into(), value);
    }

    pub fn increment_counter(&mut self, key: &str, delta: u64) {
        *self.counters.entry(key.to_string()).or_insert(0) += delta;
    }
}

/// The outcome of running a full stage chain against one file.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub success: bool,
    pub input_file: String,
    pub output_file: Option<String>,
    pub duration: Duration,
    pub stage_stats: Vec<StageStats>,
    pub errors: Vec<String>,
}

impl RunResult {
    pub fn new(input_file: impl Into<String>) -> Self {
        Self {
            success: false,
            input_file: input_file.into(),
            output_file: None,
            duration: Duration::ZERO,
            stage_stats: Vec::new(),
            errors: Vec::new(),
        }
    }
}
