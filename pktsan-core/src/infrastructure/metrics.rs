// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Metrics
//!
//! A small `prometheus` registry tracking packet/byte/stage counters across
//! a pipeline run, plus a minimal blocking HTTP server exposing it at
//! `/metrics`. Kept synchronous rather than `tokio`-based, matching this
//! crate's stage model (sequential per file, `rayon`-parallel across
//! files): the metrics server runs on its own `std::thread`, not an async
//! runtime.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

use pktsan_domain::PktsanError;

/// Pipeline-wide counters, registered once and shared (via `Arc`) across
/// stages and batch workers.
pub struct PipelineMetrics {
    registry: Registry,
    pub packets_processed: IntCounterVec,
    pub packets_modified: IntCounterVec,
    pub bytes_processed: IntCounter,
    pub errors: IntCounterVec,
}

impl PipelineMetrics {
    pub fn new() -> Result<Self, PktsanError> {
        let registry = Registry::new();

        let packets_processed = IntCounterVec::new(
            Opts::new("pktsan_packets_processed_total", "Packets processed per stage"),
            &["stage"],
        )
        .map_err(|e| PktsanError::internal(e.to_string()))?;
        let packets_modified = IntCounterVec::new(
            Opts::new("pktsan_packets_modified_total", "Packets modified per stage"),
            &["stage"],
        )
        .map_err(|e| PktsanError::internal(e.to_string()))?;
        let bytes_processed = IntCounter::new("pktsan_bytes_processed_total", "Total bytes read from captures")
            .map_err(|e| PktsanError::internal(e.to_string()))?;
        let errors = IntCounterVec::new(
            Opts::new("pktsan_errors_total", "Errors recorded per category"),
            &["category"],
        )
        .map_err(|e| PktsanError::internal(e.to_string()))?;

        registry
            .register(Box::new(packets_processed.clone()))
            .map_err(|e| PktsanError::internal(e.to_string()))?;
        registry
            .register(Box::new(packets_modified.clone()))
            .map_err(|e| PktsanError::internal(e.to_string()))?;
        registry
            .register(Box::new(bytes_processed.clone()))
            .map_err(|e| PktsanError::internal(e.to_string()))?;
        registry
            .register(Box::new(errors.clone()))
            .map_err(|e| PktsanError::internal(e.to_string()))?;

        Ok(Self {
            registry,
            packets_processed,
            packets_modified,
            bytes_processed,
            errors,
        })
    }

    pub fn record_stage(&self, stats: &pktsan_domain::value_objects::StageStats) {
        self.packets_processed
            .with_label_values(&[stats.stage_name.as_str()])
            .inc_by(stats.packets_processed);
        self.packets_modified
            .with_label_values(&[stats.stage_name.as_str()])
            .inc_by(stats.packets_modified);
    }

    pub fn record_error(&self, category: &str) {
        self.errors.with_label_values(&[category]).inc();
    }

    fn render(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let families = self.registry.gather();
        let mut buf = Vec::new();
        let _ = encoder.encode(&families, &mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Spawns a background thread serving `GET /metrics` and `GET /health` on
/// `addr`. Returns immediately; the thread runs until the process exits.
pub fn serve_metrics(addr: SocketAddr, metrics: Arc<PipelineMetrics>) -> Result<(), PktsanError> {
    let listener = TcpListener::bind(addr).map_err(|e| PktsanError::internal(e.to_string()))?;
    tracing::info!(%addr, "metrics endpoint listening");

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut buf = [0u8; 1024];
            let Ok(n) = stream.read(&mut buf) else { continue };
            let request = String::from_utf8_lossy(&buf[..n]);
            let response = if request.starts_with("GET /metrics") {
                let body = metrics.render();
                format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\n\r\n{}",
                    body.len(),
                    body
                )
            } else if request.starts_with("GET /health") {
                "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nOK".to_string()
            } else {
                "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: 9\r\n\r\nNot Found".to_string()
            };
            let _ = stream.write_all(response.as_bytes());
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_renders_stage_counters() {
        let metrics = PipelineMetrics::new().unwrap();
        let mut stats = pktsan_domain::value_objects::StageStats::new("dedup");
        stats.packets_processed = 10;
        stats.packets_modified = 3;
        metrics.record_stage(&stats);

        let rendered = metrics.render();
        assert!(rendered.contains("pktsan_packets_processed_total"));
        assert!(rendered.contains("stage=\"dedup\""));
    }

    #[test]
    fn records_errors_by_category() {
        let metrics = PipelineMetrics::new().unwrap();
        metrics.record_error("checksum");
        let rendered = metrics.render();
        assert!(rendered.contains("category=\"checksum\""));
    }
}
