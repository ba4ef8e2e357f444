// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # pktsan CLI
//!
//! Command-line entry point for the packet-sanitization pipeline:
//!
//! - `pktsan sanitize` — runs the Dedup/Anon/Mask stage chain over a single
//!   capture file or every capture file in a directory.
//! - `pktsan inspect` — reports per-file packet/flow/TLS-record counts
//!   without mutating anything.
//! - `pktsan validate-config` — loads and validates a configuration file.
//!
//! Argument parsing and security validation happen in [`cli`]; this module
//! wires validated arguments into `pktsan-core`. A GUI shell and
//! full HTML/JSON report rendering beyond the IP-mapping dump stay out of
//! this crate; they're separate concerns from file sanitization itself.

mod cli;
mod report;
mod shutdown;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use pktsan_core::infrastructure::{init_tracing, load_config, serve_metrics, LogFormat, PipelineMetrics};
use pktsan_core::pipeline::{batch, PipelineExecutor, StopFlag};
use pktsan_domain::value_objects::{AnonConfig, DedupConfig, MaskConfig, MaskPreservePolicy, PipelineConfig};
use pktsan_domain::{PktsanError, ProgressEvent, ProgressObserver};

use cli::{ValidatedCli, ValidatedCommand};

struct ConsoleObserver {
    metrics: Option<Arc<PipelineMetrics>>,
}

impl ProgressObserver for ConsoleObserver {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::PipelineStarted { total_files } => {
                tracing::info!(total_files, "pipeline started");
            }
            ProgressEvent::FileStarted { path } => {
                tracing::info!(%path, "file started");
            }
            ProgressEvent::StageFinished { file, stats } => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_stage(&stats);
                }
                tracing::info!(
                    %file,
                    stage = %stats.stage_name,
                    packets_processed = stats.packets_processed,
                    packets_modified = stats.packets_modified,
                    duration_ms = stats.duration.as_millis() as u64,
                    "stage finished"
                );
            }
            ProgressEvent::FileFinished { path } => {
                tracing::info!(%path, "file finished");
            }
            ProgressEvent::PipelineFinished => {
                tracing::info!("pipeline finished");
            }
            ProgressEvent::Log { level, message } => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_error("stage");
                }
                match level {
                    pktsan_domain::LogLevel::Debug => tracing::debug!("{message}"),
                    pktsan_domain::LogLevel::Info => tracing::info!("{message}"),
                    pktsan_domain::LogLevel::Warn => tracing::warn!("{message}"),
                    pktsan_domain::LogLevel::Error => tracing::error!("{message}"),
                }
            }
        }
    }
}

fn main() -> ExitCode {
    let validated = match cli::parse_and_validate() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("pktsan: argument error: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(if validated.log_json { LogFormat::Json } else { LogFormat::Text });

    let metrics = match &validated.metrics_addr {
        Some(addr) => match setup_metrics(addr) {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::error!("failed to start metrics endpoint: {e}");
                None
            }
        },
        None => None,
    };

    match run(validated, metrics) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pktsan: {e}");
            ExitCode::FAILURE
        }
    }
}

fn setup_metrics(addr: &str) -> Result<Arc<PipelineMetrics>, PktsanError> {
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| PktsanError::invalid_config(format!("invalid --metrics-addr {addr}: {e}")))?;
    let metrics = Arc::new(PipelineMetrics::new()?);
    serve_metrics(socket_addr, metrics.clone())?;
    Ok(metrics)
}

fn run(validated: ValidatedCli, metrics: Option<Arc<PipelineMetrics>>) -> Result<(), PktsanError> {
    match validated.command {
        ValidatedCommand::Sanitize {
            input,
            output,
            config,
            dedup,
            anon,
            mask,
            preserve_handshake,
            preserve_alert,
            preserve_ccs,
            preserve_heartbeat,
            preserve_app_data,
            dump_mapping,
            workers,
        } => sanitize(
            &input,
            &output,
            config.as_deref(),
            StageOverrides {
                dedup,
                anon,
                mask,
                preserve_handshake,
                preserve_alert,
                preserve_ccs,
                preserve_heartbeat,
                preserve_app_data,
            },
            dump_mapping.as_deref(),
            workers,
            metrics,
        ),
        ValidatedCommand::Inspect { input, json } => report::inspect(&input, json),
        ValidatedCommand::ValidateConfig { config } => {
            let cfg = load_config(Some(&config))?;
            println!("configuration valid: {cfg:?}");
            Ok(())
        }
    }
}

/// CLI-flag overrides layered on top of a loaded (or default) configuration.
/// Stage flags are additive (`--dedup` can only enable, never disable, a
/// stage already enabled in a config file); preservation flags are
/// tri-state (`Option<bool>`) so "not specified" means "keep the loaded
/// value" rather than "false".
struct StageOverrides {
    dedup: bool,
    anon: bool,
    mask: bool,
    preserve_handshake: Option<bool>,
    preserve_alert: Option<bool>,
    preserve_ccs: Option<bool>,
    preserve_heartbeat: Option<bool>,
    preserve_app_data: Option<bool>,
}

fn resolve_config(
    config_path: Option<&Path>,
    overrides: StageOverrides,
) -> Result<PipelineConfig, PktsanError> {
    let mut cfg = match config_path {
        Some(path) => load_config(Some(path))?,
        None => PipelineConfig {
            dedup: DedupConfig { enabled: false },
            anon: AnonConfig { enabled: false },
            mask: MaskConfig {
                enabled: false,
                preserve: MaskPreservePolicy::default(),
            },
        },
    };

    cfg.dedup.enabled |= overrides.dedup;
    cfg.anon.enabled |= overrides.anon;
    cfg.mask.enabled |= overrides.mask;

    if let Some(v) = overrides.preserve_handshake {
        cfg.mask.preserve.handshake = v;
    }
    if let Some(v) = overrides.preserve_alert {
        cfg.mask.preserve.alert = v;
    }
    if let Some(v) = overrides.preserve_ccs {
        cfg.mask.preserve.change_cipher_spec = v;
    }
    if let Some(v) = overrides.preserve_heartbeat {
        cfg.mask.preserve.heartbeat = v;
    }
    if let Some(v) = overrides.preserve_app_data {
        cfg.mask.preserve.application_data = v;
    }

    cfg.validate().map_err(PktsanError::invalid_config)?;
    Ok(cfg)
}

fn sanitize(
    input: &Path,
    output: &Path,
    config_path: Option<&Path>,
    overrides: StageOverrides,
    dump_mapping: Option<&Path>,
    workers: Option<usize>,
    metrics: Option<Arc<PipelineMetrics>>,
) -> Result<(), PktsanError> {
    let config = resolve_config(config_path, overrides)?;
    let observer = ConsoleObserver { metrics };
    let stop_flag = StopFlag::new();
    shutdown::install_ctrl_c_handler(stop_flag.clone());

    if input.is_dir() {
        sanitize_directory(input, output, &config, &observer, dump_mapping, workers, stop_flag)
    } else {
        sanitize_file(input, output, &config, &observer, dump_mapping, stop_flag)
    }
}

fn sanitize_directory(
    input_dir: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    observer: &dyn ProgressObserver,
    dump_mapping: Option<&Path>,
    workers: Option<usize>,
    stop_flag: StopFlag,
) -> Result<(), PktsanError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.unwrap_or(0))
        .build()
        .map_err(|e| PktsanError::internal(e.to_string()))?;

    let results = batch::process_directory(input_dir, output_dir, config, &pool, observer, stop_flag)?;

    if let Some(dump_path) = dump_mapping {
        if config.anon.enabled {
            let files = batch::discover_capture_files(input_dir)?;
            let table = batch::build_shared_mapping(&files)?;
            write_mapping_report(dump_path, &table)?;
        }
    }

    report_summary(&results);
    if results.iter().any(|r| !r.success) {
        return Err(PktsanError::internal("one or more files failed to process"));
    }
    Ok(())
}

fn sanitize_file(
    input: &Path,
    output: &Path,
    config: &PipelineConfig,
    observer: &dyn ProgressObserver,
    dump_mapping: Option<&Path>,
    stop_flag: StopFlag,
) -> Result<(), PktsanError> {
    let executor = PipelineExecutor::new(config, observer).with_stop_flag(stop_flag);
    let result = executor.run(input, output, None)?;

    if let Some(dump_path) = dump_mapping {
        if config.anon.enabled {
            let capture = pktsan_core::io::read_capture(input)?;
            let anon = pktsan_core::stages::AnonStage::new();
            let (_packets, table, _stats) = anon.run(&capture);
            write_mapping_report(dump_path, &table)?;
        }
    }

    report_summary(std::slice::from_ref(&result));
    if !result.success {
        return Err(PktsanError::internal(format!(
            "sanitize failed: {}",
            result.errors.join("; ")
        )));
    }
    Ok(())
}

fn write_mapping_report(path: &Path, table: &pktsan_domain::value_objects::IpMappingTable) -> Result<(), PktsanError> {
    let json = serde_json::to_string_pretty(table)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn report_summary(results: &[pktsan_domain::value_objects::RunResult]) {
    for result in results {
        println!(
            "{}: {} ({} stage(s), {:.3}s)",
            result.input_file,
            if result.success { "ok" } else { "failed" },
            result.stage_stats.len(),
            result.duration.as_secs_f64()
        );
        for stats in &result.stage_stats {
            println!(
                "  {}: processed={} modified={}",
                stats.stage_name, stats.packets_processed, stats.packets_modified
            );
        }
        for error in &result.errors {
            println!("  error: {error}");
        }
    }
}
