// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Executor
//!
//! Drives the canonical Dedup -> Anon -> Mask stage chain over a single
//! file. Each enabled stage writes to a scoped temporary file; the first
//! stage to fail aborts the chain (partial [`StageStats`] already collected
//! are retained on the returned [`RunResult`]) and the requested output path
//! is only touched once the last enabled stage has succeeded, matching the
//! "a non-success result implies the output must not be trusted" guarantee.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use pktsan_domain::value_objects::{IpMappingTable, PipelineConfig, RunResult};
use pktsan_domain::{PktsanError, ProgressEvent, ProgressObserver};

use crate::stages::{AnonStage, DedupStage, MaskStage};

/// Owns a directory created under the system temp root for one pipeline
/// run's intermediate files, and removes it on every exit path (including
/// panics) via `Drop`.
pub struct TempWorkDir {
    dir: tempfile::TempDir,
}

impl TempWorkDir {
    pub fn new() -> Result<Self, PktsanError> {
        let dir = tempfile::Builder::new()
            .prefix("pktsan-")
            .tempdir()
            .map_err(|e| PktsanError::internal(e.to_string()))?;
        Ok(Self { dir })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Cooperative cancellation flag shared between the batch driver and every
/// in-flight stage chain. Checked between stages and between packets; the
/// core stages are synchronous and CPU-bound, so polling an `AtomicBool` is
/// sufficient and avoids pulling an async runtime into this crate.
#[derive(Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives the stage chain for one file according to a [`PipelineConfig`].
pub struct PipelineExecutor<'a> {
    config: &'a PipelineConfig,
    observer: &'a dyn ProgressObserver,
    stop_flag: StopFlag,
}

impl<'a> PipelineExecutor<'a> {
    pub fn new(config: &'a PipelineConfig, observer: &'a dyn ProgressObserver) -> Self {
        Self {
            config,
            observer,
            stop_flag: StopFlag::new(),
        }
    }

    pub fn with_stop_flag(mut self, stop_flag: StopFlag) -> Self {
        self.stop_flag = stop_flag;
        self
    }

    /// Runs the enabled stages, in Dedup -> Anon -> Mask order, against
    /// `input`, finalizing into `output` only on full success.
    ///
    /// `shared_mapping` lets a batch driver pass in an `IpMappingTable`
    /// built once across every file in the batch, so the same original
    /// address anonymizes identically everywhere in the batch; when `None`,
    /// the Anon stage builds its own mapping scoped to this single file,
    /// matching `Stage::process_file`'s single-file contract.
    pub fn run(
        &self,
        input: &Path,
        output: &Path,
        shared_mapping: Option<&IpMappingTable>,
    ) -> Result<RunResult, PktsanError> {
        let start = Instant::now();
        let mut result = RunResult::new(input.to_string_lossy().into_owned());
        self.observer.on_event(ProgressEvent::FileStarted {
            path: input.to_string_lossy().into_owned(),
        });

        let work_dir = TempWorkDir::new()?;
        let mut current = input.to_path_buf();
        let mut stage_index = 0usize;

        macro_rules! bail_on_stop {
            () => {
                if self.stop_flag.is_stopped() {
                    result.duration = start.elapsed();
                    result.errors.push("cancelled".to_string());
                    return Ok(result);
                }
            };
        }

        if self.config.dedup.enabled {
            bail_on_stop!();
            let dest = work_dir.path(&format!("{stage_index}-dedup.pcap"));
            let mut stage = DedupStage::new();
            match stage.process_file(&current, &dest) {
                Ok(stats) => {
                    self.observer.on_event(ProgressEvent::StageFinished {
                        file: input.to_string_lossy().into_owned(),
                        stats: stats.clone(),
                    });
                    result.stage_stats.push(stats);
                    current = dest;
                    stage_index += 1;
                }
                Err(e) => return Err(self.fail(&mut result, start, e)),
            }
        }

        if self.config.anon.enabled {
            bail_on_stop!();
            let dest = work_dir.path(&format!("{stage_index}-anon.pcap"));
            let outcome = if let Some(table) = shared_mapping {
                let anon_start = Instant::now();
                let capture = crate::io::read_capture(&current)?;
                let anon = AnonStage::new();
                let mut packets = capture.packets.clone();
                let modified = anon.rewrite(&mut packets, table);
                let mut out = capture;
                out.packets = packets;
                crate::io::write_capture(&dest, &out)?;
                let mut stats = pktsan_domain::value_objects::StageStats::new("anon");
                stats.packets_processed = out.packets.len() as u64;
                stats.packets_modified = modified;
                stats.duration = anon_start.elapsed();
                stats.record_counter("ips_anonymized", table.len() as u64);
                Ok(stats)
            } else {
                let mut stage = AnonStage::new();
                stage.process_file(&current, &dest)
            };
            match outcome {
                Ok(stats) => {
                    self.observer.on_event(ProgressEvent::StageFinished {
                        file: input.to_string_lossy().into_owned(),
                        stats: stats.clone(),
                    });
                    result.stage_stats.push(stats);
                    current = dest;
                    stage_index += 1;
                }
                Err(e) => return Err(self.fail(&mut result, start, e)),
            }
        }

        if self.config.mask.enabled {
            bail_on_stop!();
            let dest = work_dir.path(&format!("{stage_index}-mask.pcap"));
            let mut stage = MaskStage::new(self.config.mask.preserve.clone());
            match stage.process_file(&current, &dest) {
                Ok(stats) => {
                    self.observer.on_event(ProgressEvent::StageFinished {
                        file: input.to_string_lossy().into_owned(),
                        stats: stats.clone(),
                    });
                    result.stage_stats.push(stats);
                    current = dest;
                }
                Err(e) => return Err(self.fail(&mut result, start, e)),
            }
        }

        std::fs::copy(&current, output).map_err(|e| PktsanError::WriteError(e.to_string()))?;
        result.success = true;
        result.output_file = Some(output.to_string_lossy().into_owned());
        result.duration = start.elapsed();
        self.observer.on_event(ProgressEvent::FileFinished {
            path: input.to_string_lossy().into_owned(),
        });
        Ok(result)
    }

    fn fail(&self, result: &mut RunResult, start: Instant, error: PktsanError) -> PktsanError {
        result.duration = start.elapsed();
        result.errors.push(error.to_string());
        self.observer.on_event(ProgressEvent::Log {
            level: pktsan_domain::LogLevel::Error,
            message: error.to_string(),
        });
        error
    }
}

use pktsan_domain::Stage;

#[cfg(test)]
mod tests {
    use super::*;
    use pktsan_domain::value_objects::{DedupConfig, MaskConfig, MaskPreservePolicy};
    use pktsan_domain::NullProgressObserver;

    fn minimal_pcap_bytes() -> Vec<u8> {
        let mut header = vec![];
        header.extend_from_slice(&0xa1b2c3d4u32.to_le_bytes());
        header.extend_from_slice(&2u16.to_le_bytes());
        header.extend_from_slice(&4u16.to_le_bytes());
        header.extend_from_slice(&0i32.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes());
        header.extend_from_slice(&65535u32.to_le_bytes());
        header.extend_from_slice(&1u32.to_le_bytes());
        header
    }

    #[test]
    fn refuses_to_finalize_when_no_stage_enabled_config_would_have_failed_validation() {
        // The executor itself does not validate; that's PipelineConfig::validate's
        // job, exercised in infrastructure::config's tests. Here we confirm that
        // an executor with every stage disabled is a no-op copy.
        let config = PipelineConfig {
            dedup: DedupConfig { enabled: false },
            anon: pktsan_domain::value_objects::AnonConfig { enabled: false },
            mask: MaskConfig {
                enabled: false,
                preserve: MaskPreservePolicy::default(),
            },
        };
        let observer = NullProgressObserver;
        let executor = PipelineExecutor::new(&config, &observer);

        let input_dir = tempfile::tempdir().unwrap();
        let input = input_dir.path().join("in.pcap");
        std::fs::write(&input, minimal_pcap_bytes()).unwrap();
        let output = input_dir.path().join("out.pcap");

        let result = executor.run(&input, &output, None).unwrap();
        assert!(result.success);
        assert!(output.exists());
    }

    #[test]
    fn stopped_flag_aborts_before_running_any_stage() {
        let config = PipelineConfig {
            dedup: DedupConfig { enabled: true },
            anon: pktsan_domain::value_objects::AnonConfig { enabled: false },
            mask: MaskConfig {
                enabled: false,
                preserve: MaskPreservePolicy::default(),
            },
        };
        let observer = NullProgressObserver;
        let stop_flag = StopFlag::new();
        stop_flag.stop();
        let executor = PipelineExecutor::new(&config, &observer).with_stop_flag(stop_flag);

        let input_dir = tempfile::tempdir().unwrap();
        let input = input_dir.path().join("in.pcap");
        std::fs::write(&input, minimal_pcap_bytes()).unwrap();
        let output = input_dir.path().join("out.pcap");

        let result = executor.run(&input, &output, None).unwrap();
        assert!(!result.success);
        assert!(!output.exists());
    }
}
