// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Batch Driver
//!
//! Processes every `.pcap`/`.pcapng` file in a directory. When the Anon
//! stage is enabled, the driver first builds one [`IpMappingTable`] shared
//! read-only across the whole batch (two full passes: pre-scan every file
//! to accumulate address frequency, then build the mapping over every file
//! in the same order), so the same original address anonymizes to the same
//! replacement in every file of the batch. Per-file stage chains then run
//! independently and in parallel across a `rayon::ThreadPool`, consulting
//! the shared table read-only.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use pktsan_domain::value_objects::{IpMappingTable, PipelineConfig, RunResult};
use pktsan_domain::{PktsanError, ProgressEvent, ProgressObserver};

use crate::stages::anon::{AnonStage, FrequencyTables, SegmentMaps};

use super::executor::{PipelineExecutor, StopFlag};

/// Lists `.pcap`/`.pcapng` files directly under `dir`, in a stable
/// (lexicographic) order so batch mapping construction is deterministic.
pub fn discover_capture_files(dir: &Path) -> Result<Vec<PathBuf>, PktsanError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && matches!(
                    path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()),
                    Some(ref ext) if ext == "pcap" || ext == "pcapng"
                )
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Builds one [`IpMappingTable`] shared across every file in `files`, by
/// running the Anon stage's pre-scan over each file (accumulating
/// frequency) and then its mapping-construction pass over each file again
/// (accumulating the mapping), both in the same file order.
///
/// Public so the CLI's `--dump-mapping` option can recompute and serialize
/// the same table `process_directory` used internally, without the
/// executor needing to thread a report sink through its whole call chain.
pub fn build_shared_mapping(files: &[PathBuf]) -> Result<IpMappingTable, PktsanError> {
    let anon = AnonStage::new();
    let mut freq = FrequencyTables::new();

    for file in files {
        let capture = crate::io::read_capture(file)?;
        let (file_freq, _stats) = anon.prescan(&capture.packets);
        freq.merge(&file_freq);
    }

    let mut maps = SegmentMaps::new();
    let mut table = IpMappingTable::new();
    for file in files {
        let capture = crate::io::read_capture(file)?;
        anon.extend_mapping(&capture.packets, &freq, &mut maps, &mut table);
    }

    Ok(table)
}

/// Processes every capture file directly under `input_dir`, writing each
/// sanitized result to `output_dir` under the same file name.
pub fn process_directory(
    input_dir: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
    pool: &rayon::ThreadPool,
    observer: &dyn ProgressObserver,
    stop_flag: StopFlag,
) -> Result<Vec<RunResult>, PktsanError> {
    let files = discover_capture_files(input_dir)?;
    std::fs::create_dir_all(output_dir)?;

    observer.on_event(ProgressEvent::PipelineStarted {
        total_files: files.len(),
    });

    let shared_mapping = if config.anon.enabled {
        Some(build_shared_mapping(&files)?)
    } else {
        None
    };

    let results = pool.install(|| {
        files
            .par_iter()
            .map(|file| {
                let executor = PipelineExecutor::new(config, observer).with_stop_flag(stop_flag.clone());
                let file_name = file.file_name().expect("listed files always have a name");
                let output = output_dir.join(file_name);
                executor.run(file, &output, shared_mapping.as_ref())
            })
            .collect::<Result<Vec<RunResult>, PktsanError>>()
    })?;

    observer.on_event(ProgressEvent::PipelineFinished);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pktsan_domain::value_objects::{AnonConfig, DedupConfig, MaskConfig, MaskPreservePolicy};
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
    fn discovers_only_capture_files_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pcap"), minimal_pcap_bytes()).unwrap();
        std::fs::write(dir.path().join("a.pcapng"), minimal_pcap_bytes()).unwrap();
        std::fs::write(dir.path().join("ignore.txt"), b"nope").unwrap();

        let files = discover_capture_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.pcapng"));
        assert!(files[1].ends_with("b.pcap"));
    }

    #[test]
    fn processes_every_file_in_a_directory() {
        let input_dir = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        std::fs::write(input_dir.path().join("one.pcap"), minimal_pcap_bytes()).unwrap();
        std::fs::write(input_dir.path().join("two.pcap"), minimal_pcap_bytes()).unwrap();

        let config = PipelineConfig {
            dedup: DedupConfig { enabled: true },
            anon: AnonConfig { enabled: false },
            mask: MaskConfig {
                enabled: false,
                preserve: MaskPreservePolicy::default(),
            },
        };
        let observer = NullProgressObserver;
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();

        let results = process_directory(
            input_dir.path(),
            output_dir.path(),
            &config,
            &pool,
            &observer,
            StopFlag::new(),
        )
        .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert!(output_dir.path().join("one.pcap").exists());
        assert!(output_dir.path().join("two.pcap").exists());
    }
}
