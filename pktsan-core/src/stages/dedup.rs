// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Dedup Stage
//!
//! Removes byte-identical packet records. Two records are identical if
//! their captured link-layer bytes match exactly, capture metadata (the
//! per-record timestamp and original/captured lengths) excluded. The first
//! occurrence of each distinct record wins; output order always matches
//! input order.

use std::time::Instant;

use sha2::{Digest, Sha256};

use pktsan_domain::value_objects::StageStats;
use pktsan_domain::PktsanError;

use crate::io::{CaptureFile, RawPacket};

#[derive(Debug, Clone, Copy, Default)]
pub struct DedupStage;

impl DedupStage {
    pub fn new() -> Self {
        Self
    }

    /// Runs the dedup pass over an already-decoded capture, returning the
    /// deduplicated packet list and the stats the caller should fold into
    /// the stage chain's `StageStats`.
    pub fn run(&self, capture: &CaptureFile) -> (Vec<RawPacket>, StageStats) {
        let start = Instant::now();
        let mut seen: std::collections::HashSet<[u8; 32]> =
            std::collections::HashSet::with_capacity(capture.packets.len());
        let mut kept = Vec::with_capacity(capture.packets.len());
        let mut removed: u64 = 0;

        for pkt in &capture.packets {
            let digest = digest_of(&pkt.data);
            if seen.insert(digest) {
                kept.push(pkt.clone());
            } else {
                removed += 1;
            }
        }

        let mut stats = StageStats::new("dedup");
        stats.packets_processed = capture.packets.len() as u64;
        stats.packets_modified = removed;
        stats.duration = start.elapsed();
        stats.record_counter("duplicates_removed", removed);
        stats.record_counter("packets_kept", kept.len() as u64);
        (kept, stats)
    }
}

fn digest_of(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

impl pktsan_domain::Stage for DedupStage {
    fn name(&self) -> &'static str {
        "dedup"
    }

    fn process_file(
        &mut self,
        input: &std::path::Path,
        output: &std::path::Path,
    ) -> Result<StageStats, PktsanError> {
        let capture = crate::io::read_capture(input)?;
        let (kept, stats) = self.run(&capture);
        let mut out = capture;
        out.packets = kept;
        crate::io::write_capture(output, &out)?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{CaptureFormat, TimeResolution};

    fn packet(bytes: &[u8]) -> RawPacket {
        RawPacket {
            ts_secs: 0,
            ts_frac: 0,
            original_len: bytes.len() as u32,
            data: bytes.to_vec(),
        }
    }

    fn capture_of(packets: Vec<RawPacket>) -> CaptureFile {
        CaptureFile {
            format: CaptureFormat::Pcap,
            linktype: 1,
            time_resolution: TimeResolution::Micros,
            snaplen: 65535,
            packets,
        }
    }

    #[test]
    fn keeps_first_occurrence_and_drops_later_duplicates() {
        let capture = capture_of(vec![
            packet(b"abc"),
            packet(b"xyz"),
            packet(b"abc"),
            packet(b"abc"),
        ]);
        let (kept, stats) = DedupStage::new().run(&capture);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].data, b"abc");
        assert_eq!(kept[1].data, b"xyz");
        assert_eq!(stats.counters["duplicates_removed"], 2);
    }

    #[test]
    fn preserves_order_with_no_duplicates() {
        let capture = capture_of(vec![packet(b"one"), packet(b"two"), packet(b"three")]);
        let (kept, stats) = DedupStage::new().run(&capture);
        assert_eq!(kept.len(), 3);
        assert_eq!(stats.counters["duplicates_removed"], 0);
    }

    #[test]
    fn idempotent_on_an_already_deduplicated_capture() {
        let capture = capture_of(vec![packet(b"one"), packet(b"two")]);
        let (first_pass, _) = DedupStage::new().run(&capture);
        let (second_pass, stats2) = DedupStage::new().run(&capture_of(first_pass.clone()));
        assert_eq!(first_pass.len(), second_pass.len());
        assert_eq!(stats2.counters["duplicates_removed"], 0);
    }
}
