// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Basic Masker
//!
//! A fallback masker driven entirely by an externally supplied
//! [`MaskingRecipe`] rather than internal TLS analysis — useful when a
//! caller already knows which byte ranges to keep (from an out-of-band TLS
//! key log, a prior `pktsan-core::stages::mask` analysis pass, or a test
//! fixture) and wants masking without re-deriving it. Reachable only
//! through the library API: the CLI always selects the enhanced masker.

use std::collections::HashMap;
use std::ops::Range;

use pktsan_domain::value_objects::{Direction, FlowKey, PreservationMask};

use crate::io::{CaptureFile, RawPacket};
use crate::layers::walk;
use crate::stages::checksum;

/// One flow/direction's preserved byte ranges, supplied by the caller
/// instead of derived from TLS record parsing.
#[derive(Debug, Clone)]
pub struct MaskingRecipeEntry {
    pub flow_key: FlowKey,
    pub direction: Direction,
    pub preserve_ranges: Vec<Range<u64>>,
}

/// A complete externally supplied masking plan.
#[derive(Debug, Clone, Default)]
pub struct MaskingRecipe {
    pub entries: Vec<MaskingRecipeEntry>,
}

impl MaskingRecipe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: MaskingRecipeEntry) {
        self.entries.push(entry);
    }

    fn masks(&self) -> HashMap<(FlowKey, Direction), PreservationMask> {
        let mut masks: HashMap<(FlowKey, Direction), PreservationMask> = HashMap::new();
        for entry in &self.entries {
            let mask = masks.entry((entry.flow_key, entry.direction)).or_default();
            for range in &entry.preserve_ranges {
                mask.insert(range.clone());
            }
        }
        masks
    }
}

/// Applies a [`MaskingRecipe`] to a capture, tracking each packet's
/// sequence-relative flow offset the same way the enhanced masker does, but
/// without running TLS analysis: the caller's recipe is authoritative.
pub struct BasicMasker {
    recipe: MaskingRecipe,
}

impl BasicMasker {
    pub fn new(recipe: MaskingRecipe) -> Self {
        Self { recipe }
    }

    pub fn run(&self, capture: &CaptureFile) -> Vec<RawPacket> {
        use pktsan_domain::value_objects::{Endpoint, TransportProtocol};
        use std::net::IpAddr;

        let masks = self.recipe.masks();
        // Per-flow/direction running byte offset, reconstructed from TCP
        // sequence numbers the same way the reassembly pass does, but
        // without materializing the full stream (the recipe already knows
        // what to preserve; only offsets are needed here).
        let mut next_offset: HashMap<(FlowKey, Direction), u64> = HashMap::new();
        let mut seen_seq: HashMap<(FlowKey, Direction), Vec<(u32, u32)>> = HashMap::new();

        let mut packets = capture.packets.clone();
        for pkt in packets.iter_mut() {
            let stack = walk(&pkt.data);
            let Some(transport) = stack.transport else {
                continue;
            };
            if transport.protocol != TransportProtocol::Tcp || transport.flags.is_control_override() {
                continue;
            }
            let Some(innermost) = stack.ip_layers.last() else {
                continue;
            };
            if transport.payload_range.is_empty() {
                continue;
            }

            let src = Endpoint::new(innermost.src, transport.src_port);
            let dst = Endpoint::new(innermost.dst, transport.dst_port);
            let (flow_key, direction) = FlowKey::canonicalize(src, dst);
            let key = (flow_key, direction);

            let seen = seen_seq.entry(key).or_default();
            let seq = transport.sequence_number;
            let len = transport.payload_range.len() as u32;
            if seen.iter().any(|&(s, l)| seq + len <= s + l) {
                continue; // retransmission already accounted for
            }
            let flow_start = *next_offset.get(&key).unwrap_or(&0);
            seen.push((seq, len));
            next_offset.insert(key, flow_start + len as u64);

            let Some(mask) = masks.get(&key) else {
                continue;
            };
            let preserved = mask.intersect(flow_start..flow_start + len as u64);
            if preserved.len() == 1
                && preserved[0].start == flow_start
                && preserved[0].end == flow_start + len as u64
            {
                continue; // entire payload preserved, nothing to rewrite
            }

            let start = transport.payload_range.start;
            let original: Vec<u8> = pkt.data[start..start + len as usize].to_vec();
            let mut rewritten = vec![0u8; len as usize];
            for range in preserved {
                let rel_start = (range.start - flow_start) as usize;
                let rel_end = (range.end - flow_start) as usize;
                rewritten[rel_start..rel_end].copy_from_slice(&original[rel_start..rel_end]);
            }
            pkt.data[start..start + len as usize].copy_from_slice(&rewritten);

            match (innermost.src, innermost.dst) {
                (IpAddr::V4(s), IpAddr::V4(d)) => {
                    let _ = checksum::recompute_ipv4_header_checksum(&mut pkt.data, innermost.header_range.start);
                    let _ = checksum::recompute_tcp_ipv4_checksum(&mut pkt.data, innermost.header_range.end, s, d);
                }
                (IpAddr::V6(s), IpAddr::V6(d)) => {
                    let _ = checksum::recompute_tcp_ipv6_checksum(&mut pkt.data, innermost.header_range.end, s, d);
                }
                _ => {}
            }
        }

        packets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{CaptureFormat, RawPacket, TimeResolution};
    use pktsan_domain::value_objects::Endpoint;
    use std::net::IpAddr;

    fn tcp_frame(payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; 14 + 20 + 20];
        frame[12] = 0x08;
        frame[13] = 0x00;
        let ip = &mut frame[14..34];
        ip[0] = 0x45;
        ip[9] = 6;
        ip[12..16].copy_from_slice(&[10, 0, 0, 1]);
        ip[16..20].copy_from_slice(&[10, 0, 0, 2]);
        let tcp = &mut frame[34..54];
        tcp[0..2].copy_from_slice(&51000u16.to_be_bytes());
        tcp[2..4].copy_from_slice(&443u16.to_be_bytes());
        tcp[12] = 5 << 4;
        frame.extend_from_slice(payload);
        frame
    }

    #[test]
    fn preserves_only_the_recipe_supplied_ranges() {
        let payload = [0xAAu8; 10];
        let frame = tcp_frame(&payload);
        let capture = CaptureFile {
            format: CaptureFormat::Pcap,
            linktype: 1,
            time_resolution: TimeResolution::Micros,
            snaplen: 65535,
            packets: vec![RawPacket {
                ts_secs: 0,
                ts_frac: 0,
                original_len: frame.len() as u32,
                data: frame,
            }],
        };

        let src = Endpoint::new("10.0.0.1".parse::<IpAddr>().unwrap(), 51000);
        let dst = Endpoint::new("10.0.0.2".parse::<IpAddr>().unwrap(), 443);
        let (flow_key, direction) = FlowKey::canonicalize(src, dst);

        let mut recipe = MaskingRecipe::new();
        recipe.push(MaskingRecipeEntry {
            flow_key,
            direction,
            preserve_ranges: vec![0..3],
        });

        let masker = BasicMasker::new(recipe);
        let out = masker.run(&capture);
        let tcp_payload = &out[0].data[54..];
        assert_eq!(&tcp_payload[0..3], &[0xAA, 0xAA, 0xAA]);
        assert!(tcp_payload[3..].iter().all(|&b| b == 0));
    }
}
