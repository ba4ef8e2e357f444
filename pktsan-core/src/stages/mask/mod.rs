// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Mask Stage
//!
//! Two explicit passes, never interleaved: [`MaskStage::analyze`] groups
//! packets into TCP flows, reassembles each direction, parses TLS records,
//! and builds a [`PreservationMask`] per flow/direction; [`MaskStage::rewrite`]
//! then zeroes every TCP payload byte outside its flow's preserved ranges
//! and recomputes the checksums that invalidates.
//!
//! This is the "enhanced" masker — internal TLS record-layer analysis, the
//! only engine [`pktsan_domain::Stage::process_file`] exposes. [`basic`]
//! keeps the externally-driven recipe masker as a library-only alternative.

pub mod basic;
pub mod reassembly;
pub mod tls;
pub mod tshark;

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::time::Instant;

use pktsan_domain::value_objects::{
    Direction, Endpoint, FlowKey, MaskPreservePolicy, PreservationMask, StageStats, TransportProtocol,
};
use pktsan_domain::{PktsanError, Stage};

use crate::io::{CaptureFile, RawPacket};
use crate::layers::walk;
use crate::stages::checksum;

use reassembly::{reassemble, DirectionStream, PacketContribution};

pub struct MaskStage {
    pub preserve: MaskPreservePolicy,
}

impl MaskStage {
    pub fn new(preserve: MaskPreservePolicy) -> Self {
        Self { preserve }
    }

    /// Pass 1. Returns, per flow/direction, the reassembled stream (kept so
    /// the rewrite pass can map packet index -> flow-relative offset) and
    /// its preservation mask, plus per-packet routing info the rewrite pass
    /// needs (control override, checksum recompute targets).
    fn analyze(&self, packets: &[RawPacket]) -> AnalysisResult {
        let mut contributions = Vec::new();
        let mut packet_info = vec![None; packets.len()];

        for (idx, pkt) in packets.iter().enumerate() {
            let stack = walk(&pkt.data);
            let Some(transport) = stack.transport else {
                continue;
            };
            if transport.protocol != TransportProtocol::Tcp {
                continue;
            }
            let Some(innermost) = stack.ip_layers.last() else {
                continue;
            };

            let src = Endpoint::new(innermost.src, transport.src_port);
            let dst = Endpoint::new(innermost.dst, transport.dst_port);
            let (flow_key, direction) = FlowKey::canonicalize(src, dst);

            packet_info[idx] = Some(PacketRoutingInfo {
                flow_key,
                direction,
                control_override: transport.flags.is_control_override(),
                ip_header_offset: innermost.header_range.start,
                tcp_offset: innermost.header_range.end,
                src_ip: innermost.src,
                dst_ip: innermost.dst,
                payload_offset_in_packet: transport.payload_range.start,
                payload_len: transport.payload_range.len(),
            });

            if transport.payload_range.is_empty() {
                continue;
            }
            contributions.push(PacketContribution {
                packet_index: idx,
                flow_key,
                direction,
                sequence_number: transport.sequence_number,
                payload_offset_in_packet: transport.payload_range.start,
                payload: pkt.data[transport.payload_range.clone()].to_vec(),
            });
        }

        let (streams, anomalous_flows) = reassemble(contributions);
        let mut masks = HashMap::with_capacity(streams.len());
        for (key, stream) in &streams {
            if anomalous_flows.contains(key) {
                continue;
            }
            masks.insert(*key, self.build_mask(stream));
        }

        AnalysisResult {
            packet_info,
            streams,
            masks,
            anomalous_flows,
        }
    }

    fn build_mask(&self, stream: &DirectionStream) -> PreservationMask {
        let mut mask = PreservationMask::new();
        let records = tls::parse_records(&stream.bytes);
        for record in &records {
            for range in tls::preserved_ranges(record, &self.preserve) {
                mask.insert(range);
            }
        }
        mask
    }

    /// Pass 2: rewrites `packets` in place per `analysis`, returning the
    /// number of packets whose payload changed.
    fn rewrite(&self, packets: &mut [RawPacket], analysis: &AnalysisResult) -> u64 {
        let mut modified = 0u64;

        for (idx, pkt) in packets.iter_mut().enumerate() {
            let Some(info) = &analysis.packet_info[idx] else {
                continue;
            };
            if info.control_override || info.payload_len == 0 {
                continue;
            }
            if analysis.anomalous_flows.contains(&(info.flow_key, info.direction)) {
                // Flow anomaly (impossible reassembly): pass this packet
                // through unchanged rather than trust an unanalyzable mask.
                continue;
            }
            let Some(stream) = analysis.streams.get(&(info.flow_key, info.direction)) else {
                continue;
            };
            let Some(segment) = stream
                .segments
                .iter()
                .find(|s| s.packet_index == idx)
            else {
                continue;
            };
            let mask = analysis
                .masks
                .get(&(info.flow_key, info.direction))
                .cloned()
                .unwrap_or_default();

            let flow_start = segment.offset_in_flow;
            let flow_end = flow_start + info.payload_len as u64;
            let preserved = mask.intersect(flow_start..flow_end);

            let payload_start = info.payload_offset_in_packet;
            let original: Vec<u8> = pkt.data[payload_start..payload_start + info.payload_len].to_vec();
            let mut rewritten = vec![0u8; info.payload_len];
            for range in preserved {
                let rel_start = (range.start - flow_start) as usize;
                let rel_end = (range.end - flow_start) as usize;
                rewritten[rel_start..rel_end].copy_from_slice(&original[rel_start..rel_end]);
            }

            if rewritten != original {
                pkt.data[payload_start..payload_start + info.payload_len].copy_from_slice(&rewritten);
                modified += 1;
                recompute_checksums(&mut pkt.data, info);
            }
        }

        modified
    }

    pub fn run(&self, capture: &CaptureFile) -> (Vec<RawPacket>, StageStats) {
        let start = Instant::now();
        let analysis = self.analyze(&capture.packets);
        let mut packets = capture.packets.clone();
        let modified = self.rewrite(&mut packets, &analysis);

        let mut stats = StageStats::new("mask");
        stats.packets_processed = capture.packets.len() as u64;
        stats.packets_modified = modified;
        stats.duration = start.elapsed();
        stats.record_counter("flows_analyzed", analysis.streams.len() as u64);
        stats.record_counter("flow_anomalies", analysis.anomalous_flows.len() as u64);
        (packets, stats)
    }
}

struct AnalysisResult {
    packet_info: Vec<Option<PacketRoutingInfo>>,
    streams: HashMap<(FlowKey, Direction), DirectionStream>,
    masks: HashMap<(FlowKey, Direction), PreservationMask>,
    anomalous_flows: std::collections::HashSet<(FlowKey, Direction)>,
}

#[derive(Clone)]
struct PacketRoutingInfo {
    flow_key: FlowKey,
    direction: Direction,
    control_override: bool,
    ip_header_offset: usize,
    tcp_offset: usize,
    src_ip: IpAddr,
    dst_ip: IpAddr,
    payload_offset_in_packet: usize,
    payload_len: usize,
}

fn recompute_checksums(frame: &mut [u8], info: &PacketRoutingInfo) {
    match (info.src_ip, info.dst_ip) {
        (IpAddr::V4(src), IpAddr::V4(dst)) => {
            let _ = checksum::recompute_ipv4_header_checksum(frame, info.ip_header_offset);
            let _ = checksum::recompute_tcp_ipv4_checksum(frame, info.tcp_offset, src, dst);
        }
        (IpAddr::V6(src), IpAddr::V6(dst)) => {
            let _ = checksum::recompute_tcp_ipv6_checksum(frame, info.tcp_offset, src, dst);
        }
        _ => {}
    }
}

impl Stage for MaskStage {
    fn name(&self) -> &'static str {
        "mask"
    }

    fn process_file(&mut self, input: &Path, output: &Path) -> Result<StageStats, PktsanError> {
        let capture = crate::io::read_capture(input)?;
        let (packets, stats) = self.run(&capture);
        let mut out = capture;
        out.packets = packets;
        crate::io::write_capture(output, &out)?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{CaptureFormat, TimeResolution};

    fn tls_record(content_type: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![content_type, 0x03, 0x03];
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn tcp_frame(seq: u32, flags: u8, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; 14 + 20 + 20];
        frame[12] = 0x08;
        frame[13] = 0x00;
        let ip_total_len = (20 + 20 + payload.len()) as u16;
        {
            let ip = &mut frame[14..34];
            ip[0] = 0x45;
            ip[2..4].copy_from_slice(&ip_total_len.to_be_bytes());
            ip[9] = 6;
            ip[12..16].copy_from_slice(&[10, 0, 0, 1]);
            ip[16..20].copy_from_slice(&[10, 0, 0, 2]);
        }
        {
            let tcp = &mut frame[34..54];
            tcp[0..2].copy_from_slice(&51000u16.to_be_bytes());
            tcp[2..4].copy_from_slice(&443u16.to_be_bytes());
            tcp[4..8].copy_from_slice(&seq.to_be_bytes());
            tcp[12] = 5 << 4;
            tcp[13] = flags;
        }
        frame.extend_from_slice(payload);
        frame
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

    fn packet(data: Vec<u8>) -> RawPacket {
        RawPacket {
            ts_secs: 0,
            ts_frac: 0,
            original_len: data.len() as u32,
            data,
        }
    }

    #[test]
    fn application_data_payload_is_zeroed_beyond_header() {
        let payload = tls_record(23, &[0xAAu8; 10]);
        let capture = capture_of(vec![packet(tcp_frame(0, 0x10, &payload))]);
        let stage = MaskStage::new(MaskPreservePolicy::default());
        let (packets, stats) = stage.run(&capture);

        assert_eq!(stats.packets_modified, 1);
        let tcp_payload = &packets[0].data[54..];
        assert_eq!(&tcp_payload[0..5], &payload[0..5]);
        assert!(tcp_payload[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn handshake_payload_is_preserved_byte_identical() {
        let payload = tls_record(22, &[1, 2, 3, 4, 5]);
        let capture = capture_of(vec![packet(tcp_frame(0, 0x10, &payload))]);
        let stage = MaskStage::new(MaskPreservePolicy::default());
        let (packets, stats) = stage.run(&capture);

        assert_eq!(stats.packets_modified, 0);
        assert_eq!(&packets[0].data[54..], &payload[..]);
    }

    #[test]
    fn overlapping_non_matching_segments_pass_through_unchanged_as_flow_anomaly() {
        let payload_a = tls_record(23, &[0xAAu8; 10]);
        let payload_b = tls_record(23, &[0xBBu8; 10]);
        let capture = capture_of(vec![
            packet(tcp_frame(0, 0x10, &payload_a)),
            packet(tcp_frame(5, 0x10, &payload_b)),
        ]);
        let stage = MaskStage::new(MaskPreservePolicy::default());
        let (packets, stats) = stage.run(&capture);

        assert_eq!(stats.packets_modified, 0);
        assert_eq!(stats.counters.get("flow_anomalies"), Some(&1));
        assert_eq!(&packets[0].data[54..], &payload_a[..]);
        assert_eq!(&packets[1].data[54..], &payload_b[..]);
    }

    #[test]
    fn syn_packet_bypasses_masking_even_with_payload() {
        let payload = tls_record(23, &[0xAAu8; 10]);
        let capture = capture_of(vec![packet(tcp_frame(0, 0x02, &payload))]); // SYN
        let stage = MaskStage::new(MaskPreservePolicy::default());
        let (packets, stats) = stage.run(&capture);

        assert_eq!(stats.packets_modified, 0);
        assert_eq!(&packets[0].data[54..], &payload[..]);
    }
}
