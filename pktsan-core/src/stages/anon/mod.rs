// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Anon Stage
//!
//! Two passes over the capture: a pre-scan that tabulates address frequency
//! at every prefix level and builds a total, injective, deterministic
//! original-to-anonymized mapping, and a rewrite pass that overwrites every
//! IP header found (at any encapsulation depth) and recomputes the
//! checksums that address change invalidates.

pub mod mapping;
pub mod prng;

use std::net::IpAddr;
use std::path::Path;
use std::time::Instant;

use pktsan_domain::value_objects::{IpMappingTable, StageStats};
use pktsan_domain::{PktsanError, Stage};

use crate::io::{CaptureFile, RawPacket};
use crate::layers::walk;
use crate::stages::checksum;

pub use mapping::{FrequencyTables, SegmentMaps};

#[derive(Debug, Default)]
pub struct AnonStage;

impl AnonStage {
    pub fn new() -> Self {
        Self
    }

    /// Pre-scan: walks every packet's encapsulation stack, tallying address
    /// frequency and returning the scan-time encapsulation counters the
    /// original tool also reports purely for diagnostics.
    ///
    /// `pub(crate)` so `pipeline::batch` can accumulate frequency across
    /// every file in a batch before any mapping is built, matching the
    /// spec's single shared mapping table per batch.
    pub(crate) fn prescan(&self, packets: &[RawPacket]) -> (FrequencyTables, EncapStats) {
        let mut freq = FrequencyTables::new();
        let mut stats = EncapStats::default();

        for pkt in packets {
            let stack = walk(&pkt.data);
            stats.total_packets_scanned += 1;
            if stack.ip_layers.is_empty() {
                stats.plain_packets += 1;
            } else {
                stats.encapsulated_packets += 1;
                if stack.ip_layers.len() > 1 {
                    stats.multi_layer_ip_packets += 1;
                }
            }
            for ip_layer in &stack.ip_layers {
                record_address(&mut freq, ip_layer.src);
                record_address(&mut freq, ip_layer.dst);
            }
        }

        (freq, stats)
    }

    /// Builds the injective mapping table for every address the pre-scan
    /// observed, using the hierarchical, frequency-aware algorithm.
    fn build_mapping(&self, packets: &[RawPacket], freq: &FrequencyTables) -> IpMappingTable {
        let mut maps = SegmentMaps::new();
        let mut table = IpMappingTable::new();
        self.extend_mapping(packets, freq, &mut maps, &mut table);
        table
    }

    /// Extends `table` (and the level-by-level replacement bookkeeping in
    /// `maps`) with every address found in `packets` that `table` doesn't
    /// already cover. Reusing the same `maps`/`table` pair across every file
    /// in a batch is what gives a batch one shared, injective mapping
    /// instead of one independent mapping per file.
    ///
    /// Addresses are mapped in a fixed order rather than packet-encounter
    /// order: the distinct addresses `packets` contributes are collected
    /// first, then visited IPv4-before-IPv6 and numerically ascending
    /// within each family (the ordering `IpAddr`'s `Ord` impl already gives
    /// a `BTreeSet`), so segment selection at each prefix level doesn't
    /// depend on which packet happened to carry an address first.
    pub(crate) fn extend_mapping(
        &self,
        packets: &[RawPacket],
        freq: &FrequencyTables,
        maps: &mut SegmentMaps,
        table: &mut IpMappingTable,
    ) {
        let mut distinct = std::collections::BTreeSet::new();
        for pkt in packets {
            let stack = walk(&pkt.data);
            for ip_layer in &stack.ip_layers {
                distinct.insert(ip_layer.src);
                distinct.insert(ip_layer.dst);
            }
        }

        for addr in distinct {
            match addr {
                IpAddr::V4(v4) => {
                    if table.get_v4(&v4).is_none() {
                        let anon = mapping::anonymize_ipv4(v4, freq, maps);
                        table.insert_v4(v4, anon);
                    }
                }
                IpAddr::V6(v6) => {
                    if table.get_v6(&v6).is_none() {
                        let anon = mapping::anonymize_ipv6(v6, freq, maps);
                        table.insert_v6(v6, anon);
                    }
                }
            }
        }
    }

    /// Rewrites every IP header in `packets` according to `table`,
    /// recomputing the checksums each rewrite invalidates. Returns the
    /// number of packets with at least one address changed.
    pub fn rewrite(&self, packets: &mut [RawPacket], table: &IpMappingTable) -> u64 {
        let mut modified = 0u64;
        for pkt in packets.iter_mut() {
            if rewrite_packet(&mut pkt.data, table) {
                modified += 1;
            }
        }
        modified
    }

    /// Runs the full pre-scan + mapping + rewrite sequence, consistent with
    /// `Stage::process_file`'s single-file, single-pass-chain contract.
    pub fn run(&self, capture: &CaptureFile) -> (Vec<RawPacket>, IpMappingTable, StageStats) {
        let start = Instant::now();
        let (freq, encap_stats) = self.prescan(&capture.packets);
        let table = self.build_mapping(&capture.packets, &freq);

        let mut packets = capture.packets.clone();
        let modified = self.rewrite(&mut packets, &table);

        let mut stats = StageStats::new("anon");
        stats.packets_processed = capture.packets.len() as u64;
        stats.packets_modified = modified;
        stats.duration = start.elapsed();
        stats.record_counter("ips_anonymized", table.len() as u64);
        stats.record_counter("total_packets_scanned", encap_stats.total_packets_scanned);
        stats.record_counter("encapsulated_packets", encap_stats.encapsulated_packets);
        stats.record_counter("multi_layer_ip_packets", encap_stats.multi_layer_ip_packets);
        stats.record_counter("plain_packets", encap_stats.plain_packets);

        (packets, table, stats)
    }
}

#[derive(Debug, Default)]
pub(crate) struct EncapStats {
    pub(crate) total_packets_scanned: u64,
    pub(crate) encapsulated_packets: u64,
    pub(crate) multi_layer_ip_packets: u64,
    pub(crate) plain_packets: u64,
}

impl EncapStats {
    pub(crate) fn merge(&mut self, other: &EncapStats) {
        self.total_packets_scanned += other.total_packets_scanned;
        self.encapsulated_packets += other.encapsulated_packets;
        self.multi_layer_ip_packets += other.multi_layer_ip_packets;
        self.plain_packets += other.plain_packets;
    }
}

fn record_address(freq: &mut FrequencyTables, addr: IpAddr) {
    match addr {
        IpAddr::V4(v4) => freq.record_ipv4(v4),
        IpAddr::V6(v6) => freq.record_ipv6(v6),
    }
}

/// Overwrites every IP layer's address bytes in `frame` and recomputes the
/// checksums that invalidates. Returns whether anything changed.
fn rewrite_packet(frame: &mut [u8], table: &IpMappingTable) -> bool {
    let stack = walk(frame);
    if stack.ip_layers.is_empty() {
        return false;
    }

    let mut changed = false;
    for ip_layer in &stack.ip_layers {
        let new_src = mapped_addr(ip_layer.src, table);
        let new_dst = mapped_addr(ip_layer.dst, table);
        if new_src == ip_layer.src && new_dst == ip_layer.dst {
            continue;
        }
        changed = true;
        match (new_src, new_dst) {
            (IpAddr::V4(src), IpAddr::V4(dst)) => {
                let start = ip_layer.header_range.start;
                frame[start + 12..start + 16].copy_from_slice(&src.octets());
                frame[start + 16..start + 20].copy_from_slice(&dst.octets());
                let _ = checksum::recompute_ipv4_header_checksum(frame, start);
            }
            (IpAddr::V6(src), IpAddr::V6(dst)) => {
                let start = ip_layer.header_range.start;
                frame[start + 8..start + 24].copy_from_slice(&src.octets());
                frame[start + 24..start + 40].copy_from_slice(&dst.octets());
            }
            _ => {}
        }
    }

    if changed {
        if let Some(innermost) = stack.ip_layers.last() {
            let src = mapped_addr(innermost.src, table);
            let dst = mapped_addr(innermost.dst, table);
            if let Some(transport) = &stack.transport {
                let tcp_or_udp_offset = innermost.header_range.end;
                recompute_transport_checksum(frame, tcp_or_udp_offset, transport.protocol, src, dst);
            }
        }
    }

    changed
}

fn mapped_addr(addr: IpAddr, table: &IpMappingTable) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => table.get_v4(&v4).map(IpAddr::V4).unwrap_or(addr),
        IpAddr::V6(v6) => table.get_v6(&v6).map(IpAddr::V6).unwrap_or(addr),
    }
}

fn recompute_transport_checksum(
    frame: &mut [u8],
    offset: usize,
    protocol: pktsan_domain::value_objects::TransportProtocol,
    src: IpAddr,
    dst: IpAddr,
) {
    use pktsan_domain::value_objects::TransportProtocol;
    let result = match (protocol, src, dst) {
        (TransportProtocol::Tcp, IpAddr::V4(s), IpAddr::V4(d)) => {
            checksum::recompute_tcp_ipv4_checksum(frame, offset, s, d)
        }
        (TransportProtocol::Tcp, IpAddr::V6(s), IpAddr::V6(d)) => {
            checksum::recompute_tcp_ipv6_checksum(frame, offset, s, d)
        }
        (TransportProtocol::Udp, IpAddr::V4(s), IpAddr::V4(d)) => {
            checksum::recompute_udp_ipv4_checksum(frame, offset, s, d)
        }
        (TransportProtocol::Udp, IpAddr::V6(s), IpAddr::V6(d)) => {
            checksum::recompute_udp_ipv6_checksum(frame, offset, s, d)
        }
        _ => Ok(()),
    };
    let _ = result;
}

impl Stage for AnonStage {
    fn name(&self) -> &'static str {
        "anon"
    }

    fn process_file(&mut self, input: &Path, output: &Path) -> Result<StageStats, PktsanError> {
        let capture = crate::io::read_capture(input)?;
        let (packets, _table, stats) = self.run(&capture);
        let mut out = capture;
        out.packets = packets;
        crate::io::write_capture(output, &out)?;
        Ok(stats)
    }
}
