// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Inspect Report
//!
//! `pktsan inspect` reads a capture file and walks it the same way the Anon
//! and Mask stages do, but read-only: no packet is ever rewritten. Useful
//! for sanity-checking a capture, or previewing what a subsequent `sanitize`
//! run would find, before committing to it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use pktsan_core::io::read_capture;
use pktsan_core::layers::walk;
use pktsan_core::stages::mask::reassembly::{reassemble, PacketContribution};
use pktsan_core::stages::mask::tls::parse_records;
use pktsan_domain::value_objects::{ContentType, Endpoint, FlowKey, TransportProtocol};
use pktsan_domain::PktsanError;

#[derive(Debug, Default, Serialize)]
pub struct InspectReport {
    pub file: String,
    pub total_packets: u64,
    pub ipv4_layers: u64,
    pub ipv6_layers: u64,
    pub encapsulated_packets: u64,
    pub tcp_packets: u64,
    pub udp_packets: u64,
    pub tcp_flows: u64,
    pub tls_record_counts: BTreeMap<String, u64>,
    pub incomplete_tls_records: u64,
}

fn content_type_label(ct: &ContentType) -> String {
    match ct {
        ContentType::ChangeCipherSpec => "change_cipher_spec".to_string(),
        ContentType::Alert => "alert".to_string(),
        ContentType::Handshake => "handshake".to_string(),
        ContentType::ApplicationData => "application_data".to_string(),
        ContentType::Heartbeat => "heartbeat".to_string(),
        ContentType::Unknown(b) => format!("unknown({b})"),
    }
}

/// Builds an [`InspectReport`] for `path` without mutating it.
pub fn build_report(path: &Path) -> Result<InspectReport, PktsanError> {
    let capture = read_capture(path)?;
    let mut report = InspectReport {
        file: path.to_string_lossy().into_owned(),
        ..Default::default()
    };

    let mut contributions = Vec::new();
    for (idx, pkt) in capture.packets.iter().enumerate() {
        report.total_packets += 1;
        let stack = walk(&pkt.data);
        if !stack.ip_layers.is_empty() {
            report.encapsulated_packets += (stack.ip_layers.len() > 1) as u64;
        }
        for ip_layer in &stack.ip_layers {
            match ip_layer.src {
                std::net::IpAddr::V4(_) => report.ipv4_layers += 1,
                std::net::IpAddr::V6(_) => report.ipv6_layers += 1,
            }
        }

        let Some(transport) = stack.transport else {
            continue;
        };
        match transport.protocol {
            TransportProtocol::Tcp => report.tcp_packets += 1,
            TransportProtocol::Udp => {
                report.udp_packets += 1;
                continue;
            }
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
        contributions.push(PacketContribution {
            packet_index: idx,
            flow_key,
            direction,
            sequence_number: transport.sequence_number,
            payload_offset_in_packet: transport.payload_range.start,
            payload: pkt.data[transport.payload_range.clone()].to_vec(),
        });
    }

    let (streams, _anomalous_flows) = reassemble(contributions);
    let mut flow_keys = std::collections::HashSet::new();
    for ((flow_key, _direction), stream) in &streams {
        flow_keys.insert(*flow_key);
        for record in parse_records(&stream.bytes) {
            if !record.is_complete {
                report.incomplete_tls_records += 1;
            }
            *report.tls_record_counts.entry(content_type_label(&record.content_type)).or_insert(0) += 1;
        }
    }
    report.tcp_flows = flow_keys.len() as u64;

    Ok(report)
}

/// Runs `pktsan inspect` end to end: builds the report and prints it either
/// as JSON or as a short human-readable summary.
pub fn inspect(path: &Path, json: bool) -> Result<(), PktsanError> {
    let report = build_report(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.file);
        println!("  packets: {}", report.total_packets);
        println!(
            "  ip layers: {} v4, {} v6 ({} encapsulated packets)",
            report.ipv4_layers, report.ipv6_layers, report.encapsulated_packets
        );
        println!(
            "  transport: {} tcp packets, {} udp packets, {} tcp flows",
            report.tcp_packets, report.udp_packets, report.tcp_flows
        );
        if report.tls_record_counts.is_empty() {
            println!("  tls records: none");
        } else {
            println!("  tls records:");
            for (kind, count) in &report.tls_record_counts {
                println!("    {kind}: {count}");
            }
            if report.incomplete_tls_records > 0 {
                println!("  incomplete tls records: {}", report.incomplete_tls_records);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn builds_a_report_for_an_empty_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pcap");
        std::fs::write(&path, minimal_pcap_bytes()).unwrap();

        let report = build_report(&path).unwrap();
        assert_eq!(report.total_packets, 0);
        assert_eq!(report.tcp_flows, 0);
        assert!(report.tls_record_counts.is_empty());
    }
}
