// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end tests driving the full stage chain against real PCAP bytes
//! on disk, covering the concrete scenarios laid out in the requirements
//! document's testable-properties section (duplicate removal, consistent
//! multi-file anonymization, and TLS-aware masking, including a record
//! split across two TCP segments and two records sharing one segment).

use std::net::Ipv4Addr;

use pktsan_core::io::{read_capture, write_capture, CaptureFile, CaptureFormat, RawPacket, TimeResolution};
use pktsan_core::pipeline::batch::build_shared_mapping;
use pktsan_core::pipeline::executor::PipelineExecutor;
use pktsan_core::stages::{DedupStage, MaskStage};
use pktsan_domain::value_objects::{
    AnonConfig, DedupConfig, MaskConfig, MaskPreservePolicy, PipelineConfig,
};
use pktsan_domain::NullProgressObserver;

fn ipv4_tcp_frame(src: [u8; 4], dst: [u8; 4], seq: u32, flags: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8; 14 + 20 + 20];
    frame[12] = 0x08;
    frame[13] = 0x00;
    let ip_total_len = (20 + 20 + payload.len()) as u16;
    {
        let ip = &mut frame[14..34];
        ip[0] = 0x45;
        ip[2..4].copy_from_slice(&ip_total_len.to_be_bytes());
        ip[9] = 6;
        ip[12..16].copy_from_slice(&src);
        ip[16..20].copy_from_slice(&dst);
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

fn udp_frame(src: [u8; 4], dst: [u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0u8; 14 + 20 + 8];
    frame[12] = 0x08;
    frame[13] = 0x00;
    let ip_total_len = (20 + 8 + payload.len()) as u16;
    {
        let ip = &mut frame[14..34];
        ip[0] = 0x45;
        ip[2..4].copy_from_slice(&ip_total_len.to_be_bytes());
        ip[9] = 17;
        ip[12..16].copy_from_slice(&src);
        ip[16..20].copy_from_slice(&dst);
    }
    {
        let udp = &mut frame[34..42];
        udp[0..2].copy_from_slice(&9999u16.to_be_bytes());
        udp[2..4].copy_from_slice(&9998u16.to_be_bytes());
        let udp_len = (8 + payload.len()) as u16;
        udp[4..6].copy_from_slice(&udp_len.to_be_bytes());
    }
    frame.extend_from_slice(payload);
    frame
}

fn packet(data: Vec<u8>) -> RawPacket {
    RawPacket {
        ts_secs: 0,
        ts_frac: 0,
        original_len: data.len() as u32,
        data,
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

fn tls_record(content_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![content_type, 0x03, 0x03];
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// S1 — a capture with three back-to-back copies of the same TCP SYN and one
/// unrelated UDP packet yields exactly one SYN (the first) plus the UDP
/// packet, in that order.
#[test]
fn s1_dedup_only_keeps_first_syn_and_unrelated_udp_in_order() {
    let syn = ipv4_tcp_frame([10, 0, 0, 1], [10, 0, 0, 2], 0, 0x02, &[]);
    let udp = udp_frame([10, 0, 0, 1], [10, 0, 0, 3], b"hello");
    let capture = capture_of(vec![
        packet(syn.clone()),
        packet(syn.clone()),
        packet(syn.clone()),
        packet(udp.clone()),
    ]);

    let (kept, stats) = DedupStage::new().run(&capture);

    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].data, syn);
    assert_eq!(kept[1].data, udp);
    assert_eq!(stats.counters["duplicates_removed"], 2);
}

/// S2 — across a two-file batch, `10.0.0.1` (present in both files) maps to
/// the same anonymized address everywhere, `10.0.0.2` shares its first three
/// octets (the `10.0.0` prefix is high-frequency: 3 occurrences), and the
/// mapping is identical across repeated runs on the same input.
#[test]
fn s2_anon_shares_mapping_and_prefix_across_a_multi_file_batch() {
    let file_a = capture_of(vec![
        packet(ipv4_tcp_frame([10, 0, 0, 1], [8, 8, 8, 8], 0, 0, &[])),
        packet(ipv4_tcp_frame([10, 0, 0, 2], [8, 8, 4, 4], 0, 0, &[])),
    ]);
    let file_b = capture_of(vec![packet(ipv4_tcp_frame(
        [10, 0, 0, 1],
        [1, 1, 1, 1],
        0,
        0,
        &[],
    ))]);

    let dir = tempfile::tempdir().unwrap();
    let path_a = dir.path().join("a.pcap");
    let path_b = dir.path().join("b.pcap");
    write_capture(&path_a, &file_a).unwrap();
    write_capture(&path_b, &file_b).unwrap();
    let files = vec![path_a.clone(), path_b.clone()];

    let table = build_shared_mapping(&files).unwrap();

    let addr1: Ipv4Addr = "10.0.0.1".parse().unwrap();
    let addr2: Ipv4Addr = "10.0.0.2".parse().unwrap();
    let mapped1 = table.get_v4(&addr1).expect("10.0.0.1 mapped");
    let mapped2 = table.get_v4(&addr2).expect("10.0.0.2 mapped");

    // Same original, same mapping everywhere in the batch.
    assert_eq!(mapped1.octets()[3], 1);
    // 10.0.0 occurred 3 times (>= 2), so .1 and .2 share the mapped A.B.C.
    assert_eq!(mapped1.octets()[0..3], mapped2.octets()[0..3]);
    assert_eq!(mapped2.octets()[3], 2);

    // Rerunning pre-scan + mapping on the same inputs is deterministic.
    let table2 = build_shared_mapping(&files).unwrap();
    assert_eq!(table.get_v4(&addr1), table2.get_v4(&addr1));
    assert_eq!(table.get_v4(&addr2), table2.get_v4(&addr2));
}

/// S3 — a single TLS 1.2-shaped session: one Handshake record, one
/// ChangeCipherSpec record, and an ApplicationData record. After masking,
/// handshake/ccs bytes are untouched and the application-data record keeps
/// only its 5-byte header, with `declared_length` zero bytes following.
#[test]
fn s3_mask_preserves_handshake_and_ccs_zeroes_application_data_payload() {
    let mut stream = tls_record(22, &[0xAA; 40]); // ClientHello-shaped
    stream.extend(tls_record(20, &[0x01])); // ChangeCipherSpec
    let app_data_payload = [0xBBu8; 64];
    stream.extend(tls_record(23, &app_data_payload));

    let capture = capture_of(vec![packet(ipv4_tcp_frame(
        [10, 0, 0, 1],
        [10, 0, 0, 2],
        0,
        0x18, // PSH+ACK
        &stream,
    ))]);

    let stage = MaskStage::new(MaskPreservePolicy::default());
    let (packets, stats) = stage.run(&capture);

    assert_eq!(stats.packets_modified, 1);
    let tcp_payload = &packets[0].data[54..];

    // Handshake record (bytes 0..45) untouched.
    assert_eq!(&tcp_payload[0..45], &stream[0..45]);
    // ChangeCipherSpec record (bytes 45..51) untouched.
    assert_eq!(&tcp_payload[45..51], &stream[45..51]);
    // ApplicationData header (5 bytes at offset 51) preserved, type 23.
    let app_data_start = 51;
    assert_eq!(tcp_payload[app_data_start], 23);
    assert_eq!(&tcp_payload[app_data_start..app_data_start + 5], &stream[app_data_start..app_data_start + 5]);
    // Payload beyond the header is all zero.
    assert!(tcp_payload[app_data_start + 5..].iter().all(|&b| b == 0));
    assert_eq!(tcp_payload.len(), stream.len());
}

/// S4 — a large TLS record delivered across four TCP segments: every
/// segment's payload survives byte-identical, no zero bytes introduced.
#[test]
fn s4_cross_segment_handshake_record_survives_byte_identical() {
    let payload = vec![0x42u8; 11_995]; // 5-byte header + payload = 12_000, divides evenly by 4
    let record = tls_record(22, &payload);

    let chunk_len = record.len() / 4;
    let chunks: Vec<&[u8]> = record.chunks(chunk_len).collect();

    let mut seq = 0u32;
    let mut packets = Vec::new();
    for chunk in &chunks {
        packets.push(packet(ipv4_tcp_frame(
            [10, 0, 0, 1],
            [10, 0, 0, 2],
            seq,
            0x10,
            chunk,
        )));
        seq += chunk.len() as u32;
    }
    let capture = capture_of(packets);

    let stage = MaskStage::new(MaskPreservePolicy::default());
    let (out_packets, stats) = stage.run(&capture);

    assert_eq!(stats.packets_modified, 0);
    for (pkt, chunk) in out_packets.iter().zip(chunks.iter()) {
        assert_eq!(&pkt.data[54..], *chunk);
    }
}

/// S6 — a single 80-byte TCP payload carrying an ApplicationData record (30
/// bytes) immediately followed by an Alert record (40 bytes... sized to the
/// declared lengths below): the first 5 bytes (the app-data header) and the
/// header-to-payload are preserved per-type, the app-data payload is
/// zeroed, and the entire alert record survives untouched.
#[test]
fn s6_mixed_application_data_and_alert_in_one_segment() {
    let mut segment = tls_record(23, &[0xCCu8; 30 - 5]); // total record len 30
    segment.extend(tls_record(21, &[0xDDu8; 40 - 5])); // total record len 40
    assert_eq!(segment.len(), 70);

    let capture = capture_of(vec![packet(ipv4_tcp_frame(
        [10, 0, 0, 1],
        [10, 0, 0, 2],
        0,
        0x10,
        &segment,
    ))]);

    let stage = MaskStage::new(MaskPreservePolicy::default());
    let (packets, stats) = stage.run(&capture);
    assert_eq!(stats.packets_modified, 1);

    let out = &packets[0].data[54..];
    // ApplicationData header preserved.
    assert_eq!(&out[0..5], &segment[0..5]);
    // ApplicationData payload zeroed.
    assert!(out[5..30].iter().all(|&b| b == 0));
    // Alert record (offset 30..70) preserved whole.
    assert_eq!(&out[30..70], &segment[30..70]);
}

/// S5-style end-to-end pipeline run: Dedup -> Anon -> Mask over one file
/// containing a duplicate TCP SYN and an application-data-bearing session.
/// After the pipeline: no duplicates remain, the IP addresses are
/// consistently rewritten, and application-data payload bytes are zeroed.
#[test]
fn full_pipeline_dedup_then_anon_then_mask() {
    let syn = ipv4_tcp_frame([10, 0, 0, 1], [10, 0, 0, 2], 0, 0x02, &[]);
    let app_data = tls_record(23, &[0x11u8; 20]);
    let data_pkt = ipv4_tcp_frame([10, 0, 0, 1], [10, 0, 0, 2], 1, 0x18, &app_data);

    let capture = capture_of(vec![
        packet(syn.clone()),
        packet(syn.clone()),
        packet(data_pkt),
    ]);

    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("in.pcap");
    write_capture(&input_path, &capture).unwrap();
    let output_path = dir.path().join("out.pcap");

    let config = PipelineConfig {
        dedup: DedupConfig { enabled: true },
        anon: AnonConfig { enabled: true },
        mask: MaskConfig {
            enabled: true,
            preserve: MaskPreservePolicy::default(),
        },
    };
    let observer = NullProgressObserver;
    let executor = PipelineExecutor::new(&config, &observer);
    let result = executor.run(&input_path, &output_path, None).unwrap();

    assert!(result.success);
    assert_eq!(result.stage_stats.len(), 3);
    assert_eq!(result.stage_stats[0].stage_name, "dedup");
    assert_eq!(result.stage_stats[0].counters["duplicates_removed"], 1);

    let out_capture = read_capture(&output_path).unwrap();
    assert_eq!(out_capture.packets.len(), 2);

    // The surviving SYN's IPv4 addresses are no longer the originals.
    let syn_out = &out_capture.packets[0].data;
    assert_ne!(&syn_out[26..30], &[10, 0, 0, 1][..]);
    assert_ne!(&syn_out[30..34], &[10, 0, 0, 2][..]);

    // The application-data packet's payload is zeroed beyond its header.
    let data_out = &out_capture.packets[1].data;
    let tcp_payload = &data_out[54..];
    assert_eq!(tcp_payload[0], 23);
    assert!(tcp_payload[5..].iter().all(|&b| b == 0));
}
