// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! TLS record-layer parser over a reassembled flow-direction byte stream.

use pktsan_domain::value_objects::{ContentType, MaskPreservePolicy, TlsRecord};

/// Walks `stream` from offset 0, returning every TLS record found.
///
/// At each position: if the next five bytes look like a TLS record header
/// (a known content-type byte), the record is recorded — complete if its
/// declared payload fits within the stream, incomplete (truncated at the
/// stream's end) otherwise, which stops the walk. If the header doesn't
/// look like TLS, the offset advances by one byte and the walk retries,
/// tolerating a stream that happens to begin with non-TLS bytes.
pub fn parse_records(stream: &[u8]) -> Vec<TlsRecord> {
    let mut records = Vec::new();
    let mut i: u64 = 0;
    let len = stream.len() as u64;

    while i + TlsRecord::HEADER_LEN <= len {
        let idx = i as usize;
        let content_type = ContentType::from_byte(stream[idx]);
        if !content_type.is_known() {
            i += 1;
            continue;
        }

        let version = u16::from_be_bytes([stream[idx + 1], stream[idx + 2]]);
        let declared_length = u16::from_be_bytes([stream[idx + 3], stream[idx + 4]]) as u32;
        let header_range = i..i + TlsRecord::HEADER_LEN;
        let payload_start = header_range.end;
        let payload_end = payload_start + declared_length as u64;

        if payload_end <= len {
            records.push(TlsRecord {
                content_type,
                version,
                declared_length,
                header_range,
                payload_range: payload_start..payload_end,
                is_complete: true,
            });
            i = payload_end;
        } else {
            records.push(TlsRecord {
                content_type,
                version,
                declared_length,
                header_range,
                payload_range: payload_start..len,
                is_complete: false,
            });
            break;
        }
    }

    records
}

/// The preserved byte ranges a single record contributes to its
/// direction's preservation mask. Each content type's flag in `policy`
/// decides whether the record survives whole or only its 5-byte header
/// does (with the rest left for the rewrite pass to zero).
pub fn preserved_ranges(record: &TlsRecord, policy: &MaskPreservePolicy) -> Vec<std::ops::Range<u64>> {
    let preserve_whole = match record.content_type {
        ContentType::ChangeCipherSpec => policy.change_cipher_spec,
        ContentType::Alert => policy.alert,
        ContentType::Handshake => policy.handshake,
        ContentType::Heartbeat => policy.heartbeat,
        ContentType::ApplicationData => policy.application_data,
        ContentType::Unknown(_) => true,
    };
    if preserve_whole {
        vec![record.full_range()]
    } else {
        vec![record.header_range.clone()]
    }
}
