// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! TLS record-layer value objects.
//!
//! A `TlsRecord` describes one unit of the TLS record layer as found in a
//! reassembled TCP flow-direction byte stream: a 5-byte header (content
//! type, version, declared length) followed by `declared_length` payload
//! bytes. Records are located by the masker's flow analysis pass; this
//! module only defines the data, not how it is parsed.

use std::ops::Range;

/// TLS record content types relevant to masking decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
    Heartbeat,
    /// A content-type byte that isn't one of the five known TLS record
    /// types. Unknown types are ignored, not treated as parse errors.
    Unknown(u8),
}

impl ContentType {
    pub const CHANGE_CIPHER_SPEC: u8 = 20;
    pub const ALERT: u8 = 21;
    pub const HANDSHAKE: u8 = 22;
    pub const APPLICATION_DATA: u8 = 23;
    pub const HEARTBEAT: u8 = 24;

    pub fn from_byte(b: u8) -> Self {
        match b {
            Self::CHANGE_CIPHER_SPEC => ContentType::ChangeCipherSpec,
            Self::ALERT => ContentType::Alert,
            Self::HANDSHAKE => ContentType::Handshake,
            Self::APPLICATION_DATA => ContentType::ApplicationData,
            Self::HEARTBEAT => ContentType::Heartbeat,
            other => ContentType::Unknown(other),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            ContentType::ChangeCipherSpec => Self::CHANGE_CIPHER_SPEC,
            ContentType::Alert => Self::ALERT,
            ContentType::Handshake => Self::HANDSHAKE,
            ContentType::ApplicationData => Self::APPLICATION_DATA,
            ContentType::Heartbeat => Self::HEARTBEAT,
            ContentType::Unknown(b) => *b,
        }
    }

    /// Whether this is one of the five TLS record types this system knows
    /// how to classify for preservation purposes.
    pub fn is_known(&self) -> bool {
        !matches!(self, ContentType::Unknown(_))
    }
}

/// A single TLS record located in a flow-direction's reassembled stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsRecord {
    pub content_type: ContentType,
    pub version: u16,
    pub declared_length: u32,
    /// Always 5 bytes, the record header, in flow-relative offsets.
    pub header_range: Range<u64>,
    /// `declared_length` bytes when `is_complete`, otherwise the truncated
    /// tail of the stream.
    pub payload_range: Range<u64>,
    pub is_complete: bool,
}

impl TlsRecord {
    pub const HEADER_LEN: u64 = 5;

    /// The full byte range (header + payload) this record spans in the flow.
    pub fn full_range(&self) -> Range<u64> {
        self.header_range.start..self.payload_range.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_round_trips_through_byte() {
        for b in [20u8, 21, 22, 23, 24] {
            assert_eq!(ContentType::from_byte(b).as_byte(), b);
        }
        assert!(matches!(ContentType::from_byte(99), ContentType::Unknown(99)));
    }

    #[test]
    fn full_range_spans_header_and_payload() {
        let record = TlsRecord {
            content_type: ContentType::Handshake,
            version: 0x0303,
            declared_length: 10,
            header_range: 0..5,
            payload_range: 5..15,
            is_complete: true,
        };
        assert_eq!(record.full_range(), 0..15);
    }
}
