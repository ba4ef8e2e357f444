// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Capture Format Abstraction
//!
//! A capture file, classic PCAP or PCAPNG, is modeled here as a sequence of
//! [`RawPacket`] records plus enough header metadata to write an equivalent
//! file back out. Every stage reads and writes through this abstraction so
//! the rest of the crate never has to special-case the on-disk format.

use std::path::Path;

use pktsan_domain::PktsanError;

/// One packet as read from a capture file: its timestamp, its declared
/// original length (which may exceed `data.len()` for truncated captures),
/// and its raw bytes starting at the link layer.
#[derive(Debug, Clone)]
pub struct RawPacket {
    pub ts_secs: u32,
    /// Microseconds for classic PCAP, nanoseconds for PCAPNG — the unit is
    /// carried by the enclosing [`CaptureFile`]'s [`TimeResolution`].
    pub ts_frac: u32,
    pub original_len: u32,
    pub data: Vec<u8>,
}

impl RawPacket {
    pub fn captured_len(&self) -> u32 {
        self.data.len() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeResolution {
    Micros,
    Nanos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    Pcap,
    PcapNg,
}

impl CaptureFormat {
    /// Sniffs the format from a file's first four bytes, per the well-known
    /// PCAP and PCAPNG magic numbers.
    pub fn detect(magic: [u8; 4]) -> Result<Self, PktsanError> {
        match magic {
            [0xD4, 0xC3, 0xB2, 0xA1] | [0xA1, 0xB2, 0xC3, 0xD4] |
            [0x4D, 0x3C, 0xB2, 0xA1] | [0xA1, 0xB2, 0x3C, 0x4D] => Ok(CaptureFormat::Pcap),
            [0x0A, 0x0D, 0x0D, 0x0A] => Ok(CaptureFormat::PcapNg),
            other => Err(PktsanError::InputUnreadable(format!(
                "unrecognized capture magic: {other:02x?}"
            ))),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, PktsanError> {
        let bytes = std::fs::read(path)?;
        if bytes.len() < 4 {
            return Err(PktsanError::InputUnreadable(
                "file too short to contain a capture header".to_string(),
            ));
        }
        Self::detect([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

/// A fully decoded capture: link-layer type, timestamp resolution, and every
/// packet record in file order. Held entirely in memory, consistent with the
/// rest of the pipeline's per-file, whole-file processing model.
#[derive(Debug, Clone)]
pub struct CaptureFile {
    pub format: CaptureFormat,
    pub linktype: u16,
    pub time_resolution: TimeResolution,
    pub snaplen: u32,
    pub packets: Vec<RawPacket>,
}

/// Reads a capture file of either supported format into memory.
pub trait CaptureReader {
    fn read(path: &Path) -> Result<CaptureFile, PktsanError>;
}

/// Writes a decoded capture back to disk in its original format.
pub trait CaptureWriter {
    fn write(path: &Path, capture: &CaptureFile) -> Result<(), PktsanError>;
}
