// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Capture file reading and writing.

pub mod capture;
pub mod pcap_format;
pub mod pcapng_format;

pub use capture::{CaptureFile, CaptureFormat, CaptureReader, CaptureWriter, RawPacket, TimeResolution};

use std::path::Path;

use pktsan_domain::PktsanError;

/// Reads a capture file of either supported format, detected from its magic
/// number.
pub fn read_capture(path: &Path) -> Result<CaptureFile, PktsanError> {
    match CaptureFormat::from_path(path)? {
        CaptureFormat::Pcap => pcap_format::PcapFormat::read(path),
        CaptureFormat::PcapNg => pcapng_format::PcapNgFormat::read(path),
    }
}

/// Writes a capture file in its own format.
pub fn write_capture(path: &Path, capture: &CaptureFile) -> Result<(), PktsanError> {
    match capture.format {
        CaptureFormat::Pcap => pcap_format::PcapFormat::write(path, capture),
        CaptureFormat::PcapNg => pcapng_format::PcapNgFormat::write(path, capture),
    }
}
