// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Classic PCAP (libpcap) reader and writer.
//!
//! Reading is delegated to `pcap-parser`'s `LegacyPcapReader`. Writing is
//! hand-rolled: the format is a 24-byte global header followed by a flat
//! sequence of 16-byte record headers and packet bytes, simple enough that
//! no retrieved crate offered a meaningful advantage over `byteorder`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{LegacyPcapBlock, PcapBlockOwned, PcapError};

use pktsan_domain::PktsanError;

use super::capture::{CaptureFile, CaptureFormat, CaptureReader, CaptureWriter, RawPacket, TimeResolution};

const GLOBAL_HEADER_LEN: usize = 24;
const RECORD_HEADER_LEN: usize = 16;
const PCAP_MAGIC_MICROS: u32 = 0xA1B2_C3D4;
const PCAP_MAGIC_NANOS: u32 = 0xA1B2_3C4D;

pub struct PcapFormat;

impl CaptureReader for PcapFormat {
    fn read(path: &Path) -> Result<CaptureFile, PktsanError> {
        let file = File::open(path)?;
        let mut reader = pcap_parser::LegacyPcapReader::new(65536, file)
            .map_err(|e| PktsanError::InputUnreadable(format!("{path:?}: {e}")))?;

        let mut linktype: u16 = 1;
        let mut snaplen: u32 = 65535;
        let mut time_resolution = TimeResolution::Micros;
        let mut packets = Vec::new();

        loop {
            match reader.next() {
                Ok((offset, block)) => {
                    match block {
                        PcapBlockOwned::LegacyHeader(hdr) => {
                            linktype = hdr.network.0 as u16;
                            snaplen = hdr.snaplen;
                            time_resolution = if hdr.magic_number == PCAP_MAGIC_NANOS {
                                TimeResolution::Nanos
                            } else {
                                TimeResolution::Micros
                            };
                        }
                        PcapBlockOwned::Legacy(b) => {
                            packets.push(raw_packet_from_legacy(&b));
                        }
                        PcapBlockOwned::NG(_) => {
                            return Err(PktsanError::PacketParseError(
                                "encountered a PCAPNG block while reading a classic PCAP file"
                                    .to_string(),
                            ));
                        }
                    }
                    reader.consume(offset);
                }
                Err(PcapError::Eof) => break,
                Err(PcapError::Incomplete(_)) => {
                    reader
                        .refill()
                        .map_err(|e| PktsanError::PacketParseError(e.to_string()))?;
                }
                Err(e) => return Err(PktsanError::PacketParseError(e.to_string())),
            }
        }

        Ok(CaptureFile {
            format: CaptureFormat::Pcap,
            linktype,
            time_resolution,
            snaplen,
            packets,
        })
    }
}

fn raw_packet_from_legacy(b: &LegacyPcapBlock) -> RawPacket {
    RawPacket {
        ts_secs: b.ts_sec,
        ts_frac: b.ts_usec,
        original_len: b.origlen,
        data: b.data.to_vec(),
    }
}

impl CaptureWriter for PcapFormat {
    fn write(path: &Path, capture: &CaptureFile) -> Result<(), PktsanError> {
        let file = File::create(path)?;
        let mut w = BufWriter::new(file);

        let magic = match capture.time_resolution {
            TimeResolution::Micros => PCAP_MAGIC_MICROS,
            TimeResolution::Nanos => PCAP_MAGIC_NANOS,
        };
        w.write_u32::<LittleEndian>(magic)?;
        w.write_u16::<LittleEndian>(2)?; // version_major
        w.write_u16::<LittleEndian>(4)?; // version_minor
        w.write_i32::<LittleEndian>(0)?; // thiszone
        w.write_u32::<LittleEndian>(0)?; // sigfigs
        w.write_u32::<LittleEndian>(capture.snaplen)?;
        w.write_u32::<LittleEndian>(capture.linktype as u32)?;

        for pkt in &capture.packets {
            w.write_u32::<LittleEndian>(pkt.ts_secs)?;
            w.write_u32::<LittleEndian>(pkt.ts_frac)?;
            w.write_u32::<LittleEndian>(pkt.captured_len())?;
            w.write_u32::<LittleEndian>(pkt.original_len)?;
            w.write_all(&pkt.data)?;
        }

        w.flush()?;
        Ok(())
    }
}

/// Sizes referenced by unit tests and the batch size-accounting metric.
pub fn record_on_disk_len(payload_len: usize) -> usize {
    RECORD_HEADER_LEN + payload_len
}

pub fn global_header_len() -> usize {
    GLOBAL_HEADER_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_len_includes_header() {
        assert_eq!(record_on_disk_len(10), 26);
    }

    #[test]
    fn writer_emits_nanosecond_magic_for_nanosecond_resolution_captures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pcap");
        let capture = CaptureFile {
            format: CaptureFormat::Pcap,
            linktype: 1,
            time_resolution: TimeResolution::Nanos,
            snaplen: 65535,
            packets: vec![],
        };
        PcapFormat::write(&path, &capture).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(magic, PCAP_MAGIC_NANOS);
    }
}
