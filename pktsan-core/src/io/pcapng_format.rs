// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! PCAPNG reader and writer.
//!
//! Reading is delegated to `pcap-parser`'s `PcapNGReader`, keeping only
//! Enhanced Packet Blocks (the block type every modern capture tool emits)
//! and the Interface Description Block that precedes them for linktype and
//! snaplen. Writing emits the minimal block set a reader needs: one Section
//! Header Block, one Interface Description Block, and one Enhanced Packet
//! Block per packet — options and name-resolution blocks are not
//! round-tripped, since nothing downstream of this pipeline depends on them
//! and the output only needs to be a valid capture file, not byte-identical
//! container metadata.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use pcap_parser::pcapng::{Block, EnhancedPacketBlock, InterfaceDescriptionBlock};
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{PcapBlockOwned, PcapError};

use pktsan_domain::PktsanError;

use super::capture::{CaptureFile, CaptureFormat, CaptureReader, CaptureWriter, RawPacket, TimeResolution};

const BYTE_ORDER_MAGIC: u32 = 0x1A2B_3C4D;
const SECTION_HEADER_BLOCK_TYPE: u32 = 0x0A0D_0D0A;
const INTERFACE_DESCRIPTION_BLOCK_TYPE: u32 = 0x0000_0001;
const ENHANCED_PACKET_BLOCK_TYPE: u32 = 0x0000_0006;

pub struct PcapNgFormat;

impl CaptureReader for PcapNgFormat {
    fn read(path: &Path) -> Result<CaptureFile, PktsanError> {
        let file = File::open(path)?;
        let mut reader = pcap_parser::PcapNGReader::new(65536, file)
            .map_err(|e| PktsanError::InputUnreadable(format!("{path:?}: {e}")))?;

        let mut linktype: u16 = 1;
        let mut snaplen: u32 = 65535;
        let mut packets = Vec::new();

        loop {
            match reader.next() {
                Ok((offset, block)) => {
                    match block {
                        PcapBlockOwned::NG(Block::SectionHeader(_)) => {}
                        PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
                            linktype = idb.linktype.0 as u16;
                            if idb.snaplen != 0 {
                                snaplen = idb.snaplen;
                            }
                        }
                        PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                            packets.push(raw_packet_from_enhanced(&epb));
                        }
                        PcapBlockOwned::NG(_) => {}
                        PcapBlockOwned::Legacy(_) | PcapBlockOwned::LegacyHeader(_) => {
                            return Err(PktsanError::PacketParseError(
                                "encountered a classic PCAP block while reading a PCAPNG file"
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
            format: CaptureFormat::PcapNg,
            linktype,
            time_resolution: TimeResolution::Micros,
            snaplen,
            packets,
        })
    }
}

fn raw_packet_from_enhanced(epb: &EnhancedPacketBlock) -> RawPacket {
    RawPacket {
        ts_secs: epb.ts_high,
        ts_frac: epb.ts_low,
        original_len: epb.origlen,
        data: epb.data.to_vec(),
    }
}

impl CaptureWriter for PcapNgFormat {
    fn write(path: &Path, capture: &CaptureFile) -> Result<(), PktsanError> {
        let file = File::create(path)?;
        let mut w = BufWriter::new(file);

        write_section_header_block(&mut w)?;
        write_interface_description_block(&mut w, capture.linktype, capture.snaplen)?;
        for pkt in &capture.packets {
            write_enhanced_packet_block(&mut w, pkt)?;
        }

        w.flush()?;
        Ok(())
    }
}

fn pad_len(len: usize) -> usize {
    (len + 3) & !3
}

fn write_section_header_block(w: &mut impl Write) -> Result<(), PktsanError> {
    let total_len: u32 = 28;
    w.write_u32::<LittleEndian>(SECTION_HEADER_BLOCK_TYPE)?;
    w.write_u32::<LittleEndian>(total_len)?;
    w.write_u32::<LittleEndian>(BYTE_ORDER_MAGIC)?;
    w.write_u16::<LittleEndian>(1)?; // major version
    w.write_u16::<LittleEndian>(0)?; // minor version
    w.write_i64::<LittleEndian>(-1)?; // section length unknown
    w.write_u32::<LittleEndian>(total_len)?;
    Ok(())
}

fn write_interface_description_block(
    w: &mut impl Write,
    linktype: u16,
    snaplen: u32,
) -> Result<(), PktsanError> {
    let total_len: u32 = 20;
    w.write_u32::<LittleEndian>(INTERFACE_DESCRIPTION_BLOCK_TYPE)?;
    w.write_u32::<LittleEndian>(total_len)?;
    w.write_u16::<LittleEndian>(linktype)?;
    w.write_u16::<LittleEndian>(0)?; // reserved
    w.write_u32::<LittleEndian>(snaplen)?;
    w.write_u32::<LittleEndian>(total_len)?;
    Ok(())
}

fn write_enhanced_packet_block(w: &mut impl Write, pkt: &RawPacket) -> Result<(), PktsanError> {
    let captured_len = pkt.captured_len() as usize;
    let padded_len = pad_len(captured_len);
    let total_len: u32 = (28 + padded_len) as u32;

    w.write_u32::<LittleEndian>(ENHANCED_PACKET_BLOCK_TYPE)?;
    w.write_u32::<LittleEndian>(total_len)?;
    w.write_u32::<LittleEndian>(0)?; // interface id
    w.write_u32::<LittleEndian>(pkt.ts_secs)?;
    w.write_u32::<LittleEndian>(pkt.ts_frac)?;
    w.write_u32::<LittleEndian>(pkt.captured_len())?;
    w.write_u32::<LittleEndian>(pkt.original_len)?;
    w.write_all(&pkt.data)?;
    for _ in 0..(padded_len - captured_len) {
        w.write_u8(0)?;
    }
    w.write_u32::<LittleEndian>(total_len)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_len_rounds_up_to_four_byte_boundary() {
        assert_eq!(pad_len(0), 0);
        assert_eq!(pad_len(1), 4);
        assert_eq!(pad_len(4), 4);
        assert_eq!(pad_len(5), 8);
    }
}
