// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Checksum recomputation, shared by the Anon and Mask stages: any stage
//! that rewrites an IP header or a TCP/UDP payload in place must invalidate
//! and recompute the affected checksums before the packet is written back
//! out, or the result is a capture a real NIC or stack would discard.

use std::net::{Ipv4Addr, Ipv6Addr};

use pnet_packet::ipv4::{checksum as ipv4_checksum, MutableIpv4Packet};
use pnet_packet::tcp::{
    ipv4_checksum as tcp_ipv4_checksum, ipv6_checksum as tcp_ipv6_checksum, MutableTcpPacket,
};
use pnet_packet::udp::{
    ipv4_checksum as udp_ipv4_checksum, ipv6_checksum as udp_ipv6_checksum, MutableUdpPacket,
};

use pktsan_domain::PktsanError;

/// Recomputes the IPv4 header checksum over `ipv4_header_and_beyond`, which
/// must start at the IPv4 header and extend at least through its declared
/// header length.
pub fn recompute_ipv4_header_checksum(frame: &mut [u8], ip_offset: usize) -> Result<(), PktsanError> {
    let mut pkt = MutableIpv4Packet::new(&mut frame[ip_offset..])
        .ok_or_else(|| PktsanError::ChecksumRecomputeFailed("IPv4 header too short".to_string()))?;
    let checksum = ipv4_checksum(&pkt.to_immutable());
    pkt.set_checksum(checksum);
    Ok(())
}

/// Recomputes a TCP segment's checksum against the given (possibly
/// anonymized) IPv4 endpoints.
pub fn recompute_tcp_ipv4_checksum(
    frame: &mut [u8],
    tcp_offset: usize,
    src: Ipv4Addr,
    dst: Ipv4Addr,
) -> Result<(), PktsanError> {
    let mut pkt = MutableTcpPacket::new(&mut frame[tcp_offset..])
        .ok_or_else(|| PktsanError::ChecksumRecomputeFailed("TCP segment too short".to_string()))?;
    let checksum = tcp_ipv4_checksum(&pkt.to_immutable(), &src, &dst);
    pkt.set_checksum(checksum);
    Ok(())
}

pub fn recompute_tcp_ipv6_checksum(
    frame: &mut [u8],
    tcp_offset: usize,
    src: Ipv6Addr,
    dst: Ipv6Addr,
) -> Result<(), PktsanError> {
    let mut pkt = MutableTcpPacket::new(&mut frame[tcp_offset..])
        .ok_or_else(|| PktsanError::ChecksumRecomputeFailed("TCP segment too short".to_string()))?;
    let checksum = tcp_ipv6_checksum(&pkt.to_immutable(), &src, &dst);
    pkt.set_checksum(checksum);
    Ok(())
}

pub fn recompute_udp_ipv4_checksum(
    frame: &mut [u8],
    udp_offset: usize,
    src: Ipv4Addr,
    dst: Ipv4Addr,
) -> Result<(), PktsanError> {
    let mut pkt = MutableUdpPacket::new(&mut frame[udp_offset..])
        .ok_or_else(|| PktsanError::ChecksumRecomputeFailed("UDP datagram too short".to_string()))?;
    let checksum = udp_ipv4_checksum(&pkt.to_immutable(), &src, &dst);
    pkt.set_checksum(checksum);
    Ok(())
}

pub fn recompute_udp_ipv6_checksum(
    frame: &mut [u8],
    udp_offset: usize,
    src: Ipv6Addr,
    dst: Ipv6Addr,
) -> Result<(), PktsanError> {
    let mut pkt = MutableUdpPacket::new(&mut frame[udp_offset..])
        .ok_or_else(|| PktsanError::ChecksumRecomputeFailed("UDP datagram too short".to_string()))?;
    let checksum = udp_ipv6_checksum(&pkt.to_immutable(), &src, &dst);
    pkt.set_checksum(checksum);
    Ok(())
}
