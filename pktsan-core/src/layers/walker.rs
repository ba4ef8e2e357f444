// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Encapsulation Stack Walker
//!
//! Decodes a single link-layer frame into an [`EncapsulationStack`], walking
//! through Ethernet, 802.1Q/802.1ad VLAN tags, MPLS label stacks, GRE and
//! VXLAN tunnels, into every IPv4/IPv6 layer found at any depth, down to the
//! innermost TCP or UDP header. Unsupported or truncated layers stop the
//! walk early rather than failing the whole packet — the caller decides
//! whether a packet with no transport header is itself an error.

use pnet_packet::ethernet::{EtherTypes, EthernetPacket};
use pnet_packet::gre::GrePacket;
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::ipv6::Ipv6Packet;
use pnet_packet::tcp::{TcpFlags as PnetTcpFlags, TcpPacket};
use pnet_packet::udp::UdpPacket;
use pnet_packet::vlan::VlanPacket;
use pnet_packet::Packet;

use pktsan_domain::value_objects::{
    EncapsulationStack, IpLayerInfo, LayerDescriptor, LayerKind, TcpFlags, TransportHeader,
    TransportProtocol,
};

const MPLS_LABEL_LEN: usize = 4;
const MAX_MPLS_LABELS: usize = 8;
const VXLAN_HEADER_LEN: usize = 8;
const VXLAN_UDP_PORT: u16 = 4789;

/// Walks `frame` (a full link-layer frame, Ethernet header included) and
/// returns its decoded encapsulation stack. Never fails: a frame that stops
/// making sense partway through simply yields a stack truncated at that
/// point, with `transport` left `None` if no transport header was reached.
pub fn walk(frame: &[u8]) -> EncapsulationStack {
    let mut stack = EncapsulationStack::new();
    let mut context: Vec<LayerKind> = Vec::new();

    let Some(eth) = EthernetPacket::new(frame) else {
        return stack;
    };
    stack.layers.push(LayerDescriptor {
        kind: LayerKind::Ethernet,
        byte_range: 0..EthernetPacket::minimum_packet_size(),
    });

    let mut ethertype = eth.get_ethertype();
    let mut offset = EthernetPacket::minimum_packet_size();
    let mut payload = eth.payload();

    // Peel VLAN tags (802.1Q / 802.1ad QinQ) and MPLS label stacks before
    // reaching an IP layer; each iteration either advances into the next
    // encapsulation or falls through to IP/unsupported handling below.
    loop {
        match ethertype {
            EtherTypes::Vlan | EtherTypes::QinQ => {
                let Some(vlan) = VlanPacket::new(payload) else {
                    return stack;
                };
                let kind = if ethertype == EtherTypes::QinQ {
                    LayerKind::QinQ
                } else {
                    LayerKind::Dot1Q
                };
                stack.layers.push(LayerDescriptor {
                    kind,
                    byte_range: offset..offset + VlanPacket::minimum_packet_size(),
                });
                offset += VlanPacket::minimum_packet_size();
                ethertype = vlan.get_ethertype();
                payload = vlan.payload();
            }
            EtherTypes::Mpls | EtherTypes::MplsMcast => {
                let mut labels = 0;
                let mut rest = payload;
                loop {
                    if rest.len() < MPLS_LABEL_LEN || labels >= MAX_MPLS_LABELS {
                        return stack;
                    }
                    let bottom_of_stack = rest[2] & 0x01 != 0;
                    stack.layers.push(LayerDescriptor {
                        kind: LayerKind::Mpls,
                        byte_range: offset..offset + MPLS_LABEL_LEN,
                    });
                    offset += MPLS_LABEL_LEN;
                    rest = &rest[MPLS_LABEL_LEN..];
                    labels += 1;
                    if bottom_of_stack {
                        break;
                    }
                }
                // After the bottom label the payload is conventionally IPv4
                // or IPv6; sniff the version nibble rather than guess.
                payload = rest;
                ethertype = match payload.first().map(|b| b >> 4) {
                    Some(4) => EtherTypes::Ipv4,
                    Some(6) => EtherTypes::Ipv6,
                    _ => return stack,
                };
            }
            _ => break,
        }
    }

    walk_ip_layer(ethertype, payload, offset, &mut context, &mut stack);
    stack
}

fn walk_ip_layer(
    ethertype: pnet_packet::ethernet::EtherType,
    payload: &[u8],
    offset: usize,
    context: &mut Vec<LayerKind>,
    stack: &mut EncapsulationStack,
) {
    match ethertype {
        EtherTypes::Ipv4 => walk_ipv4(payload, offset, context, stack),
        EtherTypes::Ipv6 => walk_ipv6(payload, offset, context, stack),
        _ => {}
    }
}

fn walk_ipv4(
    data: &[u8],
    offset: usize,
    context: &mut Vec<LayerKind>,
    stack: &mut EncapsulationStack,
) {
    let Some(ip) = Ipv4Packet::new(data) else {
        return;
    };
    let header_len = (ip.get_header_length() as usize) * 4;
    if header_len < 20 || header_len > data.len() {
        return;
    }
    let depth = stack.ip_layers.len();
    stack.ip_layers.push(IpLayerInfo {
        depth,
        src: ip.get_source().into(),
        dst: ip.get_destination().into(),
        header_range: offset..offset + header_len,
        encapsulation_context: context.clone(),
    });
    stack.layers.push(LayerDescriptor {
        kind: LayerKind::Ipv4,
        byte_range: offset..offset + header_len,
    });

    context.push(LayerKind::Ipv4);
    walk_transport(
        ip.get_next_level_protocol(),
        ip.payload(),
        offset + header_len,
        context,
        stack,
    );
    context.pop();
}

fn walk_ipv6(
    data: &[u8],
    offset: usize,
    context: &mut Vec<LayerKind>,
    stack: &mut EncapsulationStack,
) {
    let Some(ip) = Ipv6Packet::new(data) else {
        return;
    };
    const IPV6_HEADER_LEN: usize = 40;
    if data.len() < IPV6_HEADER_LEN {
        return;
    }
    let depth = stack.ip_layers.len();
    stack.ip_layers.push(IpLayerInfo {
        depth,
        src: ip.get_source().into(),
        dst: ip.get_destination().into(),
        header_range: offset..offset + IPV6_HEADER_LEN,
        encapsulation_context: context.clone(),
    });
    stack.layers.push(LayerDescriptor {
        kind: LayerKind::Ipv6,
        byte_range: offset..offset + IPV6_HEADER_LEN,
    });

    context.push(LayerKind::Ipv6);
    walk_transport(
        ip.get_next_header(),
        ip.payload(),
        offset + IPV6_HEADER_LEN,
        context,
        stack,
    );
    context.pop();
}

fn walk_transport(
    protocol: pnet_packet::ip::IpNextHeaderProtocol,
    data: &[u8],
    offset: usize,
    context: &mut Vec<LayerKind>,
    stack: &mut EncapsulationStack,
) {
    match protocol {
        IpNextHeaderProtocols::Tcp => walk_tcp(data, offset, stack),
        IpNextHeaderProtocols::Udp => walk_udp(data, offset, context, stack),
        IpNextHeaderProtocols::Gre => walk_gre(data, offset, context, stack),
        _ => {}
    }
}

fn walk_tcp(data: &[u8], offset: usize, stack: &mut EncapsulationStack) {
    let Some(tcp) = TcpPacket::new(data) else {
        return;
    };
    let header_len = (tcp.get_data_offset() as usize) * 4;
    if header_len < 20 || header_len > data.len() {
        return;
    }
    stack.layers.push(LayerDescriptor {
        kind: LayerKind::Tcp,
        byte_range: offset..offset + header_len,
    });
    let raw_flags = tcp.get_flags();
    stack.transport = Some(TransportHeader {
        protocol: TransportProtocol::Tcp,
        src_port: tcp.get_source(),
        dst_port: tcp.get_destination(),
        sequence_number: tcp.get_sequence(),
        flags: TcpFlags {
            syn: raw_flags & PnetTcpFlags::SYN != 0,
            fin: raw_flags & PnetTcpFlags::FIN != 0,
            rst: raw_flags & PnetTcpFlags::RST != 0,
            ack: raw_flags & PnetTcpFlags::ACK != 0,
        },
        payload_range: offset + header_len..offset + data.len(),
    });
}

fn walk_udp(
    data: &[u8],
    offset: usize,
    context: &mut Vec<LayerKind>,
    stack: &mut EncapsulationStack,
) {
    let Some(udp) = UdpPacket::new(data) else {
        return;
    };
    const UDP_HEADER_LEN: usize = 8;
    stack.layers.push(LayerDescriptor {
        kind: LayerKind::Udp,
        byte_range: offset..offset + UDP_HEADER_LEN,
    });
    stack.transport = Some(TransportHeader {
        protocol: TransportProtocol::Udp,
        src_port: udp.get_source(),
        dst_port: udp.get_destination(),
        sequence_number: 0,
        flags: TcpFlags::default(),
        payload_range: offset + UDP_HEADER_LEN..offset + data.len(),
    });

    if udp.get_destination() == VXLAN_UDP_PORT || udp.get_source() == VXLAN_UDP_PORT {
        walk_vxlan(udp.payload(), offset + UDP_HEADER_LEN, context, stack);
    }
}

fn walk_vxlan(
    data: &[u8],
    offset: usize,
    context: &mut Vec<LayerKind>,
    stack: &mut EncapsulationStack,
) {
    if data.len() < VXLAN_HEADER_LEN {
        return;
    }
    stack.layers.push(LayerDescriptor {
        kind: LayerKind::Vxlan,
        byte_range: offset..offset + VXLAN_HEADER_LEN,
    });
    let inner = &data[VXLAN_HEADER_LEN..];
    let inner_offset = offset + VXLAN_HEADER_LEN;

    let Some(eth) = EthernetPacket::new(inner) else {
        return;
    };
    stack.layers.push(LayerDescriptor {
        kind: LayerKind::Ethernet,
        byte_range: inner_offset..inner_offset + EthernetPacket::minimum_packet_size(),
    });
    context.push(LayerKind::Vxlan);
    walk_ip_layer(
        eth.get_ethertype(),
        eth.payload(),
        inner_offset + EthernetPacket::minimum_packet_size(),
        context,
        stack,
    );
    context.pop();
}

fn walk_gre(
    data: &[u8],
    offset: usize,
    context: &mut Vec<LayerKind>,
    stack: &mut EncapsulationStack,
) {
    let Some(gre) = GrePacket::new(data) else {
        return;
    };
    const GRE_MIN_HEADER_LEN: usize = 4;
    stack.layers.push(LayerDescriptor {
        kind: LayerKind::Gre,
        byte_range: offset..offset + GRE_MIN_HEADER_LEN,
    });
    context.push(LayerKind::Gre);
    walk_ip_layer(
        ether_type_for_gre_protocol(gre.get_protocol_type()),
        gre.payload(),
        offset + GRE_MIN_HEADER_LEN,
        context,
        stack,
    );
    context.pop();
}

fn ether_type_for_gre_protocol(proto: u16) -> pnet_packet::ethernet::EtherType {
    pnet_packet::ethernet::EtherType(proto)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_ipv4_tcp_frame() -> Vec<u8> {
        // 14-byte Ethernet header + 20-byte IPv4 header (no options) + 20-byte
        // TCP header with no payload, filled with the minimum fields the
        // walker inspects.
        let mut frame = vec![0u8; 14 + 20 + 20];
        frame[12] = 0x08;
        frame[13] = 0x00; // EtherType::IPv4

        let ip = &mut frame[14..34];
        ip[0] = 0x45; // version 4, IHL 5
        ip[9] = 6; // protocol TCP
        ip[12..16].copy_from_slice(&[10, 0, 0, 1]);
        ip[16..20].copy_from_slice(&[10, 0, 0, 2]);

        let tcp = &mut frame[34..54];
        tcp[0..2].copy_from_slice(&443u16.to_be_bytes());
        tcp[2..4].copy_from_slice(&51000u16.to_be_bytes());
        tcp[12] = 5 << 4; // data offset 5 (20 bytes), no flags set

        frame
    }

    #[test]
    fn walks_plain_ipv4_tcp_frame_to_transport() {
        let frame = build_ipv4_tcp_frame();
        let stack = walk(&frame);

        assert_eq!(stack.ip_layers.len(), 1);
        let ip = &stack.ip_layers[0];
        assert_eq!(ip.src, "10.0.0.1".parse::<std::net::IpAddr>().unwrap());
        assert_eq!(ip.dst, "10.0.0.2".parse::<std::net::IpAddr>().unwrap());

        let transport = stack.transport.expect("tcp header decoded");
        assert_eq!(transport.src_port, 443);
        assert_eq!(transport.dst_port, 51000);
        assert!(!transport.flags.is_control_override());
    }

    #[test]
    fn truncated_frame_yields_partial_stack_without_panicking() {
        let stack = walk(&[0u8; 4]);
        assert!(stack.transport.is_none());
    }
}
