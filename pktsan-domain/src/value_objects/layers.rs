// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Encapsulation Stack
//!
//! A packet's decoded view as an ordered list of layer descriptors, from
//! outermost (Ethernet) to innermost (TCP/UDP payload). Built by
//! `pktsan-core::layers::walk`; this module only defines the shape.

use std::net::IpAddr;
use std::ops::Range;

/// The kind of protocol layer a `LayerDescriptor` represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Ethernet,
    Dot1Q,
    QinQ,
    Mpls,
    Gre,
    Vxlan,
    Ipv4,
    Ipv6,
    Tcp,
    Udp,
    Other,
}

/// One layer in a packet's encapsulation stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDescriptor {
    pub kind: LayerKind,
    pub byte_range: Range<usize>,
}

/// An IP layer found anywhere in the stack, tagged with its nesting depth
/// and the names of the layers it was found inside (outermost first, not
/// including itself), for diagnostics such as "IPv4 inside VXLAN inside
/// IPv4".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpLayerInfo {
    pub depth: usize,
    pub src: IpAddr,
    pub dst: IpAddr,
    pub header_range: Range<usize>,
    pub encapsulation_context: Vec<LayerKind>,
}

impl IpLayerInfo {
    /// Human-readable context string, e.g. `"IPv4 inside VXLAN inside IPv4"`.
    pub fn context_description(&self, this_layer: LayerKind) -> String {
        if self.encapsulation_context.is_empty() {
            return format!("{this_layer:?}");
        }
        let mut parts = vec![format!("{this_layer:?}")];
        for layer in self.encapsulation_context.iter().rev() {
            parts.push(format!("{layer:?}"));
        }
        parts.join(" inside ")
    }
}

/// TCP/UDP header fields relevant to flow reconstruction and masking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportHeader {
    pub protocol: TransportProtocol,
    pub src_port: u16,
    pub dst_port: u16,
    /// Only meaningful for TCP.
    pub sequence_number: u32,
    pub flags: TcpFlags,
    pub payload_range: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportProtocol {
    Tcp,
    Udp,
}

/// The subset of TCP flags the masker and flow model care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags {
    pub syn: bool,
    pub fin: bool,
    pub rst: bool,
    pub ack: bool,
}

impl TcpFlags {
    /// Whether this segment must bypass masking entirely regardless of
    /// payload content, per the masker's control-segment override rule.
    pub fn is_control_override(&self) -> bool {
        self.syn || self.fin || self.rst
    }
}

/// A packet's full decoded view: the ordered encapsulation stack, every IP
/// layer found at any depth, and the innermost transport header if any.
#[derive(Debug, Clone, Default)]
pub struct EncapsulationStack {
    pub layers: Vec<LayerDescriptor>,
    pub ip_layers: Vec<IpLayerInfo>,
    pub transport: Option<TransportHeader>,
}

impl EncapsulationStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// The innermost IP layer, which carries the address pair the transport
    /// header actually belongs to.
    pub fn innermost_ip(&self) -> Option<&IpLayerInfo> {
        self.ip_layers.iter().max_by_key(|l| l.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_flags_trigger_override() {
        let mut flags = TcpFlags::default();
        assert!(!flags.is_control_override());
        flags.syn = true;
        assert!(flags.is_control_override());
    }

    #[test]
    fn context_description_nests_outermost_first() {
        let info = IpLayerInfo {
            depth: 1,
            src: "10.0.0.1".parse().unwrap(),
            dst: "10.0.0.2".parse().unwrap(),
            header_range: 0..20,
            encapsulation_context: vec![LayerKind::Ipv4, LayerKind::Vxlan],
        };
        assert_eq!(
            info.context_description(LayerKind::Ipv4),
            "Ipv4 inside Vxlan inside Ipv4"
        );
    }
}
