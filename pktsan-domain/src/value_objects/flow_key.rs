// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # TCP Flow Key
//!
//! A flow is the unordered 4-tuple `{(ip_a, port_a), (ip_b, port_b)}` of a
//! TCP segment's innermost IP/port pair. Canonicalization picks the
//! "smaller" endpoint first so both directions of a conversation hash to the
//! same key, and tags each packet with which side it came from.
//!
//! The endpoint ordering is **string-lexicographic** on the dotted/colon IP
//! literal, not numeric. That does not match intuitive address ordering for
//! IPv4 (`"10.0.0.2" < "10.0.0.100"` lexicographically, `"10.0.0.100" <
//! "10.0.0.2"` is false but `"2" > "1"` so digit-by-digit comparison diverges
//! from the integer value for unequal-length octets) but is preserved
//! deliberately to match an existing baseline's direction tagging; see
//! DESIGN.md Open Question OQ-2.

use std::fmt;
use std::net::IpAddr;

/// Which side of a canonicalized flow a packet's source address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Reverse,
}

/// One endpoint of a flow: an IP address and a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub ip: IpAddr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// String-lexicographic comparison key, per the canonicalization rule
    /// above. Deliberately not the same ordering as `Ord` on `IpAddr`.
    fn lexicographic_key(&self) -> (String, u16) {
        (self.ip.to_string(), self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Canonicalized, unordered 4-tuple identifying a TCP flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub first: Endpoint,
    pub second: Endpoint,
}

impl FlowKey {
    /// Builds the canonical key for a `src -> dst` segment and reports which
    /// direction that segment travels relative to the canonical key.
    pub fn canonicalize(src: Endpoint, dst: Endpoint) -> (Self, Direction) {
        if src.lexicographic_key() <= dst.lexicographic_key() {
            (
                FlowKey {
                    first: src,
                    second: dst,
                },
                Direction::Forward,
            )
        } else {
            (
                FlowKey {
                    first: dst,
                    second: src,
                },
                Direction::Reverse,
            )
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.first, self.second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_consistently_regardless_of_segment_direction() {
        let a = Endpoint::new("10.0.0.1".parse().unwrap(), 443);
        let b = Endpoint::new("10.0.0.2".parse().unwrap(), 51000);

        let (key_ab, dir_ab) = FlowKey::canonicalize(a, b);
        let (key_ba, dir_ba) = FlowKey::canonicalize(b, a);

        assert_eq!(key_ab, key_ba);
        assert_eq!(dir_ab, Direction::Forward);
        assert_eq!(dir_ba, Direction::Reverse);
    }

    #[test]
    fn ordering_is_string_lexicographic_not_numeric() {
        // "10.0.0.100" < "10.0.0.2" lexicographically ('1' < '2'), even
        // though 100 > 2 numerically. The canonical key must follow the
        // string ordering, not the numeric one.
        let a = Endpoint::new("10.0.0.100".parse().unwrap(), 80);
        let b = Endpoint::new("10.0.0.2".parse().unwrap(), 80);

        let (key, dir) = FlowKey::canonicalize(a, b);
        assert_eq!(key.first, a);
        assert_eq!(dir, Direction::Forward);
    }
}
