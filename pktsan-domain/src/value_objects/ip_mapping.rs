// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # IP Mapping Table
//!
//! The frozen result of the Anon stage's pre-scan and mapping-construction
//! phases: a total, injective, deterministic original-to-anonymized address
//! mapping for one pre-scan batch. Owned by the Anon stage, shared read-only
//! with the rewrite pass (an ordinary `&IpMappingTable` suffices — no
//! interior mutability or shared ownership is required once the table is
//! built).

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use serde::Serialize;

/// A frozen original-address -> anonymized-address mapping, built once per
/// batch and consulted read-only afterwards. `Serialize` backs the optional
/// JSON mapping report the CLI can dump alongside a sanitized batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IpMappingTable {
    v4: HashMap<Ipv4Addr, Ipv4Addr>,
    v6: HashMap<Ipv6Addr, Ipv6Addr>,
}

impl IpMappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_v4(&mut self, original: Ipv4Addr, anonymized: Ipv4Addr) {
        self.v4.insert(original, anonymized);
    }

    pub fn insert_v6(&mut self, original: Ipv6Addr, anonymized: Ipv6Addr) {
        self.v6.insert(original, anonymized);
    }

    pub fn get_v4(&self, original: &Ipv4Addr) -> Option<Ipv4Addr> {
        self.v4.get(original).copied()
    }

    pub fn get_v6(&self, original: &Ipv6Addr) -> Option<Ipv6Addr> {
        self.v6.get(original).copied()
    }

    pub fn len(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v4.is_empty() && self.v6.is_empty()
    }

    pub fn v4_entries(&self) -> impl Iterator<Item = (&Ipv4Addr, &Ipv4Addr)> {
        self.v4.iter()
    }

    pub fn v6_entries(&self) -> impl Iterator<Item = (&Ipv6Addr, &Ipv6Addr)> {
        self.v6.iter()
    }

    /// `true` iff no two distinct originals map to the same anonymized
    /// address, checked independently within each address family.
    pub fn is_injective(&self) -> bool {
        let mut seen_v4 = std::collections::HashSet::with_capacity(self.v4.len());
        for anon in self.v4.values() {
            if !seen_v4.insert(*anon) {
                return false;
            }
        }
        let mut seen_v6 = std::collections::HashSet::with_capacity(self.v6.len());
        for anon in self.v6.values() {
            if !seen_v6.insert(*anon) {
                return false;
            }
        }
        true
    }
}
