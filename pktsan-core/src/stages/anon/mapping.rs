// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Hierarchical, frequency-aware IP address anonymization.
//!
//! For IPv4 this builds three nested segment maps (`A`, `A.B`, `A.B.C`); for
//! IPv6, seven nested hextet-prefix maps. A prefix seen at least twice in
//! the pre-scan gets one consistent replacement shared by every address
//! under it; a prefix seen once gets its own independent replacement. The
//! host octet (IPv4's `D`) and host hextet (IPv6's last group) are never
//! touched.

use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, Ipv6Addr};

use super::prng::{seed_from_str, DeterministicRng};

/// High-frequency threshold: a prefix seen this many times or more gets a
/// single shared replacement instead of an independent one per occurrence.
pub const HIGH_FREQUENCY_THRESHOLD: u32 = 2;

/// Picks a deterministic replacement for `original` in `[min_val, max_val]`,
/// seeded from `seed_base`, preferring a value within a delta neighborhood
/// of `original` before falling back to the full legal range. `used`
/// enforces uniqueness across everything generated at the same level so far.
pub fn generate_unique_ipv4_segment(
    original: u8,
    seed_base: &str,
    used: &mut HashSet<u8>,
    min_val: u8,
    max_val: u8,
) -> u8 {
    let seed = seed_from_str(&format!("{seed_base}_{original}"));
    let mut rng = DeterministicRng::from_seed(seed);

    let digits = decimal_digit_count(original);
    let delta: i32 = match digits {
        1 => 3,
        2 => 5,
        _ => 20,
    };

    let orig = original as i32;
    let lower = (orig - delta).max(min_val as i32);
    let upper = (orig + delta).min(max_val as i32);

    let mut candidates: Vec<u8> = (lower..=upper)
        .filter(|&v| v != orig && !used.contains(&(v as u8)))
        .map(|v| v as u8)
        .collect();

    if candidates.is_empty() {
        candidates = (min_val as i32..=max_val as i32)
            .filter(|&v| v != orig && !used.contains(&(v as u8)))
            .map(|v| v as u8)
            .collect();
    }

    let chosen = if candidates.is_empty() {
        // Every legal value is taken; force a non-conflicting one if any
        // remains, otherwise degrade to the original (should not happen for
        // a 256-value space with realistic traffic).
        (min_val..=max_val)
            .find(|v| !used.contains(v))
            .unwrap_or(original)
    } else {
        candidates[rng.gen_index(candidates.len())]
    };

    used.insert(chosen);
    chosen
}

fn decimal_digit_count(v: u8) -> u32 {
    if v >= 100 {
        3
    } else if v >= 10 {
        2
    } else {
        1
    }
}

/// Picks a deterministic replacement hextet for `original` (a 16-bit value
/// whose canonical decimal-digit-equivalent width is `hex_digits` hex
/// digits, 1..=4), seeded from `seed_base`. Unlike the IPv4 variant, no
/// cross-call uniqueness set is enforced for hextets.
pub fn generate_ipv6_segment(original: u16, hex_digits: u32, seed_base: &str) -> u16 {
    let seed = seed_from_str(&format!("{seed_base}_{original:0width$x}", width = hex_digits as usize));
    let mut rng = DeterministicRng::from_seed(seed);

    let delta: i64 = match hex_digits {
        1 => 3,
        2 => 8,
        3 => 32,
        _ => 128,
    };
    let lower: i64 = if hex_digits > 1 {
        16i64.pow(hex_digits - 1)
    } else {
        0
    };
    let upper: i64 = 16i64.pow(hex_digits) - 1;

    let orig = original as i64;
    let cand_lower = (orig - delta).max(lower);
    let cand_upper = (orig + delta).min(upper);

    let mut candidates: Vec<i64> = (cand_lower..=cand_upper).filter(|&v| v != orig).collect();
    if candidates.is_empty() {
        candidates = (lower..=upper).filter(|&v| v != orig).collect();
    }

    let chosen = if candidates.is_empty() {
        (orig + 1).rem_euclid(upper - lower + 1) + lower
    } else {
        candidates[rng.gen_index(candidates.len())]
    };

    chosen as u16
}

/// Frequency tables for every IPv4 and IPv6 prefix level, tallied during the
/// Anon stage's pre-scan across every address found in every packet (both
/// source and destination, at every encapsulation depth).
#[derive(Debug, Default)]
pub struct FrequencyTables {
    pub ipv4: [HashMap<String, u32>; 3],
    pub ipv6: [HashMap<String, u32>; 7],
}

impl FrequencyTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_ipv4(&mut self, addr: Ipv4Addr) {
        let o = addr.octets();
        *self.ipv4[0].entry(o[0].to_string()).or_insert(0) += 1;
        *self.ipv4[1].entry(format!("{}.{}", o[0], o[1])).or_insert(0) += 1;
        *self
            .ipv4[2]
            .entry(format!("{}.{}.{}", o[0], o[1], o[2]))
            .or_insert(0) += 1;
    }

    pub fn record_ipv6(&mut self, addr: Ipv6Addr) {
        let seg = addr.segments();
        let mut prefix = String::new();
        for i in 0..7 {
            if i > 0 {
                prefix.push(':');
            }
            prefix.push_str(&format!("{:04x}", seg[i]));
            *self.ipv6[i].entry(prefix.clone()).or_insert(0) += 1;
        }
    }

    /// Folds `other`'s counts into `self`, level by level. Used to combine
    /// per-file frequency tables into one batch-wide table before any
    /// mapping is built.
    pub fn merge(&mut self, other: &FrequencyTables) {
        for level in 0..3 {
            for (k, v) in &other.ipv4[level] {
                *self.ipv4[level].entry(k.clone()).or_insert(0) += v;
            }
        }
        for level in 0..7 {
            for (k, v) in &other.ipv6[level] {
                *self.ipv6[level].entry(k.clone()).or_insert(0) += v;
            }
        }
    }
}

/// Consistent-replacement maps built lazily during mapping construction: one
/// `HashMap` per level, keyed by the original prefix string.
#[derive(Debug, Default)]
pub struct SegmentMaps {
    pub ipv4: [HashMap<String, u8>; 3],
    pub ipv6: [HashMap<String, u16>; 7],
    pub used_ipv4: [HashSet<u8>; 3],
}

impl SegmentMaps {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Builds (or reuses, for a repeated address) the anonymized IPv4 address
/// for `original`, consulting and updating `freq`/`maps` as needed.
pub fn anonymize_ipv4(original: Ipv4Addr, freq: &FrequencyTables, maps: &mut SegmentMaps) -> Ipv4Addr {
    let o = original.octets();
    let key_a = o[0].to_string();
    let key_ab = format!("{}.{}", o[0], o[1]);
    let key_abc = format!("{}.{}.{}", o[0], o[1], o[2]);

    let new_a = if *freq.ipv4[0].get(&key_a).unwrap_or(&0) >= HIGH_FREQUENCY_THRESHOLD {
        *maps.ipv4[0].entry(key_a.clone()).or_insert_with(|| {
            generate_unique_ipv4_segment(o[0], &format!("first_{key_a}"), &mut maps.used_ipv4[0], 1, 255)
        })
    } else {
        generate_unique_ipv4_segment(
            o[0],
            &format!("first_single_{key_a}"),
            &mut maps.used_ipv4[0],
            1,
            255,
        )
    };

    let new_b = if *freq.ipv4[1].get(&key_ab).unwrap_or(&0) >= HIGH_FREQUENCY_THRESHOLD {
        *maps.ipv4[1].entry(key_ab.clone()).or_insert_with(|| {
            generate_unique_ipv4_segment(o[1], &format!("second_freq_{key_ab}"), &mut maps.used_ipv4[1], 0, 255)
        })
    } else {
        *maps.ipv4[1].entry(key_ab.clone()).or_insert_with(|| {
            generate_unique_ipv4_segment(
                o[1],
                &format!("second_single_{key_ab}"),
                &mut maps.used_ipv4[1],
                0,
                255,
            )
        })
    };

    let new_c = if *freq.ipv4[2].get(&key_abc).unwrap_or(&0) >= HIGH_FREQUENCY_THRESHOLD {
        *maps.ipv4[2].entry(key_abc.clone()).or_insert_with(|| {
            generate_unique_ipv4_segment(o[2], &format!("third_freq_{key_abc}"), &mut maps.used_ipv4[2], 0, 255)
        })
    } else {
        *maps.ipv4[2].entry(key_abc.clone()).or_insert_with(|| {
            generate_unique_ipv4_segment(
                o[2],
                &format!("third_single_{key_abc}"),
                &mut maps.used_ipv4[2],
                0,
                255,
            )
        })
    };

    Ipv4Addr::new(new_a, new_b, new_c, o[3])
}

/// Builds (or reuses) the anonymized IPv6 address for `original`. The last
/// hextet (the host portion) always passes through unchanged.
pub fn anonymize_ipv6(original: Ipv6Addr, freq: &FrequencyTables, maps: &mut SegmentMaps) -> Ipv6Addr {
    let seg = original.segments();
    let mut new_seg = [0u16; 8];
    let mut prefix = String::new();

    for i in 0..7 {
        if i > 0 {
            prefix.push(':');
        }
        prefix.push_str(&format!("{:04x}", seg[i]));
        let hex_digits = 4;
        new_seg[i] = if *freq.ipv6[i].get(&prefix).unwrap_or(&0) >= HIGH_FREQUENCY_THRESHOLD {
            *maps.ipv6[i]
                .entry(prefix.clone())
                .or_insert_with(|| generate_ipv6_segment(seg[i], hex_digits, &format!("ipv6_{i}_{prefix}")))
        } else {
            generate_ipv6_segment(seg[i], hex_digits, &format!("ipv6_single_{i}_{prefix}"))
        };
    }
    new_seg[7] = seg[7];

    Ipv6Addr::new(
        new_seg[0], new_seg[1], new_seg[2], new_seg[3], new_seg[4], new_seg[5], new_seg[6], new_seg[7],
    )
}
