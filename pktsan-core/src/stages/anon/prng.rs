// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Deterministic, SHA-256-seeded random selection for the Anon stage.
//!
//! `rand::rngs::StdRng` is deliberately not used here: the mapping must be
//! reproducible run over run from nothing but a seed string, so the seed is
//! derived directly from SHA-256 and fed into a small local generator
//! instead of going through `rand`'s seeding machinery.

use sha2::{Digest, Sha256};

/// Derives a 64-bit seed from `input` by hashing it with SHA-256 and taking
/// the first 8 bytes, big-endian.
pub fn seed_from_str(input: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    u64::from_be_bytes(digest[..8].try_into().expect("8 bytes"))
}

/// A splitmix64 generator: small, dependency-free, and fully determined by
/// its seed — enough for picking a deterministic index out of a candidate
/// list, which is all the Anon stage needs.
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    pub fn from_seed(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Picks a deterministic index in `0..len`. Panics if `len == 0`, same
    /// as every other `Index`-style API in this crate.
    pub fn gen_index(&mut self, len: usize) -> usize {
        (self.next_u64() % len as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_from_str_is_deterministic() {
        assert_eq!(seed_from_str("first_10"), seed_from_str("first_10"));
        assert_ne!(seed_from_str("first_10"), seed_from_str("first_11"));
    }

    #[test]
    fn same_seed_yields_same_sequence() {
        let mut a = DeterministicRng::from_seed(42);
        let mut b = DeterministicRng::from_seed(42);
        assert_eq!(a.next_u64(), b.next_u64());
        assert_eq!(a.gen_index(100), b.gen_index(100));
    }
}
