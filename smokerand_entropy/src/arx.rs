// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `Arx256`: a 256-bit-key, counter-mode ARX block cipher.
//!
//! The entropy service only needs an ARX block cipher in counter mode; the
//! specific cipher is not observable from outside it. We use a ChaCha-family
//! round function — the same add-rotate-xor quarter round as
//! [`guts::round`](https://docs.rs/rand_chacha) — run for 12 double-rounds,
//! the same speed/quality tradeoff `ChaCha12Rng` settled on for a default
//! userspace RNG.

const ROUNDS: u32 = 12;
const CONSTANTS: [u32; 4] = [0x6170_7865, 0x3320_646e, 0x7962_2d32, 0x6b20_6574];

#[inline(always)]
fn quarter_round(state: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    state[a] = state[a].wrapping_add(state[b]);
    state[d] ^= state[a];
    state[d] = state[d].rotate_left(16);

    state[c] = state[c].wrapping_add(state[d]);
    state[b] ^= state[c];
    state[b] = state[b].rotate_left(12);

    state[a] = state[a].wrapping_add(state[b]);
    state[d] ^= state[a];
    state[d] = state[d].rotate_left(8);

    state[c] = state[c].wrapping_add(state[d]);
    state[b] ^= state[c];
    state[b] = state[b].rotate_left(7);
}

fn double_round(state: &mut [u32; 16]) {
    // Column rounds.
    quarter_round(state, 0, 4, 8, 12);
    quarter_round(state, 1, 5, 9, 13);
    quarter_round(state, 2, 6, 10, 14);
    quarter_round(state, 3, 7, 11, 15);
    // Diagonal rounds.
    quarter_round(state, 0, 5, 10, 15);
    quarter_round(state, 1, 6, 11, 12);
    quarter_round(state, 2, 7, 8, 13);
    quarter_round(state, 3, 4, 9, 14);
}

/// One counter-mode ARX cipher instance: a 256-bit key plus a 64-bit
/// counter that advances by one per emitted block.
#[derive(Clone)]
pub struct Arx256 {
    key: [u32; 8],
    counter: u64,
}

impl Arx256 {
    /// Build from a raw 256-bit key, counter reset to zero.
    pub fn from_key_bytes(key: [u8; 32]) -> Self {
        let mut words = [0u32; 8];
        for (w, chunk) in words.iter_mut().zip(key.chunks_exact(4)) {
            *w = u32::from_le_bytes(chunk.try_into().unwrap());
        }
        Arx256 { key: words, counter: 0 }
    }

    /// Current counter value (block index about to be produced).
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Seek to an explicit counter value; used to make replay of a
    /// recorded seed log reproducible without re-deriving the key.
    pub fn seek(&mut self, counter: u64) {
        self.counter = counter;
    }

    fn block(&self) -> [u32; 16] {
        let mut state = [0u32; 16];
        state[0..4].copy_from_slice(&CONSTANTS);
        state[4..12].copy_from_slice(&self.key);
        state[12] = self.counter as u32;
        state[13] = (self.counter >> 32) as u32;
        state[14] = 0;
        state[15] = 0;

        let initial = state;
        for _ in 0..(ROUNDS / 2) {
            double_round(&mut state);
        }
        for i in 0..16 {
            state[i] = state[i].wrapping_add(initial[i]);
        }
        state
    }

    /// Produce the next 64-bit seed and advance the counter.
    ///
    /// Each call consumes one full block but only the first two words are
    /// used; this trades a little throughput for a trivially simple,
    /// obviously-correct implementation, appropriate for a service that is
    /// called at most once per test per worker.
    pub fn next_u64(&mut self) -> u64 {
        let block = self.block();
        self.counter = self.counter.wrapping_add(1);
        (block[0] as u64) | ((block[1] as u64) << 32)
    }

    /// Produce a full 256-bit (32-byte) block, little-endian word order —
    /// used by base64 reseeding to capture a fresh raw seed.
    pub fn next_seed_bytes(&mut self) -> [u8; 32] {
        let block = self.block();
        self.counter = self.counter.wrapping_add(1);
        let mut out = [0u8; 32];
        for (chunk, w) in out.chunks_exact_mut(4).zip(block[0..8].iter()) {
            chunk.copy_from_slice(&w.to_le_bytes());
        }
        out
    }
}

/// Derive a 256-bit key from an arbitrary UTF-8 passphrase.
///
/// This absorbs the passphrase into a running 256-bit state by repeatedly
/// running it through the cipher's own round function keyed with the
/// running state itself (a minimal sponge-style construction), then runs
/// one more permutation over the all-zero counter to whiten the result.
/// Any two distinct passphrases are astronomically unlikely to collide;
/// cryptographic strength beyond that is not required — callers only
/// observe that reseeding changes the stream, not which cipher drives it.
pub fn derive_key_from_text(passphrase: &str) -> [u8; 32] {
    let mut state = [0u32; 8];
    for (i, byte) in passphrase.as_bytes().iter().enumerate() {
        let slot = i % 8;
        state[slot] = state[slot]
            .wrapping_add(*byte as u32)
            .rotate_left(((i % 31) + 1) as u32);
        if slot == 7 {
            whiten(&mut state);
        }
    }
    whiten(&mut state);

    let mut key = [0u8; 32];
    for (chunk, w) in key.chunks_exact_mut(4).zip(state.iter()) {
        chunk.copy_from_slice(&w.to_le_bytes());
    }
    key
}

fn whiten(state: &mut [u32; 8]) {
    let mut full = [0u32; 16];
    full[0..4].copy_from_slice(&CONSTANTS);
    full[4..12].copy_from_slice(state);
    for _ in 0..(ROUNDS / 2) {
        double_round(&mut full);
    }
    state.copy_from_slice(&full[4..12]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_fixed_key() {
        let mut a = Arx256::from_key_bytes([7u8; 32]);
        let mut b = Arx256::from_key_bytes([7u8; 32]);
        for _ in 0..64 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn distinct_keys_diverge() {
        let mut a = Arx256::from_key_bytes([1u8; 32]);
        let mut b = Arx256::from_key_bytes([2u8; 32]);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn counter_advances_monotonically() {
        let mut a = Arx256::from_key_bytes([9u8; 32]);
        assert_eq!(a.counter(), 0);
        a.next_u64();
        assert_eq!(a.counter(), 1);
        a.next_seed_bytes();
        assert_eq!(a.counter(), 2);
    }

    #[test]
    fn text_derivation_is_deterministic_and_sensitive() {
        let k1 = derive_key_from_text("correct horse battery staple");
        let k2 = derive_key_from_text("correct horse battery staple");
        let k3 = derive_key_from_text("correct horse battery staplf");
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }

    #[test]
    fn seek_reproduces_later_output() {
        let mut a = Arx256::from_key_bytes([3u8; 32]);
        let _ = a.next_u64();
        let _ = a.next_u64();
        let third = {
            let mut b = Arx256::from_key_bytes([3u8; 32]);
            b.seek(2);
            b.next_u64()
        };
        assert_eq!(a.next_u64(), third);
    }
}
