// Copyright 2024 Developers of the SmokeRand project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The base64 seed encoding:
//!
//! > prefixed with an underscore followed by two hex digits encoding the
//! > thread count, then an underscore, then 43 URL-safe base64 characters
//! > of a 256-bit seed. Parsing rejects any other length.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

const SEED_BASE64_LEN: usize = 43;

/// A parsed base64 seed: the thread count prefix and the raw 256-bit seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedSeed {
    pub thread_count: u8,
    pub seed: [u8; 32],
}

/// Errors from [`parse`] / the seed codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeedCodecError {
    #[error("base64 seed must have the form _HH_<43 chars>, got {0:?}")]
    BadShape(String),
    #[error("thread-count field is not 2 hex digits: {0:?}")]
    BadThreadCount(String),
    #[error("base64 payload is not {SEED_BASE64_LEN} characters: got {0}")]
    BadLength(usize),
    #[error("invalid base64: {0}")]
    Invalid(base64::DecodeError),
}

/// Parse a seed string of the form `_HH_<43 url-safe base64 chars>`.
pub fn parse(s: &str) -> Result<ParsedSeed, SeedCodecError> {
    let rest = s
        .strip_prefix('_')
        .ok_or_else(|| SeedCodecError::BadShape(s.into()))?;
    let mut parts = rest.splitn(2, '_');
    let hex = parts.next().ok_or_else(|| SeedCodecError::BadShape(s.into()))?;
    let payload = parts.next().ok_or_else(|| SeedCodecError::BadShape(s.into()))?;

    if hex.len() != 2 {
        return Err(SeedCodecError::BadThreadCount(hex.into()));
    }
    let thread_count =
        u8::from_str_radix(hex, 16).map_err(|_| SeedCodecError::BadThreadCount(hex.into()))?;

    if payload.len() != SEED_BASE64_LEN {
        return Err(SeedCodecError::BadLength(payload.len()));
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(SeedCodecError::Invalid)?;
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|v: Vec<u8>| SeedCodecError::BadLength(v.len()))?;

    Ok(ParsedSeed { thread_count, seed })
}

/// Encode a thread count and a 256-bit seed into the `_HH_<43 chars>` form.
pub fn encode(thread_count: u8, seed: [u8; 32]) -> String {
    format!("_{thread_count:02x}_{}", URL_SAFE_NO_PAD.encode(seed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let seed = {
            let mut s = [0u8; 32];
            for (i, b) in s.iter_mut().enumerate() {
                *b = i as u8;
            }
            s
        };
        let encoded = encode(4, seed);
        let parsed = parse(&encoded).unwrap();
        assert_eq!(parsed.thread_count, 4);
        assert_eq!(parsed.seed, seed);
    }

    #[test]
    fn rejects_wrong_length_payload() {
        let bad = "_04_tooshort";
        assert!(matches!(parse(bad), Err(SeedCodecError::BadLength(_))));
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(parse("04_abcdef").is_err());
    }

    #[test]
    fn rejects_non_hex_thread_count() {
        let encoded = encode(1, [0u8; 32]);
        let mangled = encoded.replacen("_01_", "_zz_", 1);
        assert!(matches!(
            parse(&mangled),
            Err(SeedCodecError::BadThreadCount(_))
        ));
    }
}
