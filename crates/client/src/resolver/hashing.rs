//! Deterministic bucketing of targeting keys.
//!
//! The fraction for a subject is derived from SHA-256 of
//! `"<variable name>:<targeting key>"`: the first 8 digest bytes are read as a
//! big-endian `u64`, the top 53 bits are kept and divided by 2^53. The result
//! is uniform over `[0, 1)` and exactly representable as an `f64`, so every
//! implementation using the same recipe agrees on assignment.

use sha2::{Digest, Sha256};
use variables_config::constants::BUCKET_KEY_SEPARATOR;

const MANTISSA_BITS: u32 = 53;

/// Deterministic fraction in `[0, 1)` for `(name, targeting_key)`.
pub fn bucket_fraction(name: &str, targeting_key: &str) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(BUCKET_KEY_SEPARATOR.as_bytes());
    hasher.update(targeting_key.as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let bits = u64::from_be_bytes(prefix) >> (64 - MANTISSA_BITS);
    bits as f64 / (1u64 << MANTISSA_BITS) as f64
}
