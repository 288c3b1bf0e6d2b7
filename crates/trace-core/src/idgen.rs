//! SHA256 + base36 id generation for records and statuses.

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use num_traits::Zero;
use sha2::{Digest, Sha256};

/// Base36 alphabet (0-9, a-z).
const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Encodes a byte slice as a base36 string of exactly `length` characters,
/// zero-padded on the left and keeping the least significant digits.
pub fn encode_base36(data: &[u8], length: usize) -> String {
    let mut num = BigUint::from_bytes_be(data);
    let base = BigUint::from(36u32);

    let mut digits: Vec<char> = Vec::with_capacity(length);
    while !num.is_zero() {
        let rem = &num % &base;
        num /= &base;
        let idx = rem.to_u32_digits().first().copied().unwrap_or(0) as usize;
        digits.push(BASE36_ALPHABET[idx] as char);
    }
    digits.truncate(length);
    while digits.len() < length {
        digits.push('0');
    }
    digits.iter().rev().collect()
}

/// Creates a hash-based id such as `directory-4k2x`.
///
/// `length` is expected to be 3-8; other values fall back to a 3-char byte
/// width. Bump `nonce` to get a different id for the same inputs.
pub fn generate_hash_id(
    prefix: &str,
    owner_type: &str,
    label: &str,
    timestamp: DateTime<Utc>,
    length: usize,
    nonce: u32,
) -> String {
    let content = format!(
        "{}|{}|{}|{}",
        owner_type,
        label,
        timestamp.timestamp_nanos_opt().unwrap_or(0),
        nonce
    );

    let hash = Sha256::digest(content.as_bytes());

    let num_bytes = match length {
        3 => 2,
        4 => 3,
        5 | 6 => 4,
        7 | 8 => 5,
        _ => 3,
    };

    format!("{}-{}", prefix, encode_base36(&hash[..num_bytes], length))
}

/// Birthday-paradox approximation: P ~ 1 - e^(-n^2 / 2N).
fn collision_probability(num_records: usize, id_length: usize) -> f64 {
    let total: f64 = 36.0_f64.powi(id_length as i32);
    let exponent = -(num_records as f64).powi(2) / (2.0 * total);
    1.0 - exponent.exp()
}

/// Returns the shortest length in `min_length..=max_length` whose collision
/// probability stays at or below `max_collision_prob`.
pub fn compute_adaptive_length(
    num_records: usize,
    min_length: usize,
    max_length: usize,
    max_collision_prob: f64,
) -> usize {
    (min_length..=max_length)
        .find(|&length| collision_probability(num_records, length) <= max_collision_prob)
        .unwrap_or(max_length)
}

/// Default adaptive id configuration constants.
pub mod adaptive_defaults {
    /// Collision probability threshold (25%).
    pub const MAX_COLLISION_PROB: f64 = 0.25;
    pub const MIN_LENGTH: usize = 3;
    pub const MAX_LENGTH: usize = 8;
}
