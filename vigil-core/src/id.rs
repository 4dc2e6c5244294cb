//! Identifier generation for security log records.
//!
//! Log ids are the base36 millisecond timestamp followed by a random base36
//! suffix. They sort roughly by creation time and are opaque to consumers.

use chrono::{DateTime, Utc};
use rand::Rng;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Encode an unsigned integer in lowercase base36.
pub fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::with_capacity(13);
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();

    // Every byte comes from ALPHABET, so this is always valid ASCII.
    String::from_utf8(digits).unwrap_or_default()
}

/// Generate a security log id for an event created at `now`.
///
/// # Example
/// ```
/// use chrono::Utc;
/// use vigil_core::id::generate_log_id;
///
/// let id = generate_log_id(Utc::now());
/// assert!(id.len() > 8);
/// ```
pub fn generate_log_id(now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
    let suffix: u64 = rand::rng().random();
    format!("{}{}", to_base36(millis), to_base36(suffix))
}

/// Check that an id only uses the base36 alphabet.
pub fn is_base36(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| ALPHABET.contains(&b))
}
