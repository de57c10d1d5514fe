//! Key layouts for the message partitions.
//!
//! - primary: `name ∥ correlation_key`
//! - dedup:   `name ∥ correlation_key ∥ id`
//! - ttl:     `deadline ∥ name ∥ correlation_key`
//!
//! The deadline prefix is the `i64` with its sign bit flipped, written
//! most-significant byte first. Lexicographic comparison of the prefix then
//! agrees with numeric comparison over the whole `i64` range, which is what
//! lets a forward scan of the TTL partition stop at the first late deadline.

/// Value stored in the set-like partitions (TTL and dedup).
pub const EXISTENCE: [u8; 1] = [1];

/// Width of the deadline prefix in a TTL key.
pub const DEADLINE_LEN: usize = 8;

const SIGN_BIT: u64 = 1 << 63;

pub fn encode_deadline(deadline: i64) -> [u8; DEADLINE_LEN] {
    ((deadline as u64) ^ SIGN_BIT).to_be_bytes()
}

pub fn decode_deadline(prefix: [u8; DEADLINE_LEN]) -> i64 {
    (u64::from_be_bytes(prefix) ^ SIGN_BIT) as i64
}

pub fn write_message_key(out: &mut Vec<u8>, name: &[u8], correlation_key: &[u8]) {
    out.clear();
    out.extend_from_slice(name);
    out.extend_from_slice(correlation_key);
}

pub fn write_dedup_key(out: &mut Vec<u8>, name: &[u8], correlation_key: &[u8], id: &[u8]) {
    write_message_key(out, name, correlation_key);
    out.extend_from_slice(id);
}

pub fn write_ttl_key(out: &mut Vec<u8>, deadline: i64, name: &[u8], correlation_key: &[u8]) {
    out.clear();
    out.extend_from_slice(&encode_deadline(deadline));
    out.extend_from_slice(name);
    out.extend_from_slice(correlation_key);
}

/// Splits a TTL key into its deadline and the primary key suffix.
///
/// Returns `None` for keys shorter than the deadline prefix.
pub fn split_ttl_key(key: &[u8]) -> Option<(i64, &[u8])> {
    if key.len() < DEADLINE_LEN {
        return None;
    }
    let (prefix, suffix) = key.split_at(DEADLINE_LEN);
    let mut raw = [0u8; DEADLINE_LEN];
    raw.copy_from_slice(prefix);
    Some((decode_deadline(raw), suffix))
}
