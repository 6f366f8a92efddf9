//! Integrity tag computation.
//!
//! The tag is a deterministic hash of a signature's quantised vector,
//! used for cache/dedup equality checks. It is an integrity/equality
//! tag, not a MAC: no keying, no cryptographic guarantees are claimed.

use blake2::digest::consts::U16;
use blake2::{Blake2b, Digest};

use crate::types::IntegrityTag;

type Blake2b128 = Blake2b<U16>;

/// Quantise `vector` (already-integer-valued `f32`s in `[0, 65535]`) to
/// little-endian `i16` bytes, the same byte layout used by the on-disk
/// `vector` field (§6), and hash those bytes with BLAKE2b-128.
pub fn compute_tag(quantised_vector_bytes: &[u8]) -> IntegrityTag {
    let mut hasher = Blake2b128::new();
    hasher.update(quantised_vector_bytes);
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    IntegrityTag(bytes)
}
