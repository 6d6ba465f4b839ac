//! # Hashing Utilities
//!
//! BLAKE3 everywhere. It's faster than SHA-256 on every platform that
//! matters and nothing in Passlock needs to interoperate with anyone else's
//! hash choices.

/// Compute the BLAKE3 hash of the input data.
///
/// # Example
///
/// ```
/// use passlock_protocol::crypto::blake3_hash;
///
/// let hash = blake3_hash(b"passlock");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Compute a domain-separated hash using BLAKE3's `derive_key` mode.
///
/// `domain_separated_hash("a", data)` and `domain_separated_hash("b", data)`
/// never collide. Don't prepend a tag by hand — `derive_key` uses a distinct
/// IV per context string, which is the proper way to do this with BLAKE3.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    domain_separated_hash_multi(context, &[data])
}

/// Domain-separated hash over several byte slices, fed sequentially into
/// the hasher instead of concatenated into a temporary buffer.
///
/// Callers are responsible for making the split unambiguous (fixed-width
/// leading fields, or explicit separators).
pub fn domain_separated_hash_multi(context: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Constant-time equality for 32-byte digests.
///
/// Delegates to `blake3::Hash`'s `PartialEq`, which is constant-time.
pub fn digest_eq(a: &[u8; 32], b: &[u8; 32]) -> bool {
    blake3::Hash::from(*a) == blake3::Hash::from(*b)
}
