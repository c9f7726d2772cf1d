//! # Hashing Utilities
//!
//! Token identity in sealchain is a SHA-256 digest. The base ledger is a
//! Bitcoin-style chain, so SHA-256 is what every external tool already
//! speaks; there is no reason to introduce a second hash function.
//!
//! ## Domain tags
//!
//! Some identifiers are derived from the same preimage with a short prefix
//! (e.g. the crowdsale change token hashes `b"CHANGE" || contract`). Use
//! [`tagged_sha256`] for those so the prefixing rule lives in one place.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data as a `Vec<u8>`.
///
/// # Example
///
/// ```
/// use sealchain_protocol::crypto::sha256;
///
/// let hash = sha256(b"sealchain");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Vec<u8> {
    sha256_array(data).to_vec()
}

/// Compute the SHA-256 hash and return a fixed-size array.
///
/// This is the variant token ids are built from; prefer it wherever the
/// `[u8; 32]` type propagates naturally.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices as if they were concatenated, without building
/// the concatenation.
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// SHA-256 over `tag || data`.
///
/// The tag is a raw prefix, not a length-prefixed field: callers pick tags
/// that cannot be confused with the start of a valid canonical preimage
/// (canonical contract bytes always start with `{`).
pub fn tagged_sha256(tag: &[u8], data: &[u8]) -> [u8; 32] {
    sha256_multi(&[tag, data])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string.
        let hash = sha256(b"");
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(hash, expected);
    }

    #[test]
    fn sha256_deterministic() {
        let a = sha256_array(b"seal");
        let b = sha256_array(b"seal");
        assert_eq!(a, b);
    }

    #[test]
    fn test_sha256_array_matches_vec() {
        let vec_result = sha256(b"test data");
        let arr_result = sha256_array(b"test data");
        assert_eq!(vec_result.as_slice(), arr_result.as_slice());
    }

    #[test]
    fn test_sha256_multi_matches_concatenation() {
        let multi = sha256_multi(&[b"hello", b" world"]);
        assert_eq!(multi, sha256_array(b"hello world"));
    }

    #[test]
    fn test_tagged_hash_differs_from_plain() {
        let data = b"{\"title\":\"x\"}";
        assert_ne!(tagged_sha256(b"CHANGE", data), sha256_array(data));
        assert_eq!(
            tagged_sha256(b"CHANGE", data),
            sha256_array(b"CHANGE{\"title\":\"x\"}")
        );
    }
}
