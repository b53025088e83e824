#![forbid(unsafe_code)]

use serde_json::Value;
use sha2::Digest as _;
use std::fmt::Write as _;

/// Lower-case hex SHA-256 over the canonical serialization of `value`.
///
/// `serde_json` keeps object keys sorted (no `preserve_order`), so two equal
/// documents always hash the same regardless of how they were built.
pub fn hash_json(value: &Value) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    hash_bytes(&bytes)
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}
