// hash.rs — SHA-256 helpers shared by the manifest, quote and marble code
//
// Report data binds an attestation quote to a public key: it is always
// sha256(SubjectPublicKeyInfo DER), never the raw key bytes.

use sha2::{Digest, Sha256};

/// SHA-256 digest of a byte slice.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Compute SHA-256 hex digest of a byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
    hex_encode(&sha256(data))
}

pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
