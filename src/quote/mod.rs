// quote/ — Attestation capabilities consumed by the coordinator and marbles
//
// policy.rs    — The comparison every validator applies to a parsed report
// simulated.rs — Ed25519-signed software reports for tests and dev meshes
//
// The coordinator and the marble bootstrap only see the two traits below;
// neither looks inside quote bytes.

pub mod policy;
pub mod simulated;

use crate::error::QuoteError;
use crate::hash;
use crate::manifest::{Infrastructure, Package};

/// Produces attestation evidence over caller-chosen report data.
pub trait QuoteIssuer: Send + Sync {
    fn issue(&self, report_data: &[u8]) -> Result<Vec<u8>, QuoteError>;
}

/// Checks attestation evidence against one package/infrastructure pair.
pub trait QuoteValidator: Send + Sync {
    fn validate(
        &self,
        quote: &[u8],
        report_data: &[u8],
        package: &Package,
        infrastructure: &Infrastructure,
    ) -> Result<(), QuoteError>;
}

/// Report data binding a quote to a public key (SubjectPublicKeyInfo DER).
pub fn report_data_for(public_key: &[u8]) -> [u8; 32] {
    hash::sha256(public_key)
}
