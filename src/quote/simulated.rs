// simulated.rs — Software attestation platform
//
// Stands in for enclave hardware in tests and development meshes. A quote is
// JSON `{report, signature}`, where the signature is Ed25519 over the
// canonical JSON of the report. The infrastructure's `RootCA` is the platform
// public key, so a quote only verifies against infrastructures that list the
// key that produced it.
//
// Nothing here is secret-preserving: anyone holding the platform seed can
// mint reports for any identity. Production meshes plug hardware-backed
// implementations into the same traits.

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::QuoteError;
use crate::manifest::canonical;
use crate::manifest::{Infrastructure, Package, PackageIdentity};
use crate::quote::policy::{check_report, EnclaveIdentity, Report};
use crate::quote::{QuoteIssuer, QuoteValidator};
use crate::sign;

#[derive(Debug, Serialize, Deserialize)]
struct SimulatedQuote {
    report: Report,
    signature: Vec<u8>,
}

fn report_bytes(report: &Report) -> Result<Vec<u8>, QuoteError> {
    canonical::canonical_bytes(report).map_err(|e| QuoteError::Malformed(e.to_string()))
}

// ── Issuer ──────────────────────────────────────────────────────────────────

/// Issues reports for a fixed enclave identity, signed by the platform key.
pub struct SimulatedIssuer {
    key: SigningKey,
    identity: EnclaveIdentity,
}

impl SimulatedIssuer {
    pub fn new(key: SigningKey, identity: EnclaveIdentity) -> Self {
        Self { key, identity }
    }

    /// Load the enclave identity from a JSON profile; the key comes from
    /// `EDG_PLATFORM_KEY_B64`.
    pub fn from_profile(path: &Path) -> Result<Self, QuoteError> {
        let data = std::fs::read(path)
            .map_err(|e| QuoteError::Unavailable(format!("reading {}: {}", path.display(), e)))?;
        let identity: EnclaveIdentity = serde_json::from_slice(&data)
            .map_err(|e| QuoteError::Malformed(format!("parsing {}: {}", path.display(), e)))?;
        let key = sign::load_platform_key()?.ok_or_else(|| {
            QuoteError::Unavailable(format!("{} is not set", sign::PLATFORM_KEY_ENV))
        })?;
        Ok(Self::new(key, identity))
    }

    /// Public key to list as `RootCA` for infrastructures served by this platform.
    pub fn root_of_trust(&self) -> Vec<u8> {
        self.key.verifying_key().to_bytes().to_vec()
    }

    pub fn identity(&self) -> &EnclaveIdentity {
        &self.identity
    }
}

impl QuoteIssuer for SimulatedIssuer {
    fn issue(&self, report_data: &[u8]) -> Result<Vec<u8>, QuoteError> {
        let report = Report {
            identity: self.identity.clone(),
            report_data: report_data.to_vec(),
        };
        let signature = sign::sign(&self.key, &report_bytes(&report)?).to_vec();
        serde_json::to_vec(&SimulatedQuote { report, signature })
            .map_err(|e| QuoteError::Malformed(e.to_string()))
    }
}

// ── Validator ───────────────────────────────────────────────────────────────

/// Verifies simulated quotes against the infrastructure's root of trust.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedValidator;

impl QuoteValidator for SimulatedValidator {
    fn validate(
        &self,
        quote: &[u8],
        report_data: &[u8],
        package: &Package,
        infrastructure: &Infrastructure,
    ) -> Result<(), QuoteError> {
        let quote: SimulatedQuote =
            serde_json::from_slice(quote).map_err(|e| QuoteError::Malformed(e.to_string()))?;
        sign::verify(
            &infrastructure.root_ca,
            &report_bytes(&quote.report)?,
            &quote.signature,
        )?;
        check_report(&quote.report, report_data, package, infrastructure)?;
        Ok(())
    }
}

/// An identity that satisfies `package` on `infrastructure` at the exact
/// minimum versions.
pub fn identity_for(package: &Package, infrastructure: &Infrastructure) -> EnclaveIdentity {
    let mut identity = EnclaveIdentity {
        unique_id: [0; 32],
        signer_id: [0; 32],
        product_id: 0,
        security_version: 0,
        debug: false,
        qe_svn: infrastructure.qe_svn,
        pce_svn: infrastructure.pce_svn,
        cpu_svn: infrastructure.cpu_svn,
    };
    match &package.identity {
        PackageIdentity::Unique { unique_id } => identity.unique_id = *unique_id,
        PackageIdentity::Signer {
            signer_id,
            product_id,
            security_version,
        } => {
            identity.signer_id = *signer_id;
            identity.product_id = *product_id;
            identity.security_version = *security_version;
        }
    }
    identity
}
