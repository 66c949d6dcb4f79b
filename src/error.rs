// error.rs — Error taxonomy for admission, quotes, issuance and bootstrap
//
// Every admission failure maps to a stable `ErrorKind`. Only the kind and its
// coarse description cross the wire; the Display text of the full error (which
// may name the failed quote check) stays in coordinator logs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse, wire-stable error kinds surfaced to untrusted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ManifestNotSet,
    ManifestAlreadySet,
    MalformedManifest,
    UnknownMarbleType,
    UnknownPackage,
    UnknownInfrastructure,
    QuoteInvalid,
    ActivationLimitExceeded,
    InternalCertIssuanceFailure,
    Unavailable,
    BadRequest,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManifestNotSet => "ManifestNotSet",
            Self::ManifestAlreadySet => "ManifestAlreadySet",
            Self::MalformedManifest => "MalformedManifest",
            Self::UnknownMarbleType => "UnknownMarbleType",
            Self::UnknownPackage => "UnknownPackage",
            Self::UnknownInfrastructure => "UnknownInfrastructure",
            Self::QuoteInvalid => "QuoteInvalid",
            Self::ActivationLimitExceeded => "ActivationLimitExceeded",
            Self::InternalCertIssuanceFailure => "InternalCertIssuanceFailure",
            Self::Unavailable => "Unavailable",
            Self::BadRequest => "BadRequest",
        }
    }

    /// Message safe to hand to a caller that has not been attested yet.
    pub fn public_message(self) -> &'static str {
        match self {
            Self::ManifestNotSet => "coordinator has no manifest",
            Self::ManifestAlreadySet => "manifest is already set",
            Self::MalformedManifest => "manifest rejected",
            Self::UnknownMarbleType => "marble type is not declared",
            Self::UnknownPackage => "package is not declared",
            Self::UnknownInfrastructure => "infrastructure is not declared",
            Self::QuoteInvalid => "attestation rejected",
            Self::ActivationLimitExceeded => "activation limit reached",
            Self::InternalCertIssuanceFailure => "internal error",
            Self::Unavailable => "coordinator unavailable",
            Self::BadRequest => "malformed request",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Manifest ────────────────────────────────────────────────────────────────

/// Why a manifest was refused at `SetManifest` time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("manifest is not valid JSON: {0}")]
    Json(String),

    #[error("package {package}: {reason}")]
    PackageIdentity { package: String, reason: String },

    #[error("marble {marble} references undeclared package {package}")]
    DanglingPackage { marble: String, package: String },

    #[error("empty name in {0}")]
    EmptyName(&'static str),
}

impl From<serde_json::Error> for ManifestError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}

// ── Quotes ──────────────────────────────────────────────────────────────────

/// A single failed comparison between a report and the manifest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteMismatch {
    #[error("report data does not match the presented key")]
    ReportData,

    #[error("measurement does not match UniqueID")]
    UniqueId,

    #[error("signer does not match SignerID")]
    SignerId,

    #[error("product id {actual} does not match {expected}")]
    ProductId { expected: u16, actual: u16 },

    #[error("security version {actual} below required {required}")]
    SecurityVersion { required: u16, actual: u16 },

    #[error("QE SVN {actual} below required {required}")]
    QeSvn { required: u16, actual: u16 },

    #[error("PCE SVN {actual} below required {required}")]
    PceSvn { required: u16, actual: u16 },

    #[error("CPU SVN byte {index} is {actual}, below required {required}")]
    CpuSvn { index: usize, required: u8, actual: u8 },

    #[error("debug enclave not allowed for this package")]
    Debug,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    #[error("malformed quote: {0}")]
    Malformed(String),

    #[error("quote signature does not verify against the root of trust")]
    Signature,

    #[error("key error: {0}")]
    Key(String),

    #[error(transparent)]
    Mismatch(#[from] QuoteMismatch),

    #[error("no infrastructure accepted the quote")]
    NoInfrastructure,

    #[error("quote issuer unavailable: {0}")]
    Unavailable(String),
}

// ── Certificate authority ───────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CaError {
    #[error("certificate generation failed: {0}")]
    Rcgen(#[from] rcgen::Error),

    #[error("subject public key rejected: {0}")]
    PublicKey(String),

    #[error("validity window out of range: {0}")]
    Validity(String),
}

// ── Admission ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("manifest not set")]
    ManifestNotSet,

    #[error("manifest already set")]
    ManifestAlreadySet,

    #[error("malformed manifest: {0}")]
    MalformedManifest(#[from] ManifestError),

    #[error("unknown marble type: {0}")]
    UnknownMarbleType(String),

    #[error("unknown package: {0}")]
    UnknownPackage(String),

    #[error("unknown infrastructure: {0}")]
    UnknownInfrastructure(String),

    #[error("activation limit exceeded for marble type {0}")]
    ActivationLimitExceeded(String),

    #[error("quote invalid: {0}")]
    QuoteInvalid(#[source] QuoteError),

    #[error("certificate issuance failed: {0}")]
    InternalCertIssuanceFailure(#[source] CaError),

    #[error("coordinator is shut down")]
    Unavailable,
}

impl AdmissionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ManifestNotSet => ErrorKind::ManifestNotSet,
            Self::ManifestAlreadySet => ErrorKind::ManifestAlreadySet,
            Self::MalformedManifest(_) => ErrorKind::MalformedManifest,
            Self::UnknownMarbleType(_) => ErrorKind::UnknownMarbleType,
            Self::UnknownPackage(_) => ErrorKind::UnknownPackage,
            Self::UnknownInfrastructure(_) => ErrorKind::UnknownInfrastructure,
            Self::ActivationLimitExceeded(_) => ErrorKind::ActivationLimitExceeded,
            Self::QuoteInvalid(_) => ErrorKind::QuoteInvalid,
            Self::InternalCertIssuanceFailure(_) => ErrorKind::InternalCertIssuanceFailure,
            Self::Unavailable => ErrorKind::Unavailable,
        }
    }
}

// ── Transport ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("message encoding error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("message exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("invalid base64 in field {field}")]
    Base64 { field: &'static str },
}

// ── Workload bootstrap ──────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("key generation failed: {0}")]
    Key(#[from] rcgen::Error),

    #[error("quote generation failed: {0}")]
    Quote(#[from] QuoteError),

    #[error("coordinator unreachable: {0}")]
    Service(#[from] ServiceError),

    #[error("activation refused: {kind}: {message}")]
    Refused { kind: ErrorKind, message: String },

    #[error("returned certificate rejected: {0}")]
    CertificateMismatch(String),

    #[error("installing parameters failed: {0}")]
    Install(String),
}

// ── Configuration ───────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("reading {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_match_serde_names() {
        for kind in [
            ErrorKind::ManifestNotSet,
            ErrorKind::QuoteInvalid,
            ErrorKind::ActivationLimitExceeded,
            ErrorKind::InternalCertIssuanceFailure,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn quote_errors_collapse_to_one_kind() {
        let err = AdmissionError::QuoteInvalid(QuoteMismatch::SecurityVersion {
            required: 3,
            actual: 2,
        }
        .into());
        assert_eq!(err.kind(), ErrorKind::QuoteInvalid);
        // The detailed reason is in Display, never in the public message.
        assert!(err.to_string().contains("security version"));
        assert!(!err.kind().public_message().contains("security"));
    }
}
