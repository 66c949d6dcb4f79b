// ca.rs — Coordinator certificate authority
//
// Holds the coordinator root certificate and its signing key and issues
// short-lived leaf certificates for attested marble keys. The leaf subject
// key is always the key passed to `issue`; the common name is always a fresh
// UUID chosen here. A marble may ask for a name, but the request is ignored:
// identities are assigned by the coordinator so a workload cannot claim
// another instance's name.

use chrono::{Duration, Utc};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose, SubjectPublicKeyInfo,
};
use tracing::debug;
use uuid::Uuid;

use crate::error::CaError;

/// Common name of the coordinator root certificate.
pub const COORDINATOR_COMMON_NAME: &str = "Coordinator";

/// Leaf certificates are backdated by this much to absorb clock skew.
fn backdate() -> Duration {
    Duration::minutes(5)
}

/// A leaf certificate produced for one activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    pub der: Vec<u8>,
    pub common_name: String,
}

pub struct CertificateAuthority {
    organization: String,
    root: Certificate,
    key: KeyPair,
    validity: Duration,
}

impl CertificateAuthority {
    /// Create a fresh root key and self-signed root certificate.
    pub fn generate(organization: &str, validity: Duration) -> Result<Self, CaError> {
        let key = KeyPair::generate()?;
        let root = root_params(organization).self_signed(&key)?;
        Self::assemble(organization, root, key, validity)
    }

    /// Use an existing root key. The root certificate is re-signed from the
    /// parameters recovered from `cert_pem`.
    pub fn from_pem(
        organization: &str,
        cert_pem: &str,
        key_pem: &str,
        validity: Duration,
    ) -> Result<Self, CaError> {
        let key = KeyPair::from_pem(key_pem)?;
        let params = CertificateParams::from_ca_cert_pem(cert_pem)?;
        let root = params.self_signed(&key)?;
        Self::assemble(organization, root, key, validity)
    }

    fn assemble(
        organization: &str,
        root: Certificate,
        key: KeyPair,
        validity: Duration,
    ) -> Result<Self, CaError> {
        if validity <= Duration::zero() {
            return Err(CaError::Validity(format!(
                "certificate validity must be positive, got {}s",
                validity.num_seconds()
            )));
        }
        Ok(Self {
            organization: organization.to_string(),
            root,
            key,
            validity,
        })
    }

    /// Issue a leaf certificate for `subject_public_key` (SubjectPublicKeyInfo
    /// DER). `requested_common_name` is recorded in logs only.
    pub fn issue(
        &self,
        subject_public_key: &[u8],
        requested_common_name: &str,
    ) -> Result<IssuedCertificate, CaError> {
        let spki = SubjectPublicKeyInfo::from_der(subject_public_key)
            .map_err(|e| CaError::PublicKey(e.to_string()))?;

        let common_name = Uuid::new_v4().to_string();
        debug!(
            requested = requested_common_name,
            assigned = %common_name,
            "assigning marble common name"
        );

        let now = Utc::now();
        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name(&common_name, &self.organization);
        params.not_before = offset_time(now - backdate())?;
        params.not_after = offset_time(now + self.validity)?;
        params.is_ca = IsCa::ExplicitNoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyAgreement,
        ];
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];
        params.use_authority_key_identifier_extension = true;

        let cert = params.signed_by(&spki, &self.root, &self.key)?;
        Ok(IssuedCertificate {
            der: cert.der().to_vec(),
            common_name,
        })
    }

    /// Root certificate, DER.
    pub fn root_der(&self) -> Vec<u8> {
        self.root.der().to_vec()
    }

    /// Root certificate, PEM.
    pub fn root_pem(&self) -> String {
        self.root.pem()
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }
}

fn root_params(organization: &str) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name(COORDINATOR_COMMON_NAME, organization);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params
}

fn distinguished_name(common_name: &str, organization: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    dn.push(DnType::OrganizationName, organization);
    dn
}

fn offset_time(t: chrono::DateTime<Utc>) -> Result<time::OffsetDateTime, CaError> {
    time::OffsetDateTime::from_unix_timestamp(t.timestamp())
        .map_err(|e| CaError::Validity(e.to_string()))
}
