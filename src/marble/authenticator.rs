// authenticator.rs — Marble identity before activation
//
// A fresh keypair generated inside the enclave, a self-signed placeholder
// certificate over it, and a quote whose report data is the SHA-256 of the
// public key. The placeholder is never presented to peers.

use rcgen::{CertificateParams, DnType, KeyPair};
use zeroize::Zeroizing;

use crate::coordinator::ActivationRequest;
use crate::error::BootstrapError;
use crate::quote::{report_data_for, QuoteIssuer};

pub struct Authenticator {
    key: KeyPair,
    public_key: Vec<u8>,
    placeholder: Vec<u8>,
    quote: Vec<u8>,
    common_name: String,
}

impl Authenticator {
    pub fn new(common_name: &str, issuer: &dyn QuoteIssuer) -> Result<Self, BootstrapError> {
        let key = KeyPair::generate()?;
        let public_key = key.public_key_der();

        let mut params = CertificateParams::default();
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        let placeholder = params.self_signed(&key)?.der().to_vec();

        let quote = issuer.issue(&report_data_for(&public_key))?;
        Ok(Self {
            key,
            public_key,
            placeholder,
            quote,
            common_name: common_name.to_string(),
        })
    }

    /// SubjectPublicKeyInfo DER.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn placeholder_certificate(&self) -> &[u8] {
        &self.placeholder
    }

    pub fn quote(&self) -> &[u8] {
        &self.quote
    }

    pub fn private_key_pem(&self) -> Zeroizing<String> {
        Zeroizing::new(self.key.serialize_pem())
    }

    pub fn request(&self, marble_type: &str, infrastructure: Option<&str>) -> ActivationRequest {
        ActivationRequest {
            marble_type: marble_type.to_string(),
            public_key: self.public_key.clone(),
            quote: self.quote.clone(),
            infrastructure: infrastructure.map(str::to_string),
            requested_common_name: Some(self.common_name.clone()),
        }
    }
}
