// premain.rs — Activation before the workload's entry point
//
// Single attempt: any failure is returned to the caller, which must not start
// the workload. The returned certificate is accepted only if it carries our
// own public key and verifies against the root the coordinator sent with it.

use std::time::Duration;

use tracing::info;
use x509_parser::prelude::{FromDer, X509Certificate};
use zeroize::Zeroizing;

use crate::config::MarbleEnv;
use crate::error::BootstrapError;
use crate::manifest::Parameters;
use crate::marble::authenticator::Authenticator;
use crate::service::{client, ActivationGrant, ActivationReply};

pub const ACTIVATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything the workload needs once admitted.
pub struct MarbleIdentity {
    pub common_name: String,
    pub certificate_der: Vec<u8>,
    pub root_ca_der: Vec<u8>,
    pub private_key_pem: Zeroizing<String>,
    pub parameters: Parameters,
}

impl std::fmt::Debug for MarbleIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarbleIdentity")
            .field("common_name", &self.common_name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl MarbleIdentity {
    pub fn certificate_pem(&self) -> String {
        to_pem(&self.certificate_der)
    }

    pub fn root_ca_pem(&self) -> String {
        to_pem(&self.root_ca_der)
    }
}

fn to_pem(der: &[u8]) -> String {
    let config = pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF);
    pem::encode_config(&pem::Pem::new("CERTIFICATE", der.to_vec()), config)
}

/// Activate with the coordinator named in `env`.
pub fn pre_main(auth: &Authenticator, env: &MarbleEnv) -> Result<MarbleIdentity, BootstrapError> {
    let request = auth.request(&env.marble_type, env.infrastructure.as_deref());
    let reply = client::activate(env.coordinator_addr.as_str(), &request, ACTIVATION_TIMEOUT)?;
    accept(auth, reply)
}

/// Turn the coordinator's reply into an identity, or the reason there is none.
pub fn accept(
    auth: &Authenticator,
    reply: ActivationReply,
) -> Result<MarbleIdentity, BootstrapError> {
    let grant = match reply {
        ActivationReply::Granted(grant) => grant,
        ActivationReply::Refused { kind, message } => {
            return Err(BootstrapError::Refused { kind, message })
        }
    };
    check_binding(&grant, auth.public_key())?;

    info!(common_name = %grant.common_name, "marble activated");
    Ok(MarbleIdentity {
        common_name: grant.common_name,
        certificate_der: grant.certificate,
        root_ca_der: grant.root_ca,
        private_key_pem: auth.private_key_pem(),
        parameters: grant.parameters,
    })
}

fn check_binding(grant: &ActivationGrant, public_key: &[u8]) -> Result<(), BootstrapError> {
    let mismatch = |what: String| BootstrapError::CertificateMismatch(what);

    let (_, cert) = X509Certificate::from_der(&grant.certificate)
        .map_err(|e| mismatch(format!("certificate does not parse: {}", e)))?;
    let (_, root) = X509Certificate::from_der(&grant.root_ca)
        .map_err(|e| mismatch(format!("root does not parse: {}", e)))?;

    if cert.public_key().raw != public_key {
        return Err(mismatch("certificate is for a different key".into()));
    }
    if cert.issuer().as_raw() != root.subject().as_raw() {
        return Err(mismatch("certificate issuer is not the returned root".into()));
    }
    cert.verify_signature(Some(root.public_key()))
        .map_err(|e| mismatch(format!("signature does not verify: {}", e)))?;
    Ok(())
}
