// engine.rs — Admission engine
//
// Lifecycle: Uninitialized → (set_manifest, once) → Serving → Shutdown.
//
// The manifest snapshot and its activation counters are published together
// through a `OnceLock`, so every activation sees either no manifest or the
// complete one. Per activation:
//
//   resolve marble/package/infrastructure → reserve slot → validate quote →
//   issue certificate → commit slot
//
// A failure after the reservation drops it, which releases the slot.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use tracing::{debug, info, warn};

use crate::coordinator::ca::{CertificateAuthority, IssuedCertificate};
use crate::coordinator::counter::ActivationCounters;
use crate::error::{AdmissionError, ManifestError, QuoteError};
use crate::manifest::{canonical, Infrastructure, Manifest, Package, Parameters};
use crate::quote::{report_data_for, QuoteValidator};

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreState {
    Uninitialized,
    Serving,
    Shutdown,
}

impl fmt::Display for CoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "UNINITIALIZED"),
            Self::Serving => write!(f, "SERVING"),
            Self::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}

/// One marble's request to join the mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRequest {
    pub marble_type: String,
    /// SubjectPublicKeyInfo DER of the key generated inside the enclave.
    pub public_key: Vec<u8>,
    pub quote: Vec<u8>,
    /// Infrastructure to validate against; all are tried when absent.
    pub infrastructure: Option<String>,
    /// Name the marble would like. Never used as the certificate subject.
    pub requested_common_name: Option<String>,
}

/// What an admitted marble receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub certificate: IssuedCertificate,
    pub root_certificate: Vec<u8>,
    pub parameters: Parameters,
}

struct Snapshot {
    manifest: Manifest,
    fingerprint: String,
    counters: ActivationCounters,
}

pub struct Core {
    ca: CertificateAuthority,
    validator: Box<dyn QuoteValidator>,
    snapshot: OnceLock<Snapshot>,
    shut_down: AtomicBool,
}

impl Core {
    pub fn new(ca: CertificateAuthority, validator: impl QuoteValidator + 'static) -> Self {
        Self {
            ca,
            validator: Box::new(validator),
            snapshot: OnceLock::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> CoreState {
        if self.shut_down.load(Ordering::Acquire) {
            CoreState::Shutdown
        } else if self.snapshot.get().is_some() {
            CoreState::Serving
        } else {
            CoreState::Uninitialized
        }
    }

    /// Stop accepting activations. Calls already past the state check finish.
    pub fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::AcqRel) {
            info!("coordinator shutting down");
        }
    }

    /// Accept the manifest. Succeeds at most once per engine; returns the
    /// manifest fingerprint.
    pub fn set_manifest(&self, raw: &[u8]) -> Result<String, AdmissionError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(AdmissionError::Unavailable);
        }
        if self.snapshot.get().is_some() {
            return Err(AdmissionError::ManifestAlreadySet);
        }

        let manifest = Manifest::from_json(raw).map_err(|e| {
            warn!(error = %e, "manifest rejected");
            AdmissionError::MalformedManifest(e)
        })?;
        let fingerprint = canonical::fingerprint(&manifest)
            .map_err(|e| AdmissionError::MalformedManifest(ManifestError::Json(e.to_string())))?;
        let counters = ActivationCounters::new(manifest.marbles.keys());

        let marbles = manifest.marbles.len();
        let packages = manifest.packages.len();
        let infrastructures = manifest.infrastructures.len();
        self.snapshot
            .set(Snapshot {
                manifest,
                fingerprint: fingerprint.clone(),
                counters,
            })
            .map_err(|_| AdmissionError::ManifestAlreadySet)?;

        info!(
            fingerprint = %fingerprint,
            marbles,
            packages,
            infrastructures,
            "manifest set"
        );
        Ok(fingerprint)
    }

    /// Validate a marble's quote and, if it is admitted, issue its identity.
    pub fn activate(&self, req: &ActivationRequest) -> Result<Activation, AdmissionError> {
        let result = self.try_activate(req);
        if let Err(ref e) = result {
            warn!(
                marble_type = %req.marble_type,
                kind = %e.kind(),
                error = %e,
                "activation refused"
            );
        }
        result
    }

    fn try_activate(&self, req: &ActivationRequest) -> Result<Activation, AdmissionError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(AdmissionError::Unavailable);
        }
        let snap = self.snapshot.get().ok_or(AdmissionError::ManifestNotSet)?;

        let spec = snap
            .manifest
            .marbles
            .get(&req.marble_type)
            .ok_or_else(|| AdmissionError::UnknownMarbleType(req.marble_type.clone()))?;
        let package = snap
            .manifest
            .package_for(spec)
            .ok_or_else(|| AdmissionError::UnknownPackage(spec.package.clone()))?;
        let candidates: Vec<(&str, &Infrastructure)> = match &req.infrastructure {
            Some(name) => {
                let infra = snap
                    .manifest
                    .infrastructures
                    .get(name)
                    .ok_or_else(|| AdmissionError::UnknownInfrastructure(name.clone()))?;
                vec![(name.as_str(), infra)]
            }
            None => snap
                .manifest
                .infrastructures
                .iter()
                .map(|(name, infra)| (name.as_str(), infra))
                .collect(),
        };
        let counter = snap
            .counters
            .get(&req.marble_type)
            .ok_or_else(|| AdmissionError::UnknownMarbleType(req.marble_type.clone()))?;

        let reservation = counter
            .try_reserve(spec.activation_limit())
            .ok_or_else(|| AdmissionError::ActivationLimitExceeded(req.marble_type.clone()))?;

        let report_data = report_data_for(&req.public_key);
        let infrastructure = self
            .validate(&req.quote, &report_data, package, &candidates)
            .map_err(AdmissionError::QuoteInvalid)?;

        let requested = req
            .requested_common_name
            .as_deref()
            .unwrap_or(req.marble_type.as_str());
        let certificate = self
            .ca
            .issue(&req.public_key, requested)
            .map_err(AdmissionError::InternalCertIssuanceFailure)?;

        let activations = reservation.commit();
        info!(
            marble_type = %req.marble_type,
            infrastructure,
            common_name = %certificate.common_name,
            activations,
            "marble activated"
        );

        Ok(Activation {
            certificate,
            root_certificate: self.ca.root_der(),
            parameters: spec.parameters.clone(),
        })
    }

    /// Returns the name of the first infrastructure whose validation passes.
    fn validate<'a>(
        &self,
        quote: &[u8],
        report_data: &[u8],
        package: &Package,
        candidates: &[(&'a str, &Infrastructure)],
    ) -> Result<&'a str, QuoteError> {
        match candidates {
            [] => Err(QuoteError::NoInfrastructure),
            [(name, infra)] => self
                .validator
                .validate(quote, report_data, package, infra)
                .map(|()| *name),
            _ => {
                for (name, infra) in candidates {
                    match self.validator.validate(quote, report_data, package, infra) {
                        Ok(()) => return Ok(*name),
                        Err(e) => debug!(infrastructure = *name, error = %e, "quote not accepted"),
                    }
                }
                Err(QuoteError::NoInfrastructure)
            }
        }
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.snapshot.get().map(|s| &s.manifest)
    }

    pub fn manifest_fingerprint(&self) -> Option<&str> {
        self.snapshot.get().map(|s| s.fingerprint.as_str())
    }

    /// Successful activations of `marble_type` so far.
    pub fn activation_count(&self, marble_type: &str) -> Option<u64> {
        self.snapshot
            .get()?
            .counters
            .get(marble_type)
            .map(|c| c.committed())
    }

    pub fn root_certificate_der(&self) -> Vec<u8> {
        self.ca.root_der()
    }

    pub fn root_certificate_pem(&self) -> String {
        self.ca.root_pem()
    }
}
