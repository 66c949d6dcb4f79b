use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Duration;
use x509_parser::prelude::{FromDer, X509Certificate};

use super::*;
use crate::error::{AdmissionError, ErrorKind, QuoteError, QuoteMismatch};
use crate::quote::simulated::SimulatedValidator;
use crate::quote::{report_data_for, QuoteIssuer};
use crate::test_support::{Fixture, BACKEND_ID, ORG};

fn kind_of(result: Result<Activation, AdmissionError>) -> ErrorKind {
    match result {
        Ok(_) => panic!("activation unexpectedly succeeded"),
        Err(e) => e.kind(),
    }
}

fn fresh_core() -> Core {
    Core::new(
        CertificateAuthority::generate(ORG, Duration::hours(1)).unwrap(),
        SimulatedValidator,
    )
}

#[test]
fn lifecycle_states() {
    let fx = Fixture::new();
    let core = fresh_core();
    assert_eq!(core.state(), CoreState::Uninitialized);
    assert!(core.manifest().is_none());

    core.set_manifest(&fx.manifest_json).unwrap();
    assert_eq!(core.state(), CoreState::Serving);

    core.shutdown();
    assert_eq!(core.state(), CoreState::Shutdown);
    assert_eq!(core.state().to_string(), "SHUTDOWN");
}

#[test]
fn activate_before_manifest_fails() {
    let fx = Fixture::new();
    let (_, req) = fx.request("frontend", "Azure");
    assert_eq!(kind_of(fresh_core().activate(&req)), ErrorKind::ManifestNotSet);
}

#[test]
fn second_manifest_is_rejected_and_first_stays() {
    let fx = Fixture::new();
    let core = fx.core();
    let fingerprint = core.manifest_fingerprint().unwrap().to_string();

    let other = Fixture::new();
    let err = core.set_manifest(&other.manifest_json).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ManifestAlreadySet);
    assert_eq!(core.manifest_fingerprint(), Some(fingerprint.as_str()));

    // Quotes from the first fixture's platforms still verify.
    let (_, req) = fx.request("frontend", "Azure");
    core.activate(&req).unwrap();
}

#[test]
fn malformed_manifest_leaves_engine_uninitialized() {
    let core = fresh_core();
    let err = core
        .set_manifest(br#"{"Packages":{},"Marbles":{"m":{"Package":"ghost"}}}"#)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedManifest);
    assert_eq!(core.state(), CoreState::Uninitialized);

    let fx = Fixture::new();
    core.set_manifest(&fx.manifest_json).unwrap();
    assert_eq!(core.state(), CoreState::Serving);
}

#[test]
fn unknown_marble_type_and_infrastructure() {
    let fx = Fixture::new();
    let core = fx.core();

    let (_, mut req) = fx.request("frontend", "Azure");
    req.marble_type = "database".into();
    assert_eq!(kind_of(core.activate(&req)), ErrorKind::UnknownMarbleType);

    let (_, mut req) = fx.request("frontend", "Azure");
    req.infrastructure = Some("OnPrem".into());
    assert_eq!(kind_of(core.activate(&req)), ErrorKind::UnknownInfrastructure);
}

#[test]
fn single_use_marble_activates_once() {
    let fx = Fixture::new();
    let core = fx.core();

    let (_, first) = fx.request("backend_first", "Azure");
    core.activate(&first).unwrap();

    let (_, second) = fx.request("backend_first", "Alibaba");
    assert_eq!(
        kind_of(core.activate(&second)),
        ErrorKind::ActivationLimitExceeded
    );
    assert_eq!(core.activation_count("backend_first"), Some(1));

    // Other types are unaffected.
    let (_, other) = fx.request("backend_other", "Azure");
    core.activate(&other).unwrap();
}

#[test]
fn concurrent_attempts_on_single_use_marble_admit_one() {
    let fx = Fixture::new();
    let core = fx.core();
    let requests: Vec<_> = (0..16)
        .map(|i| {
            let infra = if i % 2 == 0 { "Azure" } else { "Alibaba" };
            fx.request("backend_first", infra).1
        })
        .collect();

    let admitted = AtomicUsize::new(0);
    let limited = AtomicUsize::new(0);
    let (core, admitted, limited) = (&core, &admitted, &limited);
    std::thread::scope(|s| {
        for req in &requests {
            s.spawn(move || match core.activate(req) {
                Ok(_) => {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
                Err(AdmissionError::ActivationLimitExceeded(_)) => {
                    limited.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => panic!("unexpected error: {e}"),
            });
        }
    });

    assert_eq!(admitted.load(Ordering::SeqCst), 1);
    assert_eq!(limited.load(Ordering::SeqCst), 15);
    assert_eq!(core.activation_count("backend_first"), Some(1));
}

#[test]
fn unlimited_marble_admits_all_concurrent_attempts() {
    let fx = Fixture::new();
    let core = fx.core();
    let requests: Vec<_> = (0..12)
        .map(|i| {
            let infra = if i % 2 == 0 { "Azure" } else { "Alibaba" };
            fx.request("frontend", infra).1
        })
        .collect();

    let engine = &core;
    std::thread::scope(|s| {
        let handles: Vec<_> = requests
            .iter()
            .map(|req| s.spawn(move || engine.activate(req)))
            .collect();
        for h in handles {
            h.join().unwrap().unwrap();
        }
    });
    assert_eq!(core.activation_count("frontend"), Some(12));
}

#[test]
fn rejected_quote_releases_the_slot() {
    let fx = Fixture::new();
    let core = fx.core();

    let mut identity = fx.identity("backend_first", "Azure");
    identity.unique_id[0] ^= 0xff;
    let (_, forged) = fx.request_with("backend_first", "Azure", identity);
    let err = core.activate(&forged).unwrap_err();
    assert!(matches!(
        err,
        AdmissionError::QuoteInvalid(QuoteError::Mismatch(QuoteMismatch::UniqueId))
    ));
    assert_eq!(core.activation_count("backend_first"), Some(0));

    let (_, genuine) = fx.request("backend_first", "Azure");
    core.activate(&genuine).unwrap();
    assert_eq!(core.activation_count("backend_first"), Some(1));
}

#[test]
fn failed_issuance_releases_the_slot() {
    let fx = Fixture::new();
    let core = fx.core();

    // A genuine quote over bytes that are not SubjectPublicKeyInfo DER.
    let not_a_key = b"not a subject public key".to_vec();
    let quote = fx
        .issuer(fx.identity("backend_first", "Azure"), "Azure")
        .issue(&report_data_for(&not_a_key))
        .unwrap();
    let req = ActivationRequest {
        marble_type: "backend_first".into(),
        public_key: not_a_key,
        quote,
        infrastructure: Some("Azure".into()),
        requested_common_name: None,
    };
    assert_eq!(
        kind_of(core.activate(&req)),
        ErrorKind::InternalCertIssuanceFailure
    );
    assert_eq!(core.activation_count("backend_first"), Some(0));

    let (_, genuine) = fx.request("backend_first", "Azure");
    core.activate(&genuine).unwrap();
    assert_eq!(core.activation_count("backend_first"), Some(1));
}

#[test]
fn security_version_minimum_is_inclusive() {
    let fx = Fixture::new();
    let core = fx.core();

    let at_minimum = fx.identity("frontend", "Alibaba");
    assert_eq!(at_minimum.security_version, 3);
    let (_, req) = fx.request_with("frontend", "Alibaba", at_minimum.clone());
    core.activate(&req).unwrap();

    let mut below = at_minimum;
    below.security_version = 2;
    let (_, req) = fx.request_with("frontend", "Alibaba", below);
    assert_eq!(kind_of(core.activate(&req)), ErrorKind::QuoteInvalid);
}

#[test]
fn one_low_cpu_svn_byte_is_rejected() {
    let fx = Fixture::new();
    let core = fx.core();

    let mut identity = fx.identity("frontend", "Azure");
    identity.cpu_svn = [9; 16];
    identity.cpu_svn[7] = 1;
    let (_, req) = fx.request_with("frontend", "Azure", identity);
    let err = core.activate(&req).unwrap_err();
    assert!(matches!(
        err,
        AdmissionError::QuoteInvalid(QuoteError::Mismatch(QuoteMismatch::CpuSvn { index: 7, .. }))
    ));
}

#[test]
fn debug_reports_follow_package_flag() {
    let fx = Fixture::new();
    let core = fx.core();

    let mut identity = fx.identity("frontend", "Azure");
    identity.debug = true;
    let (_, req) = fx.request_with("frontend", "Azure", identity);
    core.activate(&req).unwrap();

    let mut identity = fx.identity("backend_other", "Azure");
    identity.debug = true;
    let (_, req) = fx.request_with("backend_other", "Azure", identity);
    assert_eq!(kind_of(core.activate(&req)), ErrorKind::QuoteInvalid);
}

#[test]
fn parameters_are_returned_verbatim() {
    let fx = Fixture::new();
    let core = fx.core();
    let (_, req) = fx.request("backend_first", "Azure");

    let activation = core.activate(&req).unwrap();
    let declared = &fx.manifest().marbles["backend_first"].parameters;
    assert_eq!(&activation.parameters, declared);
    assert_eq!(activation.parameters.files["/abc/defg.txt"], vec![7, 7, 7]);
    assert_eq!(activation.parameters.argv, vec!["--first", "serve"]);
}

#[test]
fn certificate_binds_the_presented_key() {
    let fx = Fixture::new();
    let core = fx.core();
    let (_, mut req) = fx.request("frontend", "Azure");
    req.requested_common_name = Some("admin".into());

    let activation = core.activate(&req).unwrap();
    let (_, cert) = X509Certificate::from_der(&activation.certificate.der).unwrap();
    assert_eq!(cert.public_key().raw, req.public_key.as_slice());
    assert_ne!(activation.certificate.common_name, "admin");
    assert_eq!(activation.root_certificate, core.root_certificate_der());

    let (_, root) = X509Certificate::from_der(&activation.root_certificate).unwrap();
    cert.verify_signature(Some(root.public_key())).unwrap();
}

#[test]
fn quote_for_another_key_is_rejected() {
    let fx = Fixture::new();
    let core = fx.core();
    let (_, honest) = fx.request("frontend", "Azure");
    let (_, other) = fx.request("frontend", "Azure");

    let swapped = ActivationRequest {
        public_key: other.public_key,
        ..honest
    };
    let err = core.activate(&swapped).unwrap_err();
    assert!(matches!(
        err,
        AdmissionError::QuoteInvalid(QuoteError::Mismatch(QuoteMismatch::ReportData))
    ));
    assert_eq!(core.activation_count("frontend"), Some(0));
}

#[test]
fn without_hint_every_infrastructure_is_tried() {
    let fx = Fixture::new();
    let core = fx.core();

    let (_, mut req) = fx.request("frontend", "Azure");
    req.infrastructure = None;
    core.activate(&req).unwrap();

    // A quote signed by a platform the manifest does not list.
    let stranger = Fixture::new();
    let (_, mut req) = stranger.request("frontend", "Azure");
    req.infrastructure = None;
    let err = core.activate(&req).unwrap_err();
    assert!(matches!(
        err,
        AdmissionError::QuoteInvalid(QuoteError::NoInfrastructure)
    ));
    assert_eq!(core.activation_count("frontend"), Some(1));
}

#[test]
fn shutdown_refuses_new_work() {
    let fx = Fixture::new();
    let core = fx.core();
    core.shutdown();

    let (_, req) = fx.request("frontend", "Azure");
    assert_eq!(kind_of(core.activate(&req)), ErrorKind::Unavailable);

    let idle = fresh_core();
    idle.shutdown();
    let err = idle.set_manifest(&fx.manifest_json).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
}

#[test]
fn unique_identity_package_uses_declared_measurement() {
    let fx = Fixture::new();
    assert_eq!(fx.identity("backend_first", "Azure").unique_id, BACKEND_ID);
}
