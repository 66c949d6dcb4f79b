// test_support.rs — Shared fixtures for unit tests
//
// Two simulated platforms ("Azure", "Alibaba") and a manifest declaring a
// unique-identity backend with a single-use type, an unlimited backend type
// and a signer-identity frontend.

use chrono::Duration;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rcgen::KeyPair;
use serde_json::json;

use crate::coordinator::{ActivationRequest, CertificateAuthority, Core};
use crate::manifest::Manifest;
use crate::quote::policy::EnclaveIdentity;
use crate::quote::simulated::{identity_for, SimulatedIssuer, SimulatedValidator};
use crate::quote::{report_data_for, QuoteIssuer};

pub const ORG: &str = "Edgeless Test";
pub const BACKEND_ID: [u8; 32] = [0x11; 32];
pub const FRONTEND_SIGNER: [u8; 32] = [0x22; 32];

pub struct Platform {
    pub name: &'static str,
    pub key: SigningKey,
}

pub struct Fixture {
    pub platforms: Vec<Platform>,
    pub manifest_json: Vec<u8>,
}

impl Fixture {
    pub fn new() -> Self {
        let platforms = vec![
            Platform {
                name: "Alibaba",
                key: SigningKey::generate(&mut OsRng),
            },
            Platform {
                name: "Azure",
                key: SigningKey::generate(&mut OsRng),
            },
        ];
        let root = |i: usize| platforms[i].key.verifying_key().to_bytes().to_vec();
        let (alibaba_cpu, azure_cpu) = ([1u8; 16], [2u8; 16]);

        let manifest_json = serde_json::to_vec(&json!({
            "Packages": {
                "backend": { "UniqueID": BACKEND_ID, "Debug": false },
                "frontend": {
                    "SignerID": FRONTEND_SIGNER,
                    "ProductID": 44,
                    "SecurityVersion": 3,
                    "Debug": true
                }
            },
            "Infrastructures": {
                "Alibaba": { "QESVN": 2, "PCESVN": 3, "CPUSVN": alibaba_cpu, "RootCA": root(0) },
                "Azure": { "QESVN": 4, "PCESVN": 4, "CPUSVN": azure_cpu, "RootCA": root(1) }
            },
            "Marbles": {
                "backend_first": {
                    "Package": "backend",
                    "MaxActivations": 1,
                    "Parameters": {
                        "Files": { "/abc/defg.txt": [7, 7, 7], "/ghi/jkl.mno": [0, 1, 2] },
                        "Env": { "IS_FIRST": "true" },
                        "Argv": ["--first", "serve"]
                    }
                },
                "backend_other": { "Package": "backend" },
                "frontend": {
                    "Package": "frontend",
                    "Parameters": { "Env": { "ROLE": "frontend" } }
                }
            },
            "Clients": { "owner": [9, 9, 9] }
        }))
        .unwrap();

        Self {
            platforms,
            manifest_json,
        }
    }

    pub fn manifest(&self) -> Manifest {
        Manifest::from_json(&self.manifest_json).unwrap()
    }

    pub fn platform(&self, name: &str) -> &Platform {
        self.platforms.iter().find(|p| p.name == name).unwrap()
    }

    /// Identity meeting `marble_type`'s package on `infra` at the minimums.
    pub fn identity(&self, marble_type: &str, infra: &str) -> EnclaveIdentity {
        let manifest = self.manifest();
        let spec = &manifest.marbles[marble_type];
        let package = manifest.package_for(spec).unwrap();
        identity_for(package, &manifest.infrastructures[infra])
    }

    pub fn issuer(&self, identity: EnclaveIdentity, infra: &str) -> SimulatedIssuer {
        SimulatedIssuer::new(self.platform(infra).key.clone(), identity)
    }

    /// Engine with the fixture manifest already set.
    pub fn core(&self) -> Core {
        let core = Core::new(
            CertificateAuthority::generate(ORG, Duration::hours(1)).unwrap(),
            SimulatedValidator,
        );
        core.set_manifest(&self.manifest_json).unwrap();
        core
    }

    /// A fresh key and a quote for it, issued on `infra` with the minimum
    /// identity for `marble_type`.
    pub fn request(&self, marble_type: &str, infra: &str) -> (KeyPair, ActivationRequest) {
        let identity = self.identity(marble_type, infra);
        self.request_with(marble_type, infra, identity)
    }

    pub fn request_with(
        &self,
        marble_type: &str,
        infra: &str,
        identity: EnclaveIdentity,
    ) -> (KeyPair, ActivationRequest) {
        let key = KeyPair::generate().unwrap();
        let public_key = key.public_key_der();
        let quote = self
            .issuer(identity, infra)
            .issue(&report_data_for(&public_key))
            .unwrap();
        let req = ActivationRequest {
            marble_type: marble_type.to_string(),
            public_key,
            quote,
            infrastructure: Some(infra.to_string()),
            requested_common_name: None,
        };
        (key, req)
    }
}
