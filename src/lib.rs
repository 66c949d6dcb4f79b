// marblemesh — Attestation-gated admission for confidential workload meshes
//
// The coordinator accepts one manifest, then admits marbles whose quotes
// match it, issuing each a certificate for the key it generated inside the
// enclave. Marbles run `marble::pre_main` before their own entry point.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod hash;
pub mod logging;
pub mod manifest;
pub mod marble;
pub mod quote;
pub mod service;
pub mod sign;

#[cfg(test)]
pub(crate) mod test_support;
