// coordinator — Admission engine, activation accounting and certificate authority

pub mod ca;
pub mod counter;
pub mod engine;

pub use self::ca::{CertificateAuthority, IssuedCertificate};
pub use self::engine::{Activation, ActivationRequest, Core, CoreState};

#[cfg(test)]
mod tests;
