// sign.rs — Ed25519 keys for the simulated attestation platform
//
// The simulated platform signs its reports with an Ed25519 key whose public
// half is what an infrastructure lists as `RootCA`. Secret keys travel as
// base64 seeds, the same way an operator would inject them through the
// environment.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroizing;

use crate::error::QuoteError;

/// Environment variable holding the simulated platform seed (base64).
pub const PLATFORM_KEY_ENV: &str = "EDG_PLATFORM_KEY_B64";

/// Generate a new Ed25519 platform key. Returns (seed_b64, public_key_bytes).
pub fn keygen() -> (Zeroizing<String>, [u8; 32]) {
    let mut csprng = rand::rngs::OsRng;
    let signing_key = SigningKey::generate(&mut csprng);
    let seed = Zeroizing::new(B64.encode(signing_key.to_bytes()));
    (seed, signing_key.verifying_key().to_bytes())
}

/// Decode a base64 Ed25519 seed into a signing key.
pub fn signing_key_from_b64(seed_b64: &str) -> Result<SigningKey, QuoteError> {
    let bytes = Zeroizing::new(
        B64.decode(seed_b64.trim())
            .map_err(|e| QuoteError::Key(format!("decoding platform key base64: {}", e)))?,
    );
    let seed: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| QuoteError::Key("platform key must be 32 bytes".to_string()))?;
    Ok(SigningKey::from_bytes(&seed))
}

/// Load the platform key from the environment, if one is set.
pub fn load_platform_key() -> Result<Option<SigningKey>, QuoteError> {
    match std::env::var(PLATFORM_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => signing_key_from_b64(&key).map(Some),
        _ => Ok(None),
    }
}

/// Sign data with a platform key.
pub fn sign(key: &SigningKey, data: &[u8]) -> [u8; 64] {
    key.sign(data).to_bytes()
}

/// Verify an Ed25519 signature against raw public key material.
///
/// `public_key` is whatever the manifest carries as `RootCA`; anything that
/// is not a 32-byte valid Ed25519 point fails verification.
pub fn verify(public_key: &[u8], data: &[u8], signature: &[u8]) -> Result<(), QuoteError> {
    let pk: [u8; 32] = public_key
        .try_into()
        .map_err(|_| QuoteError::Key("root of trust must be a 32-byte Ed25519 key".to_string()))?;
    let verifying_key = VerifyingKey::from_bytes(&pk)
        .map_err(|e| QuoteError::Key(format!("invalid Ed25519 root of trust: {}", e)))?;
    let sig: [u8; 64] = signature
        .try_into()
        .map_err(|_| QuoteError::Signature)?;
    verifying_key
        .verify(data, &Signature::from_bytes(&sig))
        .map_err(|_| QuoteError::Signature)
}
