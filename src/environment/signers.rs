//! Attaching a signing identity to an Environment.
//!
//! There is one composition path: a keystore is decrypted to a private key,
//! a private key becomes a [`LocalSigner`], and the signer is layered onto a
//! copy of the Environment with [`Environment::with_signer`].

use super::Environment;
use crate::error::PipelineError;
use crate::signer::{Keystore, LocalSigner, Signer};
use std::sync::Arc;
use tracing::debug;

pub fn with_private_key_signer(
    env: &Environment,
    private_key: &str,
) -> Result<Environment, PipelineError> {
    let signer = LocalSigner::from_private_key_hex(private_key)
        .map_err(|e| PipelineError::Signing(e.to_string()))?;
    debug!("Attaching signer {}", signer.address());
    Ok(env.with_signer(Arc::new(signer)))
}

pub fn with_keystore_signer(
    env: &Environment,
    keystore: &Keystore,
    password: &str,
) -> Result<Environment, PipelineError> {
    let key = keystore.decrypt(password)?;
    let hex_key = zeroize::Zeroizing::new(hex::encode(key.as_slice()));
    with_private_key_signer(env, &hex_key)
}

/// Environment signing with a freshly generated key, for simulating
/// independent participants.
pub fn with_new_account(env: &Environment) -> Environment {
    env.with_signer(Arc::new(LocalSigner::random()))
}
