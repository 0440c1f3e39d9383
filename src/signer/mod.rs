//! Signing capability: the only component that touches key material.

use crate::domain::Address;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod keystore;
pub mod local;
pub mod transaction;

pub use keystore::{Kdf, Keystore};
pub use local::{recover_message_signer, LocalSigner};
pub use transaction::{decode_raw_transaction, DecodedTransaction, RawTransaction, UnsignedTransaction};

/// Signing identity attached to an environment.
///
/// The pipeline asks for signatures and never sees the key. Hardware wallets,
/// remote signers and in-memory keys all sit behind this trait.
#[async_trait]
pub trait Signer: Send + Sync + fmt::Debug {
    fn address(&self) -> Address;

    /// Sign an arbitrary message using the personal-message prefix.
    async fn sign_message(&self, message: &[u8]) -> Result<MessageSignature, SignerError>;

    /// Produce the raw signed transaction ready for broadcast.
    async fn sign_transaction(
        &self,
        transaction: &UnsignedTransaction,
    ) -> Result<RawTransaction, SignerError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("invalid private key")]
    InvalidKey,
    #[error("signer rejected the request: {0}")]
    Rejected(String),
    #[error("malformed signed payload: {0}")]
    Malformed(String),
}

/// 65-byte `r || s || v` message signature (`v` is 27 or 28).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MessageSignature(pub [u8; 65]);

impl MessageSignature {
    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }
}

impl fmt::Display for MessageSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for MessageSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageSignature({})", self)
    }
}
