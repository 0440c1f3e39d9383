//! In-process secp256k1 signer.

use super::transaction::{RawTransaction, UnsignedTransaction};
use super::{MessageSignature, Signer, SignerError};
use crate::domain::{keccak256, Address};
use async_trait::async_trait;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use std::fmt;

/// Ledger address controlled by a public key: last 20 bytes of the Keccak-256
/// of the uncompressed point (without its prefix byte).
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::from_bytes(bytes)
}

/// Hash of a personal message with the standard signed-message prefix.
pub fn message_hash(message: &[u8]) -> [u8; 32] {
    let mut prefixed = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    prefixed.extend_from_slice(message);
    keccak256(&prefixed)
}

/// Recover the address that produced `signature` over `message`.
pub fn recover_message_signer(
    message: &[u8],
    signature: &MessageSignature,
) -> Result<Address, SignerError> {
    let bytes = signature.as_bytes();
    let sig = Signature::from_slice(&bytes[..64]).map_err(|e| SignerError::Malformed(e.to_string()))?;
    let recovery_id = bytes[64]
        .checked_sub(27)
        .and_then(RecoveryId::from_byte)
        .ok_or_else(|| SignerError::Malformed("invalid recovery byte".to_string()))?;
    let key = VerifyingKey::recover_from_prehash(&message_hash(message), &sig, recovery_id)
        .map_err(|e| SignerError::Malformed(e.to_string()))?;
    Ok(address_of(&key))
}

/// Holds a private key in memory. Key material never leaves this type; the
/// pipeline only sees the address and signatures.
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl LocalSigner {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignerError> {
        let key = SigningKey::from_slice(bytes).map_err(|_| SignerError::InvalidKey)?;
        let address = address_of(key.verifying_key());
        Ok(Self { key, address })
    }

    /// Accepts the key with or without a `0x` prefix.
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, SignerError> {
        let trimmed = hex_key.trim();
        let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = zeroize::Zeroizing::new(hex::decode(stripped).map_err(|_| SignerError::InvalidKey)?);
        Self::from_bytes(&bytes)
    }

    pub fn random() -> Self {
        let key = SigningKey::random(&mut rand::rngs::OsRng);
        let address = address_of(key.verifying_key());
        Self { key, address }
    }

    /// Raw key bytes, for exporting into an encrypted keystore.
    pub(crate) fn secret_bytes(&self) -> zeroize::Zeroizing<[u8; 32]> {
        let mut out = zeroize::Zeroizing::new([0u8; 32]);
        out.copy_from_slice(&self.key.to_bytes());
        out
    }

    fn sign_hash(&self, hash: &[u8; 32]) -> Result<(Signature, RecoveryId), SignerError> {
        self.key
            .sign_prehash_recoverable(hash)
            .map_err(|e| SignerError::Rejected(e.to_string()))
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_message(&self, message: &[u8]) -> Result<MessageSignature, SignerError> {
        let (signature, recovery_id) = self.sign_hash(&message_hash(message))?;
        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = recovery_id.to_byte() + 27;
        Ok(MessageSignature(bytes))
    }

    async fn sign_transaction(
        &self,
        transaction: &UnsignedTransaction,
    ) -> Result<RawTransaction, SignerError> {
        let (signature, recovery_id) = self.sign_hash(&transaction.signing_hash())?;
        transaction.encode_signed(&signature, recovery_id)
    }
}
