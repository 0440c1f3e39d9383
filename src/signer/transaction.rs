//! Replay-protected (EIP-155) legacy transaction encoding.

use super::local::address_of;
use super::SignerError;
use crate::domain::{keccak256, Address, TxHash, U256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use rlp::{Rlp, RlpStream};
use std::fmt;

/// Fully-formed transaction before signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    /// `None` creates a contract from `data`.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl UnsignedTransaction {
    fn append_common(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas_limit);
        match &self.to {
            Some(to) => stream.append(&to.as_bytes().to_vec()),
            None => stream.append_empty_data(),
        };
        stream.append(&self.value);
        stream.append(&self.data);
    }

    /// Hash the signer commits to: `keccak(rlp([.., chain_id, 0, 0]))`.
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut stream = RlpStream::new_list(9);
        self.append_common(&mut stream);
        stream.append(&self.chain_id);
        stream.append(&0u8);
        stream.append(&0u8);
        keccak256(&stream.out())
    }

    /// Attach an `(r, s, recovery id)` signature. Fails when the chain id is
    /// too large for `v = recovery id + 35 + 2 * chain_id` to fit 64 bits.
    pub fn encode_signed(
        &self,
        signature: &Signature,
        recovery_id: RecoveryId,
    ) -> Result<RawTransaction, SignerError> {
        let bytes = signature.to_bytes();
        let v = self
            .chain_id
            .checked_mul(2)
            .and_then(|v| v.checked_add(35 + u64::from(recovery_id.to_byte())))
            .ok_or_else(|| {
                SignerError::Rejected(format!(
                    "chain id {} does not fit replay protection",
                    self.chain_id
                ))
            })?;
        let mut stream = RlpStream::new_list(9);
        self.append_common(&mut stream);
        stream.append(&v);
        stream.append(&U256::from_big_endian(&bytes[..32]));
        stream.append(&U256::from_big_endian(&bytes[32..]));
        Ok(RawTransaction(stream.out().to_vec()))
    }
}

/// Signed transaction bytes as broadcast to the network.
#[derive(Clone, PartialEq, Eq)]
pub struct RawTransaction(pub Vec<u8>);

impl RawTransaction {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn hash(&self) -> TxHash {
        TxHash(keccak256(&self.0))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for RawTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawTransaction({})", self.hash())
    }
}

/// A raw transaction taken apart, with its sender recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    pub from: Address,
    pub hash: TxHash,
    pub unsigned: UnsignedTransaction,
}

pub fn decode_raw_transaction(raw: &RawTransaction) -> Result<DecodedTransaction, SignerError> {
    let rlp = Rlp::new(raw.as_bytes());
    let malformed = |e: rlp::DecoderError| SignerError::Malformed(e.to_string());
    if rlp.item_count().map_err(malformed)? != 9 {
        return Err(SignerError::Malformed(
            "expected a 9-item transaction list".to_string(),
        ));
    }
    let to_bytes: Vec<u8> = rlp.val_at(3).map_err(malformed)?;
    let to = if to_bytes.is_empty() {
        None
    } else {
        Some(Address::from_slice(&to_bytes).map_err(|e| SignerError::Malformed(e.to_string()))?)
    };
    let v: u64 = rlp.val_at(6).map_err(malformed)?;
    if v < 35 {
        return Err(SignerError::Malformed(format!(
            "transaction without replay protection (v = {})",
            v
        )));
    }
    let chain_id = (v - 35) / 2;
    let recovery_byte = ((v - 35) % 2) as u8;

    let unsigned = UnsignedTransaction {
        nonce: rlp.val_at(0).map_err(malformed)?,
        gas_price: rlp.val_at(1).map_err(malformed)?,
        gas_limit: rlp.val_at(2).map_err(malformed)?,
        to,
        value: rlp.val_at(4).map_err(malformed)?,
        data: rlp.val_at(5).map_err(malformed)?,
        chain_id,
    };

    let r: U256 = rlp.val_at(7).map_err(malformed)?;
    let s: U256 = rlp.val_at(8).map_err(malformed)?;
    let mut r_bytes = [0u8; 32];
    let mut s_bytes = [0u8; 32];
    r.to_big_endian(&mut r_bytes);
    s.to_big_endian(&mut s_bytes);
    let signature = Signature::from_scalars(r_bytes, s_bytes)
        .map_err(|e| SignerError::Malformed(e.to_string()))?;
    let recovery_id = RecoveryId::from_byte(recovery_byte)
        .ok_or_else(|| SignerError::Malformed("invalid recovery id".to_string()))?;
    let key = VerifyingKey::recover_from_prehash(&unsigned.signing_hash(), &signature, recovery_id)
        .map_err(|e| SignerError::Malformed(e.to_string()))?;

    Ok(DecodedTransaction {
        from: address_of(&key),
        hash: raw.hash(),
        unsigned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{LocalSigner, Signer};

    fn eip155_example() -> UnsignedTransaction {
        UnsignedTransaction {
            nonce: 9,
            gas_price: U256::from(20_000_000_000u64),
            gas_limit: 21000,
            to: Some(Address::from_bytes([0x35; 20])),
            value: U256::from(1_000_000_000_000_000_000u64),
            data: Vec::new(),
            chain_id: 1,
        }
    }

    #[test]
    fn test_signing_hash_matches_published_example() {
        assert_eq!(
            hex::encode(eip155_example().signing_hash()),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[tokio::test]
    async fn test_sign_then_recover_sender() {
        let signer = LocalSigner::from_private_key_hex(&"46".repeat(32)).unwrap();
        let tx = eip155_example();
        let raw = signer.sign_transaction(&tx).await.unwrap();
        let decoded = decode_raw_transaction(&raw).unwrap();
        assert_eq!(decoded.from, signer.address());
        assert_eq!(decoded.unsigned, tx);
        assert_eq!(decoded.hash, raw.hash());
    }

    #[tokio::test]
    async fn test_contract_creation_roundtrip() {
        let signer = LocalSigner::random();
        let tx = UnsignedTransaction {
            to: None,
            data: vec![0x60, 0x80, 0x60, 0x40],
            chain_id: 1337,
            ..eip155_example()
        };
        let raw = signer.sign_transaction(&tx).await.unwrap();
        let decoded = decode_raw_transaction(&raw).unwrap();
        assert_eq!(decoded.unsigned.to, None);
        assert_eq!(decoded.unsigned.chain_id, 1337);
        assert_eq!(decoded.from, signer.address());
    }

    #[tokio::test]
    async fn test_oversized_chain_id_is_rejected() {
        let signer = LocalSigner::random();
        let tx = UnsignedTransaction {
            chain_id: u64::MAX / 2,
            ..eip155_example()
        };
        let err = signer.sign_transaction(&tx).await.unwrap_err();
        assert!(matches!(err, SignerError::Rejected(_)));

        // Largest chain id whose v still fits.
        let tx = UnsignedTransaction {
            chain_id: (u64::MAX - 36) / 2,
            ..eip155_example()
        };
        let raw = signer.sign_transaction(&tx).await.unwrap();
        assert_eq!(decode_raw_transaction(&raw).unwrap().from, signer.address());
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = decode_raw_transaction(&RawTransaction(vec![0xc0])).unwrap_err();
        assert!(matches!(err, SignerError::Malformed(_)));
    }
}
