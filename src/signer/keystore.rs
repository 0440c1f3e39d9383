//! Encrypted key files (Web3 Secret Storage, version 3).
//!
//! Supported: `aes-128-ctr` with `scrypt` or `pbkdf2` (`hmac-sha256`). The MAC
//! is `keccak256(derived[16..32] || ciphertext)` and is checked before the
//! ciphertext is touched.

use super::local::LocalSigner;
use crate::domain::keccak256;
use crate::error::PipelineError;
use aes::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

const DERIVED_KEY_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keystore {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(alias = "Crypto")]
    pub crypto: KeystoreCrypto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoreCrypto {
    pub cipher: String,
    pub cipherparams: CipherParams,
    pub ciphertext: String,
    pub kdf: String,
    pub kdfparams: KdfParams,
    pub mac: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherParams {
    pub iv: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KdfParams {
    pub dklen: usize,
    pub salt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prf: Option<String>,
}

/// Key derivation used when writing a new keystore.
#[derive(Debug, Clone, Copy)]
pub enum Kdf {
    Scrypt { log_n: u8, r: u32, p: u32 },
    Pbkdf2 { iterations: u32 },
}

impl Keystore {
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(json).map_err(|e| keystore_error(format!("invalid keystore: {}", e)))
    }

    /// Decrypt the private key. A wrong password surfaces as a MAC mismatch.
    pub fn decrypt(&self, password: &str) -> Result<Zeroizing<Vec<u8>>, PipelineError> {
        let crypto = &self.crypto;
        if crypto.cipher != "aes-128-ctr" {
            return Err(keystore_error(format!("unsupported cipher {}", crypto.cipher)));
        }
        let ciphertext = decode_hex("ciphertext", &crypto.ciphertext)?;
        let iv = decode_hex("iv", &crypto.cipherparams.iv)?;
        let mac = decode_hex("mac", &crypto.mac)?;

        let derived = derive_key(&crypto.kdf, &crypto.kdfparams, password)?;

        let mut mac_input = derived[16..32].to_vec();
        mac_input.extend_from_slice(&ciphertext);
        let expected = keccak256(&mac_input);
        if !bool::from(expected.as_slice().ct_eq(mac.as_slice())) {
            return Err(keystore_error("MAC mismatch (wrong password?)"));
        }

        let mut plaintext = Zeroizing::new(ciphertext);
        let mut cipher = Aes128Ctr::new_from_slices(&derived[..16], &iv)
            .map_err(|e| keystore_error(format!("invalid cipher parameters: {}", e)))?;
        cipher.apply_keystream(&mut plaintext);
        Ok(plaintext)
    }

    pub fn decrypt_signer(&self, password: &str) -> Result<LocalSigner, PipelineError> {
        let key = self.decrypt(password)?;
        LocalSigner::from_bytes(&key).map_err(|e| keystore_error(e.to_string()))
    }

    /// Encrypt `signer`'s key under `password`.
    pub fn encrypt(signer: &LocalSigner, password: &str, kdf: Kdf) -> Result<Self, PipelineError> {
        use super::Signer;

        let mut rng = rand::rngs::OsRng;
        let mut salt = [0u8; 32];
        let mut iv = [0u8; 16];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut iv);

        let (kdf_name, kdfparams) = match kdf {
            Kdf::Scrypt { log_n, r, p } => (
                "scrypt",
                KdfParams {
                    dklen: DERIVED_KEY_LEN,
                    salt: hex::encode(salt),
                    n: Some(1u64 << log_n),
                    r: Some(r),
                    p: Some(p),
                    ..Default::default()
                },
            ),
            Kdf::Pbkdf2 { iterations } => (
                "pbkdf2",
                KdfParams {
                    dklen: DERIVED_KEY_LEN,
                    salt: hex::encode(salt),
                    c: Some(iterations),
                    prf: Some("hmac-sha256".to_string()),
                    ..Default::default()
                },
            ),
        };
        let derived = derive_key(kdf_name, &kdfparams, password)?;

        let mut ciphertext = signer.secret_bytes().to_vec();
        let mut cipher = Aes128Ctr::new_from_slices(&derived[..16], &iv)
            .map_err(|e| keystore_error(e.to_string()))?;
        cipher.apply_keystream(&mut ciphertext);

        let mut mac_input = derived[16..32].to_vec();
        mac_input.extend_from_slice(&ciphertext);

        Ok(Keystore {
            version: 3,
            id: Some(uuid::Uuid::new_v4().to_string()),
            address: Some(hex::encode(signer.address().as_bytes())),
            crypto: KeystoreCrypto {
                cipher: "aes-128-ctr".to_string(),
                cipherparams: CipherParams {
                    iv: hex::encode(iv),
                },
                ciphertext: hex::encode(ciphertext),
                kdf: kdf_name.to_string(),
                kdfparams,
                mac: hex::encode(keccak256(&mac_input)),
            },
        })
    }
}

fn derive_key(
    kdf: &str,
    params: &KdfParams,
    password: &str,
) -> Result<Zeroizing<Vec<u8>>, PipelineError> {
    if params.dklen < DERIVED_KEY_LEN {
        return Err(keystore_error(format!("dklen {} too short", params.dklen)));
    }
    let salt = decode_hex("salt", &params.salt)?;
    let mut derived = Zeroizing::new(vec![0u8; params.dklen]);
    match kdf {
        "scrypt" => {
            let (n, r, p) = match (params.n, params.r, params.p) {
                (Some(n), Some(r), Some(p)) => (n, r, p),
                _ => return Err(keystore_error("scrypt parameters n, r, p required")),
            };
            if !n.is_power_of_two() {
                return Err(keystore_error(format!("scrypt n {} is not a power of two", n)));
            }
            let log_n = n.trailing_zeros() as u8;
            let scrypt_params = scrypt::Params::new(log_n, r, p, params.dklen)
                .map_err(|e| keystore_error(format!("invalid scrypt parameters: {}", e)))?;
            scrypt::scrypt(password.as_bytes(), &salt, &scrypt_params, &mut derived)
                .map_err(|e| keystore_error(format!("scrypt failed: {}", e)))?;
        }
        "pbkdf2" => {
            if params.prf.as_deref().unwrap_or("hmac-sha256") != "hmac-sha256" {
                return Err(keystore_error("pbkdf2 only supports hmac-sha256"));
            }
            let rounds = params
                .c
                .ok_or_else(|| keystore_error("pbkdf2 iteration count c required"))?;
            pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, rounds, &mut derived);
        }
        other => return Err(keystore_error(format!("unsupported kdf {}", other))),
    }
    Ok(derived)
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, PipelineError> {
    hex::decode(value.strip_prefix("0x").unwrap_or(value))
        .map_err(|e| keystore_error(format!("invalid {}: {}", field, e)))
}

fn keystore_error(msg: impl Into<String>) -> PipelineError {
    PipelineError::Keystore(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Signer;

    // Published Web3 Secret Storage test vector (pbkdf2).
    const PBKDF2_VECTOR: &str = r#"{
        "crypto": {
            "cipher": "aes-128-ctr",
            "cipherparams": { "iv": "6087dab2f9fdbbfaddc31a909735c1e6" },
            "ciphertext": "5318b4d5bcd28de64ee5559e671353e16f075ecae9f99c7a79a38af5f869aa46",
            "kdf": "pbkdf2",
            "kdfparams": {
                "c": 262144,
                "dklen": 32,
                "prf": "hmac-sha256",
                "salt": "ae3cd4e7013836a3df6bd7241b12db061dbe2c6785853cce422d148a624ce0bd"
            },
            "mac": "517ead924a9d0dc3124507e3393d175ce3ff7c1e96529c6c555ce9a51a5e9ca7"
        },
        "id": "3198bc9c-6672-5ab3-d995-4942343ae5b6",
        "version": 3
    }"#;

    #[test]
    fn test_decrypt_published_vector() {
        let keystore = Keystore::from_json(PBKDF2_VECTOR).unwrap();
        let key = keystore.decrypt("testpassword").unwrap();
        assert_eq!(
            hex::encode(key.as_slice()),
            "7a28b5ba57c53603b0b07b56bba752f7784bf506fa95edc395f5cf6c7514fe9d"
        );
    }

    #[test]
    fn test_wrong_password_is_mac_mismatch() {
        let keystore = Keystore::from_json(PBKDF2_VECTOR).unwrap();
        let err = keystore.decrypt("not the password").unwrap_err();
        match err {
            PipelineError::Keystore(msg) => assert!(msg.contains("MAC mismatch")),
            other => panic!("Expected Keystore error, got {:?}", other),
        }
    }

    #[test]
    fn test_scrypt_roundtrip() {
        let signer = LocalSigner::random();
        let keystore = Keystore::encrypt(
            &signer,
            "hunter2",
            Kdf::Scrypt {
                log_n: 4,
                r: 8,
                p: 1,
            },
        )
        .unwrap();
        let json = serde_json::to_string(&keystore).unwrap();
        let restored = Keystore::from_json(&json).unwrap().decrypt_signer("hunter2").unwrap();
        assert_eq!(restored.address(), signer.address());
    }

    #[test]
    fn test_unsupported_cipher() {
        let mut keystore = Keystore::from_json(PBKDF2_VECTOR).unwrap();
        keystore.crypto.cipher = "aes-128-cbc".to_string();
        assert!(matches!(
            keystore.decrypt("testpassword"),
            Err(PipelineError::Keystore(_))
        ));
    }
}
