use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::IV_LEN;
use crate::error::{AppError, Result};

/// Encrypted half of a capability token. Field order is part of the digest input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadData {
    /// Hex nonce.
    pub iv: String,
    /// Hex AES-GCM ciphertext (tag included).
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherPayload {
    /// Hex SHA-256 over the JSON form of `data`.
    pub digest: String,
    pub data: PayloadData,
}

impl CipherPayload {
    /// URL-safe form used in links: base64url (unpadded) of the JSON payload.
    pub fn to_token(&self) -> Result<String> {
        Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(self)?))
    }

    pub fn from_token(token: &str) -> Result<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| AppError::MessageCorrupted)?;
        serde_json::from_slice(&raw).map_err(|_| AppError::MessageCorrupted)
    }
}

fn digest_of(data: &PayloadData) -> Result<String> {
    let json = serde_json::to_vec(data)?;
    Ok(hex::encode(Sha256::digest(&json)))
}

/// Symmetric, digest-checked codec for short capability strings.
pub struct Cipher {
    aead: Aes256Gcm,
}

impl Cipher {
    pub fn new(key: &[u8]) -> Result<Self> {
        let aead = Aes256Gcm::new_from_slice(key)
            .map_err(|_| AppError::Config("cipher key must be 32 bytes".to_string()))?;
        Ok(Self { aead })
    }

    pub fn encode(&self, plaintext: &str) -> Result<CipherPayload> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = self
            .aead
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|e| AppError::Cipher(e.to_string()))?;

        let data = PayloadData {
            iv: hex::encode(iv),
            message: hex::encode(ciphertext),
        };
        Ok(CipherPayload {
            digest: digest_of(&data)?,
            data,
        })
    }

    /// Verify the digest first, then decrypt. Any mismatch or decryption failure
    /// is reported as `MessageCorrupted`.
    pub fn decode(&self, payload: &CipherPayload) -> Result<String> {
        let expected = digest_of(&payload.data)?;
        if !bool::from(expected.as_bytes().ct_eq(payload.digest.as_bytes())) {
            return Err(AppError::MessageCorrupted);
        }

        let iv = hex::decode(&payload.data.iv).map_err(|_| AppError::MessageCorrupted)?;
        if iv.len() != IV_LEN {
            return Err(AppError::MessageCorrupted);
        }
        let ciphertext =
            hex::decode(&payload.data.message).map_err(|_| AppError::MessageCorrupted)?;

        let plaintext = self
            .aead
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
            .map_err(|_| AppError::MessageCorrupted)?;
        String::from_utf8(plaintext).map_err(|_| AppError::MessageCorrupted)
    }
}
