//! AES-256-GCM sealing of credential secrets
//!
//! Sealed format: `{nonce_hex}:{tag_hex}:{ciphertext_hex}`
//! - nonce: 12 bytes
//! - tag: 16 bytes
//! - ciphertext: same length as the plaintext

use std::fmt;
use std::str::FromStr;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use super::{MasterKey, SecretString};
use crate::error::{Result, VaultError};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// A secret sealed under the vault master key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedSecret {
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

impl fmt::Display for SealedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            hex::encode(self.nonce),
            hex::encode(self.tag),
            hex::encode(&self.ciphertext)
        )
    }
}

impl FromStr for SealedSecret {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(':');
        let (Some(nonce), Some(tag), Some(ciphertext), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(VaultError::DecodeFailed(
                "expected nonce:tag:ciphertext".to_string(),
            ));
        };

        Ok(Self {
            nonce: decode_fixed(nonce, "nonce")?,
            tag: decode_fixed(tag, "tag")?,
            ciphertext: hex::decode(ciphertext)
                .map_err(|e| VaultError::DecodeFailed(format!("ciphertext: {}", e)))?,
        })
    }
}

fn decode_fixed<const N: usize>(part: &str, what: &str) -> Result<[u8; N]> {
    let bytes =
        hex::decode(part).map_err(|e| VaultError::DecodeFailed(format!("{}: {}", what, e)))?;
    bytes.as_slice().try_into().map_err(|_| {
        VaultError::DecodeFailed(format!(
            "{} must be {} bytes, got {}",
            what,
            N,
            bytes.len()
        ))
    })
}

/// Seal raw bytes with a fresh random nonce
pub fn encrypt(plaintext: &[u8], key: &MasterKey) -> Result<SealedSecret> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::EncryptionError(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    // aes-gcm returns ciphertext || tag
    let mut sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| VaultError::EncryptionError(e.to_string()))?;

    let split = sealed
        .len()
        .checked_sub(TAG_LEN)
        .ok_or_else(|| VaultError::EncryptionError("ciphertext shorter than tag".to_string()))?;
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&sealed[split..]);
    sealed.truncate(split);

    Ok(SealedSecret {
        nonce,
        tag,
        ciphertext: sealed,
    })
}

/// Open a sealed secret, verifying its tag
pub fn decrypt(sealed: &SealedSecret, key: &MasterKey) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::DecodeFailed(e.to_string()))?;

    let mut joined = Vec::with_capacity(sealed.ciphertext.len() + TAG_LEN);
    joined.extend_from_slice(&sealed.ciphertext);
    joined.extend_from_slice(&sealed.tag);

    cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), joined.as_slice())
        .map_err(|_| VaultError::DecodeFailed("authentication tag mismatch".to_string()))
}

/// Seal a string and return its serialized form
pub fn encrypt_string(plaintext: &str, key: &MasterKey) -> Result<String> {
    Ok(encrypt(plaintext.as_bytes(), key)?.to_string())
}

/// Open a serialized sealed secret as a zeroizing string
pub fn decrypt_string(sealed: &str, key: &MasterKey) -> Result<SecretString> {
    let sealed: SealedSecret = sealed.parse()?;
    let plaintext = decrypt(&sealed, key)?;
    String::from_utf8(plaintext)
        .map(SecretString::new)
        .map_err(|e| VaultError::DecodeFailed(format!("invalid UTF-8: {}", e)))
}
