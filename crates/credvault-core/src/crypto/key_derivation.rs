//! Passphrase-based master key derivation using Argon2id

use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::MasterKey;
use crate::error::{Result, VaultError};

/// Argon2id cost parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyDerivationParams {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl KeyDerivationParams {
    /// Cheap parameters for tests and ephemeral vaults
    pub fn fast() -> Self {
        Self {
            memory_cost: 8192,
            time_cost: 1,
            parallelism: 1,
        }
    }
}

/// Generate a random salt string (base64, no padding)
pub fn generate_salt() -> String {
    SaltString::generate(&mut OsRng).to_string()
}

/// Derive the 32-byte vault key from a passphrase and salt
pub fn derive_key(passphrase: &str, salt: &str, params: &KeyDerivationParams) -> Result<MasterKey> {
    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| VaultError::KeyDerivationError(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let salt = SaltString::from_b64(salt)
        .map_err(|e| VaultError::KeyDerivationError(format!("invalid salt: {}", e)))?;

    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| VaultError::KeyDerivationError(e.to_string()))?
        .hash
        .ok_or_else(|| VaultError::KeyDerivationError("no hash output".to_string()))?;

    MasterKey::from_slice(hash.as_bytes())
        .ok_or_else(|| VaultError::KeyDerivationError("hash output is not 32 bytes".to_string()))
}
