//! Cryptographic primitives for credential secrets
//!
//! - AES-256-GCM sealing of stored secrets
//! - Argon2id passphrase key derivation
//! - Master key sources (passphrase, OS keychain, ephemeral)
//! - Zeroize-on-drop key and secret wrappers

mod encryption;
mod key_derivation;
mod key_source;
mod secure_memory;

pub use encryption::{decrypt, decrypt_string, encrypt, encrypt_string, SealedSecret};
pub use key_derivation::{derive_key, generate_salt, KeyDerivationParams};
pub use key_source::{KeySource, SALT_FILE};
pub use secure_memory::{MasterKey, SecretString};
