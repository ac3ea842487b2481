//! Storage backends for credential persistence
//!
//! 1. In-memory (store lifetime equals process lifetime)
//! 2. Encrypted JSON file in the data directory

mod encrypted_file;
mod memory;
mod traits;

pub use encrypted_file::EncryptedFileStorage;
pub use memory::MemoryStorage;
pub use traits::SecureStorage;
