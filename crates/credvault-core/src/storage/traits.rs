//! Storage trait definitions

use crate::error::Result;
use async_trait::async_trait;

/// Key-value persistence for credential records
#[async_trait]
pub trait SecureStorage: Send + Sync {
    /// Store a value with the given key
    async fn store(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a value by key
    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a value by key (missing keys are not an error)
    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// List all keys with a given prefix
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    async fn clear(&self) -> Result<()>;

    /// Human-readable backend name for logs
    fn backend_name(&self) -> &'static str;
}
