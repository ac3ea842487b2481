//! Process-local storage backend

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::SecureStorage;
use crate::error::Result;

/// In-memory storage; contents vanish with the process
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureStorage for MemoryStorage {
    async fn store(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "Memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prefix_listing_and_delete() {
        let storage = MemoryStorage::new();
        storage.store("credential:a", b"1").await.unwrap();
        storage.store("credential:b", b"2").await.unwrap();
        storage.store("other:c", b"3").await.unwrap();

        let keys = storage.list_keys("credential:").await.unwrap();
        assert_eq!(keys, vec!["credential:a", "credential:b"]);

        storage.delete("credential:a").await.unwrap();
        storage.delete("credential:missing").await.unwrap();
        assert!(!storage.exists("credential:a").await.unwrap());
        assert_eq!(storage.retrieve("credential:b").await.unwrap(), Some(b"2".to_vec()));
    }
}
