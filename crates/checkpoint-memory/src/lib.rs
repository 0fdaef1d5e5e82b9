//! In-memory (single process) checkpoint storage for tests and local
//! development.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use newspool_checkpoint::{CheckpointKey, CheckpointStore};
use tokio::sync::Mutex;

/// In-memory checkpoint store.
#[derive(Clone, Debug, Default)]
pub struct MemoryCheckpointStore {
    map: Arc<Mutex<HashMap<String, u64>>>,
}

impl MemoryCheckpointStore {
    /// Creates a new `MemoryCheckpointStore`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    type Error = Error;

    async fn load(&self, key: &CheckpointKey) -> Result<Option<u64>, Self::Error> {
        Ok(self.map.lock().await.get(&key.storage_name()).copied())
    }

    async fn save(&self, key: &CheckpointKey, seq: u64) -> Result<(), Self::Error> {
        self.map.lock().await.insert(key.storage_name(), seq);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = MemoryCheckpointStore::new();
        let key = CheckpointKey::topic("transport.site.data");

        store.save(&key, 9).await.unwrap();

        assert_eq!(store.load(&key).await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn keys_with_different_prefixes_are_distinct() {
        let store = MemoryCheckpointStore::new();
        let plain = CheckpointKey::topic("transport.site.data");
        let scoped = CheckpointKey::prefixed("mirror", "transport.site.data");

        store.save(&plain, 1).await.unwrap();
        store.save(&scoped, 2).await.unwrap();

        assert_eq!(store.load(&plain).await.unwrap(), Some(1));
        assert_eq!(store.load(&scoped).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = MemoryCheckpointStore::new();
        let clone = store.clone();
        let key = CheckpointKey::topic("transport.site.data");

        store.save(&key, 5).await.unwrap();

        assert_eq!(clone.load(&key).await.unwrap(), Some(5));
    }
}
