//! Checkpoint storage using one file per key on disk.
//!
//! The file holds the decimal sequence number as text, nothing else, so the
//! state stays inspectable (and repairable) with ordinary shell tools.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::path::PathBuf;

use async_trait::async_trait;
use newspool_checkpoint::{CheckpointKey, CheckpointStore};
use tokio::fs;
use tokio::io;
use tracing::warn;

/// Checkpoint store using files on disk.
///
/// Saves write to a temp file in the target directory and rename it over
/// the destination, so a crash mid-write leaves the previous value intact.
#[derive(Clone, Debug)]
pub struct FsCheckpointStore {
    dir: PathBuf,
}

impl FsCheckpointStore {
    /// Creates a new `FsCheckpointStore` rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_path(&self, key: &CheckpointKey) -> PathBuf {
        self.dir.join(key.storage_name())
    }
}

#[async_trait]
impl CheckpointStore for FsCheckpointStore {
    type Error = Error;

    async fn load(&self, key: &CheckpointKey) -> Result<Option<u64>, Self::Error> {
        let path = self.file_path(key);

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io("error reading checkpoint", e)),
        };

        match contents.trim().parse() {
            Ok(seq) => Ok(Some(seq)),
            Err(_) => {
                // An unreadable value falls back to the catchup policy, the
                // same recovery path as a missing file.
                warn!(key = %key, "unparseable checkpoint, treating as unset");
                Ok(None)
            }
        }
    }

    async fn save(&self, key: &CheckpointKey, seq: u64) -> Result<(), Self::Error> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)
                .await
                .map_err(|e| Error::Io("error creating checkpoint directory", e))?;
        }

        let path = self.file_path(key);
        // Appended, not with_extension: topic names contain dots and the
        // temp name must stay unique per key.
        let tmp = self.dir.join(format!("{}.tmp", key.storage_name()));

        fs::write(&tmp, seq.to_string())
            .await
            .map_err(|e| Error::Io("error writing checkpoint", e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::Io("error renaming checkpoint", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());
        let key = CheckpointKey::topic("transport.site.data");

        store.save(&key, 42).await.unwrap();

        assert_eq!(store.load(&key).await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn save_overwrites_previous_value() {
        let dir = tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());
        let key = CheckpointKey::topic("transport.site.data");

        store.save(&key, 42).await.unwrap();
        store.save(&key, 43).await.unwrap();

        assert_eq!(store.load(&key).await.unwrap(), Some(43));
    }

    #[tokio::test]
    async fn missing_checkpoint_loads_as_none() {
        let dir = tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());
        let key = CheckpointKey::topic("never.written");

        assert_eq!(store.load(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_checkpoint_loads_as_none() {
        let dir = tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());
        let key = CheckpointKey::topic("transport.site.data");

        std::fs::write(dir.path().join(key.storage_name()), "4\u{0}2garbage").unwrap();

        assert_eq!(store.load(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_contents_are_the_decimal_value() {
        let dir = tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());
        let key = CheckpointKey::prefixed("poller", "transport.site.data");

        store.save(&key, 1234).await.unwrap();

        let contents =
            std::fs::read_to_string(dir.path().join("poller-transport.site.data")).unwrap();
        assert_eq!(contents, "1234");
    }

    #[tokio::test]
    async fn no_temp_file_remains_after_save() {
        let dir = tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());
        let key = CheckpointKey::topic("transport.site.data");

        store.save(&key, 7).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["transport.site.data".to_string()]);
    }
}
