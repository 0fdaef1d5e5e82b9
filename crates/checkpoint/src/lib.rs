//! Abstract interface for durable consumer checkpoints.
//!
//! A checkpoint is the last successfully processed sequence number for one
//! `(binding prefix, topic)` pair. It is written only after the processing
//! callback succeeds, so a crash between callback and save re-delivers the
//! message (at-least-once).
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::error::Error as StdError;
use std::fmt;
use std::fmt::Debug;

use async_trait::async_trait;

/// Marker trait for checkpoint store errors.
pub trait CheckpointError: Debug + StdError + Send + Sync + 'static {}

/// Identifies one checkpoint: an optional binding prefix plus the topic.
///
/// Two consumers never share a key; the prefix disambiguates multiple
/// bindings onto the same topic within one process.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CheckpointKey {
    prefix: Option<String>,
    topic: String,
}

impl CheckpointKey {
    /// Creates a key for `topic` with no prefix.
    #[must_use]
    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            prefix: None,
            topic: topic.into(),
        }
    }

    /// Creates a key for `topic` scoped by `prefix`.
    #[must_use]
    pub fn prefixed(prefix: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            topic: topic.into(),
        }
    }

    /// The topic this key tracks.
    #[must_use]
    pub fn topic_name(&self) -> &str {
        &self.topic
    }

    /// The stable storage name: `prefix + "-" + topic`, or the bare topic
    /// when no prefix is set.
    #[must_use]
    pub fn storage_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}-{}", self.topic),
            None => self.topic.clone(),
        }
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_name())
    }
}

/// A durable store of last-processed sequence numbers.
#[async_trait]
pub trait CheckpointStore
where
    Self: Clone + Send + Sync + 'static,
{
    /// The error type for store operations.
    type Error: CheckpointError;

    /// Loads the checkpoint for `key`.
    ///
    /// Returns `None` when no checkpoint exists *or* the stored value is
    /// unreadable; the consumer then re-evaluates its catchup policy against
    /// the topic's current bounds.
    async fn load(&self, key: &CheckpointKey) -> Result<Option<u64>, Self::Error>;

    /// Saves the checkpoint for `key`.
    ///
    /// The value must be durable before this returns; the consumer only
    /// proceeds to the next message afterwards.
    async fn save(&self, key: &CheckpointKey, seq: u64) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_name_joins_prefix_and_topic() {
        let key = CheckpointKey::prefixed("archive-cameras", "transport.site.images");
        assert_eq!(key.storage_name(), "archive-cameras-transport.site.images");
    }

    #[test]
    fn storage_name_without_prefix_is_the_topic() {
        let key = CheckpointKey::topic("transport.site.images");
        assert_eq!(key.storage_name(), "transport.site.images");
    }
}
