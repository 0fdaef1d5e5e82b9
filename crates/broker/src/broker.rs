use std::error::Error as StdError;
use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use newspool_envelope::Envelope;

use crate::bounds::{TopicBounds, TopicInfo};

/// Marker trait for broker errors.
///
/// The transport's retry policy is driven by this classification rather than
/// by inspecting error types: transient failures are retried or deferred to
/// the next cycle, a vanished message is skipped, everything else surfaces to
/// the caller.
pub trait BrokerError: Debug + StdError + Send + Sync + 'static {
    /// The operation failed for a reason worth retrying later: connection
    /// refused, timeout, temporary server error.
    fn is_transient(&self) -> bool;

    /// The requested message no longer exists on the broker (expired or
    /// cancelled). Consumers advance past it rather than stalling.
    fn is_missing_message(&self) -> bool;
}

/// Identifier assigned to a published message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageId(
    /// The wire form, angle brackets included.
    pub String,
);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A client of the store-and-forward broker.
///
/// Handles are cheap to clone and share one underlying connection; requests
/// are serialized, one in flight at a time.
#[async_trait]
pub trait Broker
where
    Self: Clone + Send + Sync + 'static,
{
    /// The error type for broker operations.
    type Error: BrokerError;

    /// Lists all topics in the catalog with their current bounds.
    async fn list_topics(&self) -> Result<Vec<TopicInfo>, Self::Error>;

    /// Returns true if `topic` exists on the broker.
    async fn topic_exists(&self, topic: &str) -> Result<bool, Self::Error>;

    /// Returns the low/high sequence marks of `topic`.
    ///
    /// A nonexistent topic reports [`TopicBounds::EMPTY`] rather than an
    /// error.
    async fn topic_bounds(&self, topic: &str) -> Result<TopicBounds, Self::Error>;

    /// Fetches the message with sequence number `seq` from `topic`.
    ///
    /// The returned envelope carries its sequence number in the reserved
    /// article-number header.
    async fn fetch(&self, topic: &str, seq: u64) -> Result<Envelope, Self::Error>;

    /// Publishes one envelope to every topic in `topics` (cross-post).
    async fn publish(&self, topics: &[String], envelope: &Envelope)
    -> Result<MessageId, Self::Error>;

    /// Creates `topic`.
    ///
    /// Creation may be asynchronous on the broker side; callers that need
    /// the topic poll [`Broker::topic_exists`] until it is visible.
    async fn create_topic(&self, topic: &str) -> Result<(), Self::Error>;

    /// Removes `topic`.
    async fn remove_topic(&self, topic: &str) -> Result<(), Self::Error>;

    /// Cancels one message in `topic` by its message identifier.
    async fn cancel(&self, topic: &str, message_id: &MessageId) -> Result<(), Self::Error>;

    /// The broker's current time, in UTC.
    async fn server_time(&self) -> Result<DateTime<Utc>, Self::Error>;
}
