use newspool_broker::BrokerError;
use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The topic does not exist.
    #[error("no such topic: {0}")]
    MissingTopic(String),

    /// The message does not exist (expired or cancelled).
    #[error("no such message: {topic}:{seq}")]
    MissingMessage {
        /// Topic name.
        topic: String,
        /// Requested sequence number.
        seq: u64,
    },
}

impl BrokerError for Error {
    fn is_transient(&self) -> bool {
        false
    }

    fn is_missing_message(&self) -> bool {
        matches!(self, Self::MissingMessage { .. })
    }
}
