use newspool_broker::BrokerError;
use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// The socket timeout elapsed.
    #[error("timed out: {0}")]
    Timeout(&'static str),

    /// The server closed the connection.
    #[error("connection closed by server")]
    Closed,

    /// The server greeted us with a non-ready status.
    #[error("server not ready: {code} {text}")]
    NotReady {
        /// Greeting status code.
        code: u16,
        /// Greeting status text.
        text: String,
    },

    /// A response line did not follow the status-line grammar.
    #[error("malformed response: {0:?}")]
    Protocol(String),

    /// The server answered a command with an unexpected status.
    #[error("{command}: unexpected response {code} {text}")]
    Unexpected {
        /// Command that was sent.
        command: &'static str,
        /// Status code received.
        code: u16,
        /// Status text received.
        text: String,
    },

    /// The topic does not exist and creation was not requested.
    #[error("no such topic: {0}")]
    MissingTopic(String),

    /// The message vanished from the broker (expired or cancelled).
    #[error("no such message: {topic}:{seq}")]
    MissingMessage {
        /// Topic name.
        topic: String,
        /// Requested sequence number.
        seq: u64,
    },

    /// A fetched article could not be decoded into an envelope.
    #[error("undecodable article in {topic}:{seq}")]
    Decode {
        /// Topic name.
        topic: String,
        /// Sequence number of the offending article.
        seq: u64,
        /// Codec failure.
        #[source]
        source: newspool_envelope::Error,
    },

    /// Shutdown was requested while waiting to connect.
    #[error("cancelled while connecting to broker")]
    Cancelled,
}

impl BrokerError for Error {
    fn is_transient(&self) -> bool {
        match self {
            Self::Io(..) | Self::Timeout(_) | Self::Closed | Self::NotReady { .. } => true,
            // 4xx means the server is up but cannot perform the command
            // right now; 5xx and everything else is permanent.
            Self::Unexpected { code, .. } => (400..500).contains(code),
            _ => false,
        }
    }

    fn is_missing_message(&self) -> bool {
        matches!(self, Self::MissingMessage { .. } | Self::Decode { .. })
    }
}
