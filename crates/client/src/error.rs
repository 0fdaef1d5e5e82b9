use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A broker operation failed in a way the retry policy does not absorb.
    #[error("broker error: {0}")]
    Broker(#[source] BoxError),

    /// The checkpoint store failed; processing cannot safely continue.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[source] BoxError),

    /// The handler failed on a message while strict mode was enabled.
    #[error("processing failed for {topic}:{seq}")]
    Fatal {
        /// Topic of the offending message.
        topic: String,
        /// Sequence number of the offending message.
        seq: u64,
        /// The handler's error.
        #[source]
        source: BoxError,
    },

    /// Startup could not complete (bad pattern, topic creation failed).
    #[error("setup error: {0}")]
    Setup(String),

    /// A local file could not be read for posting.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// Shutdown was requested before the operation could finish.
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn broker<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Broker(Box::new(error))
    }

    pub(crate) fn checkpoint<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Checkpoint(Box::new(error))
    }
}
