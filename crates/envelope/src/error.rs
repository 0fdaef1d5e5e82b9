use thiserror::Error;

/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, Error)]
pub enum Error {
    /// A header line had no colon separator.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// A continuation line appeared before any header.
    #[error("header continuation without a preceding header")]
    DanglingContinuation,

    /// The content type could not be parsed.
    #[error("invalid content type: {0:?}")]
    ContentType(String),

    /// A multipart content type carried no boundary parameter.
    #[error("multipart content type without a boundary")]
    MissingBoundary,

    /// The closing boundary marker never appeared.
    #[error("unterminated multipart body")]
    UnterminatedMultipart,

    /// A base64-encoded part failed to decode.
    #[error("invalid base64 payload")]
    Base64(#[from] base64::DecodeError),
}
