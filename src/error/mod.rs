//! Error types for topic-relay.

use thiserror::Error;

/// Result type for topic-relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for topic-relay.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Publishing to the broker failed.
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// A delivered message could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Application logic failed while handling a delivered message.
    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),

    /// No handler is bound to the topic a message was delivered on.
    #[error("No subscription for topic: {0}")]
    SubscriptionNotFound(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while publishing an event.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The inbound request body is not UTF-8 text.
    #[error("Request body is not valid UTF-8: {0}")]
    InvalidBody(#[from] std::str::Utf8Error),

    /// The event could not be serialized.
    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The broker could not be reached.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// The broker answered with a non-success status.
    #[error("Broker rejected publish with status {status}: {body}")]
    Rejected {
        /// HTTP status returned by the broker.
        status: u16,
        /// Response body returned by the broker.
        body: String,
    },
}

/// Errors raised while decoding a delivered message.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Payload is not UTF-8 text.
    #[error("Payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Payload looked like an envelope but could not be unwrapped.
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),
}

/// Errors raised by application logic while processing a message.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// Generic processing failure.
    #[error("{0}")]
    Failed(String),
}

impl Error {
    /// Whether redelivering the same payload could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Processing(_) | Error::Io(_) => true,
            Error::Publish(e) => e.is_retryable(),
            Error::Config(_) | Error::Decode(_) | Error::SubscriptionNotFound(_) => false,
        }
    }
}

impl PublishError {
    /// Whether the broker might accept the same publish later.
    pub fn is_retryable(&self) -> bool {
        match self {
            PublishError::Unavailable(_) => true,
            PublishError::Rejected { status, .. } => *status >= 500,
            PublishError::InvalidBody(_) | PublishError::Serialization(_) => false,
        }
    }
}
