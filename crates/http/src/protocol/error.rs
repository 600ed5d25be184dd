use std::io;
use thiserror::Error;

/// Errors raised while reading message bodies from a transport stream.
///
/// None of these are retried here; retry policy, if any, belongs to the
/// transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("stream closed with {remaining} more body bytes expected")]
    UnexpectedEof { remaining: u64 },

    #[error("invalid chunked framing: {reason}")]
    InvalidChunk { reason: String },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("body exceeds the configured limit of {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl TransportError {
    pub fn unexpected_eof(remaining: u64) -> Self {
        Self::UnexpectedEof { remaining }
    }

    pub fn invalid_chunk<S: ToString>(reason: S) -> Self {
        Self::InvalidChunk { reason: reason.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(reason: S) -> Self {
        Self::InvalidContentLength { reason: reason.to_string() }
    }

    pub fn body_too_large(limit: usize) -> Self {
        Self::BodyTooLarge { limit }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
