use http::Method;
use thiserror::Error;

use crate::decoding::DecodeError;
use waylay_http::protocol::TransportError;

/// Errors surfaced by the session body-accessor API.
///
/// Every variant propagates synchronously to the caller of the triggering
/// accessor; the engine never swallows, retries, or substitutes a fallback
/// on its own.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An accessor was invoked outside its valid state-machine window,
    /// e.g. reading the response before the request was committed, or
    /// mutating the request afterwards.
    #[error("protocol state error: {reason}")]
    ProtocolState { reason: String },

    /// A body read was attempted on a message whose method semantics
    /// preclude a body.
    #[error("a {method} request does not carry a body")]
    BodyNotPresent { method: Method },

    /// The underlying stream failed while body bytes were being read.
    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },

    /// A recognized content-encoding's decompressor rejected the body.
    #[error("decompression error: {source}")]
    Decode {
        #[from]
        source: DecodeError,
    },
}

impl SessionError {
    pub fn state<S: ToString>(reason: S) -> Self {
        Self::ProtocolState { reason: reason.to_string() }
    }

    pub fn body_not_present(method: Method) -> Self {
        Self::BodyNotPresent { method }
    }
}
