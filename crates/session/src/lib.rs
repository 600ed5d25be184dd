//! Per-exchange session model and interception API for the waylay proxy.
//!
//! Builds on `waylay-http`'s body framing to give interception code a safe
//! view of one client exchange: cached bodies with transparent
//! decompression, a checked locking discipline, and a short-circuit
//! responder for answering without contacting the origin server.

pub mod decoding;
pub mod error;
pub mod interceptor;
pub mod message;
pub mod session;

pub use decoding::ContentDecoder;
pub use decoding::DecodeError;
pub use error::SessionError;
pub use interceptor::Forwarder;
pub use interceptor::Interceptor;
pub use message::InterceptedRequest;
pub use message::InterceptedResponse;
pub use session::Session;
pub use session::SessionState;
pub use session::WebSession;
