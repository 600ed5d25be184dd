//! Streaming decode of HTTP message bodies.
//!
//! Everything here is a `tokio_util::codec::Decoder` producing
//! [`PayloadItem`](crate::protocol::PayloadItem)s; the async driving loop
//! lives in [`crate::reader`]. Header tokenization is an external
//! collaborator's job and has no counterpart in this module.

pub mod body;

pub use body::BodyDecoder;
