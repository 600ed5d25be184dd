//! Core protocol abstractions for intercepted HTTP messages.
//!
//! This module provides the building blocks the rest of the engine is
//! written against:
//!
//! - **Framing** ([`message`]): [`BodySize`] holds the one documented
//!   decision table for how a body is delimited on the wire, and
//!   [`PayloadItem`] is the unit the body decoders produce.
//!
//! - **Heads** ([`request`], [`response`]): [`RequestHead`] and
//!   [`ResponseHead`] wrap the standard `http` types, adding the
//!   body-permission semantics and framing negotiation an intercepting
//!   proxy needs.
//!
//! - **Errors** ([`error`]): [`TransportError`] for everything that can go
//!   wrong while pulling body bytes off a stream.

mod message;
pub use message::BodySize;
pub use message::PayloadItem;

mod request;
pub use request::RequestHead;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::TransportError;
