//! Wire-level HTTP body framing for an intercepting proxy
//!
//! This crate implements the body-transfer protocol of HTTP/1.x as needed
//! by a man-in-the-middle proxy: deciding how a message body is delimited
//! on the wire and materializing it from a byte stream. It deliberately
//! owns nothing else — header line parsing, TLS and the socket layer are
//! external collaborators.
//!
//! # Features
//!
//! - Framing negotiation with a single documented precedence table
//!   (chunked wins over content-length, HTTP/1.0 falls back to
//!   read-until-close)
//! - Chunked transfer decoding through the terminator, so persistent
//!   connections stay correctly positioned
//! - Strict content-length reads: a premature close is an error, never a
//!   silently truncated body
//! - Asynchronous I/O using tokio, with bodies framed via `tokio-util`
//!   codecs
//!
//! # Example
//!
//! ```
//! use waylay_http::protocol::BodySize;
//! use waylay_http::reader::BodyReader;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), waylay_http::protocol::TransportError> {
//!     let wire: &[u8] = b"5\r\nhello\r\n6\r\nworld!\r\n0\r\n\r\n";
//!
//!     let mut reader = BodyReader::new(wire);
//!     let body = reader.read(BodySize::Chunked).await?;
//!     assert_eq!(&body[..], b"helloworld!");
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: framing metadata ([`protocol::BodySize`]), message head
//!   wrappers and transport errors
//! - [`codec`]: `tokio_util::codec::Decoder` implementations, one per
//!   framing kind
//! - [`reader`]: the async [`reader::BodyReader`] that drives a decoder to
//!   EOF over a stream
//!
//! The session layer (message caching, locking discipline, interception
//! API) builds on this crate and lives in `waylay-session`.

pub mod codec;
pub mod protocol;
pub mod reader;
