//! Body decoding for intercepted HTTP messages.
//!
//! One decoder exists per framing kind; [`BodyDecoder`] is the only place
//! a [`BodySize`] is mapped to a concrete strategy, so the framing
//! precedence decided in [`BodySize::negotiate`](crate::protocol::BodySize)
//! is never re-derived here.
//!
//! - [`ChunkedDecoder`]: length-prefixed segments up to the terminator
//! - [`LengthDecoder`]: exactly content-length bytes
//! - [`UntilCloseDecoder`]: everything until end-of-stream (HTTP/1.0)

mod chunked_decoder;
mod length_decoder;
mod until_close_decoder;

pub use chunked_decoder::ChunkedDecoder;
pub use length_decoder::LengthDecoder;
pub use until_close_decoder::UntilCloseDecoder;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{BodySize, PayloadItem, TransportError};

/// A unified decoder that applies the framing a message negotiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Length(LengthDecoder),
    Chunked(ChunkedDecoder),
    UntilClose(UntilCloseDecoder),
    NoBody,
}

impl BodyDecoder {
    /// Creates the decoder matching a negotiated [`BodySize`].
    pub fn for_size(size: BodySize) -> Self {
        let kind = match size {
            BodySize::Length(length) => Kind::Length(LengthDecoder::new(length)),
            BodySize::Chunked => Kind::Chunked(ChunkedDecoder::new()),
            BodySize::UntilClose => Kind::UntilClose(UntilCloseDecoder::new()),
            BodySize::Empty => Kind::NoBody,
        };
        Self { kind }
    }

    /// Creates a decoder for messages with no body.
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    /// Rearms the decoder for the next message's framing, discarding any
    /// per-message state left by the previous one.
    pub fn prepare(&mut self, size: BodySize) {
        *self = Self::for_size(size);
    }
}

impl Default for BodyDecoder {
    fn default() -> Self {
        Self::empty()
    }
}

impl Decoder for BodyDecoder {
    type Item = PayloadItem;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(decoder) => decoder.decode(src),
            Kind::Chunked(decoder) => decoder.decode(src),
            Kind::UntilClose(decoder) => decoder.decode(src),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(decoder) => decoder.decode_eof(src),
            Kind::Chunked(decoder) => decoder.decode_eof(src),
            Kind::UntilClose(decoder) => decoder.decode_eof(src),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }
}
