//! Decoder for bodies framed by a Content-Length header.
//!
//! The decoder yields exactly the advertised number of bytes. A source that
//! closes before delivering them all is a transport failure; the shortfall
//! is never papered over with a truncated body.

use std::cmp;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{PayloadItem, TransportError};

/// A decoder for bodies with a known length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    /// Bytes still owed by the source
    remaining: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = TransportError;

    /// Yields available bytes up to the advertised length, then EOF.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let take = cmp::min(self.remaining, src.len() as u64) as usize;
        let bytes = src.split_to(take).freeze();
        self.remaining -= bytes.len() as u64;

        Ok(Some(PayloadItem::Chunk(bytes)))
    }

    /// A premature close while bytes are still owed surfaces as
    /// [`TransportError::UnexpectedEof`].
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(TransportError::unexpected_eof(self.remaining)),
        }
    }
}
