//! Decoder for bodies delimited by connection close.
//!
//! HTTP/1.0 messages without a content-length or chunked framing carry no
//! in-band length signal at all; the body is simply everything the peer
//! sends before closing its side of the connection.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{PayloadItem, TransportError};

/// A decoder that consumes the source until end-of-stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UntilCloseDecoder;

impl UntilCloseDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for UntilCloseDecoder {
    type Item = PayloadItem;
    type Error = TransportError;

    /// Passes every available byte through; EOF only arrives via
    /// [`Self::decode_eof`] when the stream ends.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        Ok(Some(PayloadItem::Chunk(src.split().freeze())))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Ok(Some(PayloadItem::Eof)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_everything_until_close() {
        let mut buffer = BytesMut::from(&b"anything at all"[..]);
        let mut decoder = UntilCloseDecoder::new();

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(item.as_bytes().unwrap().as_ref(), b"anything at all");
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        assert!(decoder.decode_eof(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn close_with_pending_bytes_flushes_first() {
        let mut buffer = BytesMut::from(&b"tail"[..]);
        let mut decoder = UntilCloseDecoder::new();

        let item = decoder.decode_eof(&mut buffer).unwrap().unwrap();
        assert_eq!(item.as_bytes().unwrap().as_ref(), b"tail");
        assert!(decoder.decode_eof(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn empty_body_is_just_eof() {
        let mut buffer = BytesMut::new();
        let mut decoder = UntilCloseDecoder::new();

        assert!(decoder.decode(&mut buffer).unwrap().is_none());
        assert!(decoder.decode_eof(&mut buffer).unwrap().unwrap().is_eof());
    }
}
