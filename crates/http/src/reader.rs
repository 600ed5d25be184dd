//! Async materialization of message bodies.
//!
//! [`BodyReader`] pairs one side of an exchange (client-facing or
//! server-facing stream) with a [`BodyDecoder`] and drives it to EOF. The
//! reader owns its `FramedRead` for the lifetime of the connection side:
//! read-ahead bytes buffered past one body stay available to the next
//! message, which keeps a persistent connection correctly positioned.

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::{debug, trace};

use crate::codec::BodyDecoder;
use crate::protocol::{BodySize, PayloadItem, TransportError};

/// Limits applied while reading bodies into memory.
#[derive(Debug, Clone, Copy)]
pub struct ReaderConfig {
    /// Largest body the reader will buffer before failing with
    /// [`TransportError::BodyTooLarge`]
    pub max_body_size: usize,
    /// Initial capacity of the read buffer
    pub read_buffer_capacity: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self { max_body_size: 64 * 1024 * 1024, read_buffer_capacity: 8 * 1024 }
    }
}

/// Reads whole message bodies from a byte stream according to their
/// negotiated framing.
///
/// All I/O failures propagate to the caller; nothing is retried here.
#[derive(Debug)]
pub struct BodyReader<R> {
    framed: FramedRead<R, BodyDecoder>,
    max_body_size: usize,
}

impl<R> BodyReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(io: R) -> Self {
        Self::with_config(io, ReaderConfig::default())
    }

    pub fn with_config(io: R, config: ReaderConfig) -> Self {
        Self {
            framed: FramedRead::with_capacity(io, BodyDecoder::empty(), config.read_buffer_capacity),
            max_body_size: config.max_body_size,
        }
    }

    /// Reads one full body framed as `size` and returns it.
    ///
    /// The chunked terminator (and any trailer section) is consumed before
    /// this returns, leaving the stream at the next message.
    pub async fn read(&mut self, size: BodySize) -> Result<Bytes, TransportError> {
        // an empty framing must not touch the io at all: FramedRead polls
        // the source before consulting the decoder
        if size.is_empty() {
            return Ok(Bytes::new());
        }

        self.framed.decoder_mut().prepare(size);

        let mut body = BytesMut::new();
        loop {
            match self.framed.next().await {
                Some(Ok(PayloadItem::Chunk(bytes))) => {
                    if body.len() + bytes.len() > self.max_body_size {
                        return Err(TransportError::body_too_large(self.max_body_size));
                    }
                    body.extend_from_slice(&bytes);
                }
                Some(Ok(PayloadItem::Eof)) => {
                    trace!(len = body.len(), "message body fully read");
                    return Ok(body.freeze());
                }
                Some(Err(e)) => return Err(e),
                None => return Err(TransportError::unexpected_eof(0)),
            }
        }
    }

    /// Consumes one full body framed as `size` and discards it.
    ///
    /// Used when a body is being replaced without having been read: the
    /// wire bytes still have to leave the stream so the connection is not
    /// stuck mid-message.
    pub async fn drain(&mut self, size: BodySize) -> Result<u64, TransportError> {
        if size.is_empty() {
            return Ok(0);
        }

        self.framed.decoder_mut().prepare(size);

        let mut skipped: u64 = 0;
        loop {
            match self.framed.next().await {
                Some(Ok(PayloadItem::Chunk(bytes))) => skipped += bytes.len() as u64,
                Some(Ok(PayloadItem::Eof)) => {
                    debug!(skipped, "drained unread body");
                    return Ok(skipped);
                }
                Some(Err(e)) => return Err(e),
                None => return Err(TransportError::unexpected_eof(0)),
            }
        }
    }

    /// Bytes read ahead of the current position, belonging to whatever
    /// follows the last body on the stream.
    pub fn read_buffer(&self) -> &BytesMut {
        self.framed.read_buffer()
    }

    /// Returns a reference to the underlying stream.
    pub fn get_ref(&self) -> &R {
        self.framed.get_ref()
    }

    /// Consumes the reader, returning the underlying stream. Read-ahead
    /// bytes in the buffer are dropped.
    pub fn into_inner(self) -> R {
        self.framed.into_inner()
    }
}
