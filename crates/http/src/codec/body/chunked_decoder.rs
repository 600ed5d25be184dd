//! Decoder for HTTP chunked transfer encoding.
//!
//! Chunked framing delivers a body as a series of length-prefixed segments
//! terminated by a zero-length segment
//! ([RFC 9112 section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1)).
//! The decoder consumes everything through the final CRLF, including any
//! trailer section, so that the stream is left positioned at the start of
//! the next message on a persistent connection.

use std::cmp;

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::{PayloadItem, TransportError};

/// A decoder for chunked transfer encoded bodies.
///
/// Wire format handled per chunk: hex size line (with optional extensions),
/// CRLF, payload, CRLF. A size of zero introduces an optional trailer
/// section followed by the terminating CRLF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: State,
    /// Unread payload bytes of the chunk currently being decoded
    remaining: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Accumulating the hex chunk size
    Size,
    /// Whitespace after the size; digits may not resume
    SizeWs,
    /// Skipping a chunk extension up to its CR
    Extension,
    /// Expecting the LF that ends the size line
    SizeLf,
    /// Reading chunk payload bytes
    Data,
    /// Expecting the CR after chunk payload
    DataCr,
    /// Expecting the LF after chunk payload
    DataLf,
    /// Skipping a trailer field line up to its CR
    Trailer,
    /// Expecting the LF that ends a trailer line
    TrailerLf,
    /// Expecting the CR of the terminating CRLF
    EndCr,
    /// Expecting the LF of the terminating CRLF
    EndLf,
    /// Terminator fully consumed
    Done,
}

/// Outcome of one state-machine step.
enum Step {
    /// State advanced; run the machine again
    Continue,
    /// The source buffer is exhausted mid-element
    NeedMore,
    /// A run of payload bytes was extracted
    Data(Bytes),
}

/// Takes the next byte or bails out of `step` until more data arrives.
macro_rules! next_byte {
    ($src:ident) => {{
        if $src.is_empty() {
            return Ok(Step::NeedMore);
        }
        $src.get_u8()
    }};
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: State::Size, remaining: 0 }
    }

    fn push_size_digit(&mut self, digit: u64) -> Result<(), TransportError> {
        self.remaining = self
            .remaining
            .checked_mul(16)
            .and_then(|size| size.checked_add(digit))
            .ok_or_else(|| TransportError::invalid_chunk("chunk size overflows u64"))?;
        Ok(())
    }

    fn step(&mut self, src: &mut BytesMut) -> Result<Step, TransportError> {
        match self.state {
            State::Size => match next_byte!(src) {
                b @ b'0'..=b'9' => self.push_size_digit(u64::from(b - b'0'))?,
                b @ b'a'..=b'f' => self.push_size_digit(u64::from(b - b'a') + 10)?,
                b @ b'A'..=b'F' => self.push_size_digit(u64::from(b - b'A') + 10)?,
                b'\t' | b' ' => self.state = State::SizeWs,
                b';' => self.state = State::Extension,
                b'\r' => self.state = State::SizeLf,
                _ => return Err(TransportError::invalid_chunk("chunk size line contains a non-hex byte")),
            },

            State::SizeWs => match next_byte!(src) {
                b'\t' | b' ' => {}
                b';' => self.state = State::Extension,
                b'\r' => self.state = State::SizeLf,
                _ => return Err(TransportError::invalid_chunk("unexpected byte after chunk size")),
            },

            // extensions are skipped, not interpreted; they end at CRLF and
            // a bare LF inside one is invalid
            State::Extension => match next_byte!(src) {
                b'\r' => self.state = State::SizeLf,
                b'\n' => return Err(TransportError::invalid_chunk("chunk extension contains a bare LF")),
                _ => {}
            },

            State::SizeLf => match next_byte!(src) {
                b'\n' => self.state = if self.remaining == 0 { State::EndCr } else { State::Data },
                _ => return Err(TransportError::invalid_chunk("chunk size line not terminated by CRLF")),
            },

            State::Data => {
                if src.is_empty() {
                    return Ok(Step::NeedMore);
                }

                let take = cmp::min(self.remaining, src.len() as u64) as usize;
                let data = src.split_to(take).freeze();
                self.remaining -= take as u64;

                if self.remaining == 0 {
                    self.state = State::DataCr;
                }
                return Ok(Step::Data(data));
            }

            State::DataCr => match next_byte!(src) {
                b'\r' => self.state = State::DataLf,
                _ => return Err(TransportError::invalid_chunk("chunk data not terminated by CR")),
            },

            State::DataLf => match next_byte!(src) {
                b'\n' => self.state = State::Size,
                _ => return Err(TransportError::invalid_chunk("chunk data not terminated by LF")),
            },

            State::Trailer => match next_byte!(src) {
                b'\r' => self.state = State::TrailerLf,
                _ => {}
            },

            State::TrailerLf => match next_byte!(src) {
                b'\n' => self.state = State::EndCr,
                _ => return Err(TransportError::invalid_chunk("trailer line not terminated by LF")),
            },

            State::EndCr => match next_byte!(src) {
                b'\r' => self.state = State::EndLf,
                // any other byte opens a trailer field line
                _ => self.state = State::Trailer,
            },

            State::EndLf => match next_byte!(src) {
                b'\n' => self.state = State::Done,
                _ => return Err(TransportError::invalid_chunk("terminator not ended by LF")),
            },

            State::Done => {}
        }

        Ok(Step::Continue)
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = TransportError;

    /// Decodes chunked data from the input buffer.
    ///
    /// # Returns
    /// - `Ok(Some(PayloadItem::Chunk(bytes)))` when payload bytes are available
    /// - `Ok(Some(PayloadItem::Eof))` once the terminator is fully consumed
    /// - `Ok(None)` when more data is needed
    /// - `Err(TransportError)` if the framing is malformed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == State::Done {
                trace!("chunked body fully consumed");
                return Ok(Some(PayloadItem::Eof));
            }

            match self.step(src)? {
                Step::NeedMore => return Ok(None),
                Step::Data(bytes) => {
                    trace!(len = bytes.len(), "decoded chunk payload");
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }
                Step::Continue => {}
            }
        }
    }

    /// A stream that ends before the terminator is a transport failure,
    /// never a silently shortened body.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(TransportError::unexpected_eof(self.remaining)),
        }
    }
}
