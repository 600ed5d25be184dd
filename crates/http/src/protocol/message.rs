use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Version};

use crate::protocol::TransportError;

/// Represents an item in an HTTP body stream.
///
/// The body decoders produce either data chunks or an EOF marker that
/// signals the body is fully consumed and the stream is positioned at the
/// next message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem {
    /// A run of body bytes
    Chunk(Bytes),
    /// Marks the end of the body
    Eof,
}

impl PayloadItem {
    /// Returns true if this item marks the end of the body
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    /// Returns true if this item carries body bytes
    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }

    /// Returns a reference to the contained bytes if this is a Chunk
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }

    /// Consumes the item and returns the contained bytes if this is a Chunk
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}

/// How a message body is framed on the wire.
///
/// This is the single place where framing precedence is decided; callers
/// must never re-derive it from headers themselves. The rules, applied in
/// order by [`BodySize::negotiate`]:
///
/// | transfer-encoding chunked | content-length | version | result       |
/// |---------------------------|----------------|---------|--------------|
/// | yes                       | any            | any     | `Chunked`    |
/// | no                        | n > 0          | any     | `Length(n)`  |
/// | no                        | 0              | any     | `Empty`      |
/// | no                        | absent         | 1.0     | `UntilClose` |
/// | no                        | absent         | >= 1.1  | `Empty`      |
///
/// Chunked framing always wins over a present content-length: a sender that
/// supplies both has produced an inconsistent message, and the chunked
/// terminator is the only framing signal that can be trusted. The
/// read-until-close fallback applies only to HTTP/1.0, where no other
/// framing signal exists.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BodySize {
    /// Body with a known length in bytes
    Length(u64),
    /// Body using chunked transfer encoding
    Chunked,
    /// Body delimited by the peer closing the connection (HTTP/1.0)
    UntilClose,
    /// No body
    Empty,
}

impl BodySize {
    /// Derives the framing for a message from its headers and version.
    ///
    /// `allows_body` reflects the message semantics (e.g. a GET request
    /// carries no body regardless of headers); when false the result is
    /// always [`BodySize::Empty`].
    pub fn negotiate(headers: &HeaderMap, version: Version, allows_body: bool) -> Result<BodySize, TransportError> {
        if !allows_body {
            return Ok(BodySize::Empty);
        }

        if is_chunked(headers.get(http::header::TRANSFER_ENCODING)) {
            return Ok(BodySize::Chunked);
        }

        if let Some(value) = headers.get(http::header::CONTENT_LENGTH) {
            let text = value
                .to_str()
                .map_err(|_| TransportError::invalid_content_length("value is not visible ascii"))?;
            let length = text
                .trim()
                .parse::<u64>()
                .map_err(|_| TransportError::invalid_content_length(format!("value {text} is not u64")))?;

            return if length > 0 { Ok(BodySize::Length(length)) } else { Ok(BodySize::Empty) };
        }

        // no content-length and not chunked: only HTTP/1.0 may still carry
        // a body, delimited by connection close
        if version == Version::HTTP_10 { Ok(BodySize::UntilClose) } else { Ok(BodySize::Empty) }
    }

    /// Returns the advertised length, or `None` for chunked/until-close
    /// framing where no fixed length exists.
    #[inline]
    pub fn content_length(&self) -> Option<u64> {
        match self {
            BodySize::Length(length) => Some(*length),
            BodySize::Empty => Some(0),
            BodySize::Chunked | BodySize::UntilClose => None,
        }
    }

    /// Returns true if the body uses chunked transfer encoding
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, BodySize::Chunked)
    }

    /// Returns true if there is no body to read
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, BodySize::Empty)
    }
}

/// Checks if the Transfer-Encoding header value ends with `chunked`.
///
/// Per RFC 9112, chunked must be the final encoding when present; anything
/// else leaves the message without chunked framing.
fn is_chunked(header_value: Option<&HeaderValue>) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    if let Some(value) = header_value {
        if let Some(last) = value.as_bytes().rsplit(|b| *b == b',').next() {
            return last.trim_ascii() == CHUNKED;
        }
    }
    false
}
