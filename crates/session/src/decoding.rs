//! Content decoding for intercepted bodies.
//!
//! Interception code wants to see what a message actually says, so bodies
//! are decompressed transparently before they are cached. The selector maps
//! a content-encoding token to a strategy; an empty or unrecognized token
//! maps to the identity strategy, which passes bytes through unchanged and
//! never fails. A recognized encoding whose decoder rejects its input is a
//! hard error — compressed bytes are never substituted for the real body
//! silently.

use std::io;
use std::io::Read;

use bytes::Bytes;
use thiserror::Error;

/// A recognized encoding's decoder rejected its input.
#[derive(Debug, Error)]
#[error("{encoding} body failed to decompress: {source}")]
pub struct DecodeError {
    encoding: &'static str,
    #[source]
    source: io::Error,
}

impl DecodeError {
    fn new(encoding: &'static str, source: io::Error) -> Self {
        Self { encoding, source }
    }
}

/// The decompression strategy selected for one message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentDecoder {
    /// Pass-through for plain, empty-token or unrecognized encodings
    Identity,
    /// Gzip encoding
    Gzip,
    /// Deflate encoding (zlib-wrapped per RFC 9110)
    Deflate,
    /// Brotli encoding
    Br,
    /// Zstd encoding
    Zstd,
}

impl ContentDecoder {
    /// Selects the strategy for a content-encoding token.
    pub fn select(token: &str) -> Self {
        match token.trim() {
            t if t.eq_ignore_ascii_case("gzip") => Self::Gzip,
            t if t.eq_ignore_ascii_case("deflate") => Self::Deflate,
            t if t.eq_ignore_ascii_case("br") => Self::Br,
            t if t.eq_ignore_ascii_case("zstd") => Self::Zstd,
            _ => Self::Identity,
        }
    }

    /// Returns the name of the encoding.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
            Self::Br => "br",
            Self::Zstd => "zstd",
        }
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// Maps compressed bytes to decompressed bytes.
    ///
    /// The identity strategy returns its input untouched.
    pub fn decode(&self, data: Bytes) -> Result<Bytes, DecodeError> {
        match self {
            Self::Identity => Ok(data),

            Self::Gzip => {
                let mut decompressed = Vec::new();
                flate2::read::GzDecoder::new(&data[..])
                    .read_to_end(&mut decompressed)
                    .map_err(|e| DecodeError::new("gzip", e))?;
                Ok(Bytes::from(decompressed))
            }

            Self::Deflate => {
                let mut decompressed = Vec::new();
                flate2::read::ZlibDecoder::new(&data[..])
                    .read_to_end(&mut decompressed)
                    .map_err(|e| DecodeError::new("deflate", e))?;
                Ok(Bytes::from(decompressed))
            }

            Self::Br => {
                let mut decompressed = Vec::new();
                brotli::BrotliDecompress(&mut io::Cursor::new(&data[..]), &mut decompressed)
                    .map_err(|e| DecodeError::new("br", e))?;
                Ok(Bytes::from(decompressed))
            }

            Self::Zstd => {
                let decompressed = zstd::stream::decode_all(&data[..]).map_err(|e| DecodeError::new("zstd", e))?;
                Ok(Bytes::from(decompressed))
            }
        }
    }
}
