//! HTTP request head handling.
//!
//! This module wraps the standard `http::Request` type to represent the
//! head of an intercepted request: method, target URI, version and headers,
//! without any body attached. Header *line* parsing belongs to an external
//! parser; the [`From<httparse::Request>`] conversion is the boundary where
//! its output enters this crate.

use std::convert::Into;

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};

use crate::protocol::{BodySize, TransportError};

/// The head of an HTTP request.
///
/// Wraps a `http::Request<()>` to provide:
/// - Access to the method, URI, version and headers
/// - Body-permission semantics for the request method
/// - Framing negotiation for the request body
#[derive(Debug)]
pub struct RequestHead {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHead {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHead {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHead {
    /// Consumes the head and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Returns a reference to the request's HTTP method.
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    /// Returns a reference to the request's URI.
    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// Returns the request's HTTP version.
    pub fn version(&self) -> Version {
        self.inner.version()
    }

    /// Returns a reference to the request's headers.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Returns a mutable reference to the request's headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    /// Determines if this request's method permits a body.
    ///
    /// Returns false for methods whose semantics preclude a payload:
    /// - GET
    /// - HEAD
    /// - DELETE
    /// - OPTIONS
    /// - CONNECT
    /// - TRACE
    pub fn allows_body(&self) -> bool {
        !matches!(
            self.method(),
            &Method::GET | &Method::HEAD | &Method::DELETE | &Method::OPTIONS | &Method::CONNECT | &Method::TRACE
        )
    }

    /// Negotiates the body framing for this request from its headers.
    pub fn body_size(&self) -> Result<BodySize, TransportError> {
        BodySize::negotiate(self.headers(), self.version(), self.allows_body())
    }
}

/// Converts request parts into a RequestHead.
impl From<Parts> for RequestHead {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

/// Converts a bodyless request into a RequestHead.
impl From<Request<()>> for RequestHead {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

/// Converts a parsed HTTP request into a RequestHead.
///
/// This is the seam to the external header parser: its token-level output
/// becomes typed method, URI, version and headers here.
impl<'headers, 'buf> From<httparse::Request<'headers, 'buf>> for RequestHead {
    fn from(req: httparse::Request<'headers, 'buf>) -> Self {
        let mut builder = Request::builder()
            .method(req.method.unwrap())
            .uri(req.path.unwrap())
            .version(U8Wrapper(req.version.unwrap()).into());

        builder.headers_mut().unwrap().reserve(req.headers.len());
        for header in req.headers.iter() {
            builder = builder.header(header.name, header.value)
        }

        RequestHead { inner: builder.body(()).unwrap() }
    }
}

/// Helper struct for HTTP version conversion.
struct U8Wrapper(u8);

impl From<U8Wrapper> for Version {
    fn from(value: U8Wrapper) -> Self {
        match value.0 {
            1 => Version::HTTP_11,
            0 => Version::HTTP_10,
            // anything else is treated as pre-1.0
            _ => Version::HTTP_09,
        }
    }
}
