//! HTTP response head handling.
//!
//! The mirror of [`super::request`] for the server side of an exchange.
//! Unlike a request, a response's body permission depends on its status
//! code rather than a method token.

use http::response::Parts;
use http::{HeaderMap, Response, StatusCode, Version};

use crate::protocol::{BodySize, TransportError};

/// The head of an HTTP response.
///
/// Wraps a `http::Response<()>`; the status line's reason phrase is the
/// canonical one for the status code.
#[derive(Debug)]
pub struct ResponseHead {
    inner: Response<()>,
}

impl AsRef<Response<()>> for ResponseHead {
    fn as_ref(&self) -> &Response<()> {
        &self.inner
    }
}

impl AsMut<Response<()>> for ResponseHead {
    fn as_mut(&mut self) -> &mut Response<()> {
        &mut self.inner
    }
}

impl ResponseHead {
    /// Consumes the head and returns the inner `Response<()>`.
    pub fn into_inner(self) -> Response<()> {
        self.inner
    }

    /// Returns the response's status code.
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    /// Returns the canonical reason phrase for the status code.
    pub fn reason(&self) -> Option<&'static str> {
        self.inner.status().canonical_reason()
    }

    /// Returns the response's HTTP version.
    pub fn version(&self) -> Version {
        self.inner.version()
    }

    /// Returns a reference to the response's headers.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Returns a mutable reference to the response's headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    /// Determines if this response's status permits a body.
    ///
    /// 1xx, 204 and 304 responses never carry one.
    pub fn allows_body(&self) -> bool {
        let status = self.status();
        !(status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED)
    }

    /// Negotiates the body framing for this response from its headers.
    pub fn body_size(&self) -> Result<BodySize, TransportError> {
        BodySize::negotiate(self.headers(), self.version(), self.allows_body())
    }
}

/// Converts response parts into a ResponseHead.
impl From<Parts> for ResponseHead {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Response::from_parts(parts, ()) }
    }
}

/// Converts a bodyless response into a ResponseHead.
impl From<Response<()>> for ResponseHead {
    #[inline]
    fn from(inner: Response<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_reason() {
        let head: ResponseHead = Response::builder().status(404).body(()).unwrap().into();
        assert_eq!(head.status(), StatusCode::NOT_FOUND);
        assert_eq!(head.reason(), Some("Not Found"));
    }

    #[test]
    fn no_content_has_no_body() {
        let head: ResponseHead = Response::builder().status(204).body(()).unwrap().into();
        assert!(!head.allows_body());
        assert_eq!(head.body_size().unwrap(), BodySize::Empty);
    }

    #[test]
    fn http10_response_reads_until_close() {
        let mut response = Response::builder().status(200).body(()).unwrap();
        *response.version_mut() = Version::HTTP_10;
        let head: ResponseHead = response.into();
        assert_eq!(head.body_size().unwrap(), BodySize::UntilClose);
    }

    #[test]
    fn chunked_response_framing() {
        let head: ResponseHead = Response::builder()
            .status(200)
            .header("transfer-encoding", "chunked")
            .body(())
            .unwrap()
            .into();
        assert_eq!(head.body_size().unwrap(), BodySize::Chunked);
    }
}
