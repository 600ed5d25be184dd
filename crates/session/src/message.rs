//! The cached message model for one intercepted exchange.
//!
//! A proxy sits between two parties that both believe they own the
//! conversation, so every intercepted message carries explicit state about
//! what has already happened to it: whether its body has been pulled off
//! the wire, what decoded form has been handed out, and whether the message
//! has been committed and may no longer be reshaped. The state is tagged
//! explicitly here rather than inferred from nullable fields at call sites.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Uri, Version};

use crate::error::SessionError;
use waylay_http::protocol::{BodySize, RequestHead, ResponseHead, TransportError};

/// Body cache and lock state shared by requests and responses.
///
/// Invariants:
/// - `raw_body` is populated at most once from the wire; replacement only
///   happens through [`replace`](Self::replace).
/// - `text_body` is a memoized decode of `raw_body` and is cleared on
///   every replacement.
/// - `body_read` distinguishes "not read yet" from "read and empty".
#[derive(Debug)]
struct MessageState {
    size: BodySize,
    content_encoding: String,
    raw_body: Option<Bytes>,
    text_body: Option<String>,
    body_read: bool,
    locked: bool,
}

impl MessageState {
    fn new(size: BodySize, content_encoding: String) -> Self {
        Self { size, content_encoding, raw_body: None, text_body: None, body_read: false, locked: false }
    }

    /// Stores a body fetched from the wire. First population only; the
    /// session layer guarantees the wire is read at most once.
    fn install(&mut self, bytes: Bytes) {
        self.raw_body = Some(bytes);
        self.body_read = true;
    }

    /// Installs replacement bytes, invalidating the memoized text form.
    fn replace(&mut self, bytes: Bytes) {
        self.raw_body = Some(bytes);
        self.text_body = None;
        self.body_read = true;
    }

    /// Decoded body is UTF-8 (lossy for other declared charsets); computed
    /// once and cached until the body is replaced.
    fn decoded_text(&mut self) -> &str {
        if self.text_body.is_none() {
            let raw = self.raw_body.as_deref().unwrap_or_default();
            self.text_body = Some(String::from_utf8_lossy(raw).into_owned());
        }
        self.text_body.as_deref().unwrap_or_default()
    }
}

/// Extracts the content-encoding token from a header map.
///
/// Multiple encodings are out of scope for the selector; the raw value is
/// carried as-is and unrecognized values fall through to the identity
/// strategy.
fn encoding_token(headers: &HeaderMap) -> String {
    headers
        .get(http::header::CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

/// Extracts the declared charset from a Content-Type header, if any.
fn charset_token(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(http::header::CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type.parse::<mime::Mime>().ok()?;
    mime.get_param(mime::CHARSET).map(|charset| charset.as_str().to_owned())
}

/// Performs the length/encoding bookkeeping of a body replacement against
/// a message's headers and framing.
///
/// A non-chunked message advertises the new byte length; a chunked one
/// keeps advertising no fixed length, since its terminator frames the
/// body. The replacement bytes are plain, so any content-encoding label
/// is dropped with them.
fn replace_bookkeeping(state: &mut MessageState, headers: &mut HeaderMap, bytes: Bytes) {
    if state.size.is_chunked() {
        headers.remove(http::header::CONTENT_LENGTH);
    } else {
        state.size = BodySize::Length(bytes.len() as u64);
        headers.insert(http::header::CONTENT_LENGTH, HeaderValue::from(bytes.len() as u64));
    }

    if !state.content_encoding.is_empty() {
        headers.remove(http::header::CONTENT_ENCODING);
        state.content_encoding.clear();
    }

    state.replace(bytes);
}

/// An intercepted client request.
#[derive(Debug)]
pub struct InterceptedRequest {
    head: RequestHead,
    state: MessageState,
    cancel_upstream: bool,
}

impl InterceptedRequest {
    /// Wraps a parsed request head, negotiating its body framing once.
    pub fn new(head: RequestHead) -> Result<Self, TransportError> {
        let size = head.body_size()?;
        let content_encoding = encoding_token(head.headers());
        Ok(Self { head, state: MessageState::new(size, content_encoding), cancel_upstream: false })
    }

    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    pub fn method(&self) -> &Method {
        self.head.method()
    }

    pub fn uri(&self) -> &Uri {
        self.head.uri()
    }

    pub fn version(&self) -> Version {
        self.head.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.head.headers()
    }

    pub fn body_size(&self) -> BodySize {
        self.state.size
    }

    /// Advertised body length; `None` while the framing defines no fixed
    /// length (chunked or read-until-close).
    pub fn content_length(&self) -> Option<u64> {
        self.state.size.content_length()
    }

    pub fn content_encoding(&self) -> &str {
        &self.state.content_encoding
    }

    pub fn charset(&self) -> Option<String> {
        charset_token(self.headers())
    }

    pub fn allows_body(&self) -> bool {
        self.head.allows_body()
    }

    pub fn is_locked(&self) -> bool {
        self.state.locked
    }

    pub fn body_read(&self) -> bool {
        self.state.body_read
    }

    /// True once a synthetic response was installed; tells the forwarding
    /// collaborator not to contact the origin server.
    pub fn cancel_upstream(&self) -> bool {
        self.cancel_upstream
    }

    pub fn raw_body(&self) -> Option<&Bytes> {
        self.state.raw_body.as_ref()
    }

    /// Replaces the request method. Fails once the request is locked.
    pub fn set_method(&mut self, method: Method) -> Result<(), SessionError> {
        self.ensure_unlocked()?;
        *self.head.as_mut().method_mut() = method;
        Ok(())
    }

    /// Replaces the target URI. Fails once the request is locked.
    pub fn set_uri(&mut self, uri: Uri) -> Result<(), SessionError> {
        self.ensure_unlocked()?;
        *self.head.as_mut().uri_mut() = uri;
        Ok(())
    }

    /// Inserts or overwrites a header. Fails once the request is locked.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), SessionError> {
        self.ensure_unlocked()?;
        self.head.headers_mut().insert(name, value);
        Ok(())
    }

    /// Removes a header. Fails once the request is locked.
    pub fn remove_header(&mut self, name: HeaderName) -> Result<Option<HeaderValue>, SessionError> {
        self.ensure_unlocked()?;
        Ok(self.head.headers_mut().remove(name))
    }

    fn ensure_unlocked(&self) -> Result<(), SessionError> {
        if self.state.locked {
            return Err(SessionError::state("request is locked and may no longer be mutated"));
        }
        Ok(())
    }

    pub(crate) fn mark_locked(&mut self) {
        self.state.locked = true;
    }

    pub(crate) fn set_cancel_upstream(&mut self) {
        self.cancel_upstream = true;
    }

    pub(crate) fn install_wire_body(&mut self, bytes: Bytes) {
        self.state.install(bytes);
    }

    pub(crate) fn replace_body(&mut self, bytes: Bytes) {
        let Self { head, state, .. } = self;
        replace_bookkeeping(state, head.headers_mut(), bytes);
    }

    pub(crate) fn decoded_text(&mut self) -> &str {
        self.state.decoded_text()
    }
}

/// An intercepted origin-server (or synthetic) response.
#[derive(Debug)]
pub struct InterceptedResponse {
    head: ResponseHead,
    state: MessageState,
}

impl InterceptedResponse {
    /// Wraps a response head, negotiating its body framing once.
    pub fn new(head: ResponseHead) -> Result<Self, TransportError> {
        let size = head.body_size()?;
        let content_encoding = encoding_token(head.headers());
        Ok(Self { head, state: MessageState::new(size, content_encoding) })
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn status(&self) -> StatusCode {
        self.head.status()
    }

    pub fn reason(&self) -> Option<&'static str> {
        self.head.reason()
    }

    pub fn version(&self) -> Version {
        self.head.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.head.headers()
    }

    pub fn body_size(&self) -> BodySize {
        self.state.size
    }

    pub fn content_length(&self) -> Option<u64> {
        self.state.size.content_length()
    }

    pub fn content_encoding(&self) -> &str {
        &self.state.content_encoding
    }

    pub fn charset(&self) -> Option<String> {
        charset_token(self.headers())
    }

    pub fn is_locked(&self) -> bool {
        self.state.locked
    }

    pub fn body_read(&self) -> bool {
        self.state.body_read
    }

    pub fn raw_body(&self) -> Option<&Bytes> {
        self.state.raw_body.as_ref()
    }

    /// Replaces the status code. Fails once the response is locked.
    pub fn set_status(&mut self, status: StatusCode) -> Result<(), SessionError> {
        self.ensure_unlocked()?;
        *self.head.as_mut().status_mut() = status;
        Ok(())
    }

    /// Inserts or overwrites a header. Fails once the response is locked.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) -> Result<(), SessionError> {
        self.ensure_unlocked()?;
        self.head.headers_mut().insert(name, value);
        Ok(())
    }

    /// Removes a header. Fails once the response is locked.
    pub fn remove_header(&mut self, name: HeaderName) -> Result<Option<HeaderValue>, SessionError> {
        self.ensure_unlocked()?;
        Ok(self.head.headers_mut().remove(name))
    }

    fn ensure_unlocked(&self) -> Result<(), SessionError> {
        if self.state.locked {
            return Err(SessionError::state("response is locked and may no longer be mutated"));
        }
        Ok(())
    }

    pub(crate) fn mark_locked(&mut self) {
        self.state.locked = true;
    }

    pub(crate) fn mark_body_read(&mut self) {
        self.state.body_read = true;
    }

    pub(crate) fn install_wire_body(&mut self, bytes: Bytes) {
        self.state.install(bytes);
    }

    pub(crate) fn replace_body(&mut self, bytes: Bytes) {
        let Self { head, state } = self;
        replace_bookkeeping(state, head.headers_mut(), bytes);
    }

    pub(crate) fn decoded_text(&mut self) -> &str {
        self.state.decoded_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    fn post_with_length(length: u64) -> InterceptedRequest {
        let head: RequestHead = Request::builder()
            .method(Method::POST)
            .uri("/submit")
            .header("content-length", length)
            .body(())
            .unwrap()
            .into();
        InterceptedRequest::new(head).unwrap()
    }

    #[test]
    fn replacement_recomputes_content_length() {
        let mut request = post_with_length(5);
        request.install_wire_body(Bytes::from_static(b"hello"));

        request.replace_body(Bytes::from_static(b"a longer body"));
        assert_eq!(request.content_length(), Some(13));
        assert_eq!(request.headers().get("content-length").unwrap(), "13");
        assert_eq!(request.raw_body().unwrap().as_ref(), b"a longer body");
    }

    #[test]
    fn chunked_replacement_advertises_no_length() {
        let head: RequestHead = Request::builder()
            .method(Method::POST)
            .uri("/submit")
            .header("transfer-encoding", "chunked")
            .body(())
            .unwrap()
            .into();
        let mut request = InterceptedRequest::new(head).unwrap();

        request.replace_body(Bytes::from_static(b"new body"));
        assert_eq!(request.content_length(), None);
        assert!(request.body_size().is_chunked());
        assert!(request.headers().get("content-length").is_none());
    }

    #[test]
    fn replacement_invalidates_text_cache_and_encoding() {
        let head: RequestHead = Request::builder()
            .method(Method::POST)
            .uri("/submit")
            .header("content-length", 5)
            .header("content-encoding", "gzip")
            .body(())
            .unwrap()
            .into();
        let mut request = InterceptedRequest::new(head).unwrap();
        assert_eq!(request.content_encoding(), "gzip");

        request.install_wire_body(Bytes::from_static(b"first"));
        assert_eq!(request.decoded_text(), "first");

        request.replace_body(Bytes::from_static(b"second"));
        assert_eq!(request.decoded_text(), "second");
        assert_eq!(request.content_encoding(), "");
        assert!(request.headers().get("content-encoding").is_none());
    }

    #[test]
    fn locked_request_rejects_structural_mutation() {
        let mut request = post_with_length(5);
        request.mark_locked();

        assert!(request.set_method(Method::PUT).is_err());
        assert!(request.set_uri("/elsewhere".parse().unwrap()).is_err());
        assert!(request.insert_header("x-extra".parse().unwrap(), "1".parse().unwrap()).is_err());
        assert!(request.remove_header("content-length".parse().unwrap()).is_err());
    }

    #[test]
    fn charset_comes_from_content_type() {
        let head: RequestHead = Request::builder()
            .method(Method::POST)
            .uri("/submit")
            .header("content-type", "text/html; charset=iso-8859-4")
            .body(())
            .unwrap()
            .into();
        let request = InterceptedRequest::new(head).unwrap();
        assert_eq!(request.charset().as_deref(), Some("iso-8859-4"));
    }

    #[test]
    fn empty_body_reads_as_empty_text() {
        let mut request = post_with_length(0);
        request.install_wire_body(Bytes::new());
        assert!(request.body_read());
        assert_eq!(request.decoded_text(), "");
    }

    #[test]
    fn locked_response_rejects_structural_mutation() {
        let head: ResponseHead = http::Response::builder().status(200).body(()).unwrap().into();
        let mut response = InterceptedResponse::new(head).unwrap();
        response.mark_locked();

        assert!(response.set_status(StatusCode::IM_A_TEAPOT).is_err());
        assert!(response.insert_header("x-extra".parse().unwrap(), "1".parse().unwrap()).is_err());
    }
}
