//! One client exchange, as seen by interception code.
//!
//! A [`Session`] is created per client request/response exchange and moves
//! through a strict window sequence: request accessors are valid only
//! before the request is committed to the wire, response accessors only
//! after. The transitions are explicit, checked functions; nothing flips a
//! lock flag as a side effect of an unrelated accessor.
//!
//! All operations on one session are sequential — there is no internal
//! synchronization because no two operations on the same session ever run
//! concurrently. Sessions share nothing with each other.

use std::time::SystemTime;

use bytes::Bytes;
use http::{Response, StatusCode, header};
use tokio::io::AsyncRead;
use tracing::debug;

use waylay_http::protocol::ResponseHead;
use waylay_http::reader::BodyReader;

use crate::decoding::ContentDecoder;
use crate::error::SessionError;
use crate::message::{InterceptedRequest, InterceptedResponse};

/// Lifecycle of one exchange.
///
/// `Fresh` → `RequestLocked` → `ResponseInstalled` → `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Request still mutable; request-body accessors permitted
    Fresh,
    /// Request irrevocably committed (sent upstream or short-circuited)
    RequestLocked,
    /// A response, real or synthetic, is attached
    ResponseInstalled,
    /// Terminal; no operation is valid
    Complete,
}

/// The paired request/response of one exchange plus the server-facing
/// transport.
///
/// The response slot is replaced wholesale when a synthetic response is
/// installed, not mutated in place.
#[derive(Debug)]
pub struct WebSession<S> {
    request: InterceptedRequest,
    response: Option<InterceptedResponse>,
    server: BodyReader<S>,
}

impl<S> WebSession<S>
where
    S: AsyncRead + Unpin,
{
    pub fn new(request: InterceptedRequest, server_io: S) -> Self {
        Self { request, response: None, server: BodyReader::new(server_io) }
    }

    pub fn request(&self) -> &InterceptedRequest {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut InterceptedRequest {
        &mut self.request
    }

    pub fn response(&self) -> Option<&InterceptedResponse> {
        self.response.as_ref()
    }

    pub fn response_mut(&mut self) -> Option<&mut InterceptedResponse> {
        self.response.as_mut()
    }

    /// The server-facing reader, for the forwarding collaborator.
    pub fn server_reader(&mut self) -> &mut BodyReader<S> {
        &mut self.server
    }

    fn set_response(&mut self, response: InterceptedResponse) {
        self.response = Some(response);
    }

    /// Fetches the response body from the server stream if it has not been
    /// read yet, decompresses it per the response's content-encoding, and
    /// caches it on the response.
    async fn read_response_body(&mut self) -> Result<(), SessionError> {
        let Some(response) = self.response.as_mut() else {
            return Err(SessionError::state("no response has been attached to the exchange"));
        };

        if response.body_read() {
            return Ok(());
        }

        let raw = self.server.read(response.body_size()).await?;
        let body = ContentDecoder::select(response.content_encoding()).decode(raw)?;
        response.install_wire_body(body);
        Ok(())
    }

    /// Consumes and discards the response body from the server stream if
    /// it has not been read yet.
    async fn drain_unread_response(&mut self) -> Result<(), SessionError> {
        let Some(response) = self.response.as_ref() else {
            return Err(SessionError::state("no response has been attached to the exchange"));
        };

        if !response.body_read() {
            self.server.drain(response.body_size()).await?;
        }
        Ok(())
    }
}

/// The unit handed to interception code: one [`WebSession`] plus the
/// client-facing transport.
///
/// The session borrows nothing across exchanges; it is created when a
/// client exchange begins and dropped when the exchange completes or the
/// connection goes away.
#[derive(Debug)]
pub struct Session<C, S> {
    client: BodyReader<C>,
    web: WebSession<S>,
    state: SessionState,
}

impl<C, S> Session<C, S>
where
    C: AsyncRead + Unpin,
    S: AsyncRead + Unpin,
{
    pub fn new(client_io: C, web: WebSession<S>) -> Self {
        Self { client: BodyReader::new(client_io), web, state: SessionState::Fresh }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn web(&self) -> &WebSession<S> {
        &self.web
    }

    pub fn web_mut(&mut self) -> &mut WebSession<S> {
        &mut self.web
    }

    pub fn request(&self) -> &InterceptedRequest {
        self.web.request()
    }

    pub fn request_mut(&mut self) -> &mut InterceptedRequest {
        self.web.request_mut()
    }

    pub fn response(&self) -> Option<&InterceptedResponse> {
        self.web.response()
    }

    /// The client-facing reader, for the transport layer.
    pub fn client_reader(&mut self) -> &mut BodyReader<C> {
        &mut self.client
    }

    // ---- state machine ----

    /// Commits the request: it has been (or is about to be) sent upstream,
    /// or superseded by a synthetic response. Idempotent once committed.
    pub fn lock_request(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Fresh => {
                self.web.request_mut().mark_locked();
                self.state = SessionState::RequestLocked;
                debug!("request locked");
                Ok(())
            }
            SessionState::RequestLocked | SessionState::ResponseInstalled => Ok(()),
            SessionState::Complete => Err(SessionError::state("session is complete")),
        }
    }

    /// Attaches the response populated by the forwarding collaborator.
    pub fn attach_response(&mut self, response: InterceptedResponse) -> Result<(), SessionError> {
        match self.state {
            SessionState::Fresh => {
                Err(SessionError::state("too early: no response can be attached before the request is committed"))
            }
            SessionState::Complete => Err(SessionError::state("session is complete")),
            SessionState::RequestLocked | SessionState::ResponseInstalled => {
                self.web.set_response(response);
                self.state = SessionState::ResponseInstalled;
                debug!("response attached");
                Ok(())
            }
        }
    }

    /// Tears the exchange down. Terminal: both messages are locked and
    /// every subsequent accessor fails.
    pub fn complete(&mut self) {
        self.web.request_mut().mark_locked();
        if let Some(response) = self.web.response_mut() {
            response.mark_locked();
        }
        self.state = SessionState::Complete;
        debug!("session complete");
    }

    // ---- request body accessors ----

    /// Returns the request body, reading it from the client stream on
    /// first call and from the cache afterwards.
    ///
    /// Fails with a state error once the request is locked ("too late"),
    /// and with [`SessionError::BodyNotPresent`] for methods whose
    /// semantics preclude a body.
    pub async fn request_body(&mut self) -> Result<Bytes, SessionError> {
        self.ensure_request_window()?;

        if !self.web.request().body_read() {
            if !self.web.request().allows_body() {
                return Err(SessionError::body_not_present(self.web.request().method().clone()));
            }

            // always the client side, including the HTTP/1.0
            // read-until-close fallback
            let raw = self.client.read(self.web.request().body_size()).await?;
            let body = ContentDecoder::select(self.web.request().content_encoding()).decode(raw)?;
            self.web.request_mut().install_wire_body(body);
        }

        Ok(self.web.request().raw_body().cloned().unwrap_or_default())
    }

    /// Returns the request body decoded to text, memoized until the body
    /// is replaced. Same preconditions as [`Self::request_body`].
    pub async fn request_body_text(&mut self) -> Result<String, SessionError> {
        self.request_body().await?;
        Ok(self.web.request_mut().decoded_text().to_owned())
    }

    /// Replaces the request body. Fails once the request is locked.
    ///
    /// If the wire body has not been read yet it is drained first, so the
    /// client connection is not left holding unread bytes, then discarded.
    /// The content-length advertised by the request is recomputed from the
    /// new bytes (or stays unadvertised for chunked framing).
    pub async fn set_request_body(&mut self, body: impl Into<Bytes>) -> Result<(), SessionError> {
        self.ensure_request_window()?;

        if !self.web.request().body_read() {
            self.client.drain(self.web.request().body_size()).await?;
        }

        self.web.request_mut().replace_body(body.into());
        Ok(())
    }

    /// Encodes `text` as UTF-8 and replaces the request body with it.
    pub async fn set_request_body_text(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        self.set_request_body(Bytes::from(text.into())).await
    }

    // ---- response body accessors ----

    /// Returns the response body, reading it from the server stream on
    /// first call and from the cache afterwards.
    ///
    /// Fails with a state error while the request is still unlocked ("too
    /// early: no response exists until the request has been sent").
    pub async fn response_body(&mut self) -> Result<Bytes, SessionError> {
        self.ensure_response_window()?;
        self.web.read_response_body().await?;
        Ok(self.web.response().and_then(InterceptedResponse::raw_body).cloned().unwrap_or_default())
    }

    /// Returns the response body decoded to text, memoized until the body
    /// is replaced. Same preconditions as [`Self::response_body`].
    pub async fn response_body_text(&mut self) -> Result<String, SessionError> {
        self.ensure_response_window()?;
        self.web.read_response_body().await?;
        match self.web.response_mut() {
            Some(response) => Ok(response.decoded_text().to_owned()),
            None => Err(SessionError::state("no response has been attached to the exchange")),
        }
    }

    /// Replaces the response body, draining the unread wire body first.
    /// Same preconditions as [`Self::response_body`].
    pub async fn set_response_body(&mut self, body: impl Into<Bytes>) -> Result<(), SessionError> {
        self.ensure_response_window()?;
        self.web.drain_unread_response().await?;
        match self.web.response_mut() {
            Some(response) => {
                response.replace_body(body.into());
                Ok(())
            }
            None => Err(SessionError::state("no response has been attached to the exchange")),
        }
    }

    /// Encodes `text` as UTF-8 and replaces the response body with it.
    pub async fn set_response_body_text(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        self.set_response_body(Bytes::from(text.into())).await
    }

    // ---- short-circuit responder ----

    /// Installs `response` as this exchange's response, locking the
    /// request and marking the response locked and already read. Writing
    /// it to the client is the forwarding collaborator's job.
    pub fn respond(&mut self, mut response: InterceptedResponse) -> Result<(), SessionError> {
        if self.state == SessionState::Complete {
            return Err(SessionError::state("session is complete"));
        }

        self.lock_request()?;
        response.mark_locked();
        response.mark_body_read();
        self.web.set_response(response);
        self.state = SessionState::ResponseInstalled;
        debug!("synthetic response installed");
        Ok(())
    }

    /// Short-circuits the exchange with a 200 response carrying `body`,
    /// and flags the request so the origin server is never contacted.
    pub fn ok(&mut self, body: impl Into<Bytes>) -> Result<(), SessionError> {
        let mut response = synthetic_response(StatusCode::OK, None)?;
        response.replace_body(body.into());
        self.respond(response)?;
        self.web.request_mut().set_cancel_upstream();
        Ok(())
    }

    /// Short-circuits the exchange with a 200 text response.
    ///
    /// The body is encoded as UTF-8 and advertised as such, so the
    /// declared and actual encodings always agree.
    pub fn ok_text(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        let mut response = synthetic_response(StatusCode::OK, Some(mime::TEXT_PLAIN_UTF_8.as_ref()))?;
        response.replace_body(Bytes::from(text.into()));
        self.respond(response)?;
        self.web.request_mut().set_cancel_upstream();
        Ok(())
    }

    /// Short-circuits the exchange with an empty-bodied redirect to `url`.
    pub fn redirect(&mut self, url: &str) -> Result<(), SessionError> {
        let mut response = synthetic_response(StatusCode::FOUND, None)?;
        let location = url
            .parse::<http::HeaderValue>()
            .map_err(|_| SessionError::state("redirect target is not a valid header value"))?;
        response.insert_header(header::LOCATION, location)?;
        response.replace_body(Bytes::new());
        self.respond(response)?;
        self.web.request_mut().set_cancel_upstream();
        Ok(())
    }

    // ---- windows ----

    fn ensure_request_window(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Fresh => Ok(()),
            SessionState::Complete => Err(SessionError::state("session is complete")),
            SessionState::RequestLocked | SessionState::ResponseInstalled => {
                Err(SessionError::state("too late: the request has already been committed"))
            }
        }
    }

    fn ensure_response_window(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Fresh => {
                Err(SessionError::state("too early: no response exists until the request has been committed"))
            }
            SessionState::Complete => Err(SessionError::state("session is complete")),
            SessionState::RequestLocked | SessionState::ResponseInstalled => Ok(()),
        }
    }
}

/// Builds a minimal synthetic response head: status, `Date`, and an
/// optional content type.
fn synthetic_response(status: StatusCode, content_type: Option<&str>) -> Result<InterceptedResponse, SessionError> {
    let mut builder = Response::builder().status(status).header(header::DATE, httpdate::fmt_http_date(SystemTime::now()));
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }

    let head: ResponseHead = builder.body(()).expect("statically valid response head").into();
    Ok(InterceptedResponse::new(head)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, Request, Version};
    use std::io::Write;
    use waylay_http::protocol::{BodySize, RequestHead};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn request_head(method: Method, headers: &[(&str, &str)]) -> RequestHead {
        let mut builder = Request::builder().method(method).uri("/resource");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into()
    }

    fn session(
        method: Method,
        headers: &[(&str, &str)],
        client_wire: &'static [u8],
        server_wire: &'static [u8],
    ) -> Session<&'static [u8], &'static [u8]> {
        init_tracing();
        let request = InterceptedRequest::new(request_head(method, headers)).unwrap();
        Session::new(client_wire, WebSession::new(request, server_wire))
    }

    fn response(status: u16, headers: &[(&str, &str)]) -> InterceptedResponse {
        let mut builder = Response::builder().status(status);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        InterceptedResponse::new(builder.body(()).unwrap().into()).unwrap()
    }

    #[tokio::test]
    async fn request_body_is_read_once_and_cached() {
        let mut session = session(Method::POST, &[("content-length", "13")], b"Hello, world!", b"");

        let first = session.request_body().await.unwrap();
        assert_eq!(&first[..], b"Hello, world!");

        // the client stream is exhausted; a second wire read would fail
        let second = session.request_body().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn chunked_request_body() {
        let mut session = session(
            Method::POST,
            &[("transfer-encoding", "chunked")],
            b"5\r\nhello\r\n6\r\nworld!\r\n0\r\n\r\n",
            b"",
        );

        let body = session.request_body().await.unwrap();
        assert_eq!(&body[..], b"helloworld!");
    }

    #[tokio::test]
    async fn gzip_request_body_is_transparently_decompressed() {
        let mut compressed = Vec::new();
        let mut encoder = flate2::write::GzEncoder::new(&mut compressed, flate2::Compression::default());
        encoder.write_all(b"secret payload").unwrap();
        encoder.finish().unwrap();
        let wire: &'static [u8] = compressed.leak();

        let length = wire.len().to_string();
        let request = InterceptedRequest::new(request_head(
            Method::POST,
            &[("content-length", length.as_str()), ("content-encoding", "gzip")],
        ))
        .unwrap();
        let mut session = Session::new(wire, WebSession::new(request, &b""[..]));

        let body = session.request_body().await.unwrap();
        assert_eq!(&body[..], b"secret payload");
    }

    #[tokio::test]
    async fn premature_close_surfaces_as_transport_error() {
        let mut session = session(Method::POST, &[("content-length", "13")], b"Hello, wor", b"");

        let result = session.request_body().await;
        assert!(matches!(result, Err(SessionError::Transport { .. })));
    }

    #[tokio::test]
    async fn bodyless_method_cannot_be_read() {
        let mut session = session(Method::GET, &[], b"", b"");

        let result = session.request_body().await;
        assert!(matches!(result, Err(SessionError::BodyNotPresent { .. })));
    }

    #[tokio::test]
    async fn http10_fallback_reads_client_until_close() {
        let mut request = Request::builder().method(Method::POST).uri("/legacy").body(()).unwrap();
        *request.version_mut() = Version::HTTP_10;
        let request = InterceptedRequest::new(request.into()).unwrap();
        assert_eq!(request.body_size(), BodySize::UntilClose);

        let mut session = Session::new(&b"no framing at all"[..], WebSession::new(request, &b""[..]));
        let body = session.request_body().await.unwrap();
        assert_eq!(&body[..], b"no framing at all");
    }

    #[tokio::test]
    async fn locked_request_rejects_body_accessors() {
        let mut session = session(Method::POST, &[("content-length", "5")], b"hello", b"");
        session.lock_request().unwrap();

        assert!(matches!(session.request_body().await, Err(SessionError::ProtocolState { .. })));
        assert!(matches!(session.set_request_body(&b"x"[..]).await, Err(SessionError::ProtocolState { .. })));
    }

    #[tokio::test]
    async fn response_accessors_are_too_early_before_lock() {
        let mut session = session(Method::POST, &[("content-length", "5")], b"hello", b"");

        assert!(matches!(session.response_body().await, Err(SessionError::ProtocolState { .. })));
        assert!(matches!(session.set_response_body(&b"x"[..]).await, Err(SessionError::ProtocolState { .. })));
    }

    #[tokio::test]
    async fn replacement_recomputes_length_and_drains_the_wire() {
        let mut session =
            session(Method::POST, &[("transfer-encoding", "chunked")], b"5\r\nhello\r\n0\r\n\r\nNEXT", b"");

        session.set_request_body(&b"replacement"[..]).await.unwrap();

        let body = session.request_body().await.unwrap();
        assert_eq!(&body[..], b"replacement");
        // chunked framing advertises no fixed length
        assert_eq!(session.request().content_length(), None);
        // the unread wire body was consumed, leaving the client stream at
        // the next message
        assert_eq!(&session.client_reader().read_buffer()[..], b"NEXT");
    }

    #[tokio::test]
    async fn replacement_on_fixed_length_updates_the_header() {
        let mut session = session(Method::POST, &[("content-length", "5")], b"hello", b"");

        session.set_request_body(&b"a longer body"[..]).await.unwrap();
        assert_eq!(session.request().content_length(), Some(13));
        assert_eq!(session.request().headers().get("content-length").unwrap(), "13");
        assert_eq!(&session.request_body().await.unwrap()[..], b"a longer body");
    }

    #[tokio::test]
    async fn real_response_flow() {
        let mut session = session(Method::GET, &[], b"", b"Hello, world!");
        session.lock_request().unwrap();
        session.attach_response(response(200, &[("content-length", "13")])).unwrap();
        assert_eq!(session.state(), SessionState::ResponseInstalled);

        let body = session.response_body().await.unwrap();
        assert_eq!(&body[..], b"Hello, world!");

        session.set_response_body(&b"censored"[..]).await.unwrap();
        let replaced = session.response_body().await.unwrap();
        assert_eq!(&replaced[..], b"censored");
        assert_eq!(session.response().unwrap().content_length(), Some(8));
    }

    #[tokio::test]
    async fn response_text_is_memoized() {
        let mut session = session(Method::GET, &[], b"", b"Hello, world!");
        session.lock_request().unwrap();
        session.attach_response(response(200, &[("content-length", "13")])).unwrap();

        assert_eq!(session.response_body_text().await.unwrap(), "Hello, world!");
        assert_eq!(session.response_body_text().await.unwrap(), "Hello, world!");
    }

    #[tokio::test]
    async fn ok_short_circuits_without_touching_upstream() {
        // idle duplex streams: any wire read would hang the test
        let (client, _client_far) = tokio::io::duplex(64);
        let (server, _server_far) = tokio::io::duplex(64);
        let request = InterceptedRequest::new(request_head(Method::GET, &[])).unwrap();
        let mut session = Session::new(client, WebSession::new(request, server));

        session.ok(&b"hello"[..]).unwrap();

        assert_eq!(session.state(), SessionState::ResponseInstalled);
        assert!(session.request().is_locked());
        assert!(session.request().cancel_upstream());

        let response = session.response().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.is_locked());
        assert!(response.body_read());
        assert!(response.headers().contains_key("date"));
        assert_eq!(response.content_length(), Some(5));

        // served from the cache, not the wire
        let body = session.response_body().await.unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn ok_text_declares_utf8() {
        let mut session = session(Method::GET, &[], b"", b"");
        session.ok_text("hello").unwrap();

        let response = session.response().unwrap();
        assert_eq!(response.headers().get("content-type").unwrap(), "text/plain; charset=utf-8");
        assert_eq!(session.response_body_text().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn redirect_carries_location_and_empty_body() {
        let mut session = session(Method::GET, &[], b"", b"");
        session.redirect("https://example.com").unwrap();

        let response = session.response().unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get("location").unwrap(), "https://example.com");
        assert_eq!(response.content_length(), Some(0));
        assert!(session.request().cancel_upstream());
        assert!(session.response_body().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn complete_is_terminal() {
        let mut session = session(Method::POST, &[("content-length", "5")], b"hello", b"");
        session.complete();

        assert_eq!(session.state(), SessionState::Complete);
        assert!(matches!(session.request_body().await, Err(SessionError::ProtocolState { .. })));
        assert!(matches!(session.response_body().await, Err(SessionError::ProtocolState { .. })));
        assert!(session.lock_request().is_err());
        assert!(session.respond(response(200, &[])).is_err());
    }

    #[tokio::test]
    async fn locked_transition_happens_once() {
        let mut session = session(Method::GET, &[], b"", b"");
        session.lock_request().unwrap();
        assert_eq!(session.state(), SessionState::RequestLocked);
        // committing again is a no-op, not an error
        session.lock_request().unwrap();

        assert!(matches!(
            session.attach_response(response(204, &[])),
            Ok(())
        ));
    }

    #[tokio::test]
    async fn attach_before_lock_is_rejected() {
        let mut session = session(Method::GET, &[], b"", b"");
        assert!(session.attach_response(response(200, &[])).is_err());
    }
}
