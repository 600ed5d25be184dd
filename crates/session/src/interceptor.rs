//! The contract between the proxy core and user-supplied interception
//! code.
//!
//! The plumbing that drives these callbacks (connection accept loop, TLS,
//! request forwarding) lives outside this crate; everything an
//! implementation can do happens through the [`Session`] it is handed.

use async_trait::async_trait;

use crate::error::SessionError;
use crate::session::Session;

/// Interception hooks for one exchange.
///
/// `on_request` runs while the session is still `Fresh`: the request may
/// be inspected, rewritten, or short-circuited with a synthetic response.
/// `on_response` runs after a response is attached: the response may be
/// inspected or rewritten before it is sent downstream. Both default to
/// doing nothing.
#[async_trait]
pub trait Interceptor<C, S>: Send + Sync
where
    C: Send,
    S: Send,
{
    async fn on_request(&self, _session: &mut Session<C, S>) -> Result<(), SessionError> {
        Ok(())
    }

    async fn on_response(&self, _session: &mut Session<C, S>) -> Result<(), SessionError> {
        Ok(())
    }
}

/// The forwarding collaborator's side of the contract.
///
/// Given a session whose request is not cancelled, an implementation sends
/// the request upstream and attaches the origin's response; given a
/// cancelled one, it writes the installed synthetic response back to the
/// client without contacting the origin.
#[async_trait]
pub trait Forwarder<C, S>: Send + Sync
where
    C: Send,
    S: Send,
{
    async fn forward(&self, session: &mut Session<C, S>) -> Result<(), SessionError>;
}
