//! The request handler boundary.

use gust_codec::{CodecError, MessageCodec};
use tokio_util::sync::CancellationToken;

/// Error returned by a request handler.
///
/// Handler failures never propagate past the worker that observed
/// them; the server counts the failure and keeps serving. The payload
/// is boxed so applications can surface whatever error type they
/// already have.
#[derive(thiserror::Error, Debug)]
#[error("request handler failed: {0}")]
pub struct HandlerError(#[source] pub Box<dyn std::error::Error + Send + Sync + 'static>);

impl HandlerError {
    /// Wraps any error value.
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> Self {
        Self(err.into())
    }
}

impl From<CodecError> for HandlerError {
    fn from(err: CodecError) -> Self {
        Self(Box::new(err))
    }
}

/// Application logic invoked once per accepted datagram.
///
/// The worker feeds the datagram bytes into `inbound` before the call,
/// so the usual first step is `inbound.decode()`. Anything encoded
/// into `outbound` stays in memory for the application's own delivery
/// path; the server itself never writes to the socket.
///
/// `shutdown` is the token governing the serve loop. Long-running
/// handlers can watch it to cut work short when the server is asked to
/// stop.
///
/// Handlers run concurrently on every worker, hence `Send + Sync`.
#[async_trait::async_trait]
pub trait RequestHandler: Send + Sync {
    /// Processes one datagram.
    async fn handle(
        &self,
        shutdown: &CancellationToken,
        inbound: &mut dyn MessageCodec,
        outbound: &mut dyn MessageCodec,
    ) -> Result<(), HandlerError>;
}
