//! Error types for the datagram server.
//!
//! Only lifecycle operations surface errors to the caller. Everything
//! that goes wrong per-packet (read failures, undecodable datagrams,
//! handler failures) is counted in [`crate::MetricsSnapshot`] and
//! absorbed, because a datagram server has no one to report to.
//!
//! ## Error Cases
//! - `HandlerRequired`: `open` was called without a request handler
//!   configured.
//! - `Bind`: The UDP socket could not be bound to the requested
//!   address.
//! - `Cancelled`: `serve` stopped because its shutdown token fired or
//!   the server was closed.

use std::net::SocketAddr;

/// Unified error type for server lifecycle operations.
#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    /// No request handler was configured before `open`.
    #[error("no request handler configured")]
    HandlerRequired,

    /// Binding the UDP socket failed.
    #[error("failed to bind udp socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// `serve` was stopped by cancellation or by `close`.
    #[error("serve loop cancelled")]
    Cancelled,
}
