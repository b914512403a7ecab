//! Error types for the wire protocol layer.
//!
//! This module defines the central `CodecError` enum, which captures every
//! way a datagram can fail to decode into an [`Envelope`](crate::Envelope)
//! or an envelope can fail to encode. Datagrams arrive from untrusted
//! peers, so every decode path reports a typed error instead of panicking.
//!
//! ## Error Cases
//! - `Truncated`: The buffer ended before a field was fully read.
//! - `InvalidKind`: The message kind byte is not a known variant.
//! - `MethodNotUtf8`: The method name bytes are not valid UTF-8.
//! - `Oversize`: A length or sequence value exceeds the encodable range.

pub type Result<T> = core::result::Result<T, CodecError>;

/// Unified error type for envelope encoding and decoding.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer ran out before the current field was complete.
    #[error("truncated message: field needs {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// The leading kind byte does not map to a [`MessageKind`](crate::MessageKind).
    #[error("invalid message kind byte: {0:#04x}")]
    InvalidKind(u8),

    /// The method name field is not valid UTF-8.
    #[error("method name is not valid utf-8")]
    MethodNotUtf8(#[from] core::str::Utf8Error),

    /// A varint value does not fit the field it was read for, or a length
    /// exceeds the largest encodable varint.
    #[error("value {0} exceeds the encodable range")]
    Oversize(u64),
}
