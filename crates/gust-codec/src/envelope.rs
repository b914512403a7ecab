//! Message envelope shared by clients and servers.

use bytes::Bytes;

use crate::CodecError;

/// Role of a message within an RPC exchange.
///
/// The discriminants are part of the wire format and never change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// A request that expects a reply.
    Call = 1,
    /// A successful response to a prior call.
    Reply = 2,
    /// A failure response to a prior call.
    Exception = 3,
    /// A request that expects no reply.
    Oneway = 4,
}

impl TryFrom<u8> for MessageKind {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageKind::Call),
            2 => Ok(MessageKind::Reply),
            3 => Ok(MessageKind::Exception),
            4 => Ok(MessageKind::Oneway),
            other => Err(CodecError::InvalidKind(other)),
        }
    }
}

/// One RPC message: the unit a single datagram carries.
///
/// The payload is opaque to the transport. Applications give it meaning,
/// the server only moves it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Target method name. Must be valid UTF-8 on the wire.
    pub method: String,
    /// Caller-chosen sequence number for correlating exchanges.
    pub seq: u32,
    /// Role of this message in the exchange.
    pub kind: MessageKind,
    /// Opaque application bytes. May be empty.
    pub payload: Bytes,
}

impl Envelope {
    /// Builds a [`MessageKind::Call`] envelope.
    pub fn call(method: impl Into<String>, seq: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            method: method.into(),
            seq,
            kind: MessageKind::Call,
            payload: payload.into(),
        }
    }

    /// Builds a [`MessageKind::Reply`] envelope.
    pub fn reply(method: impl Into<String>, seq: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            method: method.into(),
            seq,
            kind: MessageKind::Reply,
            payload: payload.into(),
        }
    }

    /// Builds a [`MessageKind::Oneway`] envelope.
    pub fn oneway(method: impl Into<String>, seq: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            method: method.into(),
            seq,
            kind: MessageKind::Oneway,
            payload: payload.into(),
        }
    }
}
