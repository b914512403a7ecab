//! Growable in-memory byte transport backing every codec.
//!
//! A transport is a byte queue with two roles: a decoder consumes bytes
//! from the front, an encoder appends bytes to the back. A server feeds
//! one received datagram into a transport with [`MemoryTransport::fill`]
//! and hands the codec to a request handler. Pooled transports are wiped
//! with [`MemoryTransport::reset`] before reuse so no bytes ever leak
//! between requests.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::CodecError;

/// Byte buffer with cursor semantics for codec reads and writes.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    buf: BytesMut,
}

impl MemoryTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty transport with `capacity` bytes preallocated.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Appends raw bytes to the back of the transport.
    pub fn fill(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of unread bytes currently buffered.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Whether all buffered bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discards all buffered bytes while keeping the allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Removes and returns every buffered byte.
    ///
    /// Clients use this to pull an encoded message off the transport for
    /// sending.
    pub fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Consumes one byte from the front.
    pub fn get_u8(&mut self) -> Result<u8, CodecError> {
        if self.buf.is_empty() {
            return Err(CodecError::Truncated {
                needed: 1,
                available: 0,
            });
        }
        Ok(self.buf.get_u8())
    }

    /// Consumes `n` bytes from the front.
    pub fn get_bytes(&mut self, n: usize) -> Result<Bytes, CodecError> {
        if self.buf.len() < n {
            return Err(CodecError::Truncated {
                needed: n,
                available: self.buf.len(),
            });
        }
        Ok(self.buf.split_to(n).freeze())
    }

    /// Appends one byte to the back.
    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Appends a slice to the back.
    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}
