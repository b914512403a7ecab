//! Codec traits that make the wire format a pluggable boundary.
//!
//! A server never names a concrete codec. It holds two
//! [`CodecFactory`] handles, one for the inbound direction and one for
//! the outbound direction, and builds pooled codec instances from them.
//! Each [`MessageCodec`] owns a private [`MemoryTransport`], so two
//! codec instances can never observe each other's bytes.

use crate::{Envelope, MemoryTransport, Result};

/// One directional codec bound to its own private transport.
///
/// Instances are stateful and not thread-safe. They are `Send` so a
/// pool can move them between workers, but only one worker drives an
/// instance at a time.
pub trait MessageCodec: Send {
    /// The transport this codec reads from and writes to.
    fn transport_mut(&mut self) -> &mut MemoryTransport;

    /// Decodes the next envelope from the transport.
    fn decode(&mut self) -> Result<Envelope>;

    /// Encodes `envelope` onto the transport.
    fn encode(&mut self, envelope: &Envelope) -> Result<()>;
}

/// Builds fresh codec instances for a pool to own.
pub trait CodecFactory: Send + Sync {
    /// Creates a new codec with an empty transport.
    fn build(&self) -> Box<dyn MessageCodec>;
}
