//! Server configuration.
//!
//! A [`ServerConfig`] is a plain value. Build one, chain the `with_*`
//! setters you care about, and hand it to [`Server::new`](crate::Server::new).
//! After that the configuration is immutable; nothing re-reads it from
//! the environment and nothing can change it mid-flight.

use std::net::SocketAddr;
use std::sync::Arc;

use gust_codec::{CodecFactory, CompactCodecFactory};

use crate::handler::RequestHandler;
use crate::metrics::{MetricsSink, NoopSink};

/// Default capacity of the ingestion queue, in packets.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 2048;

/// Default per-datagram buffer capacity, in bytes. Covers the largest
/// possible UDP payload.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 65536;

/// Configuration for a [`Server`](crate::Server).
#[derive(Clone)]
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) concurrency: usize,
    pub(crate) max_queue_size: usize,
    pub(crate) max_packet_size: usize,
    pub(crate) inbound_codecs: Arc<dyn CodecFactory>,
    pub(crate) outbound_codecs: Arc<dyn CodecFactory>,
    pub(crate) handler: Option<Arc<dyn RequestHandler>>,
    pub(crate) metrics: Arc<dyn MetricsSink>,
}

impl ServerConfig {
    /// Creates a configuration for a server listening on `bind_addr`.
    ///
    /// Defaults: one worker per CPU, a queue of
    /// [`DEFAULT_MAX_QUEUE_SIZE`] packets, buffers of
    /// [`DEFAULT_MAX_PACKET_SIZE`] bytes, the compact codec on both
    /// directions, no metrics sink and no handler. A handler must be
    /// set before the server can open.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            concurrency: num_cpus::get(),
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            inbound_codecs: Arc::new(CompactCodecFactory),
            outbound_codecs: Arc::new(CompactCodecFactory),
            handler: None,
            metrics: Arc::new(NoopSink),
        }
    }

    /// Sets the request handler invoked for every accepted datagram.
    pub fn with_handler(mut self, handler: Arc<dyn RequestHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Sets how many worker tasks process packets. Zero keeps the
    /// current value.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        if concurrency != 0 {
            self.concurrency = concurrency;
        }
        self
    }

    /// Sets the ingestion queue capacity in packets. Zero keeps the
    /// current value.
    pub fn with_max_queue_size(mut self, packets: usize) -> Self {
        if packets != 0 {
            self.max_queue_size = packets;
        }
        self
    }

    /// Sets the receive buffer capacity in bytes. Datagrams longer than
    /// this are silently truncated by the socket. Zero keeps the
    /// current value.
    pub fn with_max_packet_size(mut self, bytes: usize) -> Self {
        if bytes != 0 {
            self.max_packet_size = bytes;
        }
        self
    }

    /// Sets the codec factories for the inbound and outbound direction.
    pub fn with_codec_factories(
        mut self,
        inbound: Arc<dyn CodecFactory>,
        outbound: Arc<dyn CodecFactory>,
    ) -> Self {
        self.inbound_codecs = inbound;
        self.outbound_codecs = outbound;
        self
    }

    /// Sets the sink that receives metric updates.
    pub fn with_metrics(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = sink;
        self
    }

    /// The address the server will bind to.
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Number of worker tasks.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Ingestion queue capacity in packets.
    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    /// Receive buffer capacity in bytes.
    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("concurrency", &self.concurrency)
            .field("max_queue_size", &self.max_queue_size)
            .field("max_packet_size", &self.max_packet_size)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = ServerConfig::new(addr());
        assert!(config.concurrency() >= 1);
        assert_eq!(config.max_queue_size(), DEFAULT_MAX_QUEUE_SIZE);
        assert_eq!(config.max_packet_size(), DEFAULT_MAX_PACKET_SIZE);
        assert!(config.handler.is_none());
    }

    #[test]
    fn setters_override_defaults() {
        let config = ServerConfig::new(addr())
            .with_concurrency(3)
            .with_max_queue_size(16)
            .with_max_packet_size(1500);
        assert_eq!(config.concurrency(), 3);
        assert_eq!(config.max_queue_size(), 16);
        assert_eq!(config.max_packet_size(), 1500);
    }

    #[test]
    fn zero_values_keep_previous_settings() {
        let config = ServerConfig::new(addr())
            .with_concurrency(2)
            .with_max_queue_size(8)
            .with_concurrency(0)
            .with_max_queue_size(0)
            .with_max_packet_size(0);
        assert_eq!(config.concurrency(), 2);
        assert_eq!(config.max_queue_size(), 8);
        assert_eq!(config.max_packet_size(), DEFAULT_MAX_PACKET_SIZE);
    }
}
