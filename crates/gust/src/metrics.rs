//! Instance-scoped server metrics.
//!
//! Every server owns its own counters, so two servers in one process
//! never pollute each other's numbers. Updates are also forwarded to a
//! caller-supplied [`MetricsSink`] under stable dotted names, which is
//! the integration point for whatever telemetry pipeline the embedding
//! application runs.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Gauge name: entries sitting in the ingestion queue right now.
pub const METRIC_QUEUE_SIZE: &str = "gust.server.queue_size";
/// Gauge name: size in bytes of the most recently received datagram.
pub const METRIC_PACKET_SIZE: &str = "gust.server.packet_size";
/// Counter name: packets accepted into the ingestion queue.
pub const METRIC_PACKETS_PROCESSED: &str = "gust.server.packets.processed";
/// Counter name: packets discarded because the queue was full.
pub const METRIC_PACKETS_DROPPED: &str = "gust.server.packets.dropped";
/// Counter name: failed socket reads.
pub const METRIC_READ_ERRORS: &str = "gust.server.read.errors";
/// Counter name: request handler invocations that returned an error.
pub const METRIC_HANDLER_ERRORS: &str = "gust.server.handler.errors";

/// Destination for metric updates.
///
/// Implementations must be cheap and non-blocking; updates happen on
/// the packet hot path.
pub trait MetricsSink: Send + Sync {
    /// Adds `delta` to the counter registered under `name`.
    fn counter(&self, name: &'static str, delta: u64);

    /// Sets the gauge registered under `name` to `value`.
    fn gauge(&self, name: &'static str, value: i64);
}

/// A sink that discards every update. The default.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn counter(&self, _name: &'static str, _delta: u64) {}
    fn gauge(&self, _name: &'static str, _value: i64) {}
}

/// Point-in-time copy of one server's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Packets accepted into the ingestion queue.
    pub packets_processed: u64,
    /// Packets discarded because the queue was full.
    pub packets_dropped: u64,
    /// Failed socket reads.
    pub read_errors: u64,
    /// Handler invocations that returned an error.
    pub handler_errors: u64,
    /// Entries currently in flight between pump and workers.
    pub queue_depth: i64,
}

/// Counters owned by a single server instance.
///
/// All methods take `&self`; the pump and every worker update the same
/// instance through an `Arc`.
pub(crate) struct ServerMetrics {
    sink: Arc<dyn MetricsSink>,
    packets_processed: AtomicU64,
    packets_dropped: AtomicU64,
    read_errors: AtomicU64,
    handler_errors: AtomicU64,
    queue_depth: AtomicI64,
}

impl ServerMetrics {
    pub(crate) fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            sink,
            packets_processed: AtomicU64::new(0),
            packets_dropped: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
            handler_errors: AtomicU64::new(0),
            queue_depth: AtomicI64::new(0),
        }
    }

    /// Records the size of a freshly received datagram.
    pub(crate) fn packet_received(&self, bytes: usize) {
        self.sink.gauge(METRIC_PACKET_SIZE, bytes as i64);
    }

    /// Counts a packet accepted into the queue and grows the depth gauge.
    pub(crate) fn packet_enqueued(&self) {
        self.packets_processed.fetch_add(1, Ordering::Relaxed);
        self.sink.counter(METRIC_PACKETS_PROCESSED, 1);
        let depth = self.queue_depth.fetch_add(1, Ordering::Relaxed) + 1;
        self.sink.gauge(METRIC_QUEUE_SIZE, depth);
    }

    /// Counts a packet rejected by a full queue.
    pub(crate) fn packet_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
        self.sink.counter(METRIC_PACKETS_DROPPED, 1);
    }

    /// Counts a failed socket read.
    pub(crate) fn read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
        self.sink.counter(METRIC_READ_ERRORS, 1);
    }

    /// Counts a handler invocation that returned an error.
    pub(crate) fn handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
        self.sink.counter(METRIC_HANDLER_ERRORS, 1);
    }

    /// Shrinks the depth gauge after a worker finishes an entry.
    pub(crate) fn packet_finished(&self) {
        let depth = self.queue_depth.fetch_sub(1, Ordering::Relaxed) - 1;
        self.sink.gauge(METRIC_QUEUE_SIZE, depth);
    }

    /// Copies the current counter values.
    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_processed: self.packets_processed.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            queue_depth: self.queue_depth.load(Ordering::Relaxed),
        }
    }
}
