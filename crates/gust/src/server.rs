//! The datagram server: lifecycle, packet pump and worker coordination.
//!
//! A [`Server`] moves through three states: built, open, closed. `open`
//! binds the socket and builds every runtime resource. `serve` spawns
//! the workers and runs the packet pump on the calling task until its
//! shutdown token fires. `close` stops the pump, waits for it to exit,
//! then closes the ingestion queue and waits for every worker to drain
//! and exit. All transitions are serialized behind one lock, so the
//! three calls are safe to race from different tasks.
//!
//! The pump never blocks on a slow handler: when the queue is full the
//! packet is counted as dropped and its buffer goes straight back to
//! the pool. Under sustained overload drops grow while accepted
//! packets still flow, which is the intended failure mode for a
//! datagram transport.

use std::net::SocketAddr;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use gust_codec::MessageCodec;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::buffer::ReadBuf;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handler::RequestHandler;
use crate::metrics::{MetricsSnapshot, ServerMetrics};
use crate::pool::{ObjectPool, Pooled};
use crate::queue::IngestQueue;
use crate::transport::{DatagramTransport, UdpTransport};
use crate::worker::worker_loop;

/// Everything a running server owns. Built by `open`, torn down by
/// `close`.
struct Resources {
    transport: Arc<dyn DatagramTransport>,
    buffers: Arc<ObjectPool<ReadBuf>>,
    inbound_codecs: Arc<ObjectPool<Box<dyn MessageCodec>>>,
    outbound_codecs: Arc<ObjectPool<Box<dyn MessageCodec>>>,
    queue: Arc<IngestQueue<Pooled<ReadBuf>>>,
    metrics: Arc<ServerMetrics>,
    handler: Arc<dyn RequestHandler>,
    /// Fired by `close` so a running pump halts before the queue does.
    stop: CancellationToken,
    /// Tracks pumps running inside `serve`; `close` waits on it.
    pump_gate: Arc<PumpGate>,
    workers: Vec<JoinHandle<()>>,
}

enum State {
    Unopened,
    Open(Resources),
    Closed,
}

/// Counts the pumps currently running inside [`Server::serve`].
///
/// The queue's closed flag and its ring are separate structures, so a
/// push racing [`IngestQueue::close`] can still land. `close` therefore
/// waits here until every pump has exited before it closes the queue;
/// only then is it safe for the workers to treat closed-and-empty as
/// final.
struct PumpGate {
    live: AtomicUsize,
    exited: Notify,
}

impl PumpGate {
    fn new() -> Self {
        Self {
            live: AtomicUsize::new(0),
            exited: Notify::new(),
        }
    }

    /// Registers a live pump. Dropping the permit deregisters it.
    fn enter(self: &Arc<Self>) -> PumpPermit {
        self.live.fetch_add(1, Ordering::AcqRel);
        PumpPermit {
            gate: Arc::clone(self),
        }
    }

    /// Resolves once no pump is live; immediately when none ever ran.
    async fn all_exited(&self) {
        loop {
            if self.live.load(Ordering::Acquire) == 0 {
                return;
            }
            let mut exited = pin!(self.exited.notified());
            exited.as_mut().enable();
            // Re-check after registering so a permit dropped in
            // between cannot be missed.
            if self.live.load(Ordering::Acquire) == 0 {
                return;
            }
            exited.await;
        }
    }
}

struct PumpPermit {
    gate: Arc<PumpGate>,
}

impl Drop for PumpPermit {
    fn drop(&mut self) {
        self.gate.live.fetch_sub(1, Ordering::AcqRel);
        self.gate.exited.notify_waiters();
    }
}

/// A UDP server that feeds datagrams to a pool of request workers.
///
/// See the crate docs for the overall flow. The server is a passive
/// value: nothing runs until [`Server::serve`] is awaited.
pub struct Server {
    config: ServerConfig,
    state: Mutex<State>,
}

impl Server {
    /// Creates an unopened server from its configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::Unopened),
        }
    }

    /// Binds the UDP socket and builds the queue, pools and metrics.
    ///
    /// Idempotent: opening an already-open or closed server does
    /// nothing. Fails with [`ServerError::HandlerRequired`] when no
    /// handler was configured and [`ServerError::Bind`] when the socket
    /// cannot be bound.
    ///
    /// Must be called from within a Tokio runtime because the socket
    /// registers with the runtime's I/O driver.
    pub fn open(&self) -> Result<(), ServerError> {
        let mut state = self.state.lock();
        match &*state {
            State::Open(_) | State::Closed => return Ok(()),
            State::Unopened => {}
        }

        let handler = self
            .config
            .handler
            .clone()
            .ok_or(ServerError::HandlerRequired)?;

        let transport = UdpTransport::bind(self.config.bind_addr).map_err(|source| {
            ServerError::Bind {
                addr: self.config.bind_addr,
                source,
            }
        })?;

        // One buffer can sit in the pump, one in each worker and the
        // rest in the queue; size the idle list so a fully drained
        // server re-pools every buffer it ever handed out.
        let buffer_count = self.config.max_queue_size + self.config.concurrency + 1;
        let max_packet_size = self.config.max_packet_size;
        let buffers = Arc::new(ObjectPool::new(buffer_count, move || {
            ReadBuf::with_capacity(max_packet_size)
        }));

        let inbound = Arc::clone(&self.config.inbound_codecs);
        let inbound_codecs = Arc::new(ObjectPool::new(self.config.concurrency, move || {
            inbound.build()
        }));
        let outbound = Arc::clone(&self.config.outbound_codecs);
        let outbound_codecs = Arc::new(ObjectPool::new(self.config.concurrency, move || {
            outbound.build()
        }));

        let local = transport.local_addr().ok();
        *state = State::Open(Resources {
            transport: Arc::new(transport),
            buffers,
            inbound_codecs,
            outbound_codecs,
            queue: Arc::new(IngestQueue::new(self.config.max_queue_size)),
            metrics: Arc::new(ServerMetrics::new(Arc::clone(&self.config.metrics))),
            handler,
            stop: CancellationToken::new(),
            pump_gate: Arc::new(PumpGate::new()),
            workers: Vec::with_capacity(self.config.concurrency),
        });

        tracing::debug!(addr = ?local, "server opened");
        Ok(())
    }

    /// Runs the packet pump until `shutdown` fires or the server is
    /// closed, spawning one worker task per configured unit of
    /// concurrency first.
    ///
    /// Opens the server if it is not open yet. Always returns
    /// [`ServerError::Cancelled`] once stopped; worker tasks keep
    /// draining the queue until [`Server::close`] is called.
    pub async fn serve(&self, shutdown: CancellationToken) -> Result<(), ServerError> {
        self.open()?;

        // The permit is taken under the state lock, so a `close` that
        // runs later always sees this pump and waits for it.
        let (transport, buffers, queue, metrics, stop, _permit) = {
            let mut state = self.state.lock();
            match &mut *state {
                State::Open(res) => {
                    for worker_id in 0..self.config.concurrency {
                        res.workers.push(tokio::spawn(worker_loop(
                            worker_id,
                            shutdown.clone(),
                            Arc::clone(&res.queue),
                            Arc::clone(&res.inbound_codecs),
                            Arc::clone(&res.outbound_codecs),
                            Arc::clone(&res.handler),
                            Arc::clone(&res.metrics),
                        )));
                    }
                    (
                        Arc::clone(&res.transport),
                        Arc::clone(&res.buffers),
                        Arc::clone(&res.queue),
                        Arc::clone(&res.metrics),
                        res.stop.clone(),
                        res.pump_gate.enter(),
                    )
                }
                // `open` succeeded above, so landing here means a close
                // won the race.
                State::Unopened | State::Closed => return Err(ServerError::Cancelled),
            }
        };

        tracing::info!(concurrency = self.config.concurrency, "serving datagrams");
        pump(transport, buffers, queue, metrics, shutdown, stop).await
    }

    /// Stops the pump, waits for it to exit, then refuses new packets
    /// and waits for the workers to drain every accepted packet and
    /// exit.
    ///
    /// Idempotent: closing a server that is not open does nothing.
    pub async fn close(&self) {
        let resources = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, State::Closed) {
                State::Open(res) => res,
                State::Unopened => {
                    // Never opened; leave it reusable.
                    *state = State::Unopened;
                    return;
                }
                State::Closed => return,
            }
        };

        // Halt the pump and wait for it to exit before the queue stops
        // taking entries. A push that already passed the closed check
        // must land while the workers are still draining, or the packet
        // it carries would count as accepted yet never be handled.
        resources.stop.cancel();
        resources.pump_gate.all_exited().await;
        resources.queue.close();

        join_all(resources.workers).await;
        tracing::debug!("server closed, all workers exited");
    }

    /// Whether the server is currently open.
    pub fn is_open(&self) -> bool {
        matches!(&*self.state.lock(), State::Open(_))
    }

    /// The bound socket address, once open. Useful when binding to
    /// port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.state.lock() {
            State::Open(res) => res.transport.local_addr().ok(),
            _ => None,
        }
    }

    /// A copy of this server's counters, once open.
    pub fn metrics(&self) -> Option<MetricsSnapshot> {
        match &*self.state.lock() {
            State::Open(res) => Some(res.metrics.snapshot()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Reads datagrams into pooled buffers and pushes them onto the queue.
///
/// Never blocks on the queue: a full queue counts the packet as dropped
/// and the buffer's guard returns the storage to the pool immediately.
/// Read failures are counted and the loop carries on; datagram sockets
/// routinely surface transient errors.
async fn pump(
    transport: Arc<dyn DatagramTransport>,
    buffers: Arc<ObjectPool<ReadBuf>>,
    queue: Arc<IngestQueue<Pooled<ReadBuf>>>,
    metrics: Arc<ServerMetrics>,
    shutdown: CancellationToken,
    stop: CancellationToken,
) -> Result<(), ServerError> {
    loop {
        let mut buf = buffers.acquire();
        let received = tokio::select! {
            biased;
            () = shutdown.cancelled() => return Err(ServerError::Cancelled),
            () = stop.cancelled() => return Err(ServerError::Cancelled),
            received = transport.recv(buf.storage_mut()) => received,
        };

        match received {
            Ok(len) => {
                buf.set_len(len);
                metrics.packet_received(len);
                match queue.push(buf) {
                    Ok(()) => metrics.packet_enqueued(),
                    // The rejected entry rides its guard back to the
                    // buffer pool.
                    Err(_rejected) => metrics.packet_dropped(),
                }
            }
            Err(err) => {
                metrics.read_error();
                tracing::trace!("socket read failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NoopSink;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::io;
    use std::time::Duration;

    /// Replays a fixed sequence of reads, then blocks forever.
    struct ScriptedTransport {
        reads: Mutex<VecDeque<io::Result<Vec<u8>>>>,
    }

    impl ScriptedTransport {
        fn new(reads: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                reads: Mutex::new(reads.into()),
            }
        }
    }

    #[async_trait::async_trait]
    impl DatagramTransport for ScriptedTransport {
        async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
            let next = self.reads.lock().pop_front();
            match next {
                Some(Ok(datagram)) => {
                    buf[..datagram.len()].copy_from_slice(&datagram);
                    Ok(datagram.len())
                }
                Some(Err(err)) => Err(err),
                None => std::future::pending().await,
            }
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            Ok("127.0.0.1:0".parse().expect("valid addr"))
        }
    }

    fn pump_fixture(
        reads: Vec<io::Result<Vec<u8>>>,
        queue_capacity: usize,
    ) -> (
        Arc<dyn DatagramTransport>,
        Arc<ObjectPool<ReadBuf>>,
        Arc<IngestQueue<Pooled<ReadBuf>>>,
        Arc<ServerMetrics>,
    ) {
        (
            Arc::new(ScriptedTransport::new(reads)),
            Arc::new(ObjectPool::new(16, || ReadBuf::with_capacity(256))),
            Arc::new(IngestQueue::new(queue_capacity)),
            Arc::new(ServerMetrics::new(Arc::new(NoopSink))),
        )
    }

    #[tokio::test]
    async fn pump_counts_accepts_drops_and_read_errors() {
        let (transport, buffers, queue, metrics) = pump_fixture(
            vec![
                Ok(b"one".to_vec()),
                Err(io::Error::other("carrier lost")),
                Ok(b"two".to_vec()),
                Ok(b"three".to_vec()),
            ],
            1,
        );

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(pump(
            Arc::clone(&transport),
            Arc::clone(&buffers),
            Arc::clone(&queue),
            Arc::clone(&metrics),
            shutdown.clone(),
            CancellationToken::new(),
        ));

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(ServerError::Cancelled)));

        // With no consumer and a one-slot queue, only the first
        // datagram is accepted.
        let snap = metrics.snapshot();
        assert_eq!(snap.packets_processed, 1);
        assert_eq!(snap.packets_dropped, 2);
        assert_eq!(snap.read_errors, 1);
        assert_eq!(snap.queue_depth, 1);

        // Dropped and errored reads recycled their buffers.
        assert!(buffers.returns() >= 3);

        let queued = queue.pop().await.expect("accepted entry still queued");
        assert_eq!(queued.bytes(), b"one");
    }

    #[tokio::test]
    async fn pump_exits_promptly_when_cancelled_mid_read() {
        let (transport, buffers, queue, metrics) = pump_fixture(Vec::new(), 4);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(pump(
            transport,
            buffers,
            queue,
            metrics,
            shutdown.clone(),
            CancellationToken::new(),
        ));

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("pump should exit quickly")
            .unwrap();
        assert!(matches!(result, Err(ServerError::Cancelled)));
    }

    #[tokio::test]
    async fn pump_halts_on_the_internal_stop_token() {
        let (transport, buffers, queue, metrics) = pump_fixture(Vec::new(), 4);

        let stop = CancellationToken::new();
        let task = tokio::spawn(pump(
            transport,
            buffers,
            queue,
            metrics,
            CancellationToken::new(),
            stop.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(10)).await;
        stop.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("pump should exit quickly")
            .unwrap();
        assert!(matches!(result, Err(ServerError::Cancelled)));
    }

    #[tokio::test]
    async fn pump_gate_is_idle_when_no_pump_ever_entered() {
        let gate = Arc::new(PumpGate::new());
        tokio::time::timeout(Duration::from_millis(100), gate.all_exited())
            .await
            .expect("an empty gate resolves immediately");
    }

    #[tokio::test]
    async fn pump_gate_holds_until_the_last_permit_drops() {
        let gate = Arc::new(PumpGate::new());
        let first = gate.enter();
        let second = gate.enter();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.all_exited().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(second);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("gate must release once every permit is gone")
            .unwrap();
    }
}
