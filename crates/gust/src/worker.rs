//! Worker task that turns queued datagrams into handler calls.

use std::sync::Arc;

use gust_codec::MessageCodec;
use tokio_util::sync::CancellationToken;

use crate::buffer::ReadBuf;
use crate::handler::RequestHandler;
use crate::metrics::ServerMetrics;
use crate::pool::{ObjectPool, Pooled};
use crate::queue::IngestQueue;

/// Processes queue entries until the queue is closed and drained.
///
/// Each iteration checks a codec out of both direction pools, feeds the
/// datagram to the inbound transport and invokes the handler. Handler
/// errors are counted and absorbed; a failing handler never takes the
/// worker down. Codecs are wiped and returned after every entry, and
/// the entry's buffer rides its guard back to the buffer pool.
///
/// Designed to be spawned once per configured worker. The loop ends
/// when [`IngestQueue::pop`] returns `None`, which happens only after
/// the queue is closed and every accepted entry has been handed out.
pub(crate) async fn worker_loop(
    worker_id: usize,
    shutdown: CancellationToken,
    queue: Arc<IngestQueue<Pooled<ReadBuf>>>,
    inbound_codecs: Arc<ObjectPool<Box<dyn MessageCodec>>>,
    outbound_codecs: Arc<ObjectPool<Box<dyn MessageCodec>>>,
    handler: Arc<dyn RequestHandler>,
    metrics: Arc<ServerMetrics>,
) {
    tracing::trace!("worker {worker_id} started");

    while let Some(mut buf) = queue.pop().await {
        {
            let mut inbound = inbound_codecs.acquire();
            let mut outbound = outbound_codecs.acquire();

            inbound.transport_mut().fill(buf.bytes());

            if let Err(err) = handler
                .handle(&shutdown, &mut **inbound, &mut **outbound)
                .await
            {
                metrics.handler_error();
                tracing::debug!("worker {worker_id} handler error: {err}");
            }

            // Wipe both transports before the codecs go back to their
            // pools so no bytes survive into the next request.
            inbound.transport_mut().reset();
            outbound.transport_mut().reset();
        }

        buf.clear();
        drop(buf);
        metrics.packet_finished();
    }

    tracing::trace!("worker {worker_id} stopped");
}
