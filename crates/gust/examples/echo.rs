//! A minimal echo server.
//!
//! Decodes each datagram, logs it and encodes a reply envelope into the
//! outbound codec. Run it, then fire requests at it with any UDP client
//! that speaks the compact format.
//!
//! ```sh
//! cargo run --example echo
//! ```

use std::sync::Arc;

use gust::gust_codec::{Envelope, MessageCodec};
use gust::{HandlerError, RequestHandler, Server, ServerConfig};
use tokio::signal;
use tokio_util::sync::CancellationToken;

struct Echo;

#[async_trait::async_trait]
impl RequestHandler for Echo {
    async fn handle(
        &self,
        _shutdown: &CancellationToken,
        inbound: &mut dyn MessageCodec,
        outbound: &mut dyn MessageCodec,
    ) -> Result<(), HandlerError> {
        let request = inbound.decode()?;
        tracing::info!(
            method = %request.method,
            seq = request.seq,
            payload_len = request.payload.len(),
            "echoing request"
        );

        let reply = Envelope::reply(request.method.clone(), request.seq, request.payload.clone());
        outbound.encode(&reply)?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ServerConfig::new("127.0.0.1:8686".parse()?)
        .with_handler(Arc::new(Echo))
        .with_concurrency(4);

    let server = Server::new(config);
    server.open()?;
    tracing::info!(addr = ?server.local_addr(), "echo server listening");

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let result = server.serve(shutdown).await;
    tracing::info!("shutting down: {result:?}");

    server.close().await;
    tracing::info!("all workers drained");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
