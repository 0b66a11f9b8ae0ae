use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::agent::indexer::FileIndexer;
use crate::shared::config::Settings;

use super::handler::handle_request;

/// Connections idle at a request boundary for this long are closed.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

pub async fn run_agent_server(
    settings: Arc<Settings>,
    indexer: Arc<FileIndexer>,
) -> anyhow::Result<()> {
    let addr: SocketAddr =
        format!("{}:{}", settings.server.address, settings.server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    info!(target: "logsweep::http", %addr, "Agent HTTP server running");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let indexer = Arc::clone(&indexer);

        tokio::spawn(async move {
            if let Err(err) = hyper::server::conn::http1::Builder::new()
                .timer(TokioTimer::new())
                .header_read_timeout(SESSION_IDLE_TIMEOUT)
                .serve_connection(
                    io,
                    service_fn(move |req| handle_request(req, Arc::clone(&indexer))),
                )
                .await
            {
                error!(target: "logsweep::http", error = %err, "Error serving connection");
            }
        });
    }
}
