use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::agent::http::listener::SESSION_IDLE_TIMEOUT;
use crate::shared::config::Settings;

use super::handler::{handle_request, GatewayContext};

pub async fn run_gateway_server(
    settings: Arc<Settings>,
    ctx: Arc<GatewayContext>,
) -> anyhow::Result<()> {
    let addr: SocketAddr =
        format!("{}:{}", settings.server.address, settings.server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    info!(target: "logsweep::gateway", %addr, "Gateway HTTP server running");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let ctx = Arc::clone(&ctx);

        tokio::spawn(async move {
            if let Err(err) = hyper::server::conn::http1::Builder::new()
                .timer(TokioTimer::new())
                .header_read_timeout(SESSION_IDLE_TIMEOUT)
                .serve_connection(io, service_fn(move |req| handle_request(req, Arc::clone(&ctx))))
                .await
            {
                error!(target: "logsweep::gateway", error = %err, "Error serving connection");
            }
        });
    }
}
