use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use logsweep::gateway::http::handler::GatewayContext;
use logsweep::gateway::http::listener::run_gateway_server;
use logsweep::logging;
use logsweep::shared::config::load_settings;

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .context("Usage: logsweep-gateway <config.json>")?;
    let settings = Arc::new(load_settings(&config_path)?);
    logging::init(&settings.server, "gateway.log")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(settings.server.threads.max(1))
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        info!(
            address = %settings.server.address,
            port = settings.server.port,
            threads = settings.server.threads,
            "Starting logsweep gateway"
        );

        let ctx = GatewayContext::new();
        let _cleanup = ctx.registry.start_cleanup_task();

        run_gateway_server(settings, ctx).await
    })
}
