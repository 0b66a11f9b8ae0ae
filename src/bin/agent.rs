use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use logsweep::agent::announce::start_announce_task;
use logsweep::agent::http::listener::run_agent_server;
use logsweep::agent::FileIndexer;
use logsweep::logging;
use logsweep::shared::config::load_settings;

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .context("Usage: logsweep-agent <config.json>")?;
    let settings = Arc::new(load_settings(&config_path)?);
    logging::init(&settings.server, "agent.log")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(settings.server.threads.max(1))
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        info!(
            address = %settings.server.address,
            port = settings.server.port,
            threads = settings.server.threads,
            roots = settings.paths.len(),
            "Starting logsweep agent"
        );

        let indexer = Arc::new(FileIndexer::from_settings(&settings));

        // First pass runs to completion before the server accepts requests
        // so list/search see a populated table.
        let init = Arc::clone(&indexer);
        tokio::task::spawn_blocking(move || init.init()).await?;

        let _scanner = indexer.start();
        let _announce = start_announce_task(Arc::clone(&settings));

        run_agent_server(settings, indexer).await
    })
}
