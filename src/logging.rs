use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::shared::config::ServerSettings;
use tracing::info;

/// Install the global subscriber: ANSI stdout plus a daily-rolling file
/// under `logpath`. Both layers share the configured level.
pub fn init(server: &ServerSettings, file_name: &str) -> anyhow::Result<()> {
    let filter = server
        .loglevel
        .parse::<tracing_subscriber::filter::LevelFilter>()?;

    let stdout_layer = fmt::layer().with_ansi(true).with_filter(filter);

    let file_appender = tracing_appender::rolling::daily(&server.logpath, file_name);
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(file_appender)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    Ok(())
}

#[cfg(test)]
pub fn init_for_tests() {
    use std::sync::Once;
    use tracing_subscriber::EnvFilter;

    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env().add_directive("logsweep=debug".parse().unwrap());

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}
