use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::shared::config::Settings;
use crate::shared::http_client::HttpClient;
use crate::shared::urlenc;

pub const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(10);

/// Periodically announce this agent's address to every configured registry.
/// Failures are logged and retried on the next tick; the loop never exits.
pub fn start_announce_task(settings: Arc<Settings>) -> Option<tokio::task::JoinHandle<()>> {
    if settings.server.registry_address.is_empty() {
        debug!(target: "logsweep::announce", "No registries configured, announce disabled");
        return None;
    }
    let Some(agent_addr) = settings.server.registry_agent_address.clone() else {
        warn!(target: "logsweep::announce", "registry_agent_address is not set, announce disabled");
        return None;
    };

    info!(target: "logsweep::announce", agent_addr = %agent_addr, registries = settings.server.registry_address.len(), "Announce loop started");
    let client = HttpClient::with_request_timeout(ANNOUNCE_INTERVAL);
    Some(tokio::spawn(async move {
        loop {
            for registry in &settings.server.registry_address {
                let url = format!(
                    "http://{}/agent/announce?agent_addr={}",
                    registry,
                    urlenc::encode(&agent_addr)
                );
                match client.get(&url).await {
                    Ok(res) if res.status.is_success() => {
                        debug!(target: "logsweep::announce", registry = %registry, "Announced");
                    }
                    Ok(res) => {
                        warn!(target: "logsweep::announce", registry = %registry, status = %res.status, "Announce rejected");
                    }
                    Err(e) => {
                        warn!(target: "logsweep::announce", registry = %registry, error = %e, "Announce failed");
                    }
                }
            }
            sleep(ANNOUNCE_INTERVAL).await;
        }
    }))
}
