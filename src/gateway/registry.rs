use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::gateway::fanout::AgentFileEntry;
use crate::shared::hash::stable_hash64;

/// An agent that has not announced for this long is no longer live and is
/// eventually removed by the cleanup task.
pub const AGENT_TIMEOUT_SECS: i64 = 60;

/// Listings younger than this are served from the per-agent cache instead
/// of re-fetching. Matches the announce cadence.
pub const LISTING_CACHE_TTL_SECS: i64 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    pub agent_id: u64,
    pub address: String,
    pub last_announce: i64,
}

#[derive(Debug, Clone)]
struct CachedListing {
    last_updated: i64,
    entries: Vec<AgentFileEntry>,
}

/// Live-agent registry fed by announce heartbeats, plus a freshness-bounded
/// cache of each agent's per-prefix listings.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<u64, AgentInfo>>,
    listings: RwLock<HashMap<(u64, String), CachedListing>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a heartbeat. The agent id is a stable hash of the address.
    pub fn announce(&self, address: &str) -> u64 {
        self.announce_at(address, chrono::Utc::now().timestamp())
    }

    pub(crate) fn announce_at(&self, address: &str, now: i64) -> u64 {
        let agent_id = stable_hash64(&address);
        let mut agents = self.agents.write().unwrap();
        agents
            .entry(agent_id)
            .and_modify(|info| info.last_announce = now)
            .or_insert_with(|| {
                info!(target: "logsweep::registry", address, agent_id, "New agent registered");
                AgentInfo {
                    agent_id,
                    address: address.to_string(),
                    last_announce: now,
                }
            });
        agent_id
    }

    pub fn get_active_agents(&self) -> Vec<AgentInfo> {
        self.active_agents_at(chrono::Utc::now().timestamp())
    }

    pub(crate) fn active_agents_at(&self, now: i64) -> Vec<AgentInfo> {
        let agents = self.agents.read().unwrap();
        let mut active: Vec<AgentInfo> = agents
            .values()
            .filter(|info| now - info.last_announce <= AGENT_TIMEOUT_SECS)
            .cloned()
            .collect();
        active.sort_by_key(|info| info.agent_id);
        active
    }

    /// Drop every agent whose last announce is older than the timeout.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(chrono::Utc::now().timestamp())
    }

    pub(crate) fn cleanup_expired_at(&self, now: i64) -> usize {
        let removed = {
            let mut agents = self.agents.write().unwrap();
            let before = agents.len();
            agents.retain(|_, info| {
                let live = now - info.last_announce <= AGENT_TIMEOUT_SECS;
                if !live {
                    info!(target: "logsweep::registry", address = %info.address, "Agent expired and removed");
                }
                live
            });
            before - agents.len()
        };
        if removed > 0 {
            let agents = self.agents.read().unwrap();
            self.listings
                .write()
                .unwrap()
                .retain(|(agent_id, _), _| agents.contains_key(agent_id));
        }
        removed
    }

    /// A cached listing for `(agent, prefix)` if one is still fresh.
    pub fn cached_listing(&self, agent_id: u64, prefix: &str) -> Option<Vec<AgentFileEntry>> {
        self.cached_listing_at(agent_id, prefix, chrono::Utc::now().timestamp())
    }

    pub(crate) fn cached_listing_at(
        &self,
        agent_id: u64,
        prefix: &str,
        now: i64,
    ) -> Option<Vec<AgentFileEntry>> {
        let listings = self.listings.read().unwrap();
        let cached = listings.get(&(agent_id, prefix.to_string()))?;
        if now - cached.last_updated > LISTING_CACHE_TTL_SECS {
            return None;
        }
        Some(cached.entries.clone())
    }

    pub fn store_listing(&self, agent_id: u64, prefix: &str, entries: Vec<AgentFileEntry>) {
        self.store_listing_at(agent_id, prefix, entries, chrono::Utc::now().timestamp());
    }

    pub(crate) fn store_listing_at(
        &self,
        agent_id: u64,
        prefix: &str,
        entries: Vec<AgentFileEntry>,
        now: i64,
    ) {
        self.listings.write().unwrap().insert(
            (agent_id, prefix.to_string()),
            CachedListing {
                last_updated: now,
                entries,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.agents.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.read().unwrap().is_empty()
    }

    /// Background eviction loop, one sweep per timeout period.
    pub fn start_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                sleep(Duration::from_secs(AGENT_TIMEOUT_SECS as u64)).await;
                let removed = registry.cleanup_expired();
                debug!(target: "logsweep::registry", removed, remaining = registry.len(), "Agent cleanup pass");
            }
        })
    }
}
