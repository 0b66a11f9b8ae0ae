use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::agent::search::{Query, SearchRequest};
use crate::shared::http_client::HttpClient;
use crate::shared::urlenc;

use super::error::FanoutError;
use super::registry::{AgentInfo, AgentRegistry};

/// The list phase walks up to this many agents per spawned task.
pub const LIST_AGENTS_PER_TASK: usize = 10;

fn default_max_results() -> usize {
    crate::agent::search::searcher::DEFAULT_MAX_RESULTS
}

/// Body of a gateway search request; `paths` is filled in per agent from
/// the list phase.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySearchRequest {
    #[serde(rename = "queries", alias = "querys")]
    pub queries: Vec<Query>,
    pub start_time: i64,
    pub end_time: i64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

/// One file entry as listed by an agent, tagged with the owning agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentFileEntry {
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub mtime: i64,
    #[serde(default)]
    pub etag: String,
    #[serde(default)]
    pub start_time: i64,
    #[serde(default)]
    pub end_time: i64,
    #[serde(default)]
    pub agent_id: u64,
}

#[derive(Debug, Deserialize)]
struct AgentSearchEnvelope {
    #[serde(default)]
    status: i32,
    #[serde(default)]
    error_msg: String,
    #[serde(default)]
    records: Vec<Value>,
}

/// One agent's listing for a prefix, from the registry cache when fresh.
async fn fetch_agent_listing(
    client: &HttpClient,
    registry: &AgentRegistry,
    agent: &AgentInfo,
    prefix: &str,
) -> Result<Vec<AgentFileEntry>, FanoutError> {
    if let Some(cached) = registry.cached_listing(agent.agent_id, prefix) {
        return Ok(cached);
    }
    let url = format!(
        "http://{}/log/list?prefix={}",
        agent.address,
        urlenc::encode(prefix)
    );
    let res = client.get(&url).await?;
    if res.status.as_u16() != 200 {
        return Err(FanoutError::BadStatus(res.status.as_u16()));
    }
    let mut entries: Vec<AgentFileEntry> = serde_json::from_slice(&res.body)?;
    for entry in &mut entries {
        entry.agent_id = agent.agent_id;
    }
    registry.store_listing(agent.agent_id, prefix, entries.clone());
    Ok(entries)
}

/// One agent's search records for its group of paths, tagged with the
/// agent id.
async fn fetch_agent_records(
    client: &HttpClient,
    address: &str,
    agent_id: u64,
    prefix: &str,
    body: &SearchRequest,
) -> Result<Vec<Value>, FanoutError> {
    let url = format!(
        "http://{}/log/search?prefix={}",
        address,
        urlenc::encode(prefix)
    );
    let payload = serde_json::to_vec(body)?;
    let res = client.post_json(&url, payload).await?;
    if res.status.as_u16() != 200 {
        return Err(FanoutError::BadStatus(res.status.as_u16()));
    }
    let envelope: AgentSearchEnvelope = serde_json::from_slice(&res.body)?;
    if envelope.status != 0 {
        return Err(FanoutError::AgentFailure(envelope.error_msg));
    }
    let mut records = envelope.records;
    for record in &mut records {
        if let Some(obj) = record.as_object_mut() {
            obj.insert("agent".to_string(), Value::from(agent_id));
        }
    }
    Ok(records)
}

/// Scatter `GET /log/list` across the active agents with bounded
/// concurrency: one task per chunk of ten agents, each chunk walked
/// sequentially. Fresh per-agent listings are served from the registry
/// cache; per-agent failures are logged and elided.
pub async fn fan_out_list(
    client: &Arc<HttpClient>,
    registry: &Arc<AgentRegistry>,
    agents: &[AgentInfo],
    prefix: &str,
) -> Vec<AgentFileEntry> {
    let results: Arc<Mutex<Vec<AgentFileEntry>>> = Arc::new(Mutex::new(Vec::new()));
    let mut tasks = Vec::new();

    for chunk in agents.chunks(LIST_AGENTS_PER_TASK) {
        let chunk: Vec<AgentInfo> = chunk.to_vec();
        let client = Arc::clone(client);
        let registry = Arc::clone(registry);
        let prefix = prefix.to_string();
        let results = Arc::clone(&results);
        tasks.push(tokio::spawn(async move {
            for agent in chunk {
                match fetch_agent_listing(&client, &registry, &agent, &prefix).await {
                    Ok(entries) => results.lock().unwrap().extend(entries),
                    Err(e) => {
                        warn!(target: "logsweep::fanout", agent = %agent.address, error = %e, "List fan-out failed for agent");
                    }
                }
            }
        }));
    }

    for task in tasks {
        if let Err(e) = task.await {
            warn!(target: "logsweep::fanout", error = %e, "List fan-out task panicked");
        }
    }

    let mut out = Arc::try_unwrap(results)
        .map(|m| m.into_inner().unwrap())
        .unwrap_or_default();
    out.sort_by(|a, b| (a.agent_id, a.path.as_str()).cmp(&(b.agent_id, b.path.as_str())));
    out
}

/// Scatter `POST /log/search`: entries are grouped by agent and each group
/// gets its own task (per-task ceiling of one agent). Returns the records
/// of every successful agent, merged in start-time order.
pub async fn fan_out_search(
    client: &Arc<HttpClient>,
    agents: &[AgentInfo],
    entries: &[AgentFileEntry],
    prefix: &str,
    request: &GatewaySearchRequest,
) -> Vec<Value> {
    let mut groups: BTreeMap<u64, Vec<String>> = BTreeMap::new();
    for entry in entries {
        groups
            .entry(entry.agent_id)
            .or_default()
            .push(entry.path.clone());
    }
    let address_by_id: BTreeMap<u64, String> = agents
        .iter()
        .map(|a| (a.agent_id, a.address.clone()))
        .collect();

    let records: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let mut tasks = Vec::new();

    for (agent_id, paths) in groups {
        let Some(address) = address_by_id.get(&agent_id).cloned() else {
            warn!(target: "logsweep::fanout", agent_id, "Listed agent no longer active, skipping");
            continue;
        };
        let body = SearchRequest {
            paths,
            queries: request.queries.clone(),
            start_time: request.start_time,
            end_time: request.end_time,
            max_results: request.max_results,
        };
        let client = Arc::clone(client);
        let prefix = prefix.to_string();
        let records = Arc::clone(&records);
        tasks.push(tokio::spawn(async move {
            match fetch_agent_records(&client, &address, agent_id, &prefix, &body).await {
                Ok(tagged) => records.lock().unwrap().extend(tagged),
                Err(e) => {
                    warn!(target: "logsweep::fanout", agent = %address, error = %e, "Search fan-out failed for agent");
                }
            }
        }));
    }

    for task in tasks {
        if let Err(e) = task.await {
            warn!(target: "logsweep::fanout", error = %e, "Search fan-out task panicked");
        }
    }

    let mut merged = Arc::try_unwrap(records)
        .map(|m| m.into_inner().unwrap())
        .unwrap_or_default();
    sort_records_by_start_time(&mut merged);
    merged
}

/// Stable ascending order on record `start_time`; records with a missing
/// or non-numeric start time sort first.
pub fn sort_records_by_start_time(records: &mut [Value]) {
    records.sort_by_key(|record| record.get("start_time").and_then(Value::as_i64));
}
