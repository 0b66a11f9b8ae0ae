use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{body::Incoming, header, Method, Request, Response, StatusCode};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::agent::http::handler::{
    json_response, json_response_compressed, required_param, required_prefix, text_response,
};
use crate::gateway::fanout::{fan_out_list, fan_out_search, GatewaySearchRequest};
use crate::gateway::registry::AgentRegistry;
use crate::shared::http_client::HttpClient;
use crate::shared::urlenc::parse_query;

/// Everything the gateway handlers share, built once in `main`.
pub struct GatewayContext {
    pub registry: Arc<AgentRegistry>,
    pub client: Arc<HttpClient>,
}

impl GatewayContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            registry: Arc::new(AgentRegistry::new()),
            client: Arc::new(HttpClient::new()),
        })
    }
}

/// 503 when the registry has no live agents to scatter to.
pub(crate) fn no_live_agents(active: usize) -> Option<(StatusCode, &'static str)> {
    (active == 0).then_some((StatusCode::SERVICE_UNAVAILABLE, "No active agents"))
}

/// 404 when the list scatter produced no file entries for the prefix.
pub(crate) fn no_listed_files(entries: usize) -> Option<(StatusCode, &'static str)> {
    (entries == 0).then_some((StatusCode::NOT_FOUND, "No files found under prefix"))
}

/// Body validation beyond what deserialization enforces. Returns the 400
/// response text on violation.
pub(crate) fn validate_gateway_request(req: &GatewaySearchRequest) -> Option<&'static str> {
    req.queries
        .is_empty()
        .then_some("Search request needs at least one query")
}

pub async fn handle_request(
    req: Request<Incoming>,
    ctx: Arc<GatewayContext>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    match path.as_str() {
        "/hello" => Ok(text_response(StatusCode::OK, "Hello!!!")),
        "/agent/announce" => Ok(announce(req, ctx)),
        "/agent/list" => Ok(agent_list(req, ctx)),
        "/log/list" => Ok(list(req, ctx).await),
        "/log/search" => Ok(search(req, ctx).await),
        "/web" => Ok(web(req)),
        _ => Ok(text_response(StatusCode::NOT_FOUND, "Not Found")),
    }
}

fn announce(req: Request<Incoming>, ctx: Arc<GatewayContext>) -> Response<Full<Bytes>> {
    if req.method() != Method::GET {
        return text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    }
    let params = parse_query(req.uri().query());
    let Some(agent_addr) = required_param(&params, "agent_addr") else {
        warn!(target: "logsweep::gateway", uri = %req.uri(), "agent_addr parameter is required");
        return text_response(StatusCode::BAD_REQUEST, "agent_addr parameter is required");
    };
    let agent_id = ctx.registry.announce(&agent_addr);
    debug!(target: "logsweep::gateway", agent_addr = %agent_addr, agent_id, "Agent announced");
    text_response(StatusCode::OK, "")
}

fn agent_list(req: Request<Incoming>, ctx: Arc<GatewayContext>) -> Response<Full<Bytes>> {
    if req.method() != Method::GET {
        return text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    }
    let agents = ctx.registry.get_active_agents();
    json_response(StatusCode::OK, &agents)
}

async fn list(req: Request<Incoming>, ctx: Arc<GatewayContext>) -> Response<Full<Bytes>> {
    if req.method() != Method::GET {
        return text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    }
    let params = parse_query(req.uri().query());
    let Some(prefix) = required_prefix(&params) else {
        return text_response(StatusCode::BAD_REQUEST, "prefix parameter is required");
    };
    let agents = ctx.registry.get_active_agents();
    if let Some((status, msg)) = no_live_agents(agents.len()) {
        warn!(target: "logsweep::gateway", "No active agents available");
        return text_response(status, msg);
    }

    let entries = fan_out_list(&ctx.client, &ctx.registry, &agents, &prefix).await;
    if let Some((status, msg)) = no_listed_files(entries.len()) {
        warn!(target: "logsweep::gateway", prefix = %prefix, "No files found under prefix");
        return text_response(status, msg);
    }
    info!(target: "logsweep::gateway", prefix = %prefix, files = entries.len(), agents = agents.len(), "List fan-out complete");
    json_response(StatusCode::OK, &entries)
}

async fn search(req: Request<Incoming>, ctx: Arc<GatewayContext>) -> Response<Full<Bytes>> {
    if req.method() != Method::POST {
        return text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    }
    let params = parse_query(req.uri().query());
    let Some(prefix) = required_prefix(&params) else {
        return text_response(StatusCode::BAD_REQUEST, "prefix parameter is required");
    };

    let accept_encoding = req
        .headers()
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(target: "logsweep::gateway", error = %e, "Failed to read request body");
            return text_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read body");
        }
    };
    let request: GatewaySearchRequest = match serde_json::from_slice(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(target: "logsweep::gateway", error = %e, "Invalid JSON in search body");
            return text_response(StatusCode::BAD_REQUEST, "Invalid JSON in request body");
        }
    };
    if let Some(msg) = validate_gateway_request(&request) {
        return text_response(StatusCode::BAD_REQUEST, msg);
    }

    let agents = ctx.registry.get_active_agents();
    if let Some((status, msg)) = no_live_agents(agents.len()) {
        warn!(target: "logsweep::gateway", "No active agents available");
        return text_response(status, msg);
    }

    let entries = fan_out_list(&ctx.client, &ctx.registry, &agents, &prefix).await;
    if let Some((status, msg)) = no_listed_files(entries.len()) {
        warn!(target: "logsweep::gateway", prefix = %prefix, "No files found under prefix");
        return text_response(status, msg);
    }

    let records = fan_out_search(&ctx.client, &agents, &entries, &prefix, &request).await;
    info!(target: "logsweep::gateway", prefix = %prefix, records = records.len(), "Search fan-out complete");

    let response = json!({
        "status": 0,
        "error_msg": "",
        "records": records,
    });
    json_response_compressed(StatusCode::OK, &response, accept_encoding.as_deref())
}

fn web(req: Request<Incoming>) -> Response<Full<Bytes>> {
    if req.method() != Method::GET {
        return text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    }
    let params = parse_query(req.uri().query());
    if required_prefix(&params).is_none() {
        return text_response(StatusCode::BAD_REQUEST, "prefix parameter is required");
    }
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Full::new(Bytes::from_static(
            include_bytes!("static/search.html").as_slice(),
        )))
        .unwrap()
}
