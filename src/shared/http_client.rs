use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{self, HeaderValue};
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tracing::warn;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_RETRY_BUDGET: usize = 2;
const DEFAULT_MAX_REDIRECTS: usize = 3;
const DEFAULT_POOL_IDLE_PER_HOST: usize = 8;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("Response body error: {0}")]
    Body(String),
}

impl ClientError {
    fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Timeout)
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    /// Already decoded if the peer sent `Content-Encoding: gzip`.
    pub body: Vec<u8>,
}

/// Async HTTP client for agent announce and gateway fan-out.
///
/// Connection pooling is the hyper-util idle pool, bounded per host.
/// Transient transport failures are retried within a small budget and
/// redirects are followed transparently.
pub struct HttpClient {
    inner: Client<HttpConnector, Full<Bytes>>,
    request_timeout: Duration,
    retry_budget: usize,
    max_redirects: usize,
}

impl HttpClient {
    pub fn new() -> Self {
        Self::with_request_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_request_timeout(request_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(DEFAULT_CONNECT_TIMEOUT));
        let inner = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(DEFAULT_POOL_IDLE_PER_HOST)
            .build(connector);
        Self {
            inner,
            request_timeout,
            retry_budget: DEFAULT_RETRY_BUDGET,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    pub async fn get(&self, url: &str) -> Result<HttpResponse, ClientError> {
        self.request(Method::GET, url, None).await
    }

    pub async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, ClientError> {
        self.request(Method::POST, url, Some(body)).await
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, ClientError> {
        let mut last_err = None;
        for attempt in 0..=self.retry_budget {
            match self.attempt(method.clone(), url, body.clone()).await {
                Ok(res) => return Ok(res),
                Err(e) if e.is_transient() && attempt < self.retry_budget => {
                    warn!(target: "logsweep::client", url, attempt, error = %e, "Transient request failure, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(ClientError::Timeout))
    }

    async fn attempt(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, ClientError> {
        let mut uri: Uri = url
            .parse()
            .map_err(|_| ClientError::InvalidUri(url.to_string()))?;

        for _ in 0..=self.max_redirects {
            let mut builder = Request::builder()
                .method(method.clone())
                .uri(uri.clone())
                .header(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
            if body.is_some() {
                builder = builder.header(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
            let payload = body.clone().map(Bytes::from).unwrap_or_default();
            let req = builder
                .body(Full::new(payload))
                .map_err(|e| ClientError::Transport(e.to_string()))?;

            let response = tokio::time::timeout(self.request_timeout, self.inner.request(req))
                .await
                .map_err(|_| ClientError::Timeout)?
                .map_err(|e| ClientError::Transport(e.to_string()))?;

            if response.status().is_redirection() {
                let Some(location) = response.headers().get(header::LOCATION) else {
                    return Err(ClientError::Transport(format!(
                        "Redirect {} without Location",
                        response.status()
                    )));
                };
                uri = location
                    .to_str()
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| {
                        ClientError::Transport("Invalid redirect Location".to_string())
                    })?;
                continue;
            }

            let status = response.status();
            let gzipped = response
                .headers()
                .get(header::CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.contains("gzip"))
                .unwrap_or(false);

            let collected = tokio::time::timeout(self.request_timeout, response.collect())
                .await
                .map_err(|_| ClientError::Timeout)?
                .map_err(|e| ClientError::Transport(e.to_string()))?;
            let raw = collected.to_bytes();

            let body = if gzipped {
                crate::shared::gzip::decompress(&raw)
                    .map_err(|e| ClientError::Body(e.to_string()))?
            } else {
                raw.to_vec()
            };
            return Ok(HttpResponse { status, body });
        }

        Err(ClientError::TooManyRedirects)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}
