//! Proxy engine — buffers each client request into a [`Flow`], drives
//! the hook chain around the upstream round trip and answers the client
//! with the upstream bytes.
//!
//! Requests in origin form (`POST /path`) are forwarded to the configured
//! upstream; requests in absolute form (`POST http://host/path`, explicit
//! proxy mode) are forwarded to the URL they name.

use crate::config::Config;
use crate::flow::{Flow, FlowRequest, FlowResponse};
use crate::hooks::HookChain;
use crate::types::JsonRpcResponse;
use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use reqwest::Url;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid upstream URL {url}: {reason}")]
    InvalidUpstream { url: String, reason: String },

    #[error("invalid request target {0}")]
    InvalidTarget(String),

    #[error("upstream response exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

pub struct ProxyState {
    upstream: Url,
    client: reqwest::Client,
    hooks: HookChain,
    max_body_bytes: usize,
    next_flow_id: AtomicU64,
}

impl ProxyState {
    pub fn new(config: &Config, hooks: HookChain) -> Result<Self, ProxyError> {
        let upstream = Url::parse(&config.upstream_rpc_url).map_err(|e| {
            ProxyError::InvalidUpstream {
                url: config.upstream_rpc_url.clone(),
                reason: e.to_string(),
            }
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.upstream_timeout_ms))
            .build()?;

        Ok(Self {
            upstream,
            client,
            hooks,
            max_body_bytes: config.max_body_bytes,
            next_flow_id: AtomicU64::new(1),
        })
    }

    pub fn upstream(&self) -> &Url {
        &self.upstream
    }
}

/// Every method on every path is proxied.
pub fn build_router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .fallback(handle_flow)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_flow(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Failed to buffer request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
        }
    };

    let url = match target_url(&state.upstream, &parts.uri) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "Rejecting request");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let id = state.next_flow_id.fetch_add(1, Ordering::Relaxed);
    let mut flow = Flow::new(
        id,
        FlowRequest {
            method: parts.method,
            url,
            headers: parts.headers,
            body,
        },
    );

    state.hooks.run_request(&mut flow);

    let mut failure = None;
    flow.response = match forward(&state.client, &flow.request, state.max_body_bytes).await {
        Ok(response) => Some(response),
        Err(e) => {
            warn!(flow_id = id, url = %flow.request.url, error = %e, "Upstream request failed");
            failure = Some(e.to_string());
            None
        }
    };

    state.hooks.run_response(&mut flow);

    let facts = Value::Object(flow.metadata.to_map());
    info!(
        flow_id = id,
        method = %flow.request.method,
        url = %flow.request.url,
        status = ?flow.response.as_ref().map(|r| r.status.as_u16()),
        facts = %facts,
        "Flow complete"
    );

    match flow.response {
        Some(response) => client_response(response),
        None => {
            let reason = failure.unwrap_or_else(|| "no response".into());
            (
                StatusCode::BAD_GATEWAY,
                Json(JsonRpcResponse::upstream_unavailable(&reason)),
            )
                .into_response()
        }
    }
}

/// Resolve where a client request goes.
pub fn target_url(upstream: &Url, uri: &Uri) -> Result<Url, ProxyError> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Url::parse(&uri.to_string()).map_err(|_| ProxyError::InvalidTarget(uri.to_string()));
    }

    let mut url = upstream.clone();
    if uri.path() != "/" {
        let joined = format!("{}{}", upstream.path().trim_end_matches('/'), uri.path());
        url.set_path(&joined);
    }
    if let Some(query) = uri.query() {
        url.set_query(Some(query));
    }
    Ok(url)
}

async fn forward(
    client: &reqwest::Client,
    request: &FlowRequest,
    max_body_bytes: usize,
) -> Result<FlowResponse, ProxyError> {
    let mut headers = request.headers.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    let upstream = client
        .request(request.method.clone(), request.url.clone())
        .headers(headers)
        .body(request.body.clone())
        .send()
        .await?;

    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);
    let body = read_limited(upstream, max_body_bytes).await?;

    Ok(FlowResponse {
        status,
        headers,
        body,
    })
}

/// Buffer an upstream body under the same cap as client bodies.
async fn read_limited(mut upstream: reqwest::Response, limit: usize) -> Result<Bytes, ProxyError> {
    if upstream.content_length().is_some_and(|len| len > limit as u64) {
        return Err(ProxyError::ResponseTooLarge { limit });
    }

    let mut body = Vec::new();
    while let Some(chunk) = upstream.chunk().await? {
        if body.len() + chunk.len() > limit {
            return Err(ProxyError::ResponseTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(body))
}

/// Drop connection-scoped headers that never cross the proxy.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in [
        header::CONNECTION,
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}

fn client_response(upstream: FlowResponse) -> Response {
    let mut headers = upstream.headers;
    // recomputed from the buffered body
    headers.remove(header::CONTENT_LENGTH);

    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = headers;
    response
}

// ── Tests ───────────────────────────────────────────────────────
