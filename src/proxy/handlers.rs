//! Request handlers for the proxy
//!
//! `chat` is the request orchestrator. One call walks one request through
//! `received -> authenticated -> tunneling -> relaying` and ends in either a
//! relayed upstream response or a [`ProxyError`]. The metrics observation is
//! started on arrival and handed to whichever path ends the request; if the
//! client hangs up first, dropping the future drops the timer, which records
//! the request as client-closed.

use std::fmt;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::Instrument;

use super::error::ProxyError;
use super::payload::{peek_stream_flag, InboundRequest, UpstreamPayload};
use super::relay::UpstreamResponse;
use super::sse;
use super::state::ProxyState;
use super::stream::RelayStream;
use crate::config::VERSION;
use crate::metrics::{OutcomeTimer, RequestType};
use crate::util::generate_id;

/// Largest accepted chat request body
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Lifecycle stage of one chat request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Authenticated,
    Tunneling,
    Relaying,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Received => "received",
            Stage::Authenticated => "authenticated",
            Stage::Tunneling => "tunneling",
            Stage::Relaying => "relaying",
        })
    }
}

impl ProxyError {
    /// Stage the request had reached when this error ended it
    pub fn stage(&self) -> Stage {
        match self {
            ProxyError::Auth(_) | ProxyError::BodyRead(_) | ProxyError::BadRequest(_) => {
                Stage::Received
            }
            ProxyError::Payload(_) => Stage::Authenticated,
            ProxyError::Tunnel(_) => Stage::Tunneling,
            ProxyError::Upstream(_) => Stage::Relaying,
        }
    }
}

/// `POST /api/chat`
pub async fn chat(State(state): State<ProxyState>, headers: HeaderMap, body: Body) -> Response {
    let request_id = generate_id();
    let body = axum::body::to_bytes(body, MAX_BODY_BYTES).await;

    // Label is read leniently so that even rejected requests are typed
    let request_type = RequestType::from_stream_flag(
        body.as_deref().map(peek_stream_flag).unwrap_or(false),
    );
    let timer = state.metrics.start(request_type);

    let span = tracing::info_span!("chat", id = %request_id, kind = %request_type);
    async move {
        tracing::debug!(stage = %Stage::Received, "Chat request received");

        match open_upstream(&state, &headers, body).await {
            Ok(upstream) => relay_response(&state, upstream, timer),
            Err(err) => {
                let status = err.status();
                tracing::debug!(stage = %err.stage(), "Request failed");
                let response = err.into_response();
                timer.record(status.as_u16());
                response
            }
        }
    }
    .instrument(span)
    .await
}

/// Everything up to upstream response headers
async fn open_upstream(
    state: &ProxyState,
    headers: &HeaderMap,
    body: Result<Bytes, axum::Error>,
) -> Result<UpstreamResponse, ProxyError> {
    state.auth.check(headers)?;
    tracing::debug!(stage = %Stage::Authenticated, "Service token accepted");

    let body = body.map_err(|e| ProxyError::BodyRead(e.to_string()))?;
    let request =
        InboundRequest::parse(&body).map_err(|e| ProxyError::BadRequest(e.to_string()))?;
    let payload = UpstreamPayload::new(&request, &state.upstream).to_bytes()?;

    tracing::debug!(
        stage = %Stage::Tunneling,
        messages = request.messages.len(),
        "Opening tunnel to {}",
        state.tunnel.target()
    );
    let tunnel = state.tunnel.establish().await?;

    tracing::debug!(stage = %Stage::Relaying, "Sending upstream request");
    let upstream = state.relay.send(tunnel, payload).await?;
    tracing::info!(status = upstream.status.as_u16(), "Upstream responded");

    Ok(upstream)
}

/// Stream the upstream response back to the client
fn relay_response(
    state: &ProxyState,
    mut upstream: UpstreamResponse,
    timer: OutcomeTimer,
) -> Response {
    let status = upstream.status;
    let upstream_headers = std::mem::take(&mut upstream.headers);
    let observe_sse = sse::is_sse_response(&upstream_headers);

    let body = RelayStream::new(upstream, timer, state.timeouts.upstream_idle, observe_sse);
    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in upstream_headers.iter() {
        if is_hop_by_hop(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    response
}

/// Response headers scoped to the upstream connection, never copied
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection" | "keep-alive" | "transfer-encoding"
    )
}

/// `GET /metrics`
pub async fn metrics(State(state): State<ProxyState>) -> Response {
    match state.metrics.render() {
        Ok(body) => {
            ([(header::CONTENT_TYPE, state.metrics.content_type())], body).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to render metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to render metrics" })),
            )
                .into_response()
        }
    }
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": VERSION }))
}
