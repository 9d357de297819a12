//! Proxy error types and response handling
//!
//! Each variant belongs to one stage of the request and maps to exactly one
//! client-visible status: auth 401, tunnel 502, everything past the tunnel
//! 500. Client bodies are short and never carry upstream detail.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::auth::AuthFailure;
use super::relay::RelayError;
use super::tunnel::TunnelError;

/// Errors that can occur during proxying
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("unauthorized: {0}")]
    Auth(#[from] AuthFailure),
    #[error("failed to read request body: {0}")]
    BodyRead(String),
    #[error("invalid request body: {0}")]
    BadRequest(String),
    #[error("tunnel: {0}")]
    Tunnel(#[from] TunnelError),
    #[error("upstream: {0}")]
    Upstream(#[from] RelayError),
    #[error("failed to encode upstream payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Auth(_) => StatusCode::UNAUTHORIZED,
            ProxyError::BodyRead(_) | ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Tunnel(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Upstream(_) | ProxyError::Payload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message returned to the client
    fn client_message(&self) -> &'static str {
        match self {
            ProxyError::Auth(_) => "Invalid access token. Contact your administrator.",
            ProxyError::BodyRead(_) | ProxyError::BadRequest(_) => "Invalid request body",
            ProxyError::Tunnel(_) => "Proxy tunnel failed",
            ProxyError::Upstream(_) | ProxyError::Payload(_) => "Upstream request failed",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            ProxyError::Auth(_) | ProxyError::BodyRead(_) | ProxyError::BadRequest(_) => {
                tracing::warn!("Rejected request: {} - {}", status, self)
            }
            _ => tracing::error!("Proxy error: {} - {}", status, self),
        }

        (status, Json(json!({ "error": self.client_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ProxyError::from(AuthFailure::Missing).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ProxyError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::from(TunnelError::Rejected {
                status: 407,
                reason: "Proxy Authentication Required".into(),
            })
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::from(TunnelError::Timeout(Duration::from_secs(1))).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::from(RelayError::Timeout(Duration::from_secs(1))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_response_body_hides_detail() {
        let err = ProxyError::from(TunnelError::Rejected {
            status: 407,
            reason: "secret-proxy-detail".into(),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "error": "Proxy tunnel failed" }));
    }

    #[tokio::test]
    async fn test_auth_message() {
        let response = ProxyError::from(AuthFailure::Mismatch).into_response();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            value["error"],
            "Invalid access token. Contact your administrator."
        );
    }
}
