//! Upstream request over an established tunnel
//!
//! The relay speaks HTTP/1.1 to the chat-completions API on a socket that the
//! tunnel module already connected. With TLS enabled the handshake runs inside
//! the tunnel, using the upstream host for SNI and certificate validation.
//! Each socket carries exactly one request and is torn down afterwards.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{
    header::{AUTHORIZATION, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST},
    HeaderMap, HeaderValue, Method, Request, StatusCode,
};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;

use crate::config::UpstreamConfig;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("TLS client setup failed: {0}")]
    TlsConfig(#[from] rustls::Error),
    #[error("invalid upstream server name {0:?}")]
    ServerName(String),
    #[error("TLS handshake with upstream failed: {0}")]
    Tls(#[source] io::Error),
    #[error("HTTP handshake with upstream failed: {0}")]
    Handshake(#[source] hyper::Error),
    #[error("upstream request failed: {0}")]
    Send(#[source] hyper::Error),
    #[error("failed to build upstream request: {0}")]
    Request(#[from] axum::http::Error),
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

/// How bytes are carried inside the tunnel
enum Transport {
    Plain,
    Tls {
        connector: TlsConnector,
        server_name: ServerName<'static>,
    },
}

pub struct UpstreamRelay {
    host_header: HeaderValue,
    path: String,
    authorization: HeaderValue,
    transport: Transport,
    idle_timeout: Option<Duration>,
}

/// Background task driving one upstream connection
///
/// Aborting it closes the socket, and with it the tunnel. Dropped together
/// with the response body, so the tunnel lives exactly as long as the relay.
pub struct ConnectionGuard(JoinHandle<()>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Upstream status and headers, with the body still on the wire
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Incoming,
    pub connection: ConnectionGuard,
}

impl UpstreamRelay {
    pub fn new(
        upstream: &UpstreamConfig,
        idle_timeout: Option<Duration>,
    ) -> Result<Self, RelayError> {
        let default_port = if upstream.tls { 443 } else { 80 };
        let host = if upstream.port == default_port {
            upstream.host.clone()
        } else {
            upstream.authority()
        };
        let host_header =
            HeaderValue::from_str(&host).map_err(|_| RelayError::ServerName(host.clone()))?;

        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", upstream.api_key))
            .map_err(|e| RelayError::Request(e.into()))?;
        authorization.set_sensitive(true);

        let transport = if upstream.tls {
            let server_name = ServerName::try_from(upstream.host.as_str())
                .map(|name| name.to_owned())
                .map_err(|_| RelayError::ServerName(upstream.host.clone()))?;
            Transport::Tls {
                connector: TlsConnector::from(Arc::new(tls_client_config()?)),
                server_name,
            }
        } else {
            Transport::Plain
        };

        Ok(Self {
            host_header,
            path: upstream.path.clone(),
            authorization,
            transport,
            idle_timeout,
        })
    }

    /// Send one chat-completions request through the tunnel
    ///
    /// Resolves once response headers arrive. The body is left unread.
    pub async fn send(
        &self,
        tunnel: TcpStream,
        body: Bytes,
    ) -> Result<UpstreamResponse, RelayError> {
        let request = self.build_request(body)?;

        match &self.transport {
            Transport::Plain => self.bounded(exchange(tunnel, request)).await,
            Transport::Tls {
                connector,
                server_name,
            } => {
                self.bounded(async {
                    let tls = connector
                        .connect(server_name.clone(), tunnel)
                        .await
                        .map_err(RelayError::Tls)?;
                    tracing::debug!("TLS established with upstream");
                    exchange(tls, request).await
                })
                .await
            }
        }
    }

    async fn bounded<F>(&self, fut: F) -> Result<UpstreamResponse, RelayError>
    where
        F: Future<Output = Result<UpstreamResponse, RelayError>>,
    {
        match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| RelayError::Timeout(limit))?,
            None => fut.await,
        }
    }

    fn build_request(&self, body: Bytes) -> Result<Request<Full<Bytes>>, RelayError> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.path.as_str())
            .header(HOST, self.host_header.clone())
            .header(AUTHORIZATION, self.authorization.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, body.len())
            .header(CONNECTION, "close")
            .body(Full::new(body))?;
        Ok(request)
    }
}

/// HTTP/1.1 exchange on an already-connected stream
async fn exchange<IO>(io: IO, request: Request<Full<Bytes>>) -> Result<UpstreamResponse, RelayError>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(io))
        .await
        .map_err(RelayError::Handshake)?;

    let connection = ConnectionGuard(tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!("Upstream connection ended: {}", e);
        }
    }));

    let response = sender.send_request(request).await.map_err(RelayError::Send)?;
    let (parts, body) = response.into_parts();

    Ok(UpstreamResponse {
        status: parts.status,
        headers: parts.headers,
        body,
        connection,
    })
}

/// Client TLS config trusting the Mozilla root set, HTTP/1.1 only
fn tls_client_config() -> Result<ClientConfig, rustls::Error> {
    let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let mut config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(config)
}
