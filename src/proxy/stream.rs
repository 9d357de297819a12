//! Response body relayed from upstream to the client
//!
//! [`RelayStream`] forwards upstream chunks as they arrive and owns the
//! request's pending metrics observation. Whatever ends the relay (upstream
//! end of body, an upstream error, the idle timer, or the client going away
//! and the body being dropped) records the outcome exactly once and closes
//! the tunnel.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use http_body_util::BodyExt;
use hyper::body::Body as _;
use tokio::time::Sleep;

use super::relay::{ConnectionGuard, UpstreamResponse};
use super::sse::SseObserver;
use crate::metrics::OutcomeTimer;

/// Why the relay stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayEnd {
    Complete,
    UpstreamError,
    IdleTimeout,
    ClientGone,
}

impl RelayEnd {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::UpstreamError => "upstream_error",
            Self::IdleTimeout => "idle_timeout",
            Self::ClientGone => "client_disconnected",
        }
    }
}

pub struct RelayStream {
    inner: BoxStream<'static, Result<Bytes, hyper::Error>>,
    idle_timeout: Option<Duration>,
    idle_sleep: Option<Pin<Box<Sleep>>>,
    /// Observation to record and the status the client was sent
    outcome: Option<(OutcomeTimer, u16)>,
    observer: Option<SseObserver>,
    bytes: u64,
    /// Body length announced by upstream, if any
    expected_len: Option<u64>,
    span: tracing::Span,
    done: bool,
    // Dropping this closes the tunnel
    _connection: ConnectionGuard,
}

impl RelayStream {
    /// Wrap an upstream response body
    ///
    /// `observe_sse` enables event accounting for the request log.
    pub fn new(
        upstream: UpstreamResponse,
        timer: OutcomeTimer,
        idle_timeout: Option<Duration>,
        observe_sse: bool,
    ) -> Self {
        let status = upstream.status.as_u16();
        let expected_len = upstream.body.size_hint().exact();
        Self {
            inner: Box::pin(upstream.body.into_data_stream()),
            idle_timeout,
            idle_sleep: idle_timeout.map(|d| Box::pin(tokio::time::sleep(d))),
            outcome: Some((timer, status)),
            observer: observe_sse.then(SseObserver::new),
            bytes: 0,
            expected_len,
            span: tracing::Span::current(),
            done: false,
            _connection: upstream.connection,
        }
    }

    fn finish(&mut self, end: RelayEnd) {
        self.done = true;
        let Some((timer, status)) = self.outcome.take() else {
            return;
        };
        let _entered = self.span.enter();

        match self.observer.take().map(SseObserver::finish) {
            Some(summary) => tracing::info!(
                status,
                end = end.as_str(),
                bytes = self.bytes,
                events = summary.events,
                content_chars = summary.content_chars,
                done = summary.done,
                model = summary.model.as_deref().unwrap_or("-"),
                finish_reason = summary.finish_reason.as_deref().unwrap_or("-"),
                "Stream relay finished"
            ),
            None => tracing::info!(
                status,
                end = end.as_str(),
                bytes = self.bytes,
                "Relay finished"
            ),
        }
        if end != RelayEnd::Complete {
            tracing::warn!("Relay ended early: {}", end.as_str());
        }

        timer.record(status);
    }
}

impl Stream for RelayStream {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.as_mut().get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.inner.poll_next_unpin(cx) {
            Poll::Pending => {
                if let Some(timer) = this.idle_sleep.as_mut() {
                    if timer.as_mut().poll(cx).is_ready() {
                        this.finish(RelayEnd::IdleTimeout);
                        return Poll::Ready(Some(Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "upstream went idle mid-response",
                        ))));
                    }
                }
                Poll::Pending
            }
            Poll::Ready(None) => {
                this.finish(RelayEnd::Complete);
                Poll::Ready(None)
            }
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes += chunk.len() as u64;
                if let Some(observer) = this.observer.as_mut() {
                    observer.ingest(&chunk);
                }
                if this.expected_len == Some(this.bytes) {
                    // Length-delimited bodies may be dropped without a final poll
                    this.finish(RelayEnd::Complete);
                } else if let Some(d) = this.idle_timeout {
                    this.idle_sleep = Some(Box::pin(tokio::time::sleep(d)));
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finish(RelayEnd::UpstreamError);
                Poll::Ready(Some(Err(io::Error::other(e))))
            }
        }
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if !self.done {
            self.finish(RelayEnd::ClientGone);
        }
    }
}
