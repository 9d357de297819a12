//! Request outcome metrics
//!
//! A process-wide Prometheus registry with one counter and one histogram.
//! Every chat request folds exactly one outcome into both: the counter is
//! labelled with the HTTP status the client saw and the request type, the
//! histogram records how long the request took end to end.
//!
//! The single-observation rule is enforced by [`OutcomeTimer`]: it is
//! consumed by [`OutcomeTimer::record`], so a request cannot report twice,
//! and a timer dropped unrecorded (the client hung up before the request
//! ended) reports [`CLIENT_CLOSED_REQUEST`].

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

const REQUESTS_TOTAL: &str = "excel_ai_requests_total";
const REQUEST_DURATION: &str = "excel_ai_request_duration_seconds";

/// Histogram buckets in seconds, sized for LLM completions
const DURATION_BUCKETS: &[f64] = &[0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0];

/// Status label for requests abandoned by the client before a response
/// (nginx's 499 convention)
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Whether the client asked for an incremental response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Stream,
    Sync,
}

impl RequestType {
    pub fn from_stream_flag(stream: bool) -> Self {
        if stream {
            Self::Stream
        } else {
            Self::Sync
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stream => "stream",
            Self::Sync => "sync",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide metrics registry
///
/// Cheap to clone; all clones share the same collectors.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new(REQUESTS_TOTAL, "Total chat requests from the Excel add-in"),
            &["status", "type"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(REQUEST_DURATION, "Chat request duration in seconds")
                .buckets(DURATION_BUCKETS.to_vec()),
            &["type"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        // Process CPU/memory/fd gauges, where the platform exposes them
        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            requests,
            duration,
        })
    }

    /// Start timing one request
    pub fn start(self: &Arc<Self>, request_type: RequestType) -> OutcomeTimer {
        OutcomeTimer {
            metrics: Arc::clone(self),
            request_type,
            started: Instant::now(),
            recorded: false,
        }
    }

    fn observe(&self, status: u16, request_type: RequestType, seconds: f64) {
        let status = status.to_string();
        self.requests
            .with_label_values(&[status.as_str(), request_type.as_str()])
            .inc();
        self.duration
            .with_label_values(&[request_type.as_str()])
            .observe(seconds);
    }

    /// Render the registry in Prometheus text exposition format
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Content type for [`Metrics::render`] output
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Current value of the request counter for one label pair
    #[cfg(test)]
    pub fn request_count(&self, status: u16, request_type: RequestType) -> u64 {
        self.requests
            .with_label_values(&[status.to_string().as_str(), request_type.as_str()])
            .get()
    }

    /// Sum of the request counter across every label pair
    #[cfg(test)]
    pub fn total_requests(&self) -> u64 {
        let rendered = self.render().unwrap_or_default();
        rendered
            .lines()
            .filter(|line| line.starts_with(REQUESTS_TOTAL) && line.contains('{'))
            .filter_map(|line| line.rsplit(' ').next())
            .filter_map(|value| value.parse::<f64>().ok())
            .map(|value| value as u64)
            .sum()
    }
}

/// Pending observation for one in-flight request
///
/// Created when the request arrives; consumed when the request reaches its
/// terminal state. Dropping it unrecorded counts as
/// [`CLIENT_CLOSED_REQUEST`].
pub struct OutcomeTimer {
    metrics: Arc<Metrics>,
    request_type: RequestType,
    started: Instant,
    recorded: bool,
}

impl OutcomeTimer {
    /// Fold the terminal outcome into the registry
    pub fn record(mut self, status: u16) {
        self.observe(status);
    }

    fn observe(&mut self, status: u16) {
        if self.recorded {
            return;
        }
        self.recorded = true;
        let seconds = self.started.elapsed().as_secs_f64();
        self.metrics.observe(status, self.request_type, seconds);
        tracing::debug!(
            status,
            request_type = %self.request_type,
            duration_secs = seconds,
            "Outcome recorded"
        );
    }
}

impl Drop for OutcomeTimer {
    fn drop(&mut self) {
        if !self.recorded {
            tracing::info!("Client went away before the request finished");
            self.observe(CLIENT_CLOSED_REQUEST);
        }
    }
}
