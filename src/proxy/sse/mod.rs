// SSE (Server-Sent Events) observation module
//
// Streamed chat completions arrive as OpenAI-style SSE:
// ```
// data: {"choices":[{"delta":{"content":"Hel"}}], "model": "..."}
//
// data: [DONE]
// ```
//
// The proxy relays these bytes untouched. This module only watches them go by
// so the request log can say how many events were relayed, how much text the
// model produced and whether the stream ended with the `[DONE]` sentinel.
// Nothing here can alter or delay the relayed bytes.

use axum::http::{header::CONTENT_TYPE, HeaderMap};
use serde_json::Value;

/// Sentinel the upstream sends as its final data line
const DONE_SENTINEL: &str = "[DONE]";

/// Longest partial line carried between chunks before it is dropped
const MAX_PENDING_LINE: usize = 64 * 1024;

// ============================================================================
// SSE Detection
// ============================================================================

/// Check if a response is SSE based on content-type header
pub fn is_sse_response(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("text/event-stream"))
        .unwrap_or(false)
}

// ============================================================================
// Line-Level Extractors
// ============================================================================

/// Extract incremental assistant text from a chat-completion chunk
pub fn extract_delta_content(line: &str) -> Option<String> {
    let data = parse_sse_data_line(line)?;
    data.get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .map(String::from)
}

/// Extract the finish reason (`stop`, `length`, ...) from a chunk
pub fn extract_finish_reason(line: &str) -> Option<String> {
    let data = parse_sse_data_line(line)?;
    data.get("choices")?
        .get(0)?
        .get("finish_reason")?
        .as_str()
        .map(String::from)
}

/// Extract the model name the upstream reports
pub fn extract_model(line: &str) -> Option<String> {
    let data = parse_sse_data_line(line)?;
    data.get("model")?.as_str().map(String::from)
}

/// True for the terminal `data: [DONE]` line
pub fn is_done_line(line: &str) -> bool {
    line.strip_prefix("data:")
        .map(|rest| rest.trim() == DONE_SENTINEL)
        .unwrap_or(false)
}

// ============================================================================
// Stream Observer
// ============================================================================

/// Summary of one relayed event stream
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SseSummary {
    /// `data:` lines seen, including the sentinel
    pub events: usize,
    /// Characters of assistant text across all deltas
    pub content_chars: usize,
    pub model: Option<String>,
    pub finish_reason: Option<String>,
    /// Whether the `[DONE]` sentinel arrived
    pub done: bool,
}

/// Incremental line splitter over relayed chunks
///
/// Chunks can split a line (or a UTF-8 sequence) anywhere, so the tail of each
/// chunk is carried until its newline arrives.
#[derive(Debug, Default)]
pub struct SseObserver {
    pending: Vec<u8>,
    summary: SseSummary,
}

impl SseObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        let mut consumed = 0;
        while let Some(pos) = self.pending[consumed..].iter().position(|&b| b == b'\n') {
            let end = consumed + pos;
            let line = String::from_utf8_lossy(&self.pending[consumed..end]).into_owned();
            self.observe_line(line.trim_end_matches('\r'));
            consumed = end + 1;
        }
        self.pending.drain(..consumed);

        if self.pending.len() > MAX_PENDING_LINE {
            tracing::debug!(len = self.pending.len(), "Dropping oversized SSE line");
            self.pending.clear();
        }
    }

    fn observe_line(&mut self, line: &str) {
        if !line.starts_with("data:") {
            return;
        }
        self.summary.events += 1;

        if is_done_line(line) {
            self.summary.done = true;
            return;
        }
        if let Some(text) = extract_delta_content(line) {
            self.summary.content_chars += text.chars().count();
        }
        if self.summary.model.is_none() {
            self.summary.model = extract_model(line);
        }
        if let Some(reason) = extract_finish_reason(line) {
            self.summary.finish_reason = Some(reason);
        }
    }

    /// Flush any unterminated final line and return the summary
    pub fn finish(mut self) -> SseSummary {
        if !self.pending.is_empty() {
            let line = String::from_utf8_lossy(&self.pending).into_owned();
            self.observe_line(line.trim_end_matches('\r'));
        }
        self.summary
    }
}

// ============================================================================
// Internal Helpers
// ============================================================================

/// Parse an SSE "data:" line into JSON
///
/// Returns None if:
/// - Line doesn't start with "data:"
/// - Data is empty or "[DONE]"
/// - JSON parsing fails
fn parse_sse_data_line(line: &str) -> Option<Value> {
    let json_str = line.strip_prefix("data:")?.trim();
    if json_str.is_empty() || json_str == DONE_SENTINEL {
        return None;
    }
    serde_json::from_str(json_str).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_is_sse_response() {
        let mut headers = HeaderMap::new();
        assert!(!is_sse_response(&headers));

        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/event-stream; charset=utf-8"),
        );
        assert!(is_sse_response(&headers));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(!is_sse_response(&headers));
    }

    #[test]
    fn test_line_extractors() {
        let line = r#"data: {"model":"qwen","choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#;
        assert_eq!(extract_delta_content(line).as_deref(), Some("Hi"));
        assert_eq!(extract_model(line).as_deref(), Some("qwen"));
        assert_eq!(extract_finish_reason(line), None);

        let last = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(extract_finish_reason(last).as_deref(), Some("stop"));
        assert_eq!(extract_delta_content(last), None);

        assert!(is_done_line("data: [DONE]"));
        assert!(is_done_line("data:[DONE]"));
        assert!(!is_done_line("event: [DONE]"));
        assert_eq!(extract_delta_content("data: [DONE]"), None);
        assert_eq!(extract_delta_content("data: not json"), None);
    }

    #[test]
    fn test_observer_handles_split_lines() {
        let stream = concat!(
            "data: {\"model\":\"qwen\",\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\", wörld\"}}]}\r\n\r\n",
            ": keep-alive comment\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        )
        .as_bytes();

        // Feed in awkward 7-byte pieces, splitting lines and the ö
        let mut observer = SseObserver::new();
        for piece in stream.chunks(7) {
            observer.ingest(piece);
        }
        let summary = observer.finish();

        assert_eq!(summary.events, 4);
        assert_eq!(summary.content_chars, "Hello, wörld".chars().count());
        assert_eq!(summary.model.as_deref(), Some("qwen"));
        assert_eq!(summary.finish_reason.as_deref(), Some("stop"));
        assert!(summary.done);
    }

    #[test]
    fn test_observer_without_sentinel() {
        let mut observer = SseObserver::new();
        observer.ingest(b"data: {\"choices\":[{\"delta\":{\"content\":\"cut\"}}]}");
        let summary = observer.finish();

        assert_eq!(summary.events, 1);
        assert_eq!(summary.content_chars, 3);
        assert!(!summary.done);
    }

    #[test]
    fn test_observer_drops_oversized_line() {
        let mut observer = SseObserver::new();
        observer.ingest(&vec![b'x'; MAX_PENDING_LINE + 1]);
        observer.ingest(b"\ndata: [DONE]\n");
        let summary = observer.finish();

        assert_eq!(summary.events, 1);
        assert!(summary.done);
    }
}
