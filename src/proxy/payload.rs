//! Inbound chat requests and the upstream payload built from them

use bytes::Bytes;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::UpstreamConfig;

/// Author of one chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    System,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Body of `POST /api/chat`
///
/// Both fields follow JavaScript truthiness, which is what clients of the
/// add-in send: a falsy or missing `messages` is an empty conversation, and
/// `stream` is on for any truthy value.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundRequest {
    #[serde(default, deserialize_with = "falsy_as_empty")]
    pub messages: Vec<ChatMessage>,
    #[serde(default, deserialize_with = "truthy")]
    stream: bool,
}

impl InboundRequest {
    pub fn parse(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    pub fn stream(&self) -> bool {
        self.stream
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
        Value::Null => false,
    }
}

fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Value::deserialize(deserializer).map(|value| is_truthy(&value))
}

fn falsy_as_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<ChatMessage>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if !is_truthy(&value) {
        return Ok(Vec::new());
    }
    Vec::<ChatMessage>::deserialize(value).map_err(de::Error::custom)
}

/// Best-effort read of the `stream` flag from a body that may be invalid
///
/// Used to label metrics for requests rejected before the body is parsed.
/// Applies the same truthiness as [`InboundRequest`].
pub fn peek_stream_flag(body: &[u8]) -> bool {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("stream").map(is_truthy))
        .unwrap_or(false)
}

/// JSON body sent to the chat-completions endpoint
#[derive(Debug, Serialize)]
pub struct UpstreamPayload<'a> {
    messages: &'a [ChatMessage],
    model: &'a str,
    stream: bool,
    max_tokens: u32,
}

impl<'a> UpstreamPayload<'a> {
    pub fn new(request: &'a InboundRequest, upstream: &'a UpstreamConfig) -> Self {
        Self {
            messages: &request.messages,
            model: &upstream.model,
            stream: request.stream(),
            max_tokens: upstream.max_tokens,
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Bytes> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}
