//! JSON-RPC client for A2A agents.
//!
//! [`A2aClient`] speaks `message/send`, `message/stream` and `tasks/get`
//! against the endpoint advertised in the agent card. The driver only sees
//! the [`AgentTransport`] trait.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::header::{ACCEPT, HeaderMap};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::protocol::{
    AGENT_CARD_PATH, AgentCard, Event, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    METHOD_MESSAGE_SEND, METHOD_MESSAGE_STREAM, METHOD_TASKS_GET, MessageSendParams,
    SendMessageResult, Task, TaskQueryParams,
};
use crate::sse::{SseDecoder, SseEvent};

/// Connect timeout for every request. Bodies are not time-limited since a
/// video stream can stay open for minutes.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Stream of decoded events from `message/stream`.
pub type EventStream = BoxStream<'static, Result<Event, ClientError>>;

/// Errors from talking to an agent.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to build HTTP client: {0}")]
    Builder(#[source] reqwest::Error),

    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("Agent returned JSON-RPC error: {0}")]
    Rpc(JsonRpcError),

    #[error("Failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },
}

impl ClientError {
    fn http(url: &str, source: reqwest::Error) -> Self {
        Self::Http {
            url: url.to_string(),
            source,
        }
    }

    fn decode(what: &'static str, message: impl std::fmt::Display) -> Self {
        Self::Decode {
            what,
            message: message.to_string(),
        }
    }
}

/// Operations the task driver needs from an agent.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// `message/send`: one request, one result.
    async fn send_message(&self, params: MessageSendParams) -> Result<SendMessageResult, ClientError>;

    /// `message/stream`: events in arrival order.
    ///
    /// Fails if the stream cannot be opened. Once open, a JSON-RPC error or a
    /// broken body surfaces as an `Err` item; malformed events are skipped.
    async fn send_message_streaming(&self, params: MessageSendParams) -> Result<EventStream, ClientError>;

    /// `tasks/get`: the current task record.
    async fn get_task(&self, params: TaskQueryParams) -> Result<Task, ClientError>;
}

/// Build the shared HTTP client with the caller's extra headers.
pub fn build_http_client(headers: HeaderMap) -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(ClientError::Builder)
}

/// Fetch the agent card from `{base_url}/.well-known/agent.json`.
#[instrument(level = "info", skip(http))]
pub async fn resolve_agent_card(http: &reqwest::Client, base_url: &str) -> Result<AgentCard, ClientError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), AGENT_CARD_PATH);
    debug!(url = %url, "Fetching agent card");

    let response = http.get(&url).send().await.map_err(|e| ClientError::http(&url, e))?;
    let response = ensure_success(&url, response).await?;
    let body = response.text().await.map_err(|e| ClientError::http(&url, e))?;

    serde_json::from_str(&body).map_err(|e| ClientError::decode("agent card", e))
}

/// JSON-RPC client bound to one agent endpoint.
#[derive(Debug, Clone)]
pub struct A2aClient {
    http: reqwest::Client,
    url: String,
}

impl A2aClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self { http, url: url.into() }
    }

    /// Client for the endpoint the card advertises, falling back to the
    /// base URL the card was fetched from.
    pub fn from_card(http: reqwest::Client, card: &AgentCard, base_url: &str) -> Self {
        let url = if card.url.trim().is_empty() {
            base_url.to_string()
        } else {
            card.url.clone()
        };
        Self::new(http, url)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<P, R>(&self, method: &'static str, params: P) -> Result<R, ClientError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let request = JsonRpcRequest::new(method, params);
        debug!(method, request_id = %request.id, "Sending JSON-RPC request");

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::http(&self.url, e))?;
        let response = ensure_success(&self.url, response).await?;
        let body = response.text().await.map_err(|e| ClientError::http(&self.url, e))?;

        let envelope: JsonRpcResponse<Value> =
            serde_json::from_str(&body).map_err(|e| ClientError::decode("JSON-RPC response", e))?;
        let result = envelope.into_result().map_err(ClientError::Rpc)?;
        serde_json::from_value(result).map_err(|e| ClientError::decode(method, e))
    }
}

#[async_trait]
impl AgentTransport for A2aClient {
    #[instrument(level = "debug", skip_all, fields(url = %self.url))]
    async fn send_message(&self, params: MessageSendParams) -> Result<SendMessageResult, ClientError> {
        self.call(METHOD_MESSAGE_SEND, params).await
    }

    #[instrument(level = "debug", skip_all, fields(url = %self.url))]
    async fn send_message_streaming(&self, params: MessageSendParams) -> Result<EventStream, ClientError> {
        let request = JsonRpcRequest::new(METHOD_MESSAGE_STREAM, params);
        debug!(request_id = %request.id, "Opening event stream");

        let response = self
            .http
            .post(&self.url)
            .header(ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::http(&self.url, e))?;
        let response = ensure_success(&self.url, response).await?;

        let url = self.url.clone();
        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            let mut pending = Vec::new();
            let mut body = response.bytes_stream();

            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => {
                        pending.extend_from_slice(&bytes);
                        let text = drain_utf8(&mut pending);
                        for event in decoder.feed(&text) {
                            if let Some(item) = decode_stream_event(&event) {
                                yield item;
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(ClientError::http(&url, e));
                        return;
                    }
                }
            }

            if let Some(event) = decoder.finish() {
                if let Some(item) = decode_stream_event(&event) {
                    yield item;
                }
            }
            debug!("Event stream closed");
        };

        Ok(Box::pin(stream))
    }

    #[instrument(level = "debug", skip_all, fields(url = %self.url, task_id = %params.id))]
    async fn get_task(&self, params: TaskQueryParams) -> Result<Task, ClientError> {
        self.call(METHOD_TASKS_GET, params).await
    }
}

async fn ensure_success(url: &str, response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// Take the longest valid UTF-8 prefix, keeping an incomplete trailing
/// sequence for the next chunk.
fn drain_utf8(pending: &mut Vec<u8>) -> String {
    let valid = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => pending.len(),
    };
    let bytes: Vec<u8> = pending.drain(..valid).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Decode one SSE payload. `None` means the payload was skipped.
fn decode_stream_event(event: &SseEvent) -> Option<Result<Event, ClientError>> {
    let envelope: JsonRpcResponse<Value> = match serde_json::from_str(&event.data) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Skipping malformed stream payload");
            return None;
        }
    };

    match envelope.into_result() {
        Ok(result) => match serde_json::from_value::<Event>(result) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!(error = %e, "Skipping unrecognized stream event");
                None
            }
        },
        Err(rpc) => Some(Err(ClientError::Rpc(rpc))),
    }
}
