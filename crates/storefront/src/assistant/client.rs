//! Streaming chat-completions client.
//!
//! Talks to any OpenAI-compatible gateway: `POST {base_url}/chat/completions`
//! with `stream: true`, answered by `data: {json}` events and a final
//! `data: [DONE]`.

use std::sync::Arc;

use async_stream::stream;
use futures::Stream;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use tracing::instrument;

use crate::config::AssistantConfig;

use super::error::{ApiErrorResponse, AssistantError};
use super::types::{ChatCompletionChunk, ChatCompletionRequest, ChatMessage, StreamChunk};

const MAX_TOKENS: u32 = 600;
const TEMPERATURE: f32 = 0.4;

/// Shopping assistant client.
#[derive(Clone)]
pub struct AssistantClient {
    inner: Arc<AssistantClientInner>,
}

struct AssistantClientInner {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl AssistantClient {
    /// Create a new assistant client.
    ///
    /// # Errors
    ///
    /// Returns `AssistantError::Unauthorized` if the API key can't be sent as
    /// a header, or `AssistantError::Http` if the HTTP client can't be built.
    pub fn new(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
            .map_err(|_| AssistantError::Unauthorized("API key is not a valid header".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(AssistantClientInner {
                client,
                endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
                model: config.model.clone(),
            }),
        })
    }

    /// Start a streamed completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial request fails or the gateway answers
    /// with an error status. Errors after streaming starts are yielded.
    #[instrument(skip(self, messages), fields(model = %self.inner.model, turns = messages.len()))]
    pub async fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Result<impl Stream<Item = Result<StreamChunk, AssistantError>> + Send + use<>, AssistantError>
    {
        let request = ChatCompletionRequest {
            model: self.inner.model.clone(),
            messages,
            stream: true,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_error_status(status, response).await);
        }

        Ok(completion_events(response.bytes_stream()))
    }
}

/// Turn the raw response body into assistant chunks.
///
/// Network chunks can end mid-character, so bytes are buffered until a whole
/// event has arrived and only then decoded.
fn completion_events<S, B, E>(
    body: S,
) -> impl Stream<Item = Result<StreamChunk, AssistantError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    stream! {
        use futures::StreamExt;

        let mut buffer = SseBuffer::default();
        let mut body = std::pin::pin!(body);

        while let Some(chunk_result) = body.next().await {
            match chunk_result {
                Ok(chunk) => {
                    buffer.push(chunk.as_ref());

                    while let Some(event) = buffer.next_event() {
                        let parsed = match event {
                            Ok(event) => parse_sse_event(&event),
                            Err(e) => Some(Err(e)),
                        };
                        if let Some(parsed) = parsed {
                            let done = matches!(parsed, Ok(StreamChunk::Done));
                            yield parsed;
                            if done {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    yield Err(AssistantError::Stream(e.to_string()));
                    return;
                }
            }
        }
    }
}

async fn handle_error_status(
    status: reqwest::StatusCode,
    response: reqwest::Response,
) -> AssistantError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(20);
        return AssistantError::RateLimited(retry_after);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return AssistantError::Unauthorized("API key rejected".to_string());
    }

    match response.text().await {
        Ok(body) => match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(api_error) => AssistantError::Api {
                error_type: api_error
                    .error
                    .error_type
                    .unwrap_or_else(|| status.as_u16().to_string()),
                message: api_error.error.message,
            },
            Err(_) => AssistantError::Api {
                error_type: status.as_u16().to_string(),
                message: body.chars().take(200).collect(),
            },
        },
        Err(e) => AssistantError::Http(e),
    }
}

/// Undecoded response bytes awaiting a complete SSE event.
#[derive(Debug, Default)]
struct SseBuffer {
    bytes: Vec<u8>,
}

impl SseBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
        // Gateways differ on line endings
        if self.bytes.windows(2).any(|w| w == b"\r\n") {
            self.bytes = fold_crlf(&self.bytes);
        }
    }

    /// Take one complete event off the front, decoded as UTF-8.
    fn next_event(&mut self) -> Option<Result<String, AssistantError>> {
        let idx = self.bytes.windows(2).position(|w| w == b"\n\n")?;
        let event: Vec<u8> = self.bytes.drain(..idx + 2).collect();
        Some(
            String::from_utf8(event)
                .map(|text| text.trim_end().to_string())
                .map_err(|e| AssistantError::Parse(format!("Invalid UTF-8 in event: {e}"))),
        )
    }
}

fn fold_crlf(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().peekable();
    while let Some(&b) = iter.next() {
        if b == b'\r' && iter.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}

/// Parse one SSE event. Keep-alives and empty deltas yield `None`.
fn parse_sse_event(event: &str) -> Option<Result<StreamChunk, AssistantError>> {
    let data = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .last()?;

    if data == "[DONE]" {
        return Some(Ok(StreamChunk::Done));
    }

    let chunk = match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            return Some(Err(AssistantError::Parse(format!(
                "Failed to parse stream chunk: {e}"
            ))));
        }
    };

    let text: String = chunk
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(Ok(StreamChunk::Text(text)))
    }
}
