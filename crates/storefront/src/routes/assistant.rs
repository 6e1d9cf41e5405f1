//! Shopping assistant chat endpoint.
//!
//! The browser keeps the conversation and posts it whole on every turn. The
//! reply streams back as SSE events carrying [`AssistantEvent`] JSON.

use std::convert::Infallible;

use async_stream::stream;
use axum::{
    Json,
    extract::State,
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
};
use futures::{Stream, StreamExt};
use serde::Deserialize;

use riptide_db::ProductFilter;

use crate::assistant::{
    AssistantError, AssistantEvent, ChatMessage, StreamChunk, build_system_prompt,
    validate_history,
};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Chat request body.
#[derive(Debug, Deserialize)]
pub struct AssistantRequest {
    pub messages: Vec<ChatMessage>,
}

/// Stream a reply to the shopper's latest message.
#[tracing::instrument(skip_all)]
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<AssistantRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let assistant = state
        .assistant()
        .cloned()
        .ok_or_else(|| AppError::ServiceUnavailable("The assistant is not available".to_string()))?;

    validate_history(&request.messages)?;

    let settings = state.catalog().settings().await?;
    let currency = settings.currency_code()?;
    let products = state.catalog().products(&ProductFilter::default()).await?;

    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(ChatMessage::system(build_system_prompt(
        &settings.store_name,
        currency,
        &products,
    )));
    messages.extend(request.messages);

    let events = stream! {
        let chunks = match assistant.chat_stream(messages).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(error = %e, "Assistant request failed");
                yield AssistantEvent::Error { message: shopper_message(&e) };
                return;
            }
        };
        let mut chunks = std::pin::pin!(chunks);

        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(StreamChunk::Text(text)) => yield AssistantEvent::Delta { text },
                Ok(StreamChunk::Done) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Assistant stream failed");
                    yield AssistantEvent::Error { message: shopper_message(&e) };
                    return;
                }
            }
        }
        yield AssistantEvent::Done;
    };

    let sse_stream = events.map(|event| {
        let json = serde_json::to_string(&event).unwrap_or_else(|_| {
            r#"{"type":"error","message":"Failed to serialize event"}"#.to_string()
        });
        Ok(Event::default().data(json))
    });

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

fn shopper_message(err: &AssistantError) -> String {
    match err {
        AssistantError::RateLimited(_) => {
            "The assistant is busy, please try again shortly".to_string()
        }
        _ => "The assistant is unavailable right now".to_string(),
    }
}
