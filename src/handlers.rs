use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header;
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use axum::Json;
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{AppError, Result};
use crate::models::{ChatRequest, HealthStatus};
use crate::AppState;

// ============================================================================
// SSE STREAM HANDLER
// ============================================================================

/// Handler for streaming chat responses via SSE
///
/// POST /api/chat
/// Body: `{"messages": [{"role": "user" | "assistant", "content": "..."}]}`
///
/// Returns: Server-Sent Events stream of `StreamChunk` frames, ending with `done`.
/// While the model is quiet a `:keep-alive` comment is sent every 15 seconds.
/// Malformed bodies are rejected with 400 before any frame is written. The
/// body is parsed as JSON whatever its `Content-Type`.
pub async fn chat_stream_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response> {
    let Json(request) = Json::<ChatRequest>::from_bytes(&body)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let conversation = request.into_conversation()?;

    let rx = state.relay.start(conversation);

    // One SSE event per frame; axum writes each as its own body chunk.
    let stream = ReceiverStream::new(rx).map(|chunk| Event::default().json_data(chunk));

    let sse = Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    );

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        sse,
    )
        .into_response())
}

// ============================================================================
// HEALTH
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(HealthStatus::healthy(state.relay.model_name()))
}

// ============================================================================
// TESTS
// ============================================================================
