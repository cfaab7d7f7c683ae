//! The seam between the relay and whatever model answers the chat.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::models::{Conversation, Source, ToolInvocation};

/// Error messages some SDK-style transports use to say "the stream is over".
const END_OF_STREAM_EXACT: &str = "iterator done";
const END_OF_STREAM_CONTAINS: &str = "no more items";

/// One item pulled from an upstream response stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    Text(String),
    ToolCall(ToolInvocation),
    Grounding(Vec<Source>),
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upstream API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Failed to decode upstream chunk: {0}")]
    Decode(String),
    #[error("Stream error: {0}")]
    Stream(String),
    #[error("Prompt blocked by upstream: {0}")]
    Blocked(String),
}

impl UpstreamError {
    /// True when the error is really the upstream saying it has nothing more to send.
    pub fn is_end_of_stream(&self) -> bool {
        match self {
            Self::Stream(message) => {
                message == END_OF_STREAM_EXACT || message.contains(END_OF_STREAM_CONTAINS)
            }
            Self::Http(_) | Self::Api { .. } | Self::Decode(_) | Self::Blocked(_) => false,
        }
    }
}

pub type ModelStream = BoxStream<'static, Result<ModelEvent, UpstreamError>>;

/// A generative model that can answer a conversation as a stream of events.
///
/// Implementations are built once at startup and shared read-only between
/// requests, so `stream_chat` must not mutate shared state.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    async fn stream_chat(&self, conversation: Conversation) -> Result<ModelStream, UpstreamError>;
}
