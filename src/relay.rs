use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::llm::{ChatModel, ModelEvent, ModelStream};
use crate::models::{Conversation, Source, StreamChunk};

const RELAY_CHANNEL_CAPACITY: usize = 16;

// ============================================================================
// RELAY SUMMARY
// ============================================================================

/// Everything the relay holds back until the text stream is over.
#[derive(Debug, Default)]
struct RelaySummary {
    text_frames: usize,
    sources: Vec<Source>,
    tool_results: Vec<String>,
}

impl RelaySummary {
    fn add_sources(&mut self, sources: Vec<Source>) {
        for source in sources {
            if !self.sources.iter().any(|known| known.url == source.url) {
                self.sources.push(source);
            }
        }
    }

    fn metadata(&self) -> Option<StreamChunk> {
        if self.sources.is_empty() && self.tool_results.is_empty() {
            return None;
        }
        Some(StreamChunk::Metadata {
            sources: self.sources.clone(),
            tool_results: self.tool_results.clone(),
        })
    }
}

/// How the upstream phase ended.
enum Outcome {
    Completed,
    Failed(String),
    Disconnected,
}

// ============================================================================
// CHAT RELAY
// ============================================================================

/// Relays one conversation per call to the configured model and re-frames its
/// output as [`StreamChunk`]s.
#[derive(Clone)]
pub struct ChatRelay {
    model: Arc<dyn ChatModel>,
}

impl ChatRelay {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Starts relaying in the background and returns the frame receiver.
    ///
    /// Dropping the receiver cancels the relay and the upstream call with it.
    pub fn start(&self, conversation: Conversation) -> mpsc::Receiver<StreamChunk> {
        let (tx, rx) = mpsc::channel(RELAY_CHANNEL_CAPACITY);
        let model = self.model.clone();

        tokio::spawn(async move {
            let request_id = Uuid::now_v7().to_string();
            log::info!(
                "[{}] relaying chat: {} prior turns",
                request_id,
                conversation.history.len()
            );
            Self::run(model, conversation, tx, &request_id).await;
        });

        rx
    }

    async fn run(
        model: Arc<dyn ChatModel>,
        conversation: Conversation,
        tx: mpsc::Sender<StreamChunk>,
        request_id: &str,
    ) {
        let mut summary = RelaySummary::default();

        let outcome = match model.stream_chat(conversation).await {
            Ok(upstream) => Self::pump(upstream, &tx, &mut summary).await,
            Err(e) => Outcome::Failed(e.to_string()),
        };

        match outcome {
            Outcome::Completed => {}
            Outcome::Failed(message) => {
                log::warn!("[{}] upstream stream failed: {}", request_id, message);
                if tx.send(StreamChunk::Error { message }).await.is_err() {
                    log::info!("[{}] client disconnected before error frame", request_id);
                    return;
                }
            }
            Outcome::Disconnected => {
                log::info!("[{}] client disconnected, upstream call dropped", request_id);
                return;
            }
        }

        if let Some(metadata) = summary.metadata() {
            if tx.send(metadata).await.is_err() {
                return;
            }
        }
        let _ = tx.send(StreamChunk::Done).await;

        log::info!(
            "[{}] chat finished: {} text frames, {} tool calls, {} sources",
            request_id,
            summary.text_frames,
            summary.tool_results.len(),
            summary.sources.len()
        );
    }

    /// Pulls upstream events one at a time, forwarding text as soon as it arrives.
    async fn pump(
        mut upstream: ModelStream,
        tx: &mpsc::Sender<StreamChunk>,
        summary: &mut RelaySummary,
    ) -> Outcome {
        loop {
            let next = tokio::select! {
                biased;
                _ = tx.closed() => return Outcome::Disconnected,
                next = upstream.next() => next,
            };

            match next {
                None => return Outcome::Completed,
                Some(Ok(ModelEvent::Text(text))) => {
                    if tx.send(StreamChunk::Text { text }).await.is_err() {
                        return Outcome::Disconnected;
                    }
                    summary.text_frames += 1;
                }
                Some(Ok(ModelEvent::ToolCall(call))) => {
                    summary.tool_results.push(call.describe());
                }
                Some(Ok(ModelEvent::Grounding(sources))) => {
                    summary.add_sources(sources);
                }
                Some(Err(e)) if e.is_end_of_stream() => return Outcome::Completed,
                Some(Err(e)) => return Outcome::Failed(e.to_string()),
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
