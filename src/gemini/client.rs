use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};

use super::types::{ApiErrorEnvelope, GenerateContentRequest, GenerationConfig, StreamPayload};
use crate::error::AppError;
use crate::llm::{ChatModel, ModelStream, UpstreamError};
use crate::models::Conversation;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

const API_KEY_HEADER: &str = "x-goog-api-key";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub generation: GenerationConfig,
    pub system_instruction: String,
    pub google_search: bool,
}

/// Streams chat completions from the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, AppError> {
        let mut api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| AppError::configuration("API key contains invalid header characters"))?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self { http, config })
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_request(&self, conversation: &Conversation) -> GenerateContentRequest {
        let request = GenerateContentRequest::from_conversation(conversation, self.config.generation)
            .with_system_instruction(&self.config.system_instruction);
        if self.config.google_search {
            request.with_google_search()
        } else {
            request
        }
    }

    async fn open_stream(&self, request: &GenerateContentRequest) -> Result<reqwest::Response, UpstreamError> {
        let response = self
            .http
            .post(self.stream_url())
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match serde_json::from_str::<ApiErrorEnvelope>(&body) {
            Ok(envelope) => envelope.into_upstream_error(status.as_u16()),
            Err(_) => UpstreamError::Api {
                status: status.as_u16(),
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
            },
        })
    }
}

/// Turns the raw SSE body into relay events.
fn decode_events(response: reqwest::Response) -> ModelStream {
    let mut events = Box::pin(response.bytes_stream().eventsource());

    async_stream::try_stream! {
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| UpstreamError::Stream(e.to_string()))?;
            if event.data.trim().is_empty() {
                continue;
            }

            let payload: StreamPayload = serde_json::from_str(&event.data)
                .map_err(|e| UpstreamError::Decode(format!("{}: {}", e, event.data)))?;

            match payload {
                StreamPayload::Error(envelope) => {
                    Err::<(), _>(envelope.into_upstream_error(200))?;
                }
                StreamPayload::Response(response) => {
                    for model_event in response.into_events()? {
                        yield model_event;
                    }
                }
            }
        }
    }
    .boxed()
}

#[async_trait]
impl ChatModel for GeminiClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn stream_chat(&self, conversation: Conversation) -> Result<ModelStream, UpstreamError> {
        let request = self.build_request(&conversation);
        let response = self.open_stream(&request).await?;
        Ok(decode_events(response))
    }
}
