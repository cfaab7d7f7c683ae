//! Wire types for `streamGenerateContent`.

use serde::{Deserialize, Serialize};

use crate::llm::{ModelEvent, UpstreamError};
use crate::models::{ChatRole, ChatTurn, Conversation, Source, ToolInvocation};

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl From<ChatRole> for Role {
    fn from(role: ChatRole) -> Self {
        match role {
            ChatRole::User => Self::User,
            ChatRole::Assistant => Self::Model,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<TextPart>,
}

impl From<&ChatTurn> for Content {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            role: turn.role.into(),
            parts: vec![TextPart {
                text: turn.content.clone(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SystemInstruction {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 2048,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct GoogleSearch {}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub google_search: GoogleSearch,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

impl GenerateContentRequest {
    /// History first, then the latest message as the new user turn.
    pub fn from_conversation(conversation: &Conversation, generation_config: GenerationConfig) -> Self {
        let mut contents: Vec<Content> = conversation.history.iter().map(Content::from).collect();
        contents.push(Content {
            role: Role::User,
            parts: vec![TextPart {
                text: conversation.latest.clone(),
            }],
        });

        Self {
            contents,
            system_instruction: None,
            generation_config,
            tools: Vec::new(),
        }
    }

    pub fn with_system_instruction(mut self, text: &str) -> Self {
        self.system_instruction = Some(SystemInstruction {
            parts: vec![TextPart {
                text: text.to_string(),
            }],
        });
        self
    }

    pub fn with_google_search(mut self) -> Self {
        self.tools.push(Tool {
            google_search: GoogleSearch::default(),
        });
        self
    }
}

// ============================================================================
// Response
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub function_call: Option<FunctionCall>,
    #[serde(default)]
    pub thought: bool,
}

impl ResponsePart {
    fn into_event(self) -> Option<ModelEvent> {
        if self.thought {
            return None;
        }
        match (self.text, self.function_call) {
            (_, Some(call)) => Some(ModelEvent::ToolCall(ToolInvocation {
                name: call.name,
                arguments: call.args.unwrap_or_default(),
            })),
            (Some(text), None) if !text.is_empty() => Some(ModelEvent::Text(text)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSource {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

impl GroundingMetadata {
    fn sources(self) -> Vec<Source> {
        self.grounding_chunks
            .into_iter()
            .filter_map(|chunk| chunk.web)
            .filter_map(|web| {
                let url = web.uri?;
                let title = web.title.unwrap_or_else(|| url.clone());
                Some(Source { title, url })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// Flattens one streamed response into relay events, in part order.
    pub fn into_events(self) -> Result<Vec<ModelEvent>, UpstreamError> {
        if let Some(reason) = self.prompt_feedback.and_then(|feedback| feedback.block_reason) {
            return Err(UpstreamError::Blocked(reason));
        }

        let mut events = Vec::new();
        for candidate in self.candidates {
            if let Some(content) = candidate.content {
                events.extend(content.parts.into_iter().filter_map(ResponsePart::into_event));
            }
            if let Some(sources) = candidate.grounding_metadata.map(GroundingMetadata::sources) {
                if !sources.is_empty() {
                    events.push(ModelEvent::Grounding(sources));
                }
            }
            if let Some(reason) = candidate.finish_reason {
                log::debug!("candidate finished: {}", reason);
            }
        }
        Ok(events)
    }
}

/// Google API error envelope, sent as the body of non-2xx responses and
/// occasionally inside the event stream.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

impl ApiErrorEnvelope {
    pub fn into_upstream_error(self, http_status: u16) -> UpstreamError {
        let status = self.error.code.unwrap_or(http_status);
        let message = match self.error.status {
            Some(kind) if !self.error.message.is_empty() => format!("{}: {}", kind, self.error.message),
            Some(kind) => kind,
            None => self.error.message,
        };
        UpstreamError::Api { status, message }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StreamPayload {
    Error(ApiErrorEnvelope),
    Response(GenerateContentResponse),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_role_mapping() {
        let conversation = Conversation {
            history: vec![ChatTurn::user("A"), ChatTurn::assistant("B")],
            latest: "C".to_string(),
        };

        let request = GenerateContentRequest::from_conversation(&conversation, GenerationConfig::default());
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(
            body["contents"],
            json!([
                {"role": "user", "parts": [{"text": "A"}]},
                {"role": "model", "parts": [{"text": "B"}]},
                {"role": "user", "parts": [{"text": "C"}]}
            ])
        );
        assert!(body.get("tools").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_request_options() {
        let conversation = Conversation {
            history: vec![],
            latest: "Best track car under 50k?".to_string(),
        };
        let request = GenerateContentRequest::from_conversation(&conversation, GenerationConfig::default())
            .with_system_instruction("You are CarBot.")
            .with_google_search();
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["systemInstruction"], json!({"parts": [{"text": "You are CarBot."}]}));
        assert_eq!(body["tools"], json!([{"googleSearch": {}}]));
        assert_eq!(body["generationConfig"]["topK"], json!(40));
        assert_eq!(body["generationConfig"]["maxOutputTokens"], json!(2048));
    }

    #[test]
    fn test_response_parts_to_events() {
        let payload: StreamPayload = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "The GT3 "},
                        {"text": "", "thoughtSignature": "abc"},
                        {"text": "thinking...", "thought": true},
                        {"functionCall": {"name": "car_specs", "args": {"model": "911 GT3"}}}
                    ]
                },
                "groundingMetadata": {
                    "groundingChunks": [
                        {"web": {"uri": "https://example.com/gt3", "title": "GT3 review"}},
                        {"retrievedContext": {}}
                    ]
                }
            }]
        }))
        .unwrap();

        let StreamPayload::Response(response) = payload else {
            panic!("expected a response payload");
        };
        let events = response.into_events().unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], ModelEvent::Text("The GT3 ".into()));
        match &events[1] {
            ModelEvent::ToolCall(call) => {
                assert_eq!(call.name, "car_specs");
                assert_eq!(call.arguments["model"], json!("911 GT3"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(
            events[2],
            ModelEvent::Grounding(vec![Source {
                title: "GT3 review".into(),
                url: "https://example.com/gt3".into()
            }])
        );
    }

    #[test]
    fn test_function_call_without_args() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [
                {"functionCall": {"name": "lap_times", "args": null}},
                {"functionCall": {"name": "dealer_lookup"}}
            ]}}]
        }))
        .unwrap();

        let events = response.into_events().unwrap();
        let calls: Vec<String> = events
            .into_iter()
            .map(|event| match event {
                ModelEvent::ToolCall(call) => call.describe(),
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(calls, vec!["Tool: lap_times, Args: {}", "Tool: dealer_lookup, Args: {}"]);
    }

    #[test]
    fn test_blocked_prompt() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        assert!(matches!(response.into_events(), Err(UpstreamError::Blocked(reason)) if reason == "SAFETY"));
    }

    #[test]
    fn test_in_stream_error_payload() {
        let payload: StreamPayload = serde_json::from_value(json!({
            "error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}
        }))
        .unwrap();

        let StreamPayload::Error(envelope) = payload else {
            panic!("expected an error payload");
        };
        match envelope.into_upstream_error(200) {
            UpstreamError::Api { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "RESOURCE_EXHAUSTED: Resource has been exhausted");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
