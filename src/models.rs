use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

// ============================================================================
// Chat request
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatTurn>,
}

impl ChatRequest {
    /// Splits the message list into prior context and the turn to answer.
    pub fn into_conversation(self) -> Result<Conversation> {
        let mut history = self.messages;
        let latest = history
            .pop()
            .ok_or_else(|| AppError::bad_request("messages must contain at least one turn"))?;

        Ok(Conversation {
            history,
            latest: latest.content,
        })
    }
}

/// A validated request: everything before the last turn is read-only context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub history: Vec<ChatTurn>,
    pub latest: String,
}

// ============================================================================
// Stream frames
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub title: String,
    pub url: String,
}

/// A function call emitted by the model. Recorded, never executed.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolInvocation {
    pub fn describe(&self) -> String {
        let args = serde_json::Value::Object(self.arguments.clone());
        format!("Tool: {}, Args: {}", self.name, args)
    }
}

/// One frame of the `/api/chat` SSE protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    Text {
        text: String,
    },
    Metadata {
        sources: Vec<Source>,
        #[serde(rename = "toolResults")]
        tool_results: Vec<String>,
    },
    Error {
        #[serde(rename = "error")]
        message: String,
    },
    Done,
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model: String,
}

impl HealthStatus {
    pub fn healthy(model: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            model: model.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn test_conversation_split() {
        let request = ChatRequest {
            messages: vec![
                ChatTurn::user("A"),
                ChatTurn::assistant("B"),
                ChatTurn::user("C"),
            ],
        };

        let conversation = request.into_conversation().unwrap();
        assert_eq!(conversation.latest, "C");
        assert_eq!(
            conversation.history,
            vec![ChatTurn::user("A"), ChatTurn::assistant("B")]
        );
    }

    #[test]
    fn test_empty_messages_rejected() {
        let err = ChatRequest { messages: vec![] }
            .into_conversation()
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);
    }

    #[test]
    fn test_request_parsing() {
        let request: ChatRequest = serde_json::from_value(json!({
            "messages": [
                {"role": "user", "content": "What's faster, a 911 or a Corvette?"},
                {"role": "assistant", "content": "Depends on the trim."}
            ]
        }))
        .unwrap();
        assert_eq!(request.messages[1].role, ChatRole::Assistant);

        assert!(serde_json::from_value::<ChatRequest>(json!({"msgs": []})).is_err());
        assert!(
            serde_json::from_value::<ChatRequest>(json!({
                "messages": [{"role": "system", "content": "x"}]
            }))
            .is_err()
        );
    }

    #[test]
    fn test_frame_wire_format() {
        let text = StreamChunk::Text { text: "V8".into() };
        assert_eq!(
            serde_json::to_value(&text).unwrap(),
            json!({"type": "text", "text": "V8"})
        );

        let error = StreamChunk::Error { message: "quota exceeded".into() };
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"type": "error", "error": "quota exceeded"})
        );

        assert_eq!(
            serde_json::to_value(StreamChunk::Done).unwrap(),
            json!({"type": "done"})
        );

        let metadata = StreamChunk::Metadata {
            sources: vec![],
            tool_results: vec!["Tool: lookup, Args: {}".into()],
        };
        assert_eq!(
            serde_json::to_value(&metadata).unwrap(),
            json!({"type": "metadata", "sources": [], "toolResults": ["Tool: lookup, Args: {}"]})
        );
    }

    #[test]
    fn test_tool_invocation_description() {
        let mut arguments = serde_json::Map::new();
        arguments.insert("make".into(), json!("Porsche"));
        arguments.insert("year".into(), json!(2024));
        let call = ToolInvocation {
            name: "car_specs".into(),
            arguments,
        };
        assert_eq!(
            call.describe(),
            r#"Tool: car_specs, Args: {"make":"Porsche","year":2024}"#
        );
    }
}
