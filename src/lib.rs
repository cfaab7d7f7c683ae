pub mod error;
pub mod gemini;
pub mod handlers;
pub mod init;
pub mod llm;
pub mod models;
pub mod prompts;
pub mod relay;
pub mod state;

pub use crate::llm::{ChatModel, ModelEvent, UpstreamError};
pub use crate::relay::ChatRelay;
pub use crate::state::AppState;
