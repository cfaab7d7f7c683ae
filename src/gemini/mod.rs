// Gemini (Generative Language API) backend for the relay
pub mod client;
pub mod types;

pub use client::{DEFAULT_BASE_URL, DEFAULT_MODEL, GeminiClient, GeminiConfig};
pub use types::GenerationConfig;
