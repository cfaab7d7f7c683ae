use std::sync::Arc;

use crate::llm::ChatModel;
use crate::relay::ChatRelay;

// ============================================================================
// AppState
// ============================================================================

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub relay: ChatRelay,
}

impl AppState {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            relay: ChatRelay::new(model),
        }
    }
}
