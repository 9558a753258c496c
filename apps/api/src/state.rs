use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::llm_client::CompletionPort;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Holds no per-request data: every analysis runs on its own copies.
#[derive(Clone)]
pub struct AppState {
    /// Text completion service. `LlmClient` in production.
    pub completion: Arc<dyn CompletionPort>,
    pub pipeline: Arc<PipelineConfig>,
}
