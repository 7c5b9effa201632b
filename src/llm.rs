//! LLM provider abstraction
//!
//! Every reasoning role is one forced tool call against a provider behind
//! `LlmService`. Requests carry the role's submit tool as `tool_choice`, and
//! a conversation longer than one message is a correction round after
//! rejected output.

mod anthropic;
mod error;
mod models;
mod registry;
mod types;

pub use anthropic::AnthropicService;
pub use error::{LlmError, LlmErrorKind};
pub use models::{all_models, ModelDef};
pub use registry::{LlmConfig, ModelRegistry};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logs each role call with its tool, correction round and token usage
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

/// Correction rounds visible in the conversation. A round after an empty reply
/// folds into the last user message and is not counted.
fn correction_round(request: &LlmRequest) -> usize {
    request.messages.len().saturating_sub(1) / 2
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();
        let tool = request.tool_choice.as_deref().unwrap_or("-");
        let correction = correction_round(request);

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    tool,
                    correction,
                    tool_called = request
                        .tool_choice
                        .as_deref()
                        .is_some_and(|name| response.tool_use(name).is_some()),
                    duration_ms = %duration.as_millis(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    cache_read_tokens = response.usage.cache_read_tokens,
                    "Role call completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    tool,
                    correction,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "Role call failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
