//! Model registry for managing available LLM providers

use super::{all_models, LlmService, LoggingService};
use std::collections::HashMap;
use std::sync::Arc;

/// Preferred default: the roles are short structured calls, so speed wins
const PREFERRED_DEFAULT: &str = "claude-4.5-haiku";

/// Configuration for LLM providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub anthropic_api_key: Option<String>,
    /// LLM gateway URL; the gateway handles authentication
    pub gateway: Option<String>,
    /// Default model ID
    pub default_model: Option<String>,
}

impl LlmConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            anthropic_api_key: lookup("ANTHROPIC_API_KEY"),
            gateway: lookup("LLM_GATEWAY"),
            default_model: lookup("DEFAULT_MODEL"),
        }
    }
}

/// Registry of available LLM models
pub struct ModelRegistry {
    services: HashMap<String, Arc<dyn LlmService>>,
    default_model: String,
}

impl ModelRegistry {
    pub fn new(config: &LlmConfig) -> Self {
        let mut services: HashMap<String, Arc<dyn LlmService>> = HashMap::new();

        for model_def in all_models() {
            if let Some(service) = Self::try_create_model(model_def, config) {
                services.insert(model_def.id.to_string(), service);
            }
        }

        let default_model = config
            .default_model
            .clone()
            .or_else(|| {
                if services.contains_key(PREFERRED_DEFAULT) {
                    Some(PREFERRED_DEFAULT.to_string())
                } else {
                    let mut ids: Vec<_> = services.keys().cloned().collect();
                    ids.sort();
                    ids.into_iter().next()
                }
            })
            .unwrap_or_else(|| PREFERRED_DEFAULT.to_string());

        Self {
            services,
            default_model,
        }
    }

    /// Try to create a model service, validating prerequisites
    fn try_create_model(
        model_def: &super::ModelDef,
        config: &LlmConfig,
    ) -> Option<Arc<dyn LlmService>> {
        // In gateway mode, use "implicit" as the API key
        let api_key = if config.gateway.is_some() {
            "implicit".to_string()
        } else {
            config.anthropic_api_key.clone()?
        };

        match (model_def.factory)(&api_key, config.gateway.as_deref()) {
            Ok(service) => {
                tracing::debug!(model = model_def.id, description = model_def.description, "Model available");
                Some(Arc::new(LoggingService::new(service)))
            }
            Err(e) => {
                tracing::debug!(model = model_def.id, error = %e, "Model unavailable");
                None
            }
        }
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(model_id).cloned()
    }

    /// Get the default model
    pub fn default(&self) -> Option<Arc<dyn LlmService>> {
        self.get(&self.default_model)
    }

    /// Get the default model ID
    pub fn default_model_id(&self) -> &str {
        &self.default_model
    }

    /// List all available model IDs
    pub fn available_models(&self) -> Vec<String> {
        let mut models: Vec<_> = self.services.keys().cloned().collect();
        models.sort();
        models
    }

    /// Check if any models are available
    pub fn has_models(&self) -> bool {
        !self.services.is_empty()
    }
}
