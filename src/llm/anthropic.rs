//! Anthropic Claude provider implementation

use super::types::{ContentBlock, LlmMessage, LlmRequest, LlmResponse, MessageRole, Usage};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_MAX_TOKENS: u32 = 4096;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Anthropic model variants
#[derive(Debug, Clone, Copy)]
pub enum AnthropicModel {
    Claude45Opus,
    Claude45Sonnet,
    Claude45Haiku,
}

impl AnthropicModel {
    pub fn api_name(self) -> &'static str {
        match self {
            AnthropicModel::Claude45Opus => "claude-opus-4-5-20251101",
            AnthropicModel::Claude45Sonnet => "claude-sonnet-4-5-20250929",
            AnthropicModel::Claude45Haiku => "claude-haiku-4-5-20251001",
        }
    }

    pub fn model_id(self) -> &'static str {
        match self {
            AnthropicModel::Claude45Opus => "claude-4.5-opus",
            AnthropicModel::Claude45Sonnet => "claude-4.5-sonnet",
            AnthropicModel::Claude45Haiku => "claude-4.5-haiku",
        }
    }
}

/// Anthropic service implementation
pub struct AnthropicService {
    client: Client,
    api_key: String,
    model: AnthropicModel,
    base_url: String,
}

impl AnthropicService {
    pub fn new(
        api_key: String,
        model: AnthropicModel,
        gateway: Option<&str>,
    ) -> Result<Self, String> {
        let base_url = match gateway {
            Some(gw) => format!(
                "{}/_/gateway/anthropic/v1/messages",
                gw.trim_end_matches('/')
            ),
            None => "https://api.anthropic.com/v1/messages".to_string(),
        };

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url,
        })
    }

    fn translate_request(&self, request: &LlmRequest) -> AnthropicRequest {
        let system = request
            .system
            .iter()
            .map(|s| AnthropicSystemBlock {
                r#type: "text".to_string(),
                text: s.text.clone(),
                cache_control: s.cache.then(|| CacheControl {
                    r#type: "ephemeral".to_string(),
                }),
            })
            .collect();

        let messages = request.messages.iter().map(translate_message).collect();

        let tools: Vec<AnthropicTool> = request
            .tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            })
            .collect();

        AnthropicRequest {
            model: self.model.api_name().to_string(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            messages,
            tools: if tools.is_empty() { None } else { Some(tools) },
            tool_choice: request.tool_choice.as_ref().map(|name| AnthropicToolChoice {
                r#type: "tool".to_string(),
                name: name.clone(),
            }),
        }
    }
}

fn translate_message(msg: &LlmMessage) -> AnthropicMessage {
    let role = match msg.role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    };

    let content = msg
        .content
        .iter()
        .map(|block| match block {
            ContentBlock::Text { text } => AnthropicContentBlock::Text { text: text.clone() },
            ContentBlock::ToolUse { id, name, input } => AnthropicContentBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            },
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => AnthropicContentBlock::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content: content.clone(),
                is_error: *is_error,
            },
        })
        .collect();

    AnthropicMessage {
        role: role.to_string(),
        content,
    }
}

fn normalize_response(resp: AnthropicResponse) -> LlmResponse {
    let content = resp
        .content
        .into_iter()
        .map(|block| match block {
            AnthropicContentBlock::Text { text } => ContentBlock::Text { text },
            AnthropicContentBlock::ToolUse { id, name, input } => {
                ContentBlock::ToolUse { id, name, input }
            }
            // Tool results never come back from the model
            AnthropicContentBlock::ToolResult { .. } => ContentBlock::Text {
                text: "[tool result]".to_string(),
            },
        })
        .collect();

    let end_turn = resp.stop_reason.as_deref() == Some("end_turn");

    LlmResponse {
        content,
        end_turn,
        usage: Usage {
            input_tokens: resp.usage.input_tokens,
            output_tokens: resp.usage.output_tokens,
            cache_creation_tokens: resp.usage.cache_creation_input_tokens.unwrap_or(0),
            cache_read_tokens: resp.usage.cache_read_input_tokens.unwrap_or(0),
        },
    }
}

fn classify_error(status: reqwest::StatusCode, body: &str) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::auth(format!("Authentication failed: {body}")),
        429 => {
            let mut err = LlmError::rate_limit(format!("Rate limited: {body}"));
            if let Some(retry_after) = serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|parsed| parsed.get("error")?.get("retry_after")?.as_f64())
            {
                err = err.with_retry_after(Duration::from_secs_f64(retry_after));
            }
            err
        }
        400 => LlmError::invalid_request(format!("Invalid request: {body}")),
        500..=599 => LlmError::server_error(format!("Server error: {body}")),
        _ => LlmError::unknown(format!("HTTP {status}: {body}")),
    }
}

#[async_trait]
impl LlmService for AnthropicService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let anthropic_request = self.translate_request(request);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&anthropic_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        let anthropic_response: AnthropicResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Ok(normalize_response(anthropic_response))
    }

    fn model_id(&self) -> &str {
        self.model.model_id()
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    system: Vec<AnthropicSystemBlock>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<AnthropicToolChoice>,
}

#[derive(Debug, Serialize)]
struct AnthropicSystemBlock {
    r#type: String,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

#[derive(Debug, Serialize)]
struct CacheControl {
    r#type: String,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct AnthropicToolChoice {
    r#type: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
    cache_creation_input_tokens: Option<u64>,
    cache_read_input_tokens: Option<u64>,
}
