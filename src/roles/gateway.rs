//! LLM-backed role gateway
//!
//! Every role answers through a single forced tool whose input schema is the
//! role's output shape. Output that fails to decode or validate is sent back
//! to the model as an error tool result and requested again. Transient
//! transport errors are retried with exponential backoff.

use super::prompts::{
    render_classifier, render_evaluator, render_problem_setter, render_teacher,
    CLASSIFIER_PROMPT, EVALUATOR_PROMPT, PROBLEM_SETTER_PROMPT, TEACHER_PROMPT,
};
use super::types::{
    ClassifierOutput, EvaluatorOutput, ProblemSetterOutput, RoleOutputSchema, TeacherOutput,
};
use super::{Role, RoleFailure, RoleGateway, RoleOutput, RoleRequest};
use crate::llm::{
    ContentBlock, LlmMessage, LlmRequest, LlmResponse, SystemContent, ToolDefinition,
};
use crate::runtime::LlmClient;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Re-requests after output that fails to decode or validate
    pub output_retries: u32,
    /// Total attempts per request when the transport error is retryable
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_tokens: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            output_retries: 2,
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_tokens: 4096,
        }
    }
}

impl GatewayConfig {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

pub struct LlmRoleGateway<L: LlmClient> {
    llm: L,
    config: GatewayConfig,
}

impl<L: LlmClient> LlmRoleGateway<L> {
    pub fn new(llm: L, config: GatewayConfig) -> Self {
        Self { llm, config }
    }

    async fn run<T: RoleOutputSchema>(
        &self,
        role: Role,
        system: &str,
        prompt: String,
    ) -> Result<T, RoleFailure> {
        let tool = ToolDefinition {
            name: T::TOOL_NAME.to_string(),
            description: T::TOOL_DESCRIPTION.to_string(),
            input_schema: T::input_schema(),
        };
        let mut messages = vec![LlmMessage::user(vec![ContentBlock::text(prompt)])];
        let mut corrections = 0;

        loop {
            let request = LlmRequest {
                system: vec![SystemContent::cached(system)],
                messages: messages.clone(),
                tools: vec![tool.clone()],
                tool_choice: Some(T::TOOL_NAME.to_string()),
                max_tokens: Some(self.config.max_tokens),
            };
            let response = self.complete_with_backoff(role, &request).await?;

            let (tool_use_id, problem) = match response.tool_use(T::TOOL_NAME) {
                Some((id, input)) => match decode::<T>(input) {
                    Ok(output) => return Ok(output),
                    Err(problem) => (Some(id.to_string()), problem),
                },
                None => (None, format!("no call to `{}`", T::TOOL_NAME)),
            };

            if corrections >= self.config.output_retries {
                return Err(RoleFailure::new(
                    role,
                    format!("invalid output after {} attempts: {problem}", corrections + 1),
                ));
            }
            corrections += 1;
            tracing::warn!(%role, correction = corrections, %problem, "Role output rejected, asking again");

            push_correction(&mut messages, response, tool_use_id, &problem);
        }
    }

    async fn complete_with_backoff(
        &self,
        role: Role,
        request: &LlmRequest,
    ) -> Result<LlmResponse, RoleFailure> {
        let mut attempt = 1;
        loop {
            match self.llm.complete(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.kind.is_retryable() && attempt < self.config.max_attempts => {
                    let delay = e.retry_after.unwrap_or_else(|| self.config.backoff(attempt));
                    tracing::warn!(
                        %role,
                        attempt,
                        delay_ms = %delay.as_millis(),
                        error = %e,
                        "Role request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(RoleFailure::new(
                        role,
                        format!("request failed after {attempt} attempt(s): {e}"),
                    ));
                }
            }
        }
    }
}

fn decode<T: RoleOutputSchema>(input: &Value) -> Result<T, String> {
    let output: T = serde_json::from_value(input.clone())
        .map_err(|e| format!("output does not match schema: {e}"))?;
    output.validate()?;
    Ok(output)
}

/// Append the rejected response and a correction request to the conversation
fn push_correction(
    messages: &mut Vec<LlmMessage>,
    response: LlmResponse,
    tool_use_id: Option<String>,
    problem: &str,
) {
    if let Some(id) = tool_use_id {
        messages.push(LlmMessage::assistant(response.content));
        messages.push(LlmMessage::user(vec![ContentBlock::tool_result(
            id,
            format!("Invalid input: {problem}. Call the tool again with corrected input."),
            true,
        )]));
        return;
    }

    let correction = ContentBlock::text(format!(
        "Your reply was not usable ({problem}). Answer only by calling the tool."
    ));
    if response.content.is_empty() {
        if let Some(last) = messages.last_mut() {
            last.content.push(correction);
            return;
        }
    } else {
        messages.push(LlmMessage::assistant(response.content));
    }
    messages.push(LlmMessage::user(vec![correction]));
}

#[async_trait]
impl<L: LlmClient> RoleGateway for LlmRoleGateway<L> {
    async fn invoke(&self, request: RoleRequest) -> Result<RoleOutput, RoleFailure> {
        let role = request.role();
        tracing::debug!(%role, "Invoking role");
        match request {
            RoleRequest::Classify(input) => self
                .run::<ClassifierOutput>(role, CLASSIFIER_PROMPT, render_classifier(&input))
                .await
                .map(RoleOutput::Classification),
            RoleRequest::Teach(input) => self
                .run::<TeacherOutput>(role, TEACHER_PROMPT, render_teacher(&input))
                .await
                .map(RoleOutput::Explanation),
            RoleRequest::SetProblem(input) => self
                .run::<ProblemSetterOutput>(role, PROBLEM_SETTER_PROMPT, render_problem_setter(&input))
                .await
                .map(RoleOutput::Problem),
            RoleRequest::Evaluate(input) => self
                .run::<EvaluatorOutput>(role, EVALUATOR_PROMPT, render_evaluator(&input))
                .await
                .map(RoleOutput::Evaluation),
        }
    }
}
