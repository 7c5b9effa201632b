//! Reasoning roles
//!
//! Each role is one structured LLM call. The turn state machine asks for a
//! role through `RoleRequest` and receives a validated `RoleOutput`, or a
//! `RoleFailure` once every retry is spent.

mod gateway;
mod prompts;
pub mod types;

pub use gateway::{GatewayConfig, LlmRoleGateway};
pub use types::{
    ClassifierInput, ClassifierOutput, EvaluatorInput, EvaluatorOutput, ProblemSetterInput,
    ProblemSetterOutput, RoleOutputSchema, TeacherInput, TeacherOutput,
};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Classifier,
    Teacher,
    ProblemSetter,
    Evaluator,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Classifier => "classifier",
            Role::Teacher => "teacher",
            Role::ProblemSetter => "problem_setter",
            Role::Evaluator => "evaluator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for one role invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleRequest {
    Classify(ClassifierInput),
    Teach(TeacherInput),
    SetProblem(ProblemSetterInput),
    Evaluate(EvaluatorInput),
}

impl RoleRequest {
    pub fn role(&self) -> Role {
        match self {
            RoleRequest::Classify(_) => Role::Classifier,
            RoleRequest::Teach(_) => Role::Teacher,
            RoleRequest::SetProblem(_) => Role::ProblemSetter,
            RoleRequest::Evaluate(_) => Role::Evaluator,
        }
    }
}

/// A validated role result
#[derive(Debug, Clone, PartialEq)]
pub enum RoleOutput {
    Classification(ClassifierOutput),
    Explanation(TeacherOutput),
    Problem(ProblemSetterOutput),
    Evaluation(EvaluatorOutput),
}

impl RoleOutput {
    pub fn role(&self) -> Role {
        match self {
            RoleOutput::Classification(_) => Role::Classifier,
            RoleOutput::Explanation(_) => Role::Teacher,
            RoleOutput::Problem(_) => Role::ProblemSetter,
            RoleOutput::Evaluation(_) => Role::Evaluator,
        }
    }
}

/// A role could not produce valid output
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{role} failed: {cause}")]
pub struct RoleFailure {
    pub role: Role,
    pub cause: String,
}

impl RoleFailure {
    pub fn new(role: Role, cause: impl Into<String>) -> Self {
        Self {
            role,
            cause: cause.into(),
        }
    }
}

/// Invokes reasoning roles
#[async_trait]
pub trait RoleGateway: Send + Sync {
    async fn invoke(&self, request: RoleRequest) -> Result<RoleOutput, RoleFailure>;
}

#[async_trait]
impl<T: RoleGateway + ?Sized> RoleGateway for Arc<T> {
    async fn invoke(&self, request: RoleRequest) -> Result<RoleOutput, RoleFailure> {
        (**self).invoke(request).await
    }
}
