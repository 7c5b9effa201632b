//! Structured inputs and outputs of the reasoning roles

use crate::state_machine::state::{Difficulty, Intent, LearningStyle, LogEntry};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Output shape a role must return through its submit tool
pub trait RoleOutputSchema: DeserializeOwned + Send {
    /// Name of the tool the model must call
    const TOOL_NAME: &'static str;
    const TOOL_DESCRIPTION: &'static str;

    fn input_schema() -> Value;

    /// Semantic checks serde cannot express
    fn validate(&self) -> Result<(), String>;
}

fn require_text(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("`{field}` must not be empty"))
    } else {
        Ok(())
    }
}

// ============================================================================
// Classifier
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierInput {
    pub message: String,
    /// Most recent log entries, oldest first
    pub context: Vec<LogEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierOutput {
    pub intent: Intent,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    /// Kept as free text; unrecognised values fall back to the thread default
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub direct_response: Option<String>,
    pub needs_agent: bool,
}

impl ClassifierOutput {
    pub fn parsed_difficulty(&self) -> Option<Difficulty> {
        self.difficulty.as_deref().and_then(|d| d.parse().ok())
    }
}

impl RoleOutputSchema for ClassifierOutput {
    const TOOL_NAME: &'static str = "submit_classification";
    const TOOL_DESCRIPTION: &'static str = "Submit the classification of the student's message";

    fn input_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "intent": {
                    "type": "string",
                    "enum": ["learn", "practice", "review", "clarify", "greeting", "off_topic"]
                },
                "subject": { "type": "string", "description": "Math, Physics, Chemistry, ..." },
                "topic": { "type": "string", "description": "Specific topic, e.g. quadratic equations" },
                "difficulty": { "type": "string", "enum": ["beginner", "intermediate", "advanced"] },
                "reasoning": { "type": "string", "description": "Why this classification was chosen" },
                "direct_response": { "type": "string", "description": "Reply for greetings and off-topic messages" },
                "needs_agent": { "type": "boolean", "description": "False when direct_response fully handles the message" }
            },
            "required": ["intent", "reasoning", "needs_agent"]
        })
    }

    fn validate(&self) -> Result<(), String> {
        if !self.needs_agent {
            match self.direct_response.as_deref() {
                Some(text) => require_text("direct_response", text)?,
                None => return Err("`direct_response` is required when needs_agent is false".to_string()),
            }
        }
        Ok(())
    }
}

// ============================================================================
// Teacher
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeacherInput {
    pub question: String,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Difficulty,
    pub learning_style: LearningStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherOutput {
    pub explanation: String,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub analogies: Vec<String>,
    pub check_question: String,
    #[serde(default)]
    pub key_concepts: Vec<String>,
    #[serde(default)]
    pub next_steps: String,
}

impl RoleOutputSchema for TeacherOutput {
    const TOOL_NAME: &'static str = "submit_explanation";
    const TOOL_DESCRIPTION: &'static str = "Submit the explanation for the student";

    fn input_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "explanation": { "type": "string" },
                "examples": { "type": "array", "items": { "type": "string" } },
                "analogies": { "type": "array", "items": { "type": "string" } },
                "check_question": { "type": "string", "description": "Question that verifies understanding" },
                "key_concepts": { "type": "array", "items": { "type": "string" } },
                "next_steps": { "type": "string" }
            },
            "required": ["explanation", "examples", "check_question", "key_concepts", "next_steps"]
        })
    }

    fn validate(&self) -> Result<(), String> {
        require_text("explanation", &self.explanation)?;
        require_text("check_question", &self.check_question)
    }
}

// ============================================================================
// Problem setter
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemSetterInput {
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSetterOutput {
    pub problem_text: String,
    #[serde(default)]
    pub problem_type: String,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub expected_concepts: Vec<String>,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub sample_solution_approach: String,
}

impl RoleOutputSchema for ProblemSetterOutput {
    const TOOL_NAME: &'static str = "submit_problem";
    const TOOL_DESCRIPTION: &'static str = "Submit the practice problem";

    fn input_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "problem_text": { "type": "string" },
                "problem_type": { "type": "string", "enum": ["multiple_choice", "open_ended", "calculation"] },
                "hints": { "type": "array", "items": { "type": "string" }, "description": "Progressive hints, subtle to explicit" },
                "expected_concepts": { "type": "array", "items": { "type": "string" } },
                "difficulty": { "type": "string", "enum": ["beginner", "intermediate", "advanced"] },
                "sample_solution_approach": { "type": "string" }
            },
            "required": ["problem_text", "hints", "expected_concepts", "difficulty", "sample_solution_approach"]
        })
    }

    fn validate(&self) -> Result<(), String> {
        require_text("problem_text", &self.problem_text)
    }
}

// ============================================================================
// Evaluator
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorInput {
    pub problem_text: String,
    pub student_answer: String,
    pub expected_concepts: Vec<String>,
    pub hints_used: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorOutput {
    /// Score in `[0, 1]`, passed through unmodified
    pub correctness: f64,
    pub is_correct: bool,
    pub feedback: String,
    #[serde(default)]
    pub misconceptions: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub next_hint: Option<String>,
    pub should_retry: bool,
    /// struggling, learning, proficient or mastered
    #[serde(default)]
    pub mastery_update: Option<String>,
}

impl RoleOutputSchema for EvaluatorOutput {
    const TOOL_NAME: &'static str = "submit_evaluation";
    const TOOL_DESCRIPTION: &'static str = "Submit the evaluation of the student's answer";

    fn input_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "correctness": { "type": "number", "minimum": 0, "maximum": 1 },
                "is_correct": { "type": "boolean" },
                "feedback": { "type": "string" },
                "misconceptions": { "type": "array", "items": { "type": "string" } },
                "strengths": { "type": "array", "items": { "type": "string" } },
                "next_hint": { "type": "string" },
                "should_retry": { "type": "boolean" },
                "mastery_update": { "type": "string", "enum": ["struggling", "learning", "proficient", "mastered"] }
            },
            "required": ["correctness", "is_correct", "feedback", "misconceptions", "strengths", "should_retry", "mastery_update"]
        })
    }

    fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.correctness) {
            return Err(format!(
                "`correctness` must be within [0, 1], got {}",
                self.correctness
            ));
        }
        require_text("feedback", &self.feedback)
    }
}
