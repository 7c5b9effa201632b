//! Turn state types
//!
//! One `TurnState` exists per conversation thread. It is loaded at the start
//! of every turn, advanced by the transition function, and saved as a whole.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::gate::OverrideDetector;

/// Number of log entries handed to the classifier as context
pub const CLASSIFIER_CONTEXT_ENTRIES: usize = 3;

// ============================================================================
// Classification values
// ============================================================================

/// What the student is trying to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Intent {
    Learn,
    Practice,
    Review,
    Clarify,
    Greeting,
    OffTopic,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Learn => "learn",
            Intent::Practice => "practice",
            Intent::Review => "review",
            Intent::Clarify => "clarify",
            Intent::Greeting => "greeting",
            Intent::OffTopic => "off_topic",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "learn" => Ok(Intent::Learn),
            "practice" => Ok(Intent::Practice),
            "review" => Ok(Intent::Review),
            "clarify" => Ok(Intent::Clarify),
            "greeting" => Ok(Intent::Greeting),
            "off_topic" | "offtopic" => Ok(Intent::OffTopic),
            other => Err(format!("unknown intent: {other}")),
        }
    }
}

impl TryFrom<String> for Intent {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Problem and explanation difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" | "easy" | "basic" => Ok(Difficulty::Beginner),
            "intermediate" | "medium" => Ok(Difficulty::Intermediate),
            "advanced" | "hard" | "expert" => Ok(Difficulty::Advanced),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

impl TryFrom<String> for Difficulty {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// How a student prefers explanations to be shaped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum LearningStyle {
    Visual,
    StepByStep,
    Conceptual,
    #[default]
    Balanced,
}

impl LearningStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            LearningStyle::Visual => "visual",
            LearningStyle::StepByStep => "step_by_step",
            LearningStyle::Conceptual => "conceptual",
            LearningStyle::Balanced => "balanced",
        }
    }
}

impl FromStr for LearningStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "visual" => Ok(LearningStyle::Visual),
            "step_by_step" => Ok(LearningStyle::StepByStep),
            "conceptual" => Ok(LearningStyle::Conceptual),
            "balanced" => Ok(LearningStyle::Balanced),
            other => Err(format!("unknown learning style: {other}")),
        }
    }
}

impl TryFrom<String> for LearningStyle {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// Next action
// ============================================================================

/// What kind of input the caller should expect to send next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    #[default]
    None,
    WaitAnswer,
    Retry,
    /// Transient: set between an incorrect evaluation and the chained
    /// explanation inside one turn. Never persisted or returned.
    Reteach,
}

impl NextAction {
    pub fn as_str(self) -> &'static str {
        match self {
            NextAction::None => "none",
            NextAction::WaitAnswer => "wait_answer",
            NextAction::Retry => "retry",
            NextAction::Reteach => "reteach",
        }
    }

    /// Whether the next message is read as an answer when a quiz is pending
    pub fn expects_answer(self) -> bool {
        matches!(self, NextAction::WaitAnswer | NextAction::Retry)
    }
}

// ============================================================================
// Message log
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRole {
    User,
    Assistant,
}

/// One entry of the thread's conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub role: LogRole,
    pub content: String,
}

impl LogEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: LogRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: LogRole::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Quiz mode
// ============================================================================

/// An issued practice problem that has not been resolved yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveQuiz {
    pub problem_text: String,
    pub hints: Vec<String>,
    /// Concepts the problem tests; unique, in the order first given
    pub expected_concepts: Vec<String>,
    pub difficulty: Difficulty,
    /// Subject and topic the problem was issued for, used when reteaching
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    /// Retry hints handed out so far
    #[serde(default)]
    pub hints_used: u32,
}

impl ActiveQuiz {
    pub fn new(
        problem_text: impl Into<String>,
        hints: Vec<String>,
        expected_concepts: Vec<String>,
        difficulty: Difficulty,
    ) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(expected_concepts.len());
        for concept in expected_concepts {
            if !unique.contains(&concept) {
                unique.push(concept);
            }
        }
        Self {
            problem_text: problem_text.into(),
            hints,
            expected_concepts: unique,
            difficulty,
            subject: None,
            topic: None,
            hints_used: 0,
        }
    }

    #[must_use]
    pub fn for_topic(mut self, subject: Option<String>, topic: Option<String>) -> Self {
        self.subject = subject;
        self.topic = topic;
        self
    }
}

/// Whether a practice problem is pending on the thread
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mode {
    /// No problem pending
    #[default]
    Idle,
    /// A problem was issued and its answer has not been resolved
    AwaitingAnswer { quiz: ActiveQuiz },
}

// ============================================================================
// Turn state
// ============================================================================

/// Working memory of one conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnState {
    pub thread_id: String,
    #[serde(default)]
    pub last_user_message: String,
    #[serde(default)]
    pub message_log: Vec<LogEntry>,
    #[serde(default)]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default = "default_needs_agent")]
    pub needs_agent: bool,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub next_action: NextAction,
}

fn default_needs_agent() -> bool {
    true
}

impl TurnState {
    /// Fresh state for a thread seen for the first time
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            last_user_message: String::new(),
            message_log: Vec::new(),
            intent: None,
            subject: None,
            topic: None,
            difficulty: None,
            needs_agent: true,
            mode: Mode::Idle,
            response: String::new(),
            next_action: NextAction::None,
        }
    }

    pub fn active_quiz(&self) -> Option<&ActiveQuiz> {
        match &self.mode {
            Mode::Idle => None,
            Mode::AwaitingAnswer { quiz } => Some(quiz),
        }
    }

    pub fn active_quiz_mut(&mut self) -> Option<&mut ActiveQuiz> {
        match &mut self.mode {
            Mode::Idle => None,
            Mode::AwaitingAnswer { quiz } => Some(quiz),
        }
    }

    /// Whether the next message should be read as a candidate answer
    pub fn awaits_answer(&self) -> bool {
        self.active_quiz().is_some() && self.next_action.expects_answer()
    }

    /// The last `n` log entries, oldest first
    pub fn recent_log(&self, n: usize) -> &[LogEntry] {
        let start = self.message_log.len().saturating_sub(n);
        &self.message_log[start..]
    }

    /// Check the invariants that must hold for a state to be persisted
    pub fn check_invariants(&self) -> Result<(), String> {
        match self.next_action {
            NextAction::Reteach => Err("reteach is internal to a turn".to_string()),
            NextAction::Retry if self.active_quiz().is_none() => {
                Err("retry requires a pending problem".to_string())
            }
            NextAction::None if self.active_quiz().is_some() => {
                Err("a resolved turn must not keep a pending problem".to_string())
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Turn context
// ============================================================================

/// Per-turn inputs that are not part of the thread's state
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub learning_style: LearningStyle,
    pub override_detector: Arc<dyn OverrideDetector>,
}

impl TurnContext {
    pub fn new(override_detector: Arc<dyn OverrideDetector>) -> Self {
        Self {
            learning_style: LearningStyle::default(),
            override_detector,
        }
    }

    #[must_use]
    pub fn with_learning_style(mut self, learning_style: LearningStyle) -> Self {
        self.learning_style = learning_style;
        self
    }
}
