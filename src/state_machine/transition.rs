//! Pure state transition function
//!
//! A turn starts in `Ready`, moves through at most two role phases and ends
//! in `Done`. The function performs no I/O: role calls are requested as
//! effects and their outputs come back as events.

use super::compose::{self, FeedbackTail};
use super::state::{
    ActiveQuiz, Intent, LogEntry, Mode, NextAction, TurnContext, TurnState,
    CLASSIFIER_CONTEXT_ENTRIES,
};
use super::{Effect, Event};
use crate::roles::{
    ClassifierInput, ClassifierOutput, EvaluatorInput, EvaluatorOutput, ProblemSetterInput,
    ProblemSetterOutput, RoleRequest, TeacherInput, TeacherOutput,
};
use thiserror::Error;

/// Where a turn is between events
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Ready,
    Classifying,
    /// Waiting for the teacher. `preface` is evaluation feedback that goes
    /// in front of the explanation when reteaching.
    Teaching { preface: Option<String> },
    SettingProblem,
    Evaluating,
    Done,
}

impl TurnPhase {
    pub fn name(&self) -> &'static str {
        match self {
            TurnPhase::Ready => "ready",
            TurnPhase::Classifying => "classifying",
            TurnPhase::Teaching { .. } => "teaching",
            TurnPhase::SettingProblem => "setting_problem",
            TurnPhase::Evaluating => "evaluating",
            TurnPhase::Done => "done",
        }
    }
}

/// Thread state plus the phase of the turn in progress
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub state: TurnState,
    pub phase: TurnPhase,
}

impl Turn {
    pub fn start(state: TurnState) -> Self {
        Self {
            state,
            phase: TurnPhase::Ready,
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == TurnPhase::Done
    }
}

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_turn: Turn,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    fn new(state: TurnState, phase: TurnPhase) -> Self {
        Self {
            new_turn: Turn { state, phase },
            effects: vec![],
        }
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message must not be empty")]
    EmptyMessage,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    turn: &Turn,
    context: &TurnContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let state = turn.state.clone();

    match (&turn.phase, event) {
        (TurnPhase::Ready, Event::UserMessage { text }) => {
            if text.trim().is_empty() {
                return Err(TransitionError::EmptyMessage);
            }
            Ok(receive_message(state, context, text))
        }

        (TurnPhase::Classifying, Event::Classified(output)) => {
            Ok(route_classification(state, context, output))
        }

        (TurnPhase::Teaching { preface }, Event::Explained(output)) => {
            Ok(finish_explanation(state, preface.as_deref(), &output))
        }

        (TurnPhase::SettingProblem, Event::ProblemSet(output)) => {
            Ok(finish_problem(state, output))
        }

        (TurnPhase::Evaluating, Event::Evaluated(output)) => {
            resolve_evaluation(state, context, &output)
        }

        (phase, event) => Err(TransitionError::InvalidTransition(format!(
            "{} cannot handle {}",
            phase.name(),
            event.name()
        ))),
    }
}

// ============================================================================
// Phase handlers
// ============================================================================

fn receive_message(mut state: TurnState, context: &TurnContext, text: String) -> TransitionResult {
    state.response.clear();

    if state.awaits_answer() && !context.override_detector.is_override(&text) {
        if let Some(quiz) = state.active_quiz() {
            let request = RoleRequest::Evaluate(EvaluatorInput {
                problem_text: quiz.problem_text.clone(),
                student_answer: text.clone(),
                expected_concepts: quiz.expected_concepts.clone(),
                hints_used: quiz.hints_used,
            });
            state.last_user_message = text;
            return TransitionResult::new(state, TurnPhase::Evaluating)
                .with_effect(Effect::InvokeRole(request));
        }
    }

    // Override, or nothing pending: any quiz is abandoned
    state.mode = Mode::Idle;
    state.next_action = NextAction::None;

    let request = RoleRequest::Classify(ClassifierInput {
        message: text.clone(),
        context: state.recent_log(CLASSIFIER_CONTEXT_ENTRIES).to_vec(),
    });
    state.last_user_message = text;
    TransitionResult::new(state, TurnPhase::Classifying).with_effect(Effect::InvokeRole(request))
}

fn route_classification(
    mut state: TurnState,
    context: &TurnContext,
    output: ClassifierOutput,
) -> TransitionResult {
    let difficulty = output.parsed_difficulty();

    state.intent = Some(output.intent);
    if let Some(subject) = output.subject.filter(|s| !s.trim().is_empty()) {
        state.subject = Some(subject);
    }
    if let Some(topic) = output.topic.filter(|t| !t.trim().is_empty()) {
        state.topic = Some(topic);
    }
    state.difficulty = Some(difficulty.or(state.difficulty).unwrap_or_default());
    state.needs_agent = output.needs_agent;

    if !output.needs_agent {
        let response = output.direct_response.unwrap_or_default();
        return finish(state, response, NextAction::None);
    }

    match output.intent {
        Intent::Learn | Intent::Clarify => {
            let request = RoleRequest::Teach(TeacherInput {
                question: state.last_user_message.clone(),
                subject: state.subject.clone(),
                topic: state.topic.clone(),
                difficulty: state.difficulty.unwrap_or_default(),
                learning_style: context.learning_style,
            });
            TransitionResult::new(state, TurnPhase::Teaching { preface: None })
                .with_effect(Effect::InvokeRole(request))
        }
        Intent::Practice => {
            let request = RoleRequest::SetProblem(ProblemSetterInput {
                subject: state.subject.clone(),
                topic: state.topic.clone(),
                difficulty: state.difficulty.unwrap_or_default(),
            });
            TransitionResult::new(state, TurnPhase::SettingProblem)
                .with_effect(Effect::InvokeRole(request))
        }
        intent @ (Intent::Review | Intent::Greeting | Intent::OffTopic) => {
            finish(state, compose::neutral(intent), NextAction::None)
        }
    }
}

fn finish_explanation(
    state: TurnState,
    preface: Option<&str>,
    output: &TeacherOutput,
) -> TransitionResult {
    let explanation = compose::explanation(output);
    let response = match preface {
        Some(preface) => format!("{preface}\n\n{explanation}"),
        None => explanation,
    };
    finish(state, response, NextAction::WaitAnswer)
}

fn finish_problem(mut state: TurnState, output: ProblemSetterOutput) -> TransitionResult {
    let quiz = ActiveQuiz::new(
        output.problem_text,
        output.hints,
        output.expected_concepts,
        output.difficulty,
    )
    .for_topic(state.subject.clone(), state.topic.clone());

    let response = compose::problem(&quiz);
    state.mode = Mode::AwaitingAnswer { quiz };
    finish(state, response, NextAction::WaitAnswer)
}

fn resolve_evaluation(
    mut state: TurnState,
    context: &TurnContext,
    output: &EvaluatorOutput,
) -> Result<TransitionResult, TransitionError> {
    let hint = output
        .next_hint
        .as_deref()
        .filter(|h| !h.trim().is_empty());

    if let (true, Some(hint)) = (output.should_retry, hint) {
        let quiz = state.active_quiz_mut().ok_or_else(no_quiz)?;
        quiz.hints_used += 1;
        let response = compose::feedback(output, FeedbackTail::Hint(hint));
        return Ok(finish(state, response, NextAction::Retry));
    }

    if !output.is_correct && !output.should_retry {
        let quiz = state.active_quiz().ok_or_else(no_quiz)?;
        let request = RoleRequest::Teach(TeacherInput {
            question: compose::reteach_question(quiz, &state.last_user_message),
            subject: quiz.subject.clone().or_else(|| state.subject.clone()),
            topic: quiz.topic.clone().or_else(|| state.topic.clone()),
            difficulty: quiz.difficulty,
            learning_style: context.learning_style,
        });
        let preface = compose::feedback(output, FeedbackTail::Reteach);
        state.next_action = NextAction::Reteach;
        return Ok(TransitionResult::new(
            state,
            TurnPhase::Teaching {
                preface: Some(preface),
            },
        )
        .with_effect(Effect::InvokeRole(request)));
    }

    state.mode = Mode::Idle;
    let response = compose::feedback(output, FeedbackTail::Resolved);
    Ok(finish(state, response, NextAction::None))
}

fn no_quiz() -> TransitionError {
    TransitionError::InvalidTransition("evaluation without a pending problem".to_string())
}

/// Record the response, append the exchange to the log and end the turn
fn finish(mut state: TurnState, response: String, next_action: NextAction) -> TransitionResult {
    state.message_log.push(LogEntry::user(state.last_user_message.clone()));
    state.message_log.push(LogEntry::assistant(response.clone()));
    state.response = response;
    state.next_action = next_action;
    TransitionResult::new(state, TurnPhase::Done).with_effect(Effect::CompleteTurn)
}
