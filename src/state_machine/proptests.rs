//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary conversations.

use super::gate::{OverrideDetector, PhraseDetector, DEFAULT_OVERRIDE_PHRASES};
use super::state::*;
use super::transition::*;
use super::*;
use crate::roles::{ClassifierOutput, EvaluatorOutput, ProblemSetterOutput, RoleRequest, TeacherOutput};
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> TurnContext {
    TurnContext::new(Arc::new(PhraseDetector::default()))
}

/// Role outputs available to answer whatever the state machine asks for
#[derive(Debug, Clone)]
struct Script {
    message: String,
    classification: ClassifierOutput,
    explanation: TeacherOutput,
    problem: ProblemSetterOutput,
    evaluation: EvaluatorOutput,
}

impl Script {
    fn answer(&self, request: &RoleRequest) -> Event {
        match request {
            RoleRequest::Classify(_) => Event::Classified(self.classification.clone()),
            RoleRequest::Teach(_) => Event::Explained(self.explanation.clone()),
            RoleRequest::SetProblem(_) => Event::ProblemSet(self.problem.clone()),
            RoleRequest::Evaluate(_) => Event::Evaluated(self.evaluation.clone()),
        }
    }
}

/// Run one turn to completion; returns the final turn and the roles invoked
fn drive(state: TurnState, script: &Script) -> (Turn, Vec<RoleRequest>) {
    let ctx = test_context();
    let mut requests = vec![];
    let mut result = transition(&Turn::start(state), &ctx, Event::user_message(&script.message))
        .expect("non-empty message is accepted");

    loop {
        match result.effects.as_slice() {
            [Effect::InvokeRole(request)] => {
                requests.push(request.clone());
                let event = script.answer(request);
                result = transition(&result.new_turn, &ctx, event).expect("valid role event");
            }
            [Effect::CompleteTurn] => return (result.new_turn, requests),
            other => panic!("unexpected effects: {other:?}"),
        }
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_intent() -> impl Strategy<Value = Intent> {
    prop_oneof![
        Just(Intent::Learn),
        Just(Intent::Practice),
        Just(Intent::Review),
        Just(Intent::Clarify),
        Just(Intent::Greeting),
        Just(Intent::OffTopic),
    ]
}

fn arb_difficulty() -> impl Strategy<Value = Difficulty> {
    prop_oneof![
        Just(Difficulty::Beginner),
        Just(Difficulty::Intermediate),
        Just(Difficulty::Advanced),
    ]
}

fn arb_message() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9 =+]{1,30}".prop_filter("non-blank", |s| !s.trim().is_empty()),
        (
            "[a-z ]{0,10}",
            prop::sample::select(DEFAULT_OVERRIDE_PHRASES),
            "[a-z ]{0,10}"
        )
            .prop_map(|(a, phrase, b)| format!("{a}{phrase}{b}")),
    ]
}

fn arb_classification() -> impl Strategy<Value = ClassifierOutput> {
    (
        arb_intent(),
        prop::option::of("[A-Z][a-z]{2,8}"),
        prop::option::of("[a-z ]{3,15}"),
        prop::option::of(prop_oneof![
            Just("beginner".to_string()),
            Just("hard".to_string()),
            Just("unknown".to_string()),
        ]),
        any::<bool>(),
    )
        .prop_map(|(intent, subject, topic, difficulty, needs_agent)| ClassifierOutput {
            intent,
            subject,
            topic,
            difficulty,
            reasoning: String::new(),
            direct_response: (!needs_agent).then(|| "Hello!".to_string()),
            needs_agent,
        })
}

fn arb_explanation() -> impl Strategy<Value = TeacherOutput> {
    (
        "[a-z ]{1,20}",
        prop::collection::vec("[a-z ]{1,10}", 0..3),
        prop::collection::vec("[a-z ]{1,10}", 0..2),
    )
        .prop_map(|(explanation, examples, analogies)| TeacherOutput {
            explanation: format!("E {explanation}"),
            examples,
            analogies,
            check_question: "Why?".to_string(),
            key_concepts: vec![],
            next_steps: String::new(),
        })
}

fn arb_problem() -> impl Strategy<Value = ProblemSetterOutput> {
    (
        "[a-z0-9 ]{1,20}",
        prop::collection::vec("[a-z ]{1,10}", 0..3),
        prop::collection::vec("[a-c]", 0..4),
        arb_difficulty(),
    )
        .prop_map(|(text, hints, concepts, difficulty)| ProblemSetterOutput {
            problem_text: format!("P {text}"),
            problem_type: "open_ended".to_string(),
            hints,
            expected_concepts: concepts,
            difficulty,
            sample_solution_approach: String::new(),
        })
}

fn arb_evaluation() -> impl Strategy<Value = EvaluatorOutput> {
    (
        0.0f64..=1.0,
        any::<bool>(),
        any::<bool>(),
        prop::option::of("[a-z ]{0,10}"),
    )
        .prop_map(|(correctness, is_correct, should_retry, next_hint)| EvaluatorOutput {
            correctness,
            is_correct,
            feedback: "Noted.".to_string(),
            misconceptions: vec![],
            strengths: vec![],
            next_hint,
            should_retry,
            mastery_update: None,
        })
}

fn arb_script() -> impl Strategy<Value = Script> {
    (
        arb_message(),
        arb_classification(),
        arb_explanation(),
        arb_problem(),
        arb_evaluation(),
    )
        .prop_map(|(message, classification, explanation, problem, evaluation)| Script {
            message,
            classification,
            explanation,
            problem,
            evaluation,
        })
}

fn arb_awaiting_state() -> impl Strategy<Value = TurnState> {
    (arb_problem(), prop_oneof![Just(NextAction::WaitAnswer), Just(NextAction::Retry)]).prop_map(
        |(problem, next_action)| {
            let mut state = TurnState::new("prop");
            state.mode = Mode::AwaitingAnswer {
                quiz: ActiveQuiz::new(
                    problem.problem_text,
                    problem.hints,
                    problem.expected_concepts,
                    problem.difficulty,
                ),
            };
            state.next_action = next_action;
            state
        },
    )
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Every completed turn leaves a state that may be persisted
    #[test]
    fn completed_turns_satisfy_invariants(scripts in prop::collection::vec(arb_script(), 1..8)) {
        let mut state = TurnState::new("prop");
        for script in &scripts {
            let (turn, _) = drive(state, script);
            prop_assert!(turn.is_done());
            prop_assert!(turn.state.check_invariants().is_ok(), "{:?}", turn.state);
            prop_assert_ne!(turn.state.next_action, NextAction::Reteach);
            state = turn.state;
        }
    }

    /// The log grows by exactly one exchange per turn, in order
    #[test]
    fn log_grows_by_two_per_turn(scripts in prop::collection::vec(arb_script(), 1..8)) {
        let mut state = TurnState::new("prop");
        for script in &scripts {
            let before = state.message_log.clone();
            let (turn, _) = drive(state, script);
            let log = &turn.state.message_log;
            prop_assert_eq!(log.len(), before.len() + 2);
            prop_assert_eq!(&log[..before.len()], &before[..]);
            prop_assert_eq!(&log[before.len()], &LogEntry::user(script.message.clone()));
            prop_assert_eq!(&log[before.len() + 1], &LogEntry::assistant(turn.state.response.clone()));
            state = turn.state;
        }
    }

    /// At most two role calls, and two only for evaluate-then-teach
    #[test]
    fn role_calls_are_bounded(state in arb_awaiting_state(), script in arb_script()) {
        let (_, requests) = drive(state, &script);
        prop_assert!(!requests.is_empty() && requests.len() <= 2);
        if let [first, _] = requests.as_slice() {
            let chained_reteach = matches!(first, RoleRequest::Evaluate(_));
            let routed = matches!(first, RoleRequest::Classify(_));
            prop_assert!(chained_reteach || routed);
        }
    }

    /// A pending problem sends plain answers to the evaluator and
    /// override requests to the classifier
    #[test]
    fn gate_routes_by_override(state in arb_awaiting_state(), message in arb_message()) {
        let is_override = PhraseDetector::default().is_override(&message);
        let result = transition(&Turn::start(state), &test_context(), Event::user_message(message))
            .expect("non-empty message is accepted");
        match result.effects.as_slice() {
            [Effect::InvokeRole(RoleRequest::Classify(_))] => prop_assert!(is_override),
            [Effect::InvokeRole(RoleRequest::Evaluate(_))] => prop_assert!(!is_override),
            other => prop_assert!(false, "unexpected effects: {:?}", other),
        }
        if is_override {
            prop_assert!(result.new_turn.state.active_quiz().is_none());
        }
    }

    /// The transition function is deterministic
    #[test]
    fn transition_is_deterministic(state in arb_awaiting_state(), script in arb_script()) {
        let (a, ra) = drive(state.clone(), &script);
        let (b, rb) = drive(state, &script);
        prop_assert_eq!(a, b);
        prop_assert_eq!(ra, rb);
    }
}
