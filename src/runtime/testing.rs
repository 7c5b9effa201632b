//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::db::NewTurn;
use crate::llm::{LlmError, LlmRequest, LlmResponse};
use crate::roles::{RoleFailure, RoleGateway, RoleOutput, RoleRequest};
use crate::state_machine::state::{LearningStyle, TurnState};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock Role Gateway
// ============================================================================

/// Role gateway that answers from a queue and records every request
#[derive(Default)]
pub struct MockRoleGateway {
    outputs: Mutex<VecDeque<Result<RoleOutput, RoleFailure>>>,
    requests: Mutex<Vec<RoleRequest>>,
    delay: Option<Duration>,
}

impl MockRoleGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every invocation, to simulate slow roles
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue(&self, output: RoleOutput) {
        self.outputs.lock().unwrap().push_back(Ok(output));
    }

    pub fn queue_failure(&self, failure: RoleFailure) {
        self.outputs.lock().unwrap().push_back(Err(failure));
    }

    pub fn recorded_requests(&self) -> Vec<RoleRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RoleGateway for MockRoleGateway {
    async fn invoke(&self, request: RoleRequest) -> Result<RoleOutput, RoleFailure> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let role = request.role();
        self.requests.lock().unwrap().push(request);
        self.outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RoleFailure::new(role, "no mock output queued")))
    }
}

// ============================================================================
// In-Memory Storage
// ============================================================================

/// In-memory storage for testing
#[derive(Default)]
pub struct InMemoryStore {
    states: Mutex<HashMap<String, TurnState>>,
    students: Mutex<HashMap<String, LearningStyle>>,
    turns: Mutex<Vec<NewTurn>>,
    touched: Mutex<Vec<String>>,
    sessions: Mutex<HashMap<String, u32>>,
    saves: Mutex<u32>,
    fail_loads: Mutex<bool>,
    fail_saves: Mutex<bool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a thread's state directly
    pub fn put_state(&self, state: TurnState) {
        self.states
            .lock()
            .unwrap()
            .insert(state.thread_id.clone(), state);
    }

    /// Get current state for a thread
    pub fn get_current_state(&self, thread_id: &str) -> Option<TurnState> {
        self.states.lock().unwrap().get(thread_id).cloned()
    }

    pub fn add_student(&self, student_id: &str, style: LearningStyle) {
        self.students
            .lock()
            .unwrap()
            .insert(student_id.to_string(), style);
    }

    pub fn fail_loads(&self, fail: bool) {
        *self.fail_loads.lock().unwrap() = fail;
    }

    pub fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap() = fail;
    }

    pub fn save_count(&self) -> u32 {
        *self.saves.lock().unwrap()
    }

    pub fn recorded_turns(&self) -> Vec<NewTurn> {
        self.turns.lock().unwrap().clone()
    }

    pub fn touched_students(&self) -> Vec<String> {
        self.touched.lock().unwrap().clone()
    }

    pub fn session_count(&self, student_id: &str) -> u32 {
        self.sessions
            .lock()
            .unwrap()
            .get(student_id)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn load(&self, thread_id: &str) -> Result<TurnState, StoreError> {
        if *self.fail_loads.lock().unwrap() {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        Ok(self
            .get_current_state(thread_id)
            .unwrap_or_else(|| TurnState::new(thread_id)))
    }

    async fn save(&self, thread_id: &str, state: &TurnState) -> Result<(), StoreError> {
        if *self.fail_saves.lock().unwrap() {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        *self.saves.lock().unwrap() += 1;
        self.states
            .lock()
            .unwrap()
            .insert(thread_id.to_string(), state.clone());
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn learning_style(&self, student_id: &str) -> Result<Option<LearningStyle>, StoreError> {
        Ok(self.students.lock().unwrap().get(student_id).copied())
    }

    async fn touch_student(&self, student_id: &str, new_session: bool) -> Result<(), StoreError> {
        self.touched.lock().unwrap().push(student_id.to_string());
        if new_session {
            *self
                .sessions
                .lock()
                .unwrap()
                .entry(student_id.to_string())
                .or_default() += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl TurnLog for InMemoryStore {
    async fn record_turn(&self, turn: &NewTurn) -> Result<(), StoreError> {
        self.turns.lock().unwrap().push(turn.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::{
        ClassifierOutput, EvaluatorOutput, ProblemSetterOutput, Role, TeacherOutput,
    };
    use crate::runtime::{SessionRunner, TurnError, TurnRequest};
    use crate::state_machine::state::{ActiveQuiz, Difficulty, Intent, Mode, NextAction};
    use crate::state_machine::PhraseDetector;
    use std::sync::Arc;

    type TestRunner = SessionRunner<Arc<InMemoryStore>, Arc<MockRoleGateway>>;

    fn runner() -> (TestRunner, Arc<InMemoryStore>, Arc<MockRoleGateway>) {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(MockRoleGateway::new());
        let runner = SessionRunner::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            Arc::new(PhraseDetector::default()),
        );
        (runner, store, gateway)
    }

    fn request(message: &str, thread_id: Option<&str>) -> TurnRequest {
        TurnRequest {
            message: message.to_string(),
            thread_id: thread_id.map(str::to_string),
            student_id: None,
        }
    }

    fn classified(intent: Intent) -> RoleOutput {
        RoleOutput::Classification(ClassifierOutput {
            intent,
            subject: Some("Math".to_string()),
            topic: Some("quadratic equations".to_string()),
            difficulty: Some("beginner".to_string()),
            reasoning: "test".to_string(),
            direct_response: None,
            needs_agent: true,
        })
    }

    fn explained() -> RoleOutput {
        RoleOutput::Explanation(TeacherOutput {
            explanation: "A quadratic equation has the form ax^2 + bx + c = 0.".to_string(),
            examples: vec!["x^2 - 1 = 0".to_string()],
            analogies: vec!["Like a ball thrown in the air".to_string()],
            check_question: "What is a in 2x^2 + 3 = 0?".to_string(),
            key_concepts: vec!["coefficients".to_string()],
            next_steps: "Practice factoring".to_string(),
        })
    }

    fn problem() -> RoleOutput {
        RoleOutput::Problem(ProblemSetterOutput {
            problem_text: "Solve x^2 - 9 = 0".to_string(),
            problem_type: "calculation".to_string(),
            hints: vec!["Difference of squares".to_string()],
            expected_concepts: vec!["factoring".to_string()],
            difficulty: Difficulty::Beginner,
            sample_solution_approach: "(x-3)(x+3)".to_string(),
        })
    }

    fn evaluated(is_correct: bool, should_retry: bool, hint: Option<&str>) -> RoleOutput {
        RoleOutput::Evaluation(EvaluatorOutput {
            correctness: if is_correct { 0.95 } else { 0.2 },
            is_correct,
            feedback: "Thanks for the answer.".to_string(),
            misconceptions: vec![],
            strengths: vec![],
            next_hint: hint.map(str::to_string),
            should_retry,
            mastery_update: Some("learning".to_string()),
        })
    }

    fn awaiting_state(thread_id: &str) -> TurnState {
        let mut state = TurnState::new(thread_id);
        state.subject = Some("Math".to_string());
        state.topic = Some("quadratic equations".to_string());
        let quiz = ActiveQuiz::new(
            "Solve x^2 - 9 = 0",
            vec![],
            vec!["factoring".to_string()],
            Difficulty::Beginner,
        )
        .for_topic(state.subject.clone(), state.topic.clone());
        state.mode = Mode::AwaitingAnswer { quiz };
        state.next_action = NextAction::WaitAnswer;
        state
    }

    #[tokio::test]
    async fn test_new_thread_learn_turn() {
        let (runner, store, gateway) = runner();
        gateway.queue(classified(Intent::Learn));
        gateway.queue(explained());

        let outcome = runner
            .handle_turn(request("explain quadratic equations", None))
            .await
            .unwrap();

        assert!(outcome.thread_id.starts_with("thread_"));
        assert_eq!(outcome.next_action, Some(NextAction::WaitAnswer));
        assert_eq!(outcome.metadata.intent, Some(Intent::Learn));
        assert_eq!(outcome.metadata.subject.as_deref(), Some("Math"));
        assert!(!outcome.metadata.has_active_quiz);
        assert!(outcome.response.contains("ax^2 + bx + c"));

        let saved = store.get_current_state(&outcome.thread_id).unwrap();
        assert_eq!(saved.message_log.len(), 2);
        assert_eq!(saved.response, outcome.response);

        let turns = store.recorded_turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].handled_by.as_deref(), Some("teacher"));
        assert_eq!(turns[0].score, None);
    }

    #[tokio::test]
    async fn test_quiz_then_correct_answer_across_turns() {
        let (runner, store, gateway) = runner();
        gateway.queue(classified(Intent::Practice));
        gateway.queue(problem());
        gateway.queue(evaluated(true, false, None));

        let first = runner
            .handle_turn(request("quiz me on quadratic equations", Some("thread_q")))
            .await
            .unwrap();
        assert_eq!(first.thread_id, "thread_q");
        assert!(first.metadata.has_active_quiz);
        assert_eq!(first.next_action, Some(NextAction::WaitAnswer));

        let second = runner
            .handle_turn(request("x = 3 or x = -3", Some("thread_q")))
            .await
            .unwrap();
        assert!(!second.metadata.has_active_quiz);
        assert_eq!(second.next_action, None);

        let requests = gateway.recorded_requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].role(), Role::Evaluator);

        let saved = store.get_current_state("thread_q").unwrap();
        assert_eq!(saved.message_log.len(), 4);

        let turns = store.recorded_turns();
        assert_eq!(turns[0].intent, Some(Intent::Practice));
        assert_eq!(turns[1].intent, None);
        assert_eq!(turns[1].handled_by.as_deref(), Some("evaluator"));
        assert_eq!(turns[1].score, Some(0.95));
        assert_eq!(turns[1].mastery_update.as_deref(), Some("learning"));
    }

    #[tokio::test]
    async fn test_retry_keeps_quiz() {
        let (runner, store, gateway) = runner();
        store.put_state(awaiting_state("thread_r"));
        gateway.queue(evaluated(false, true, Some("Think about squares")));

        let outcome = runner
            .handle_turn(request("x = 9", Some("thread_r")))
            .await
            .unwrap();
        assert_eq!(outcome.next_action, Some(NextAction::Retry));
        assert!(outcome.metadata.has_active_quiz);

        let saved = store.get_current_state("thread_r").unwrap();
        assert_eq!(saved.active_quiz().unwrap().hints_used, 1);
    }

    #[tokio::test]
    async fn test_reteach_chain_returns_wait_answer() {
        let (runner, store, gateway) = runner();
        store.put_state(awaiting_state("thread_e"));
        gateway.queue(evaluated(false, false, None));
        gateway.queue(explained());

        let outcome = runner
            .handle_turn(request("x = 81", Some("thread_e")))
            .await
            .unwrap();

        assert_eq!(outcome.next_action, Some(NextAction::WaitAnswer));
        assert!(outcome.response.contains("Let me explain this again..."));

        let requests = gateway.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].role(), Role::Teacher);

        let saved = store.get_current_state("thread_e").unwrap();
        assert_ne!(saved.next_action, NextAction::Reteach);
        assert_eq!(saved.message_log.len(), 2);
        assert_eq!(store.recorded_turns()[0].handled_by.as_deref(), Some("teacher"));
    }

    #[tokio::test]
    async fn test_answer_after_reteach_is_evaluated() {
        let (runner, store, gateway) = runner();
        store.put_state(awaiting_state("thread_re"));
        gateway.queue(evaluated(false, false, None));
        gateway.queue(explained());
        gateway.queue(evaluated(true, false, None));

        runner
            .handle_turn(request("x = 81", Some("thread_re")))
            .await
            .unwrap();
        let saved = store.get_current_state("thread_re").unwrap();
        assert_eq!(saved.next_action, NextAction::WaitAnswer);
        assert!(saved.active_quiz().is_some());

        let outcome = runner
            .handle_turn(request("x = 3 or x = -3", Some("thread_re")))
            .await
            .unwrap();
        let requests = gateway.recorded_requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].role(), Role::Evaluator);
        assert_eq!(outcome.next_action, None);
        assert!(!outcome.metadata.has_active_quiz);
    }

    #[tokio::test]
    async fn test_role_failure_saves_nothing() {
        let (runner, store, gateway) = runner();
        store.put_state(awaiting_state("thread_f"));
        let before = store.get_current_state("thread_f").unwrap();
        gateway.queue_failure(RoleFailure::new(Role::Evaluator, "model unavailable"));

        let err = runner
            .handle_turn(request("x = 3", Some("thread_f")))
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Role(ref f) if f.role == Role::Evaluator));

        assert_eq!(store.get_current_state("thread_f").unwrap(), before);
        assert_eq!(store.save_count(), 0);
        assert!(store.recorded_turns().is_empty());
    }

    #[tokio::test]
    async fn test_role_failure_in_reteach_chain_saves_nothing() {
        let (runner, store, gateway) = runner();
        store.put_state(awaiting_state("thread_g"));
        gateway.queue(evaluated(false, false, None));
        gateway.queue_failure(RoleFailure::new(Role::Teacher, "timeout"));

        let result = runner.handle_turn(request("x = 0", Some("thread_g"))).await;
        assert!(matches!(result, Err(TurnError::Role(_))));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_load_failure_starts_fresh() {
        let (runner, store, gateway) = runner();
        store.put_state(awaiting_state("thread_l"));
        store.fail_loads(true);
        gateway.queue(classified(Intent::Learn));
        gateway.queue(explained());

        // "x = 3" would be evaluated against the stored quiz; fresh state classifies it
        let outcome = runner
            .handle_turn(request("x = 3", Some("thread_l")))
            .await
            .unwrap();
        assert_eq!(gateway.recorded_requests()[0].role(), Role::Classifier);
        assert_eq!(outcome.thread_id, "thread_l");
        assert_eq!(store.get_current_state("thread_l").unwrap().message_log.len(), 2);
    }

    #[tokio::test]
    async fn test_save_failure_is_an_error() {
        let (runner, store, gateway) = runner();
        store.fail_saves(true);
        gateway.queue(classified(Intent::Learn));
        gateway.queue(explained());

        let err = runner
            .handle_turn(request("explain", Some("thread_s")))
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Store(_)));
        assert!(store.recorded_turns().is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_rejected_before_load() {
        let (runner, store, gateway) = runner();
        let err = runner
            .handle_turn(request("   ", Some("thread_v")))
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Validation(_)));
        assert!(gateway.recorded_requests().is_empty());
        assert!(store.get_current_state("thread_v").is_none());
    }

    #[tokio::test]
    async fn test_empty_thread_id_gets_fresh_id() {
        let (runner, _store, gateway) = runner();
        gateway.queue(classified(Intent::Review));

        let outcome = runner.handle_turn(request("how am I doing", Some(""))).await.unwrap();
        assert!(outcome.thread_id.starts_with("thread_"));
        assert_eq!(outcome.next_action, None);
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let store = InMemoryStore::new();
        store.put_state(awaiting_state("thread_i"));
        let a = store.load("thread_i").await.unwrap();
        let b = store.load("thread_i").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_learning_style_and_activity() {
        let (runner, store, gateway) = runner();
        store.add_student("s1", LearningStyle::StepByStep);
        gateway.queue(classified(Intent::Learn));
        gateway.queue(explained());

        runner
            .handle_turn(TurnRequest {
                message: "explain factoring".to_string(),
                thread_id: None,
                student_id: Some("s1".to_string()),
            })
            .await
            .unwrap();

        let RoleRequest::Teach(input) = &gateway.recorded_requests()[1] else {
            panic!("expected teacher request");
        };
        assert_eq!(input.learning_style, LearningStyle::StepByStep);
        assert_eq!(store.touched_students(), vec!["s1"]);
    }

    #[tokio::test]
    async fn test_sessions_count_new_threads_only() {
        let (runner, store, gateway) = runner();
        store.add_student("s1", LearningStyle::Visual);
        for _ in 0..3 {
            gateway.queue(classified(Intent::Learn));
            gateway.queue(explained());
        }
        let turn = |thread_id: &str| TurnRequest {
            message: "explain factoring".to_string(),
            thread_id: Some(thread_id.to_string()),
            student_id: Some("s1".to_string()),
        };

        runner.handle_turn(turn("thread_s1")).await.unwrap();
        runner.handle_turn(turn("thread_s1")).await.unwrap();
        assert_eq!(store.session_count("s1"), 1);

        runner.handle_turn(turn("thread_s2")).await.unwrap();
        assert_eq!(store.session_count("s1"), 2);
        assert_eq!(store.touched_students().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_student_defaults_to_balanced() {
        let (runner, _store, gateway) = runner();
        gateway.queue(classified(Intent::Learn));
        gateway.queue(explained());

        runner
            .handle_turn(TurnRequest {
                message: "explain factoring".to_string(),
                thread_id: None,
                student_id: Some("ghost".to_string()),
            })
            .await
            .unwrap();

        let RoleRequest::Teach(input) = &gateway.recorded_requests()[1] else {
            panic!("expected teacher request");
        };
        assert_eq!(input.learning_style, LearningStyle::Balanced);
    }

    #[tokio::test]
    async fn test_same_thread_turns_are_serialised() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(MockRoleGateway::new().with_delay(Duration::from_millis(20)));
        let runner = SessionRunner::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            Arc::new(PhraseDetector::default()),
        );
        for _ in 0..2 {
            gateway.queue(classified(Intent::Learn));
            gateway.queue(explained());
        }

        let (a, b) = tokio::join!(
            runner.handle_turn(request("explain roots", Some("thread_c"))),
            runner.handle_turn(request("explain vertices", Some("thread_c"))),
        );
        a.unwrap();
        b.unwrap();

        // Neither turn overwrote the other
        let saved = store.get_current_state("thread_c").unwrap();
        assert_eq!(saved.message_log.len(), 4);
        let requests = gateway.recorded_requests();
        assert_eq!(requests[0].role(), Role::Classifier);
        assert_eq!(requests[1].role(), Role::Teacher);
        assert_eq!(requests[2].role(), Role::Classifier);
        assert_eq!(requests[3].role(), Role::Teacher);
    }

    #[tokio::test]
    async fn test_abandoned_caller_still_saves() {
        let store = Arc::new(InMemoryStore::new());
        let gateway = Arc::new(MockRoleGateway::new().with_delay(Duration::from_millis(30)));
        let runner = SessionRunner::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            Arc::new(PhraseDetector::default()),
        );
        gateway.queue(classified(Intent::Learn));
        gateway.queue(explained());

        let timed_out = tokio::time::timeout(
            Duration::from_millis(5),
            runner.handle_turn(request("explain", Some("thread_t"))),
        )
        .await;
        assert!(timed_out.is_err());

        for _ in 0..50 {
            if store.get_current_state("thread_t").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let saved = store.get_current_state("thread_t").unwrap();
        assert_eq!(saved.message_log.len(), 2);
    }
}
