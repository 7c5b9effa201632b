//! System prompts and input templates for the reasoning roles

use super::types::{ClassifierInput, EvaluatorInput, ProblemSetterInput, TeacherInput};
use crate::state_machine::state::{LearningStyle, LogRole};
use std::fmt::Write as _;

pub const CLASSIFIER_PROMPT: &str = r"You are the router of StudyBuddy, a tutoring assistant.

Classify the student's latest message and extract what it is about.

Intents:
- greeting: hi, hello, thanks. Reply warmly yourself and ask what they want to study.
- learn: wants an explanation (explain, teach me, what is, how does).
- practice: wants problems (quiz me, give me a problem, test me).
- review: wants a progress check (how am I doing, review, summary).
- clarify: follow-up on the previous topic (I don't understand, explain more).
- off_topic: not about learning. Reply yourself and steer back to studying.

Extract the subject (Math, Physics, Chemistry, Biology, ...) and the specific topic.
Infer difficulty from the wording and the recent conversation.

Set needs_agent=false and write direct_response for greetings and off-topic messages.
Otherwise set needs_agent=true. Always answer by calling the submit tool.";

pub const TEACHER_PROMPT: &str = r"You are the teacher of StudyBuddy, an expert and patient educator.

Explain the concept at the student's level:
- beginner: simple language, more examples, basic concepts
- intermediate: standard explanation with some depth
- advanced: rigorous treatment, edge cases, connections

Start from why it matters, give the core idea clearly, show two or three concrete
examples, connect it to something familiar, and finish with one check question that
verifies understanding plus a suggested next step. Always answer by calling the
submit tool.";

pub const PROBLEM_SETTER_PROMPT: &str = r"You are the problem setter of StudyBuddy.

Write one engaging practice problem for the given subject, topic and difficulty.
Provide progressive hints from subtle to explicit, the concepts the problem tests,
and a short description of how to approach a solution. Do not reveal the answer in
the problem text. Always answer by calling the submit tool.";

pub const EVALUATOR_PROMPT: &str = r"You are the evaluator of StudyBuddy.

Judge the student's answer to the problem. Score correctness from 0 to 1 and set
is_correct when the answer is substantially right. Give specific, constructive
feedback, list misconceptions and strengths, and decide whether the student should
try again. When they should, provide the next hint without giving the answer away.
Always answer by calling the submit tool.";

fn or_unspecified(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("unspecified")
}

fn style_guidance(style: LearningStyle) -> &'static str {
    match style {
        LearningStyle::Visual => "visual: describe diagrams, shapes and pictures in words",
        LearningStyle::StepByStep => "step_by_step: break everything into numbered steps",
        LearningStyle::Conceptual => "conceptual: focus on the big picture and why it works",
        LearningStyle::Balanced => "balanced: mix intuition, steps and examples",
    }
}

pub fn render_classifier(input: &ClassifierInput) -> String {
    let mut prompt = String::new();
    if !input.context.is_empty() {
        prompt.push_str("Recent conversation:\n");
        for entry in &input.context {
            let speaker = match entry.role {
                LogRole::User => "Student",
                LogRole::Assistant => "Tutor",
            };
            let _ = writeln!(prompt, "{speaker}: {}", entry.content);
        }
        prompt.push('\n');
    }
    let _ = write!(prompt, "Student message: {}", input.message);
    prompt
}

pub fn render_teacher(input: &TeacherInput) -> String {
    format!(
        "Student question: {question}\nSubject: {subject}\nTopic: {topic}\nDifficulty: {difficulty}\nLearning style: {style}\n\nProvide a clear explanation with examples.",
        question = input.question,
        subject = or_unspecified(input.subject.as_deref()),
        topic = or_unspecified(input.topic.as_deref()),
        difficulty = input.difficulty,
        style = style_guidance(input.learning_style),
    )
}

pub fn render_problem_setter(input: &ProblemSetterInput) -> String {
    format!(
        "Generate a practice problem:\nSubject: {subject}\nTopic: {topic}\nDifficulty: {difficulty}\n\nCreate an engaging problem with hints.",
        subject = or_unspecified(input.subject.as_deref()),
        topic = or_unspecified(input.topic.as_deref()),
        difficulty = input.difficulty,
    )
}

pub fn render_evaluator(input: &EvaluatorInput) -> String {
    format!(
        "Evaluate this answer:\n\nProblem: {problem}\nStudent answer: {answer}\nExpected concepts: {concepts}\nHints already given: {hints}\n\nProvide feedback.",
        problem = input.problem_text,
        answer = input.student_answer,
        concepts = input.expected_concepts.join(", "),
        hints = input.hints_used,
    )
}
