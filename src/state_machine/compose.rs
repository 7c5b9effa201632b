//! Student-facing response text built from role outputs

use super::state::{ActiveQuiz, Difficulty, Intent};
use crate::roles::{EvaluatorOutput, TeacherOutput};
use std::fmt::Write as _;

/// How an evaluation feedback message ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FeedbackTail<'a> {
    Hint(&'a str),
    Reteach,
    Resolved,
}

pub(crate) fn explanation(output: &TeacherOutput) -> String {
    let mut response = format!("{}\n\n", output.explanation.trim());

    if !output.examples.is_empty() {
        response.push_str("**Examples:**\n");
        for (i, example) in output.examples.iter().enumerate() {
            let _ = writeln!(response, "{}. {example}", i + 1);
        }
        response.push('\n');
    }

    if let Some(analogy) = output.analogies.first() {
        let _ = write!(response, "💡 {analogy}\n\n");
    }

    let _ = write!(response, "**Check:** {}", output.check_question.trim());

    let next_steps = output.next_steps.trim();
    if !next_steps.is_empty() {
        let _ = write!(response, "\n\n*{next_steps}*");
    }
    response
}

fn difficulty_emoji(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Beginner => "🌱",
        Difficulty::Intermediate => "🌿",
        Difficulty::Advanced => "🌳",
    }
}

pub(crate) fn problem(quiz: &ActiveQuiz) -> String {
    format!(
        "{emoji} **Practice Problem** ({difficulty})\n\n{text}\n\nType your answer when ready! 💡 Need a hint? Just ask!",
        emoji = difficulty_emoji(quiz.difficulty),
        difficulty = quiz.difficulty,
        text = quiz.problem_text.trim(),
    )
}

/// Opener by correctness band, checked in order
fn opener(output: &EvaluatorOutput) -> &'static str {
    if output.is_correct {
        "🎉 **Excellent!**"
    } else if output.correctness > 0.6 {
        "👍 **Good effort!**"
    } else {
        "💭 **Let's work through this.**"
    }
}

pub(crate) fn feedback(output: &EvaluatorOutput, tail: FeedbackTail<'_>) -> String {
    let mut response = format!("{} {}\n\n", opener(output), output.feedback.trim());

    if !output.strengths.is_empty() {
        response.push_str("**What you did well:**\n");
        for strength in &output.strengths {
            let _ = writeln!(response, "✓ {strength}");
        }
        response.push('\n');
    }

    if !output.misconceptions.is_empty() {
        response.push_str("**Let's clarify:**\n");
        for misconception in &output.misconceptions {
            let _ = writeln!(response, "• {misconception}");
        }
        response.push('\n');
    }

    match tail {
        FeedbackTail::Hint(hint) => {
            let _ = write!(response, "💡 **Hint:** {hint}\n\nTry again!");
        }
        FeedbackTail::Reteach => response.push_str("Let me explain this again..."),
        FeedbackTail::Resolved => response.push_str("🎯 Ready for another problem?"),
    }
    response
}

/// Reply for intents that need no specialised role
pub(crate) fn neutral(intent: Intent) -> String {
    match intent {
        Intent::Review => "I don't have a progress summary for you yet. Tell me a topic to \
                           learn about, or ask for a practice problem to see where you stand."
            .to_string(),
        _ => "I'm here to help you study. Ask me to explain a topic, or ask for a practice \
              problem."
            .to_string(),
    }
}

/// Question handed to the teacher after an incorrect answer
pub(crate) fn reteach_question(quiz: &ActiveQuiz, answer: &str) -> String {
    format!(
        "The student answered this problem incorrectly.\n\nProblem: {}\nStudent answer: {answer}\n\nExplain the underlying concept again, differently, without giving away the answer.",
        quiz.problem_text
    )
}
