//! Events that can occur during a turn

use crate::roles::{
    ClassifierOutput, EvaluatorOutput, ProblemSetterOutput, RoleOutput, TeacherOutput,
};

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // User events
    UserMessage { text: String },

    // Role events
    Classified(ClassifierOutput),
    Explained(TeacherOutput),
    ProblemSet(ProblemSetterOutput),
    Evaluated(EvaluatorOutput),
}

impl Event {
    pub fn user_message(text: impl Into<String>) -> Self {
        Event::UserMessage { text: text.into() }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::UserMessage { .. } => "user_message",
            Event::Classified(_) => "classified",
            Event::Explained(_) => "explained",
            Event::ProblemSet(_) => "problem_set",
            Event::Evaluated(_) => "evaluated",
        }
    }
}

impl From<RoleOutput> for Event {
    fn from(output: RoleOutput) -> Self {
        match output {
            RoleOutput::Classification(c) => Event::Classified(c),
            RoleOutput::Explanation(t) => Event::Explained(t),
            RoleOutput::Problem(p) => Event::ProblemSet(p),
            RoleOutput::Evaluation(e) => Event::Evaluated(e),
        }
    }
}
