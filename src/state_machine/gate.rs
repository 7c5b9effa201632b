//! Override detection for pending problems
//!
//! While a problem is pending, every message is treated as an answer unless
//! the detector says the student wants something else.

use std::fmt;

/// Phrases that mean "stop the quiz, I want something else"
pub const DEFAULT_OVERRIDE_PHRASES: &[&str] = &[
    "explain",
    "teach",
    "new problem",
    "another problem",
    "different",
    "change topic",
    "switch topic",
    "something else",
];

/// Decides whether a message abandons the pending problem
pub trait OverrideDetector: Send + Sync + fmt::Debug {
    fn is_override(&self, message: &str) -> bool;
}

/// Case-insensitive substring match against a fixed phrase set
#[derive(Debug, Clone)]
pub struct PhraseDetector {
    phrases: Vec<String>,
}

impl PhraseDetector {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}

impl Default for PhraseDetector {
    fn default() -> Self {
        Self::new(DEFAULT_OVERRIDE_PHRASES)
    }
}

impl OverrideDetector for PhraseDetector {
    fn is_override(&self, message: &str) -> bool {
        let msg = message.to_lowercase();
        self.phrases.iter().any(|phrase| msg.contains(phrase.as_str()))
    }
}
