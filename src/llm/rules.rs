//! Rule-based replies used when no language model is available
//!
//! Keyword tables map common phrases to canned replies. Anything else gets
//! one of the generic acknowledgements. This model never fails, so it always
//! sits at the end of the brain's chain.

use crate::collaborators::LanguageModel;
use crate::Result;
use rand::seq::SliceRandom;
use tokio_util::sync::CancellationToken;

/// Replies used when no rule matches
pub const ACKNOWLEDGEMENTS: &[&str] = &["Acknowledged.", "At once, sir.", "As you wish."];

struct Rule {
    triggers: &'static [&'static str],
    replies: &'static [&'static str],
}

const RULES: &[Rule] = &[
    Rule {
        triggers: &["hello", "hi", "hey", "greetings"],
        replies: &[
            "Good day, sir. How may I be of service?",
            "Hello, sir. I am at your disposal.",
            "Greetings, sir. What can I do for you?",
        ],
    },
    Rule {
        triggers: &["how are you"],
        replies: &["All systems operating within normal parameters."],
    },
    Rule {
        triggers: &["what can you do", "can you", "what do you"],
        replies: &[
            "I can assist with system tasks, information retrieval, and command execution, sir.",
        ],
    },
    Rule {
        triggers: &["thanks", "thank you", "appreciate"],
        replies: &[
            "You are most welcome, sir.",
            "It is my pleasure to assist, sir.",
            "Always happy to help, sir.",
        ],
    },
    Rule {
        triggers: &["bye", "goodbye"],
        replies: &["Goodbye, sir. Systems on standby.", "Standing by. Call me anytime."],
    },
    Rule {
        triggers: &["status"],
        replies: &["All systems nominal. Ready to assist."],
    },
    Rule {
        triggers: &["report"],
        replies: &["Diagnostics complete. All functions operational."],
    },
];

/// Keyword-table responder
#[derive(Clone, Debug, Default)]
pub struct RuleBasedModel;

impl RuleBasedModel {
    pub fn new() -> Self {
        Self
    }

    /// Pick a reply for `text`
    pub fn respond(&self, text: &str) -> String {
        let replies = Self::replies_for(text);
        replies
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(ACKNOWLEDGEMENTS[0])
            .to_string()
    }

    /// All replies `respond` may return for `text`
    pub fn replies_for(text: &str) -> &'static [&'static str] {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .collect();

        // Single-word triggers match whole words so "hi" does not fire on "this"
        let matches = |trigger: &str| {
            if trigger.contains(' ') {
                lower.contains(trigger)
            } else {
                words.contains(&trigger)
            }
        };

        RULES
            .iter()
            .find(|rule| rule.triggers.iter().any(|t| matches(t)))
            .map(|rule| rule.replies)
            .unwrap_or(ACKNOWLEDGEMENTS)
    }
}

impl LanguageModel for RuleBasedModel {
    fn name(&self) -> &str {
        "rules"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn generate(&self, prompt: &str, _cancel: &CancellationToken) -> Result<String> {
        Ok(self.respond(prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting() {
        let model = RuleBasedModel::new();
        let reply = model.respond("hello");
        assert!(RuleBasedModel::replies_for("hello").contains(&reply.as_str()));
        assert!(reply.contains("sir"));
    }

    #[test]
    fn test_whole_word_matching() {
        // "this" contains "hi" but is not a greeting
        assert_eq!(RuleBasedModel::replies_for("this is fine"), ACKNOWLEDGEMENTS);
        assert_ne!(RuleBasedModel::replies_for("hi there"), ACKNOWLEDGEMENTS);
    }

    #[test]
    fn test_phrase_rules() {
        assert_eq!(
            RuleBasedModel::replies_for("How are you today?"),
            &["All systems operating within normal parameters."]
        );
        assert_eq!(
            RuleBasedModel::replies_for("system status"),
            &["All systems nominal. Ready to assist."]
        );
    }

    #[test]
    fn test_unknown_input_gets_acknowledgement() {
        let model = RuleBasedModel::new();
        let reply = model.respond("what is the weather");
        assert!(ACKNOWLEDGEMENTS.contains(&reply.as_str()));
    }

    #[test]
    fn test_generate_never_fails() {
        let model = RuleBasedModel::new();
        let token = CancellationToken::new();
        token.cancel();
        assert!(model.generate("anything", &token).is_ok());
        assert!(model.is_available());
    }
}
