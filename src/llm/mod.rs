//! Reply generation
//!
//! The `Brain` is an ordered chain of language models. The first available
//! model that returns a reply wins; errors fall through to the next one and
//! the rule-based model at the end always answers.

pub mod context;
#[cfg(feature = "mistral")]
pub mod mistral;
pub mod rules;

pub use context::{persona_prompt, ConversationContext, Message, MessageRole};
#[cfg(feature = "mistral")]
pub use mistral::MistralModel;
pub use rules::{RuleBasedModel, ACKNOWLEDGEMENTS};

use crate::collaborators::LanguageModel;
use crate::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Language-model fallback chain
pub struct Brain {
    models: Vec<Arc<dyn LanguageModel>>,
    fallback: RuleBasedModel,
}

impl Brain {
    /// Create a brain over `models`, tried in order before the rules
    pub fn new(models: Vec<Arc<dyn LanguageModel>>) -> Self {
        Self {
            models,
            fallback: RuleBasedModel::new(),
        }
    }

    /// A brain with no language model, only canned replies
    pub fn rules_only() -> Self {
        Self::new(Vec::new())
    }

    /// Whether a real language model is available
    pub fn has_model(&self) -> bool {
        self.models.iter().any(|m| m.is_available())
    }

    /// Produce a reply; never fails
    pub fn respond(&self, prompt: &str, cancel: &CancellationToken) -> String {
        for model in self.models.iter().filter(|m| m.is_available()) {
            if cancel.is_cancelled() {
                debug!("Request cancelled before {} ran", model.name());
                break;
            }
            match model.generate(prompt, cancel) {
                Ok(reply) => {
                    debug!("{} produced {} chars", model.name(), reply.len());
                    return reply.trim().to_string();
                }
                Err(e) => warn!("{} failed, falling back: {}", model.name(), e),
            }
        }
        self.fallback.respond(prompt)
    }
}

/// Reports available only when a real model is loaded; `generate` always
/// answers either way.
impl LanguageModel for Brain {
    fn name(&self) -> &str {
        "brain"
    }

    fn is_available(&self) -> bool {
        self.has_model()
    }

    fn generate(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        Ok(self.respond(prompt, cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NeoError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedModel {
        name: &'static str,
        available: bool,
        reply: Result<String>,
        calls: AtomicUsize,
    }

    impl FixedModel {
        fn new(name: &'static str, available: bool, reply: Result<String>) -> Arc<Self> {
            Arc::new(Self {
                name,
                available,
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl LanguageModel for FixedModel {
        fn name(&self) -> &str {
            self.name
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn generate(&self, _prompt: &str, _cancel: &CancellationToken) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    #[test]
    fn test_rules_only_brain() {
        let brain = Brain::rules_only();
        assert!(!brain.has_model());
        assert!(!brain.is_available());
        let reply = brain
            .generate("what is the weather", &CancellationToken::new())
            .unwrap();
        assert!(ACKNOWLEDGEMENTS.contains(&reply.as_str()));
    }

    #[test]
    fn test_first_working_model_wins() {
        let offline = FixedModel::new("offline", false, Ok("never".into()));
        let broken = FixedModel::new(
            "broken",
            true,
            Err(NeoError::GenerationError("oom".into())),
        );
        let good = FixedModel::new("good", true, Ok("  Indeed, sir.  ".into()));
        let brain = Brain::new(vec![offline.clone(), broken.clone(), good.clone()]);

        assert!(brain.has_model());
        assert_eq!(
            brain.respond("hello", &CancellationToken::new()),
            "Indeed, sir."
        );
        assert_eq!(offline.calls.load(Ordering::SeqCst), 0);
        assert_eq!(broken.calls.load(Ordering::SeqCst), 1);
        assert_eq!(good.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_all_models_failing_falls_back_to_rules() {
        let broken = FixedModel::new(
            "broken",
            true,
            Err(NeoError::GenerationError("oom".into())),
        );
        let brain = Brain::new(vec![broken]);
        let reply = brain.respond("thanks", &CancellationToken::new());
        assert!(RuleBasedModel::replies_for("thanks").contains(&reply.as_str()));
    }

    #[test]
    fn test_cancelled_request_skips_models() {
        let good = FixedModel::new("good", true, Ok("late".into()));
        let brain = Brain::new(vec![good.clone()]);
        let token = CancellationToken::new();
        token.cancel();

        let _ = brain.respond("hello", &token);
        assert_eq!(good.calls.load(Ordering::SeqCst), 0);
    }
}
