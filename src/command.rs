//! User commands and action/conversation classification
//!
//! A command is an immutable, trimmed utterance tagged with where it came
//! from. Classification is a case-insensitive substring test against a
//! static keyword list: any keyword present makes the command an action.
//!
//! The heuristic is crude and knowingly misfires on questions that happen
//! to contain an action word. "what time does the store open" is an action
//! (it contains both "time" and "open"), and so is "restart the music"
//! because "restart" contains "start".

use std::fmt;

/// Keywords that mark a command as a request for a system action
pub const ACTION_KEYWORDS: &[&str] = &[
    "open", "show", "launch", "start", "run", "execute", "time", "date", "browser", "terminal",
    "editor", "volume", "click", "scroll", "type",
];

/// Where a command came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InputSource {
    /// Recognized from the microphone
    Speech,
    /// Typed into the text input box
    Typed,
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Speech => write!(f, "speech"),
            InputSource::Typed => write!(f, "text"),
        }
    }
}

/// A single user utterance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    text: String,
    source: InputSource,
}

impl Command {
    /// Create a command from raw input
    ///
    /// Returns `None` when the input is empty after trimming.
    pub fn new(text: &str, source: InputSource) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            text: trimmed.to_string(),
            source,
        })
    }

    /// Create a command from recognized speech
    pub fn speech(text: &str) -> Option<Self> {
        Self::new(text, InputSource::Speech)
    }

    /// Create a command from typed input
    pub fn typed(text: &str) -> Option<Self> {
        Self::new(text, InputSource::Typed)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> InputSource {
        self.source
    }

    /// Whether this command came from the microphone
    pub fn is_speech(&self) -> bool {
        self.source == InputSource::Speech
    }
}

/// Result of classifying a command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    /// Requests an OS-level side effect
    Action,
    /// Needs a generated reply
    Conversational,
}

/// Keyword classifier for commands
#[derive(Clone, Debug)]
pub struct CommandClassifier {
    keywords: Vec<String>,
}

impl Default for CommandClassifier {
    fn default() -> Self {
        Self::new(ACTION_KEYWORDS.iter().copied())
    }
}

impl CommandClassifier {
    /// Create a classifier over the given keywords
    ///
    /// Keywords are lowercased; blank entries are ignored.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    /// Return the first keyword found in `text`, if any
    pub fn matched_keyword(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .find(|k| lower.contains(k.as_str()))
            .map(String::as_str)
    }

    /// Classify raw text
    pub fn classify(&self, text: &str) -> CommandKind {
        match self.matched_keyword(text) {
            Some(_) => CommandKind::Action,
            None => CommandKind::Conversational,
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

/// Classify text against the default action keywords
pub fn classify(text: &str) -> CommandKind {
    CommandClassifier::default().classify(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_trimmed() {
        let cmd = Command::typed("  open the browser \n").unwrap();
        assert_eq!(cmd.text(), "open the browser");
        assert_eq!(cmd.source(), InputSource::Typed);
    }

    #[test]
    fn test_empty_input_is_not_a_command() {
        assert!(Command::speech("").is_none());
        assert!(Command::speech("   \t ").is_none());
    }

    #[test]
    fn test_every_keyword_classifies_as_action() {
        for keyword in ACTION_KEYWORDS {
            let text = format!("please {} something", keyword);
            assert_eq!(classify(&text), CommandKind::Action, "keyword {}", keyword);
        }
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("OPEN THE BROWSER"), CommandKind::Action);
        assert_eq!(classify("Volume Up"), CommandKind::Action);
    }

    #[test]
    fn test_conversational() {
        assert_eq!(classify("hello"), CommandKind::Conversational);
        assert_eq!(classify("what is the weather"), CommandKind::Conversational);
        assert_eq!(classify("how are you"), CommandKind::Conversational);
    }

    #[test]
    fn test_known_false_positives() {
        assert_eq!(
            classify("what time does the store open"),
            CommandKind::Action
        );
        assert_eq!(classify("restart the music"), CommandKind::Action);
    }

    #[test]
    fn test_matched_keyword_reports_first_in_list_order() {
        let classifier = CommandClassifier::default();
        assert_eq!(
            classifier.matched_keyword("what time does the store open"),
            Some("open")
        );
        assert_eq!(classifier.matched_keyword("hello there"), None);
    }

    #[test]
    fn test_custom_keywords() {
        let classifier = CommandClassifier::new(["Lights", " ", "play"]);
        assert_eq!(classifier.keywords().len(), 2);
        assert_eq!(classifier.classify("turn on the lights"), CommandKind::Action);
        assert_eq!(
            classifier.classify("open the browser"),
            CommandKind::Conversational
        );
    }
}
