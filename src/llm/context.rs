//! Conversation context for prompt building
//!
//! A bounded, in-memory history of recent exchanges. Nothing here is
//! persisted and nothing in the coordinator depends on it.

use std::collections::VecDeque;

/// Role of a message in the conversation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single message in the conversation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Persona system prompt for the given assistant name
pub fn persona_prompt(name: &str) -> String {
    format!(
        "You are {name}, a sophisticated AI assistant like JARVIS in Iron Man. \
         Be concise, helpful, and slightly formal. Address the user as 'sir'. \
         Respond in 1-2 sentences max."
    )
}

/// Bounded conversation history
#[derive(Clone, Debug)]
pub struct ConversationContext {
    system_prompt: String,
    messages: VecDeque<Message>,
    /// Maximum number of user/assistant exchanges kept
    max_turns: usize,
}

impl ConversationContext {
    pub fn new(system_prompt: &str, max_turns: usize) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            messages: VecDeque::new(),
            max_turns,
        }
    }

    /// Record a finished exchange
    ///
    /// Both messages go in together, so concurrent requests never leave a
    /// dangling user message or pair a reply with the wrong question.
    pub fn record_exchange(&mut self, user: &str, assistant: &str) {
        self.messages.push_back(Message::user(user));
        self.messages.push_back(Message::assistant(assistant));
        self.trim();
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// All messages including the system prompt
    pub fn messages(&self) -> Vec<Message> {
        let mut result = vec![Message::system(&self.system_prompt)];
        result.extend(self.messages.iter().cloned());
        result
    }

    /// Messages for a request asking `prompt`; the history is not changed
    pub fn with_prompt(&self, prompt: &str) -> Vec<Message> {
        let mut result = self.messages();
        result.push(Message::user(prompt));
        result
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Number of messages in history (excluding system prompt)
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    fn trim(&mut self) {
        let max_messages = self.max_turns * 2;
        while self.messages.len() > max_messages {
            self.messages.pop_front();
        }
    }
}
