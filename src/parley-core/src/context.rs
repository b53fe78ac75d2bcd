//! Role-tagged message history for chat completion calls.
//!
//! The voice pipeline keeps one [`ChatContext`] per session: a single
//! system entry at the head followed by strictly alternating user and
//! assistant entries. Switching language or model replaces the whole
//! context rather than patching it.

use serde::{Deserialize, Serialize};

/// Role of a message in a chat completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single role-tagged message.
///
/// Serializes to the `{"role": ..., "content": ...}` shape chat
/// completion endpoints expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Conversation history with an invariant head and alternation rule.
///
/// Invariants: exactly one system entry, fixed at index 0; after it the
/// roles alternate user/assistant. A push that would break alternation is
/// dropped (with a warning) so the history stays coherent even if turns
/// are interrupted by language or model switches.
#[derive(Debug, Clone)]
pub struct ChatContext {
    messages: Vec<ChatMessage>,
}

impl ChatContext {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
        }
    }

    /// Replace the entire context with a single system entry.
    pub fn reset(&mut self, system_prompt: impl Into<String>) {
        self.messages.clear();
        self.messages.push(ChatMessage::system(system_prompt));
    }

    /// Append a user message. Returns false if the push was dropped.
    pub fn push_user(&mut self, content: impl Into<String>) -> bool {
        self.push_checked(Role::User, content.into())
    }

    /// Append an assistant message. Returns false if the push was dropped.
    pub fn push_assistant(&mut self, content: impl Into<String>) -> bool {
        self.push_checked(Role::Assistant, content.into())
    }

    /// Remove a trailing user entry that never received a reply.
    ///
    /// Called when the model call for a turn fails, so the next utterance
    /// does not land behind an unanswered one.
    pub fn rollback_user(&mut self) {
        if self
            .messages
            .last()
            .is_some_and(|message| message.role == Role::User)
        {
            self.messages.pop();
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn push_checked(&mut self, role: Role, content: String) -> bool {
        let tail = match self.messages.last() {
            Some(message) => message.role,
            None => {
                // Cannot happen: the head is set in new() and reset().
                self.messages.push(ChatMessage { role, content });
                return true;
            }
        };

        let accepted = match role {
            Role::User => matches!(tail, Role::System | Role::Assistant),
            Role::Assistant => tail == Role::User,
            Role::System => false,
        };

        if accepted {
            self.messages.push(ChatMessage { role, content });
        } else {
            tracing::warn!(?role, ?tail, "dropping message that would break alternation");
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_has_single_system_head() {
        let context = ChatContext::new("You are a tutor.");
        assert_eq!(context.len(), 1);
        assert_eq!(context.messages()[0].role, Role::System);
        assert_eq!(context.messages()[0].content, "You are a tutor.");
    }

    #[test]
    fn reset_discards_prior_turns() {
        let mut context = ChatContext::new("english prompt");
        assert!(context.push_user("hello"));
        assert!(context.push_assistant("hi there"));
        assert_eq!(context.len(), 3);

        context.reset("german prompt");
        assert_eq!(context.len(), 1);
        assert_eq!(context.messages()[0].role, Role::System);
        assert_eq!(context.messages()[0].content, "german prompt");
    }

    #[test]
    fn alternation_is_enforced() {
        let mut context = ChatContext::new("prompt");
        assert!(!context.push_assistant("reply before any question"));
        assert!(context.push_user("first"));
        assert!(!context.push_user("second in a row"));
        assert!(context.push_assistant("reply"));
        assert!(context.push_user("third"));
        assert_eq!(context.len(), 4);
    }

    #[test]
    fn rollback_removes_unanswered_user_entry() {
        let mut context = ChatContext::new("prompt");
        context.push_user("question");
        context.rollback_user();
        assert_eq!(context.len(), 1);

        context.push_user("question");
        context.push_assistant("answer");
        context.rollback_user();
        assert_eq!(context.len(), 3);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let message = ChatMessage::user("hello");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"], "hello");
    }
}
