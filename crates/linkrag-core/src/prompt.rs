//! Chat prompt assembly.
//!
//! A request to a chat provider is one system message followed by the most
//! recent turns of the conversation. The system message carries the
//! payload's system prompt and the retrieved grounding context.

use serde::{Deserialize, Serialize};

use crate::models::Payload;

/// How many trailing conversation messages are sent with each request.
pub const RECENT_HISTORY_LIMIT: usize = 12;

const GROUNDING_INSTRUCTION: &str = "Ground answers in the supplied context whenever possible. If context is insufficient, clearly say what is missing.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

/// System message text: the trimmed system prompt and, when there is any
/// context, the grounding instruction. `None` when both are empty.
pub fn system_message_text(payload: &Payload, context: &str) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    let system_prompt = payload.system_prompt.trim();
    if !system_prompt.is_empty() {
        parts.push(system_prompt.to_string());
    }
    if !context.trim().is_empty() {
        parts.push(format!("{}\n\nContext:\n{}", GROUNDING_INSTRUCTION, context));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Build the message list sent to a provider.
///
/// The system message (if any) comes first, followed by the last
/// `recent_history_limit` messages of `history`.
pub fn build_chat_messages(
    history: &[ChatMessage],
    payload: &Payload,
    context: &str,
    recent_history_limit: usize,
) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(recent_history_limit);

    let mut messages = Vec::with_capacity(history.len() - start + 1);
    if let Some(system) = system_message_text(payload, context) {
        messages.push(ChatMessage::new(ChatRole::System, system));
    }
    messages.extend_from_slice(&history[start..]);
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::default_payload;

    #[test]
    fn test_system_message_includes_prompt_and_context() {
        let payload = default_payload();
        let text = system_message_text(&payload, "[1] Doc\nbody").unwrap();
        assert!(text.starts_with(&payload.system_prompt));
        assert!(text.ends_with("Context:\n[1] Doc\nbody"));
    }

    #[test]
    fn test_context_only() {
        let mut payload = default_payload();
        payload.system_prompt = "   ".to_string();
        let text = system_message_text(&payload, "ctx").unwrap();
        assert!(text.starts_with("Ground answers"));
    }

    #[test]
    fn test_no_system_message_when_both_empty() {
        let mut payload = default_payload();
        payload.system_prompt = String::new();
        let messages = build_chat_messages(&[ChatMessage::user("hi")], &payload, " ", 12);
        assert_eq!(messages, vec![ChatMessage::user("hi")]);
    }

    #[test]
    fn test_prompt_without_context() {
        let payload = default_payload();
        let text = system_message_text(&payload, "").unwrap();
        assert_eq!(text, payload.system_prompt);
    }

    #[test]
    fn test_history_window() {
        let history: Vec<ChatMessage> = (0..20)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("q{}", i))
                } else {
                    ChatMessage::assistant(format!("a{}", i))
                }
            })
            .collect();
        let messages = build_chat_messages(&history, &default_payload(), "ctx", RECENT_HISTORY_LIMIT);
        assert_eq!(messages.len(), 13);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[1].content, "q8");
        assert_eq!(messages[12].content, "a19");
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
