//! Conversation sessions, stored per payload.
//!
//! Each payload digest owns one JSON file under `[sessions].dir` holding an
//! array of [`ChatSession`]s, most recently updated first and capped at
//! `[sessions].limit`. A payload that changes gets a new digest and
//! therefore a fresh session list.
//!
//! Records are re-validated on load: sessions without an id are dropped,
//! messages that are not well-formed user/assistant turns are filtered out,
//! and blank titles are regenerated from the first user message.

use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::config::Config;
use linkrag_core::prompt::{ChatMessage, ChatRole};

pub const NEW_CONVERSATION_TITLE: &str = "New Conversation";

const TITLE_MAX_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One displayed conversation turn. Timestamps are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl UiMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: now_millis(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::new(MessageRole::Assistant, content)
        }
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        let role = match self.role {
            MessageRole::User => ChatRole::User,
            MessageRole::Assistant => ChatRole::Assistant,
        };
        ChatMessage::new(role, self.content.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub messages: Vec<UiMessage>,
    pub created_at: i64,
    pub updated_at: i64,
    pub payload_digest: String,
}

impl ChatSession {
    pub fn new(payload_digest: &str) -> Self {
        let now = now_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: NEW_CONVERSATION_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            payload_digest: payload_digest.to_string(),
        }
    }

    /// Append a message, bump `updated_at` and refresh a placeholder title.
    pub fn push(&mut self, message: UiMessage) {
        self.updated_at = self.updated_at.max(message.created_at);
        self.messages.push(message);
        if self.title == NEW_CONVERSATION_TITLE {
            self.title = create_chat_title(&self.messages);
        }
    }

    /// History suitable for a provider: error replies are left out.
    pub fn chat_history(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .filter(|m| !m.is_error)
            .map(UiMessage::to_chat_message)
            .collect()
    }
}

/// Title from the first user message, whitespace-collapsed and cut to 40
/// characters, or [`NEW_CONVERSATION_TITLE`].
pub fn create_chat_title(messages: &[UiMessage]) -> String {
    let Some(first) = messages.iter().find(|m| m.role == MessageRole::User) else {
        return NEW_CONVERSATION_TITLE.to_string();
    };
    let collapsed = first.content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return NEW_CONVERSATION_TITLE.to_string();
    }
    if collapsed.chars().count() > TITLE_MAX_CHARS {
        let head: String = collapsed.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head)
    } else {
        collapsed
    }
}

/// Rebuild a session from untrusted JSON. `None` if it has no usable id.
pub fn normalize_session(raw: &Value, payload_digest: &str) -> Option<ChatSession> {
    let obj = raw.as_object()?;
    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())?
        .to_string();

    let messages: Vec<UiMessage> = obj
        .get("messages")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|m| serde_json::from_value::<UiMessage>(m.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    let created_at = obj
        .get("createdAt")
        .and_then(Value::as_i64)
        .filter(|t| *t > 0)
        .unwrap_or_else(now_millis);
    let updated_at = obj
        .get("updatedAt")
        .and_then(Value::as_i64)
        .filter(|t| *t > 0)
        .unwrap_or(created_at);

    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| create_chat_title(&messages));

    Some(ChatSession {
        id,
        title,
        messages,
        created_at,
        updated_at,
        payload_digest: obj
            .get("payloadDigest")
            .and_then(Value::as_str)
            .unwrap_or(payload_digest)
            .to_string(),
    })
}

/// JSON-file session store, one file per payload digest.
pub struct SessionStore {
    dir: PathBuf,
    limit: usize,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            dir: dir.into(),
            limit: limit.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.sessions.dir.clone(), config.sessions.limit)
    }

    fn path_for(&self, digest: &str) -> PathBuf {
        self.dir.join(format!("{}.json", digest))
    }

    /// Sessions for `digest`, most recently updated first.
    ///
    /// A missing file is an empty list. An unreadable file is logged and
    /// treated as empty rather than blocking the conversation.
    pub fn load(&self, digest: &str) -> Result<Vec<ChatSession>> {
        let path = self.path_for(digest);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session file: {}", path.display()))?;

        let raw: Value = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring malformed session file");
                return Ok(Vec::new());
            }
        };

        let sessions: Vec<ChatSession> = raw
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|s| normalize_session(s, digest))
                    .collect()
            })
            .unwrap_or_default();

        Ok(self.sort_and_limit(sessions))
    }

    /// Replace the stored list for `digest`.
    pub fn save(&self, digest: &str, sessions: Vec<ChatSession>) -> Result<()> {
        let sessions = self.sort_and_limit(sessions);
        std::fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create session directory: {}", self.dir.display())
        })?;

        let path = self.path_for(digest);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&sessions)?;
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write session file: {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace session file: {}", path.display()))?;

        debug!(digest, sessions = sessions.len(), "saved sessions");
        Ok(())
    }

    /// Insert or replace `session` in its payload's list.
    pub fn upsert(&self, session: &ChatSession) -> Result<()> {
        let digest = &session.payload_digest;
        let mut sessions = self.load(digest)?;
        sessions.retain(|s| s.id != session.id);
        sessions.push(session.clone());
        self.save(digest, sessions)
    }

    /// Pick the session to continue: `id` if given, a fresh one if `fresh`,
    /// else the most recent.
    pub fn select(&self, digest: &str, id: Option<&str>, fresh: bool) -> Result<ChatSession> {
        let sessions = self.load(digest)?;
        if let Some(id) = id {
            return match sessions.into_iter().find(|s| s.id == id) {
                Some(session) => Ok(session),
                None => bail!("session not found: {}", id),
            };
        }
        if fresh {
            return Ok(ChatSession::new(digest));
        }
        Ok(sessions
            .into_iter()
            .next()
            .unwrap_or_else(|| ChatSession::new(digest)))
    }

    fn sort_and_limit(&self, mut sessions: Vec<ChatSession>) -> Vec<ChatSession> {
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions.truncate(self.limit);
        sessions
    }
}

/// `YYYY-MM-DD HH:MM` (UTC) for a millisecond timestamp.
pub fn format_timestamp(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
