use serde::{Deserialize, Serialize};

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation. Immutable once appended to a session history;
/// the streaming draft only becomes a message at stream completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Server-identified conversation thread.
///
/// The `uid` is opaque and server-assigned; the client never mints one. The
/// title may be empty while generation is pending, and `messages` is omitted
/// from list responses; only fetch-by-uid populates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSession {
    pub uid: String,
    pub title: String,
    pub created_time: i64,
    /// Unix seconds, monotonic per update on the server.
    pub updated_time: i64,
    pub messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(uid: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Request payload for one generation stream. An empty `session_uid` asks the
/// backend to create a session implicitly on the first successful exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateContentRequest {
    pub messages: Vec<ChatMessage>,
    pub session_uid: String,
}

/// Partial session update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub title: Option<String>,
}
