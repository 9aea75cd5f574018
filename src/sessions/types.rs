use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message in a conversation history. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
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

/// A saved inbound image a user can keep asking about until its TTL fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastImage {
    pub path: PathBuf,
    pub expires_at: DateTime<Utc>,
}

/// Full per-user state record. Created lazily on first reference to an
/// identity, lives for the process lifetime; never persisted.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub id: String,
    pub history: Vec<Turn>,
    pub chat_enabled: bool,
    /// Absent means "fall back to the global default prompt". Absence is a
    /// distinct state, never inferred from string emptiness.
    pub system_prompt: Option<String>,
    pub last_image: Option<LastImage>,
}

impl UserSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            history: Vec::new(),
            chat_enabled: true,
            system_prompt: None,
            last_image: None,
        }
    }
}
