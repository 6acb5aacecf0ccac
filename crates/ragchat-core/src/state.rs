//! UI-agnostic conversation state types
//!
//! These structures are shared by every front end (the TUI, the one-shot CLI
//! commands) and don't depend on any specific UI framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat message in the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Citation>,
    #[serde(default)]
    pub is_error: bool,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl ChatMessage {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            sources: Vec::new(),
            is_error: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<Citation>) -> Self {
        Self {
            sources,
            ..Self::new(ChatRole::Assistant, content)
        }
    }

    /// An assistant message standing in for a reply that never arrived.
    pub fn failure(content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::new(ChatRole::Assistant, content)
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }
}

/// A source the backend cited for an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawCitation")]
pub struct Citation {
    pub label: String,
    pub page: Option<u32>,
    pub excerpt: Option<String>,
}

impl Citation {
    pub fn display(&self) -> String {
        match self.page {
            Some(page) => format!("{} (p. {})", self.label, page),
            None => self.label.clone(),
        }
    }
}

/// Backends send either bare strings or small objects in `sources`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCitation {
    Plain(String),
    Detailed {
        #[serde(alias = "source", alias = "title", alias = "name")]
        label: String,
        #[serde(default)]
        page: Option<u32>,
        #[serde(default, alias = "content", alias = "snippet")]
        excerpt: Option<String>,
    },
}

impl From<RawCitation> for Citation {
    fn from(raw: RawCitation) -> Self {
        match raw {
            RawCitation::Plain(label) => Citation {
                label,
                page: None,
                excerpt: None,
            },
            RawCitation::Detailed { label, page, excerpt } => Citation { label, page, excerpt },
        }
    }
}
