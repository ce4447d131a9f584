//! UI-agnostic chat transcript types
//!
//! These are shared by the chat state machine, transcript persistence and
//! any front end, and don't depend on a specific UI framework.

use serde::{Deserialize, Serialize};

/// One candidate passage returned by backend vector search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub content: String,
    /// Vector similarity in `[0, 1]`.
    pub score: f64,
    #[serde(default)]
    pub rerank_score: Option<f64>,
}

/// A chat message in the question-answering conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<Vec<RetrievalHit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_rerank: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            contexts: None,
            retrieval: None,
            use_rerank: None,
            prompt: None,
        }
    }

    /// True when the backend returned at least one retrieval hit for this answer.
    pub fn has_retrieval(&self) -> bool {
        self.retrieval.as_ref().is_some_and(|hits| !hits.is_empty())
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}
