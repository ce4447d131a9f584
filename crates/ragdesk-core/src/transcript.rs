//! Local persistence of the chat transcript.
//!
//! The store is a [`ChatObserver`]: subscribed to a session, it rewrites the
//! transcript file whenever a message is added, settles, or the transcript
//! is replaced. [`TranscriptStore::load`] seeds the next session on startup.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::warn;

use crate::chat::{ChatChange, ChatObserver};
use crate::config;
use crate::state::ChatMessage;

pub struct TranscriptStore {
    path: PathBuf,
}

impl TranscriptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<data_dir>/ragdesk/transcript.json`.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(config::data_dir()?.join("transcript.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved messages, or an empty transcript if nothing was saved yet.
    pub fn load(&self) -> Result<Vec<ChatMessage>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, messages: &[ChatMessage]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string(messages)?)?;
        Ok(())
    }
}

impl ChatObserver for TranscriptStore {
    fn on_change(&mut self, change: ChatChange, messages: &[ChatMessage]) {
        // Streaming fragments are saved once the answer settles.
        if matches!(change, ChatChange::Metadata(_) | ChatChange::Delta(_)) {
            return;
        }
        if let Err(e) = self.save(messages) {
            warn!(error = %e, ?change, path = %self.path.display(), "failed to persist transcript");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatSession;
    use tempfile::tempdir;

    #[test]
    fn test_load_without_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = TranscriptStore::new(dir.path().join("transcript.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_session_changes_are_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chat").join("transcript.json");

        let mut session = ChatSession::new();
        session.subscribe(Box::new(TranscriptStore::new(&path)));
        let handle = session.submit("hello").unwrap().handle;

        // The question and the empty placeholder are saved on submit.
        let saved = TranscriptStore::new(&path).load().unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].content, "hello");
        assert_eq!(saved[1].content, "");

        session.apply_delta(handle, "hi ");
        session.apply_delta(handle, "there");
        let saved = TranscriptStore::new(&path).load().unwrap();
        assert_eq!(saved[1].content, "");

        session.finish(handle);
        let saved = TranscriptStore::new(&path).load().unwrap();
        assert_eq!(saved[1].content, "hi there");

        let mut restored = ChatSession::new();
        restored.restore(TranscriptStore::new(&path).load().unwrap());
        assert_eq!(restored.messages(), session.messages());
    }

    #[test]
    fn test_abort_saves_partial_answer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transcript.json");

        let mut session = ChatSession::new();
        session.subscribe(Box::new(TranscriptStore::new(&path)));
        let handle = session.submit("q").unwrap().handle;
        session.apply_delta(handle, "half an ans");
        session.abort(handle);

        let saved = TranscriptStore::new(&path).load().unwrap();
        assert_eq!(saved[1].content, "half an ans");
    }

    #[test]
    fn test_clear_persists_empty_transcript() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transcript.json");

        let mut session = ChatSession::new();
        session.subscribe(Box::new(TranscriptStore::new(&path)));
        let handle = session.submit("q").unwrap().handle;
        session.fail(handle, "offline");
        session.clear();

        assert!(TranscriptStore::new(&path).load().unwrap().is_empty());
    }
}
