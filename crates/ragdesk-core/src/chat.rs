//! Chat session state machine
//!
//! A session owns the ordered transcript and applies streaming events to the
//! assistant message of the one request in flight. `submit` hands out a
//! [`MessageHandle`] for that message; every later mutation must present it,
//! so a stray event can never land on an older answer.

use tracing::{debug, warn};

use crate::api::{StreamEvent, StreamMetadata};
use crate::state::{ChatMessage, ChatRole};

/// Prefix of the text that replaces an answer when its request fails.
pub const FAILURE_PREFIX: &str = "Query failed";

/// Addresses the assistant message created by a [`ChatSession::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(usize);

impl MessageHandle {
    /// Position of the message in the transcript.
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatState {
    #[default]
    Idle,
    AwaitingResponse,
}

/// An accepted question, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub question: String,
    pub handle: MessageHandle,
}

/// What changed in the last mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatChange {
    Submitted(MessageHandle),
    Metadata(MessageHandle),
    Delta(MessageHandle),
    Finished(MessageHandle),
    Failed(MessageHandle),
    Aborted(MessageHandle),
    Cleared,
    Restored,
}

/// Notified after every mutation of a [`ChatSession`].
pub trait ChatObserver {
    fn on_change(&mut self, change: ChatChange, messages: &[ChatMessage]);
}

impl<F> ChatObserver for F
where
    F: FnMut(ChatChange, &[ChatMessage]),
{
    fn on_change(&mut self, change: ChatChange, messages: &[ChatMessage]) {
        self(change, messages)
    }
}

#[derive(Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    state: ChatState,
    in_flight: Option<MessageHandle>,
    observers: Vec<Box<dyn ChatObserver>>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Box<dyn ChatObserver>) {
        self.observers.push(observer);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn is_awaiting(&self) -> bool {
        self.state == ChatState::AwaitingResponse
    }

    pub fn in_flight(&self) -> Option<MessageHandle> {
        self.in_flight
    }

    /// Accept a question. Returns `None` (and changes nothing) when the
    /// trimmed question is empty or another request is still in flight.
    pub fn submit(&mut self, question: &str) -> Option<Submission> {
        let question = question.trim();
        if question.is_empty() || self.is_awaiting() {
            return None;
        }

        self.messages.push(ChatMessage::user(question));
        self.messages.push(ChatMessage::assistant(""));
        let handle = MessageHandle(self.messages.len() - 1);
        self.in_flight = Some(handle);
        self.state = ChatState::AwaitingResponse;

        debug!(index = handle.index(), "question submitted");
        self.notify(ChatChange::Submitted(handle));
        Some(Submission {
            question: question.to_string(),
            handle,
        })
    }

    /// Attach retrieval provenance. The answer text is left alone.
    pub fn apply_metadata(&mut self, handle: MessageHandle, metadata: StreamMetadata) -> bool {
        let Some(message) = self.in_flight_mut(handle, "metadata") else {
            return false;
        };
        message.retrieval = Some(metadata.retrieval);
        message.contexts = Some(metadata.contexts);
        message.use_rerank = Some(metadata.use_rerank);
        message.prompt = Some(metadata.prompt);
        self.notify(ChatChange::Metadata(handle));
        true
    }

    /// Append a fragment verbatim; spacing is the server's job.
    pub fn apply_delta(&mut self, handle: MessageHandle, fragment: &str) -> bool {
        let Some(message) = self.in_flight_mut(handle, "delta") else {
            return false;
        };
        message.content.push_str(fragment);
        self.notify(ChatChange::Delta(handle));
        true
    }

    pub fn finish(&mut self, handle: MessageHandle) -> bool {
        if self.in_flight_mut(handle, "done").is_none() {
            return false;
        }
        self.settle();
        self.notify(ChatChange::Finished(handle));
        true
    }

    /// Replace the answer with a failure notice. The only mutation that
    /// overwrites rather than appends.
    pub fn fail(&mut self, handle: MessageHandle, error: &str) -> bool {
        let Some(message) = self.in_flight_mut(handle, "error") else {
            return false;
        };
        message.content = format!("{}: {}", FAILURE_PREFIX, error);
        self.settle();
        self.notify(ChatChange::Failed(handle));
        true
    }

    /// The user cancelled. Whatever arrived so far stays; no error is shown.
    pub fn abort(&mut self, handle: MessageHandle) -> bool {
        if self.in_flight_mut(handle, "abort").is_none() {
            return false;
        }
        self.settle();
        self.notify(ChatChange::Aborted(handle));
        true
    }

    pub fn apply(&mut self, handle: MessageHandle, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Metadata(metadata) => self.apply_metadata(handle, metadata),
            StreamEvent::Delta(fragment) => self.apply_delta(handle, &fragment),
            StreamEvent::Done => self.finish(handle),
        }
    }

    /// Drop the transcript. Refused while a request is in flight.
    pub fn clear(&mut self) -> bool {
        if self.is_awaiting() {
            return false;
        }
        self.messages.clear();
        self.notify(ChatChange::Cleared);
        true
    }

    /// Replace the transcript with a previously saved one.
    pub fn restore(&mut self, messages: Vec<ChatMessage>) -> bool {
        if self.is_awaiting() {
            return false;
        }
        self.messages = messages;
        self.notify(ChatChange::Restored);
        true
    }

    fn in_flight_mut(&mut self, handle: MessageHandle, op: &str) -> Option<&mut ChatMessage> {
        let valid = self.is_awaiting()
            && self.in_flight == Some(handle)
            && handle.index() + 1 == self.messages.len();
        if !valid {
            warn!(
                op,
                index = handle.index(),
                state = ?self.state,
                "stream event for a message that is not in flight"
            );
            return None;
        }
        self.messages
            .get_mut(handle.index())
            .filter(|message| message.role == ChatRole::Assistant)
    }

    fn settle(&mut self) {
        self.state = ChatState::Idle;
        self.in_flight = None;
    }

    fn notify(&mut self, change: ChatChange) {
        for observer in &mut self.observers {
            observer.on_change(change, &self.messages);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RetrievalHit;
    use std::sync::{Arc, Mutex};

    fn metadata() -> StreamMetadata {
        StreamMetadata {
            retrieval: vec![RetrievalHit {
                content: "passage".to_string(),
                score: 0.91,
                rerank_score: Some(8.0),
            }],
            contexts: vec!["passage".to_string()],
            use_rerank: true,
            prompt: "assembled prompt".to_string(),
        }
    }

    #[test]
    fn test_empty_questions_are_rejected() {
        let mut session = ChatSession::new();
        assert!(session.submit("").is_none());
        assert!(session.submit("   ").is_none());
        assert!(session.messages().is_empty());
        assert_eq!(session.state(), ChatState::Idle);
    }

    #[test]
    fn test_submit_appends_user_and_placeholder() {
        let mut session = ChatSession::new();
        let submission = session.submit("  what is RAG?  ").unwrap();

        assert_eq!(submission.question, "what is RAG?");
        assert_eq!(submission.handle.index(), 1);
        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[0].content, "what is RAG?");
        assert_eq!(messages[1].role, ChatRole::Assistant);
        assert_eq!(messages[1].content, "");
        assert!(session.is_awaiting());
    }

    #[test]
    fn test_submit_while_awaiting_is_noop() {
        let mut session = ChatSession::new();
        session.submit("first").unwrap();
        assert!(session.submit("second").is_none());
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn test_metadata_then_deltas_then_done() {
        let mut session = ChatSession::new();
        let handle = session.submit("q").unwrap().handle;

        assert!(session.apply_metadata(handle, metadata()));
        assert!(session.apply_delta(handle, "A"));
        assert!(session.apply_delta(handle, "B"));
        assert!(session.finish(handle));

        let last = session.messages().last().unwrap();
        assert_eq!(last.content, "AB");
        assert_eq!(last.prompt.as_deref(), Some("assembled prompt"));
        assert_eq!(last.use_rerank, Some(true));
        assert_eq!(last.retrieval.as_ref().unwrap().len(), 1);
        assert_eq!(last.contexts.as_ref().unwrap(), &vec!["passage".to_string()]);
        assert_eq!(session.state(), ChatState::Idle);
    }

    #[test]
    fn test_metadata_does_not_touch_content() {
        let mut session = ChatSession::new();
        let handle = session.submit("q").unwrap().handle;
        session.apply_delta(handle, "partial");
        session.apply_metadata(handle, metadata());
        assert_eq!(session.messages()[1].content, "partial");
    }

    #[test]
    fn test_error_replaces_accumulated_deltas() {
        let mut session = ChatSession::new();
        let handle = session.submit("q").unwrap().handle;
        session.apply_delta(handle, "one ");
        session.apply_delta(handle, "two");
        assert!(session.fail(handle, "HTTP 500: boom"));

        let assistants: Vec<_> = session
            .messages()
            .iter()
            .filter(|m| m.role == ChatRole::Assistant)
            .collect();
        assert_eq!(assistants.len(), 1);
        assert_eq!(assistants[0].content, "Query failed: HTTP 500: boom");
        assert_eq!(session.state(), ChatState::Idle);
    }

    #[test]
    fn test_abort_keeps_partial_answer() {
        let mut session = ChatSession::new();
        let handle = session.submit("q").unwrap().handle;
        session.apply_delta(handle, "half");
        assert!(session.abort(handle));
        assert_eq!(session.messages()[1].content, "half");
        assert!(!session.is_awaiting());
    }

    #[test]
    fn test_stale_handle_cannot_touch_earlier_answer() {
        let mut session = ChatSession::new();
        let first = session.submit("one").unwrap().handle;
        session.apply_delta(first, "first answer");
        session.finish(first);

        let second = session.submit("two").unwrap().handle;
        assert!(!session.apply_delta(first, "late"));
        assert!(!session.fail(first, "late"));
        assert!(!session.apply_metadata(first, metadata()));
        assert_eq!(session.messages()[1].content, "first answer");
        assert!(session.messages()[1].retrieval.is_none());
        assert!(session.is_awaiting());

        assert!(session.apply_delta(second, "ok"));
    }

    #[test]
    fn test_events_after_done_are_rejected() {
        let mut session = ChatSession::new();
        let handle = session.submit("q").unwrap().handle;
        session.finish(handle);
        assert!(!session.apply_delta(handle, "x"));
        assert!(!session.finish(handle));
        assert_eq!(session.messages()[1].content, "");
    }

    #[test]
    fn test_apply_dispatches_stream_events() {
        let mut session = ChatSession::new();
        let handle = session.submit("q").unwrap().handle;
        session.apply(handle, StreamEvent::Metadata(metadata()));
        session.apply(handle, StreamEvent::Delta("Hi".to_string()));
        session.apply(handle, StreamEvent::Done);
        assert_eq!(session.messages()[1].content, "Hi");
        assert!(!session.is_awaiting());
    }

    #[test]
    fn test_clear_refused_while_awaiting() {
        let mut session = ChatSession::new();
        let handle = session.submit("q").unwrap().handle;
        assert!(!session.clear());
        session.finish(handle);
        assert!(session.clear());
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_observers_see_every_mutation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut session = ChatSession::new();
        session.subscribe(Box::new(move |change: ChatChange, messages: &[ChatMessage]| {
            sink.lock().unwrap().push((change, messages.len()));
        }));

        let handle = session.submit("q").unwrap().handle;
        session.apply_delta(handle, "a");
        session.finish(handle);
        session.apply_delta(handle, "ignored");

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (ChatChange::Submitted(handle), 2),
                (ChatChange::Delta(handle), 2),
                (ChatChange::Finished(handle), 2),
            ]
        );
    }

    #[test]
    fn test_restore_replaces_transcript() {
        let mut session = ChatSession::new();
        assert!(session.restore(vec![
            ChatMessage::user("old"),
            ChatMessage::assistant("answer"),
        ]));
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.state(), ChatState::Idle);
    }
}
