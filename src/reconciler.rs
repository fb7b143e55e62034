//! Folds socket events into the agent chat transcript.
//!
//! The reconciler is synchronous and never fails: every event is applied in
//! arrival order and reports what it changed, so a front end can print
//! incremental output without diffing the whole transcript.

use crate::types::{InboundEvent, Message, Sender};

/// What a single `apply` did to the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Nothing visible changed.
    None,
    TypingStarted,
    /// A new streaming agent message was appended at `index`.
    Created { index: usize },
    /// `delta` was appended to the streaming message at `index`.
    Appended { index: usize, delta: String },
    /// The streaming message at `index` was replaced by a snapshot.
    Replaced { index: usize },
    /// The message at `index` stopped streaming. `rewritten` is set when a
    /// final response overwrote its content.
    Finalized { index: usize, rewritten: bool },
    /// A finalized system message was appended at `index`.
    ErrorAppended { index: usize },
}

#[derive(Debug, Default)]
pub struct Reconciler {
    messages: Vec<Message>,
    accumulator: String,
    typing: bool,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulator
    }

    pub fn streaming_index(&self) -> Option<usize> {
        self.messages.iter().rposition(|m| m.streaming)
    }

    pub fn apply(&mut self, event: InboundEvent) -> Change {
        match event {
            InboundEvent::Typing => {
                self.typing = true;
                self.accumulator.clear();
                Change::TypingStarted
            }
            InboundEvent::Stream {
                content,
                full_content,
            } => self.apply_stream(non_empty(content), non_empty(full_content)),
            InboundEvent::Complete { full_response } => {
                self.typing = false;
                self.accumulator.clear();
                let Some(index) = self.streaming_index() else {
                    return Change::None;
                };
                let message = &mut self.messages[index];
                message.streaming = false;
                let rewritten = match non_empty(full_response) {
                    Some(text) if text != message.content => {
                        message.content = text;
                        true
                    }
                    _ => false,
                };
                Change::Finalized { index, rewritten }
            }
            InboundEvent::Error { message } => {
                self.typing = false;
                self.accumulator.clear();
                let message = message.unwrap_or_default();
                self.messages
                    .push(Message::finalized(Sender::System, format!("Error: {message}")));
                Change::ErrorAppended {
                    index: self.messages.len() - 1,
                }
            }
            InboundEvent::Unknown => {
                tracing::warn!("ignoring socket event of unknown type");
                Change::None
            }
        }
    }

    fn apply_stream(&mut self, content: Option<String>, full_content: Option<String>) -> Change {
        let Some(index) = self.streaming_index() else {
            let initial = full_content.or(content).unwrap_or_default();
            self.accumulator = initial.clone();
            self.messages.push(Message::streaming_agent(initial));
            return Change::Created {
                index: self.messages.len() - 1,
            };
        };

        if let Some(snapshot) = full_content {
            self.accumulator = snapshot.clone();
            self.messages[index].content = snapshot;
            return Change::Replaced { index };
        }

        match content {
            Some(delta) if !self.accumulator.contains(delta.as_str()) => {
                self.accumulator.push_str(&delta);
                self.messages[index].content.push_str(&delta);
                Change::Appended { index, delta }
            }
            Some(delta) => {
                tracing::debug!(len = delta.len(), "dropping duplicate stream chunk");
                Change::None
            }
            None => Change::None,
        }
    }

    /// Appends an outbound user message. A reply left streaming by an error
    /// frame is finalized first so the next reply starts below the question.
    pub fn push_user(&mut self, text: impl Into<String>) -> usize {
        if let Some(index) = self.streaming_index() {
            tracing::debug!(index, "finalizing interrupted reply");
            self.messages[index].streaming = false;
            self.accumulator.clear();
        }
        self.messages.push(Message::finalized(Sender::User, text));
        self.messages.len() - 1
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.accumulator.clear();
    }

    /// Called when the socket goes away. The in-flight message keeps the text
    /// it had but no longer counts as streaming.
    pub fn end_session(&mut self) -> Option<usize> {
        self.typing = false;
        self.accumulator.clear();
        let index = self.streaming_index()?;
        self.messages[index].streaming = false;
        Some(index)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(content: &str) -> InboundEvent {
        InboundEvent::Stream {
            content: Some(content.to_string()),
            full_content: None,
        }
    }

    fn snapshot(full: &str) -> InboundEvent {
        InboundEvent::Stream {
            content: None,
            full_content: Some(full.to_string()),
        }
    }

    fn complete() -> InboundEvent {
        InboundEvent::Complete {
            full_response: None,
        }
    }

    fn streaming_count(r: &Reconciler) -> usize {
        r.messages().iter().filter(|m| m.streaming).count()
    }

    #[test]
    fn typing_then_deltas_then_complete_yields_one_message() {
        let mut r = Reconciler::new();
        r.apply(InboundEvent::Typing);
        assert!(r.is_typing());
        assert!(r.messages().is_empty());
        r.apply(stream("Hel"));
        r.apply(stream("lo"));
        r.apply(complete());

        assert_eq!(r.messages().len(), 1);
        let msg = &r.messages()[0];
        assert_eq!(msg.sender, Sender::Agent);
        assert_eq!(msg.content, "Hello");
        assert!(!msg.streaming);
        assert!(!r.is_typing());
    }

    #[test]
    fn duplicate_snapshot_delta_is_suppressed() {
        let mut r = Reconciler::new();
        r.apply(snapshot("Hi there"));
        assert_eq!(r.apply(stream("Hi there")), Change::None);
        assert_eq!(r.messages()[0].content, "Hi there");
        assert!(r.messages()[0].streaming);
    }

    #[test]
    fn replayed_delta_is_a_no_op() {
        let mut r = Reconciler::new();
        r.apply(stream("abc"));
        r.apply(stream("def"));
        let before = r.messages().to_vec();
        assert_eq!(r.apply(stream("def")), Change::None);
        assert_eq!(r.messages(), before.as_slice());
    }

    #[test]
    fn deltas_concatenate_in_arrival_order() {
        let mut r = Reconciler::new();
        for delta in ["The ", "quick ", "brown ", "fox"] {
            r.apply(stream(delta));
        }
        assert_eq!(r.messages()[0].content, "The quick brown fox");
        assert_eq!(r.accumulated(), "The quick brown fox");
    }

    #[test]
    fn snapshot_overrides_accumulated_content() {
        let mut r = Reconciler::new();
        r.apply(stream("partial garbage"));
        let change = r.apply(snapshot("Clean text"));
        assert_eq!(change, Change::Replaced { index: 0 });
        assert_eq!(r.messages()[0].content, "Clean text");
        assert_eq!(r.accumulated(), "Clean text");
    }

    #[test]
    fn empty_stream_creates_empty_streaming_message() {
        let mut r = Reconciler::new();
        let change = r.apply(InboundEvent::Stream {
            content: None,
            full_content: None,
        });
        assert_eq!(change, Change::Created { index: 0 });
        assert_eq!(r.messages()[0].content, "");
        assert!(r.messages()[0].streaming);
    }

    #[test]
    fn complete_without_streaming_message_only_clears_accumulator() {
        let mut r = Reconciler::new();
        r.push_user("hi");
        r.apply(InboundEvent::Typing);
        let before = r.messages().to_vec();
        assert_eq!(r.apply(complete()), Change::None);
        assert_eq!(r.messages(), before.as_slice());
        assert_eq!(r.accumulated(), "");
    }

    #[test]
    fn complete_with_full_response_overwrites_content() {
        let mut r = Reconciler::new();
        r.apply(stream("draft"));
        let change = r.apply(InboundEvent::Complete {
            full_response: Some("final answer".to_string()),
        });
        assert_eq!(
            change,
            Change::Finalized {
                index: 0,
                rewritten: true
            }
        );
        assert_eq!(r.messages()[0].content, "final answer");
        assert!(!r.messages()[0].streaming);
    }

    #[test]
    fn finalized_message_is_not_mutated_by_later_streams() {
        let mut r = Reconciler::new();
        r.apply(stream("first"));
        r.apply(complete());
        r.apply(stream("second"));
        assert_eq!(r.messages().len(), 2);
        assert_eq!(r.messages()[0].content, "first");
        assert_eq!(r.messages()[1].content, "second");
        assert_eq!(streaming_count(&r), 1);
    }

    #[test]
    fn error_while_streaming_appends_system_message() {
        let mut r = Reconciler::new();
        r.apply(InboundEvent::Typing);
        r.apply(stream("partial"));
        let change = r.apply(InboundEvent::Error {
            message: Some("timeout".to_string()),
        });
        assert_eq!(change, Change::ErrorAppended { index: 1 });
        assert!(!r.is_typing());
        assert_eq!(r.messages()[0].content, "partial");
        assert!(r.messages()[0].streaming);
        let err = &r.messages()[1];
        assert_eq!(err.sender, Sender::System);
        assert_eq!(err.content, "Error: timeout");
        assert!(!err.streaming);
        assert_eq!(streaming_count(&r), 1);
    }

    #[test]
    fn unknown_event_is_ignored() {
        let mut r = Reconciler::new();
        r.apply(stream("x"));
        assert_eq!(r.apply(InboundEvent::Unknown), Change::None);
        assert_eq!(r.messages().len(), 1);
    }

    #[test]
    fn end_session_keeps_partial_text() {
        let mut r = Reconciler::new();
        r.apply(InboundEvent::Typing);
        r.apply(stream("half a sent"));
        assert_eq!(r.end_session(), Some(0));
        assert!(!r.is_typing());
        assert_eq!(r.messages()[0].content, "half a sent");
        assert_eq!(streaming_count(&r), 0);
    }

    #[test]
    fn clear_resets_transcript_and_accumulator() {
        let mut r = Reconciler::new();
        r.push_user("q");
        r.apply(stream("a"));
        r.clear();
        assert!(r.messages().is_empty());
        assert_eq!(r.accumulated(), "");
    }

    #[test]
    fn message_ids_are_unique() {
        let mut r = Reconciler::new();
        r.push_user("a");
        r.apply(stream("b"));
        r.apply(complete());
        r.apply(InboundEvent::Error {
            message: Some("c".to_string()),
        });
        let ids: std::collections::HashSet<_> = r.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn next_turn_after_error_gets_its_own_reply() {
        let mut r = Reconciler::new();
        r.apply(InboundEvent::Typing);
        r.apply(stream("Let me"));
        r.apply(InboundEvent::Error {
            message: Some("timeout".to_string()),
        });
        assert_eq!(r.push_user("try again?"), 2);
        assert_eq!(streaming_count(&r), 0);

        r.apply(InboundEvent::Typing);
        assert_eq!(r.apply(stream("Sure")), Change::Created { index: 3 });
        r.apply(complete());

        let transcript: Vec<_> = r
            .messages()
            .iter()
            .map(|m| (m.sender, m.content.as_str(), m.streaming))
            .collect();
        assert_eq!(
            transcript,
            vec![
                (Sender::Agent, "Let me", false),
                (Sender::System, "Error: timeout", false),
                (Sender::User, "try again?", false),
                (Sender::Agent, "Sure", false),
            ]
        );
    }

    #[test]
    fn error_without_message_text() {
        let mut r = Reconciler::new();
        assert_eq!(
            r.apply(InboundEvent::Error { message: None }),
            Change::ErrorAppended { index: 0 }
        );
        assert_eq!(r.messages()[0].content, "Error: ");
        assert_eq!(r.messages()[0].sender, Sender::System);
    }

    #[test]
    fn typing_mid_stream_resets_duplicate_check() {
        let mut r = Reconciler::new();
        r.apply(InboundEvent::Typing);
        r.apply(stream("abc"));
        assert_eq!(r.apply(stream("abc")), Change::None);

        r.apply(InboundEvent::Typing);
        assert_eq!(r.accumulated(), "");
        assert_eq!(
            r.apply(stream("abc")),
            Change::Appended {
                index: 0,
                delta: "abc".to_string()
            }
        );
        assert_eq!(r.messages().len(), 1);
        assert_eq!(r.messages()[0].content, "abcabc");
        assert_eq!(streaming_count(&r), 1);
    }
}
