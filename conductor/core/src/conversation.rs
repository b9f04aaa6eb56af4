//! Conversation State
//!
//! The client-side accumulator a stream is applied to: the ordered message
//! list plus the two flags a presentation layer renders from
//! (`awaiting_first_token` while the request is in flight,
//! `streaming_content` while an assistant message is growing).
//!
//! # Invariants
//!
//! - At most one assistant message is streaming at a time.
//! - Events are applied in arrival order; text is only ever appended.
//! - After [`Conversation::clear`], the rest of the active run's output is
//!   dropped; the run itself is not stopped.

use serde::{Deserialize, Serialize};

use crate::events::{ProgressStage, StreamEvent};

/// Unique message identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("msg_{id}"))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who authored a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The person at the keyboard
    User,
    /// The generation pipeline
    Assistant,
}

/// A message in the conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Unique message ID
    pub id: MessageId,
    /// Who sent this message
    pub sender: Sender,
    /// Message text, progress markers included
    pub text: String,
    /// When the message was created (Unix timestamp ms)
    pub created_at: u64,
    /// Whether this message reports a failure
    pub is_error: bool,
    /// Whether the message is still being streamed
    pub streaming: bool,
    /// Progress points reached while this message streamed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<ProgressStage>,
}

impl ConversationMessage {
    fn new(sender: Sender, text: String) -> Self {
        Self {
            id: MessageId::new(),
            sender,
            text,
            created_at: now_ms(),
            is_error: false,
            streaming: false,
            stages: Vec::new(),
        }
    }

    fn streaming(sender: Sender) -> Self {
        Self {
            streaming: true,
            ..Self::new(sender, String::new())
        }
    }
}

/// What applying one event changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Applied {
    /// Text was appended to the streaming message
    Appended {
        /// Message that grew
        id: MessageId,
        /// The appended fragment
        text: String,
    },
    /// A progress marker was appended and recorded
    Progress {
        /// Message that grew
        id: MessageId,
        /// Progress point reached
        stage: ProgressStage,
        /// The marker text appended
        text: String,
    },
    /// The run failed and an error message was added
    Failed(ConversationMessage),
}

/// Conversation history plus in-flight flags
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    /// Conversation history
    messages: Vec<ConversationMessage>,
    /// Request sent, no response body yet
    awaiting_first_token: bool,
    /// An assistant message is growing
    streaming_content: bool,
    /// The assistant message being streamed
    current_streaming_id: Option<MessageId>,
    /// Remaining output of the active run goes nowhere
    discard_active: bool,
}

impl Conversation {
    /// Create an empty conversation
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user message and mark the run as awaiting its first token
    ///
    /// A message still streaming from a superseded run is completed first.
    pub fn push_user(&mut self, text: impl Into<String>) -> MessageId {
        self.finish();
        let msg = ConversationMessage::new(Sender::User, text.into());
        let id = msg.id.clone();
        self.messages.push(msg);
        self.awaiting_first_token = true;
        id
    }

    /// Start the (initially empty) assistant message for the active run
    ///
    /// Returns `None` when the run's output was discarded by [`clear`].
    ///
    /// [`clear`]: Conversation::clear
    pub fn begin_assistant(&mut self) -> Option<MessageId> {
        self.awaiting_first_token = false;
        self.streaming_content = true;
        if self.discard_active {
            return None;
        }
        if let Some(id) = &self.current_streaming_id {
            return Some(id.clone());
        }

        let msg = ConversationMessage::streaming(Sender::Assistant);
        let id = msg.id.clone();
        self.current_streaming_id = Some(id.clone());
        self.messages.push(msg);
        Some(id)
    }

    /// Apply one stream event
    ///
    /// Returns `None` when the event was dropped (no assistant message to
    /// append to).
    pub fn apply(&mut self, event: &StreamEvent) -> Option<Applied> {
        match event {
            StreamEvent::Chunk { text, .. } => {
                let msg = self.streaming_message_mut()?;
                msg.text.push_str(text);
                Some(Applied::Appended {
                    id: msg.id.clone(),
                    text: text.clone(),
                })
            }
            StreamEvent::Progress { stage, marker } => {
                let msg = self.streaming_message_mut()?;
                msg.text.push_str(marker);
                msg.stages.push(*stage);
                Some(Applied::Progress {
                    id: msg.id.clone(),
                    stage: *stage,
                    text: marker.clone(),
                })
            }
            StreamEvent::Error { message } => {
                let id = self.push_error(message.clone());
                self.get_message(&id).cloned().map(Applied::Failed)
            }
        }
    }

    /// Add an assistant error message and end the active run
    pub fn push_error(&mut self, text: impl Into<String>) -> MessageId {
        self.finish();
        let mut msg = ConversationMessage::new(Sender::Assistant, text.into());
        msg.is_error = true;
        let id = msg.id.clone();
        self.messages.push(msg);
        id
    }

    /// End the active run: completes the streaming message, resets flags
    pub fn finish(&mut self) {
        if let Some(id) = self.current_streaming_id.take() {
            if let Some(msg) = self.messages.iter_mut().find(|m| m.id == id) {
                msg.streaming = false;
            }
        }
        self.awaiting_first_token = false;
        self.streaming_content = false;
        self.discard_active = false;
    }

    /// Discard all messages; an active run keeps going but its output is dropped
    pub fn clear(&mut self) {
        let active = self.is_busy();
        self.messages.clear();
        self.current_streaming_id = None;
        self.discard_active = active;
        tracing::debug!(active, "Cleared conversation");
    }

    /// Copy of the message list
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConversationMessage> {
        self.messages.clone()
    }

    /// All messages
    #[must_use]
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Get message by ID
    #[must_use]
    pub fn get_message(&self, id: &MessageId) -> Option<&ConversationMessage> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Get the current streaming message ID
    #[must_use]
    pub fn streaming_message_id(&self) -> Option<&MessageId> {
        self.current_streaming_id.as_ref()
    }

    /// Request sent, nothing received yet
    #[must_use]
    pub fn awaiting_first_token(&self) -> bool {
        self.awaiting_first_token
    }

    /// An assistant message is growing
    #[must_use]
    pub fn streaming_content(&self) -> bool {
        self.streaming_content
    }

    /// Whether a run is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.awaiting_first_token || self.streaming_content
    }

    fn streaming_message_mut(&mut self) -> Option<&mut ConversationMessage> {
        let id = self.current_streaming_id.as_ref()?;
        self.messages.iter_mut().find(|m| &m.id == id)
    }
}

/// Get current timestamp in milliseconds
fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChunkStep;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_user_message_sets_awaiting() {
        let mut conversation = Conversation::new();
        let id = conversation.push_user("Hello");

        let msg = conversation.get_message(&id).unwrap();
        assert_eq!(msg.sender, Sender::User);
        assert_eq!(msg.text, "Hello");
        assert!(conversation.awaiting_first_token());
        assert!(!conversation.streaming_content());
    }

    #[test]
    fn test_streaming_response() {
        let mut conversation = Conversation::new();
        conversation.push_user("hi");

        let id = conversation.begin_assistant().unwrap();
        assert!(!conversation.awaiting_first_token());
        assert!(conversation.streaming_content());
        assert_eq!(conversation.get_message(&id).unwrap().text, "");

        conversation.apply(&StreamEvent::chunk(None, "Hello "));
        conversation.apply(&StreamEvent::chunk(None, "world! "));

        let msg = conversation.get_message(&id).unwrap();
        assert!(msg.streaming);
        assert_eq!(msg.text, "Hello world! ");

        conversation.finish();
        assert!(!conversation.is_busy());
        assert!(!conversation.get_message(&id).unwrap().streaming);
        assert_eq!(conversation.streaming_message_id(), None);
    }

    #[test]
    fn test_progress_is_appended_and_recorded() {
        let mut conversation = Conversation::new();
        conversation.push_user("topic");
        let id = conversation.begin_assistant().unwrap();

        let applied = conversation.apply(&StreamEvent::progress(ProgressStage::Init));
        assert_eq!(
            applied,
            Some(Applied::Progress {
                id: id.clone(),
                stage: ProgressStage::Init,
                text: ProgressStage::Init.marker().to_string(),
            })
        );
        conversation.apply(&StreamEvent::chunk(Some(ChunkStep::Final), "Body "));

        let msg = conversation.get_message(&id).unwrap();
        assert_eq!(msg.stages, vec![ProgressStage::Init]);
        assert_eq!(msg.text, format!("{}Body ", ProgressStage::Init.marker()));
    }

    #[test]
    fn test_error_event_adds_error_message() {
        let mut conversation = Conversation::new();
        conversation.push_user("hi");
        let streaming = conversation.begin_assistant().unwrap();
        conversation.apply(&StreamEvent::chunk(None, "partial "));

        let applied = conversation.apply(&StreamEvent::error("Rate limit reached."));
        let Some(Applied::Failed(msg)) = applied else {
            panic!("expected failure, got {applied:?}");
        };

        assert!(msg.is_error);
        assert_eq!(msg.sender, Sender::Assistant);
        assert_eq!(msg.text, "❌ Rate limit reached.");
        assert!(!conversation.is_busy());
        // Partial output stays
        assert_eq!(conversation.get_message(&streaming).unwrap().text, "partial ");
        assert_eq!(conversation.messages().len(), 3);
    }

    #[test]
    fn test_clear_drops_later_events() {
        let mut conversation = Conversation::new();
        conversation.push_user("hi");
        conversation.begin_assistant();
        conversation.apply(&StreamEvent::chunk(None, "one "));

        conversation.clear();
        assert!(conversation.messages().is_empty());
        assert!(conversation.is_busy());

        assert_eq!(conversation.apply(&StreamEvent::chunk(None, "two ")), None);
        assert!(conversation.messages().is_empty());

        conversation.finish();
        assert!(!conversation.is_busy());
    }

    #[test]
    fn test_clear_before_first_token_discards_run() {
        let mut conversation = Conversation::new();
        conversation.push_user("hi");
        conversation.clear();

        assert_eq!(conversation.begin_assistant(), None);
        assert_eq!(conversation.apply(&StreamEvent::chunk(None, "late ")), None);
        assert!(conversation.messages().is_empty());

        // A new run starts clean
        conversation.finish();
        conversation.push_user("again");
        assert!(conversation.begin_assistant().is_some());
    }

    #[test]
    fn test_new_user_message_completes_superseded_stream() {
        let mut conversation = Conversation::new();
        conversation.push_user("one");
        let old = conversation.begin_assistant().unwrap();
        conversation.apply(&StreamEvent::chunk(None, "a "));

        conversation.push_user("two");
        assert!(!conversation.get_message(&old).unwrap().streaming);
        assert_eq!(conversation.streaming_message_id(), None);
        assert!(conversation.awaiting_first_token());
        assert!(!conversation.streaming_content());
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = MessageId::new();
        let b = MessageId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("msg_"));
    }
}
