//! Session Controller
//!
//! Owns one conversation and at most one active generation run. The run's
//! read loop is the only writer of streamed text; observers learn about
//! changes through [`SessionUpdate`]s and may take a snapshot at any time.
//!
//! # Run Lifecycle
//!
//! ```text
//!   send() ─► user message, awaiting_first_token
//!      │
//!      ▼
//!   transport.open ──refused/unreachable──► error message ─► TransportFailed
//!      │
//!      ▼ first non-empty chunk
//!   assistant message, streaming_content
//!      │
//!      ├─ chunk/progress frames ─► appended
//!      ├─ error frame ─────────► error message ─► Failed
//!      ├─ read error ──────────► error message ─► TransportFailed
//!      ├─ stop() ──────────────► notice ────────► Cancelled
//!      └─ clean close ─────────────────────────► Completed
//! ```
//!
//! Every exit resets both flags; the flags going false is the signal that
//! the read loop has finished.

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use quill_core::{
    Applied, ContentMode, Conversation, ConversationMessage, FrameDecoder, GenerationRequest,
    MessageId, ProgressStage, StreamEvent, ERROR_MARKER,
};

use crate::error::ClientError;
use crate::transport::GenerationTransport;

/// Notice shown after a cancelled run
pub const STOPPED_NOTICE: &str = "Generation stopped";

/// Notice shown after a failed run
pub const FAILED_NOTICE: &str = "Failed to generate content";

/// Notice severity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational
    Info,
    /// Error
    Error,
}

/// Change notifications for observers
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionUpdate {
    /// A message was appended to the conversation
    MessageAdded(ConversationMessage),
    /// Text was appended to an existing message
    MessageAppended {
        /// Message that grew
        id: MessageId,
        /// The appended fragment
        text: String,
    },
    /// A pipeline progress point was reached
    Progress {
        /// Message the marker was appended to
        id: MessageId,
        /// Progress point
        stage: ProgressStage,
    },
    /// In-flight flags changed
    StateChanged {
        /// Request sent, nothing received yet
        awaiting_first_token: bool,
        /// An assistant message is growing
        streaming_content: bool,
    },
    /// Transient user-facing notice
    Notice {
        /// Severity
        level: NoticeLevel,
        /// Notice text
        message: String,
    },
    /// All messages were discarded
    Cleared,
}

/// How a run ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The stream closed cleanly
    Completed,
    /// The service reported a pipeline failure
    Failed(String),
    /// The run was stopped or superseded
    Cancelled,
    /// The stream could not be opened or broke mid-way
    TransportFailed(ClientError),
}

/// State shared between the controller and its read loop
struct Shared {
    conversation: Conversation,
    /// Generation counter; a read loop only writes while its run is current
    run: u64,
    cancel: CancellationToken,
}

/// Drives generation runs against a transport
pub struct SessionController<T: GenerationTransport> {
    transport: Arc<T>,
    shared: Arc<Mutex<Shared>>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
}

impl<T: GenerationTransport> SessionController<T> {
    /// Create a controller and the receiver its updates arrive on
    pub fn new(transport: T) -> (Self, mpsc::UnboundedReceiver<SessionUpdate>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let controller = Self {
            transport: Arc::new(transport),
            shared: Arc::new(Mutex::new(Shared {
                conversation: Conversation::new(),
                run: 0,
                cancel: CancellationToken::new(),
            })),
            updates,
        };
        (controller, rx)
    }

    /// Start a run for `prompt`
    ///
    /// The user message is appended before this returns. Any run still in
    /// flight is cancelled first. The returned handle resolves once the read
    /// loop has exited.
    pub fn send(
        &self,
        prompt: impl Into<String>,
        mode: ContentMode,
        context: Option<String>,
    ) -> JoinHandle<SessionOutcome> {
        let prompt = prompt.into();
        let mut request = GenerationRequest::new(prompt.clone(), mode);
        if let Some(context) = context {
            request = request.with_context(context);
        }

        let (run, token, user_message) = {
            let mut shared = self.shared.lock();
            shared.cancel.cancel();
            shared.cancel = CancellationToken::new();
            shared.run += 1;
            let id = shared.conversation.push_user(prompt);
            let message = shared.conversation.get_message(&id).cloned();
            (shared.run, shared.cancel.clone(), message)
        };

        if let Some(message) = user_message {
            let _ = self.updates.send(SessionUpdate::MessageAdded(message));
        }
        let _ = self.updates.send(SessionUpdate::StateChanged {
            awaiting_first_token: true,
            streaming_content: false,
        });

        info!(run, mode = %mode, "Sending generation request");
        let read_loop = ReadLoop {
            transport: Arc::clone(&self.transport),
            shared: Arc::clone(&self.shared),
            updates: self.updates.clone(),
            run,
            token,
        };
        tokio::spawn(read_loop.drive(request))
    }

    /// Cancel the active run, if any
    ///
    /// Returns immediately; the read loop resets the flags once it observes
    /// the cancellation. Calling this while idle does nothing.
    pub fn stop(&self) {
        let shared = self.shared.lock();
        if shared.conversation.is_busy() {
            debug!(run = shared.run, "Stopping generation");
        }
        shared.cancel.cancel();
    }

    /// Discard every message without stopping the active run
    ///
    /// Output the active run produces afterwards is dropped.
    pub fn clear(&self) {
        self.shared.lock().conversation.clear();
        let _ = self.updates.send(SessionUpdate::Cleared);
    }

    /// The transport runs are opened on
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Copy of the current message list
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConversationMessage> {
        self.shared.lock().conversation.snapshot()
    }

    /// Request sent, nothing received yet
    #[must_use]
    pub fn awaiting_first_token(&self) -> bool {
        self.shared.lock().conversation.awaiting_first_token()
    }

    /// An assistant message is growing
    #[must_use]
    pub fn streaming_content(&self) -> bool {
        self.shared.lock().conversation.streaming_content()
    }

    /// Whether a run is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.shared.lock().conversation.is_busy()
    }
}

impl<T: GenerationTransport> Drop for SessionController<T> {
    fn drop(&mut self) {
        self.shared.lock().cancel.cancel();
    }
}

/// One run's reader
struct ReadLoop<T: GenerationTransport> {
    transport: Arc<T>,
    shared: Arc<Mutex<Shared>>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    run: u64,
    token: CancellationToken,
}

impl<T: GenerationTransport> ReadLoop<T> {
    async fn drive(self, request: GenerationRequest) -> SessionOutcome {
        let opened = tokio::select! {
            biased;
            () = self.token.cancelled() => return self.cancelled(),
            opened = self.transport.open(&request) => opened,
        };
        let mut body = match opened {
            Ok(body) => body,
            Err(e) => return self.transport_failed(e),
        };

        let mut decoder = FrameDecoder::new();
        let mut started = false;

        loop {
            let next = tokio::select! {
                biased;
                () = self.token.cancelled() => return self.cancelled(),
                next = body.next() => next,
            };

            let bytes = match next {
                None => break,
                Some(Err(e)) => return self.transport_failed(e),
                Some(Ok(bytes)) if bytes.is_empty() => continue,
                Some(Ok(bytes)) => bytes,
            };

            if !started {
                started = true;
                self.begin_assistant();
            }

            decoder.push(&bytes);
            while let Some(event) = decoder.next_event() {
                if self.token.is_cancelled() {
                    return self.cancelled();
                }
                if let Some(outcome) = self.apply(&event) {
                    return outcome;
                }
            }
        }

        if let Some(event) = decoder.finish() {
            if let Some(outcome) = self.apply(&event) {
                return outcome;
            }
        }
        if decoder.skipped() > 0 {
            debug!(skipped = decoder.skipped(), "Skipped malformed frames");
        }

        self.finish();
        info!(run = self.run, "Generation complete");
        SessionOutcome::Completed
    }

    /// Run `f` against the conversation if this run is still current
    fn with_conversation<R>(&self, f: impl FnOnce(&mut Conversation) -> R) -> Option<R> {
        let mut shared = self.shared.lock();
        (shared.run == self.run).then(|| f(&mut shared.conversation))
    }

    fn notify(&self, update: SessionUpdate) {
        // Observers may have gone away; the run still completes
        let _ = self.updates.send(update);
    }

    fn notify_state(&self, awaiting_first_token: bool, streaming_content: bool) {
        self.notify(SessionUpdate::StateChanged {
            awaiting_first_token,
            streaming_content,
        });
    }

    fn begin_assistant(&self) {
        let Some(started) = self.with_conversation(|c| {
            c.begin_assistant()
                .and_then(|id| c.get_message(&id).cloned())
        }) else {
            return;
        };
        if let Some(message) = started {
            self.notify(SessionUpdate::MessageAdded(message));
        }
        self.notify_state(false, true);
    }

    /// Apply one event; returns the outcome if it ends the run
    fn apply(&self, event: &StreamEvent) -> Option<SessionOutcome> {
        let Some(applied) = self.with_conversation(|c| c.apply(event)) else {
            return Some(SessionOutcome::Cancelled);
        };

        match applied {
            Some(Applied::Appended { id, text }) => {
                self.notify(SessionUpdate::MessageAppended { id, text });
                None
            }
            Some(Applied::Progress { id, stage, text }) => {
                self.notify(SessionUpdate::MessageAppended {
                    id: id.clone(),
                    text,
                });
                self.notify(SessionUpdate::Progress { id, stage });
                None
            }
            Some(Applied::Failed(message)) => {
                warn!(run = self.run, message = %message.text, "Generation failed");
                let text = message.text.clone();
                self.notify(SessionUpdate::MessageAdded(message));
                self.notify_state(false, false);
                self.notify(SessionUpdate::Notice {
                    level: NoticeLevel::Error,
                    message: FAILED_NOTICE.to_string(),
                });
                Some(SessionOutcome::Failed(text))
            }
            None => {
                debug!(run = self.run, "Dropped event for cleared conversation");
                None
            }
        }
    }

    fn finish(&self) {
        if self.with_conversation(Conversation::finish).is_some() {
            self.notify_state(false, false);
        }
    }

    fn cancelled(&self) -> SessionOutcome {
        if self.with_conversation(Conversation::finish).is_some() {
            info!(run = self.run, "Generation stopped");
            self.notify_state(false, false);
            self.notify(SessionUpdate::Notice {
                level: NoticeLevel::Info,
                message: STOPPED_NOTICE.to_string(),
            });
        }
        SessionOutcome::Cancelled
    }

    fn transport_failed(&self, error: ClientError) -> SessionOutcome {
        warn!(run = self.run, error = %error, "Generation stream failed");
        let message = self.with_conversation(|c| {
            let id = c.push_error(format!("{ERROR_MARKER}{error}"));
            c.get_message(&id).cloned()
        });
        let Some(message) = message else {
            return SessionOutcome::Cancelled;
        };

        if let Some(message) = message {
            self.notify(SessionUpdate::MessageAdded(message));
        }
        self.notify_state(false, false);
        self.notify(SessionUpdate::Notice {
            level: NoticeLevel::Error,
            message: FAILED_NOTICE.to_string(),
        });
        SessionOutcome::TransportFailed(error)
    }
}
