//! Message Session
//!
//! Owns the active conversation: the ordered message list, the loading
//! flag, and the request lifecycle for sending text.
//!
//! # Design Philosophy
//!
//! The session applies optimistic updates: the user's message is appended
//! before the network call is issued, and it is never rolled back, even
//! when the reply fails: what the user typed stays visible, and failures
//! become assistant bubbles instead of losing input.
//!
//! Sends are serialized by the loading flag inside the session itself, not
//! by UI disablement, so the at-most-one-in-flight contract holds under
//! harnesses that drive the session directly. Switching the active
//! conversation bumps a view epoch; a reply that resolves after the epoch
//! moved on is discarded rather than appended to the wrong conversation.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{BackendApi, ChatRequest};

/// Assistant bubble shown when the reply payload carries no answer.
pub const NO_ANSWER_FALLBACK: &str = "No response received.";

/// Assistant bubble shown when the chat request fails outright.
pub const SEND_FAILED_BUBBLE: &str = "Error: Service unreachable.";

/// Opaque client-side message id
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a fresh id
    pub fn new() -> Self {
        Self(format!("msg_{}", Uuid::new_v4().simple()))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

/// Who a message is attributed to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person typing
    User,
    /// The assistant's replies, including failure bubbles
    Assistant,
    /// Client-side status notes (uploads, voice processing)
    System,
}

/// One chat bubble
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,
    /// Message text
    pub text: String,
    /// Client id, used to remove transient placeholders precisely
    pub client_id: MessageId,
}

impl Message {
    fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            client_id: MessageId::new(),
        }
    }
}

/// Result of a [`MessageSession::send`] call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The exchange completed and the reply was appended
    Sent {
        /// Whether this send created the conversation server-side
        started_conversation: bool,
    },
    /// The request failed; a failure bubble was appended
    Failed,
    /// Another send was in flight; nothing was appended
    Busy,
    /// The text was empty; nothing was appended
    Empty,
    /// The user switched conversations mid-flight; the reply was discarded
    Superseded,
}

struct SessionState {
    messages: Vec<Message>,
    conversation_id: Option<String>,
    loading: bool,
    /// Bumped whenever the conversation view is replaced; in-flight
    /// requests compare against it before applying their result
    epoch: u64,
}

/// The active conversation's state machine
pub struct MessageSession {
    api: Arc<dyn BackendApi>,
    state: Mutex<SessionState>,
}

impl MessageSession {
    /// Create an empty session talking to `api`
    pub fn new(api: Arc<dyn BackendApi>) -> Self {
        Self {
            api,
            state: Mutex::new(SessionState {
                messages: Vec::new(),
                conversation_id: None,
                loading: false,
                epoch: 0,
            }),
        }
    }

    /// Snapshot of the current message list, in insertion order
    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().messages.clone()
    }

    /// Server id of the active conversation, once assigned
    pub fn conversation_id(&self) -> Option<String> {
        self.state.lock().conversation_id.clone()
    }

    /// Whether a request is in flight
    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    /// Send `text` as the user's next message
    ///
    /// The user bubble is appended synchronously, before any suspension
    /// point. At most one send is in flight per session; a call while one
    /// is pending returns [`SendOutcome::Busy`] without appending anything.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Empty;
        }

        let (epoch, conversation_id) = {
            let mut state = self.state.lock();
            if state.loading {
                tracing::debug!("send ignored: a request is already in flight");
                return SendOutcome::Busy;
            }
            state.messages.push(Message::new(Role::User, text));
            state.loading = true;
            (state.epoch, state.conversation_id.clone())
        };

        let request = ChatRequest::new(text, conversation_id);
        let result = self.api.send_chat(&request).await;

        let mut state = self.state.lock();
        if state.epoch != epoch {
            // The view this send belonged to is gone; whoever replaced it
            // owns the loading flag now.
            tracing::debug!("discarding chat reply for a superseded conversation view");
            return SendOutcome::Superseded;
        }

        let outcome = match result {
            Ok(reply) => {
                let answer = reply
                    .answer
                    .filter(|answer| !answer.is_empty())
                    .unwrap_or_else(|| NO_ANSWER_FALLBACK.to_string());
                state.messages.push(Message::new(Role::Assistant, answer));

                let started = state.conversation_id.is_none() && reply.conversation_id.is_some();
                if started {
                    state.conversation_id = reply.conversation_id;
                }
                SendOutcome::Sent {
                    started_conversation: started,
                }
            }
            Err(error) => {
                tracing::warn!(%error, "chat request failed");
                state
                    .messages
                    .push(Message::new(Role::Assistant, SEND_FAILED_BUBBLE));
                SendOutcome::Failed
            }
        };
        state.loading = false;
        outcome
    }

    /// Replace the session with the stored transcript of `id`
    ///
    /// The message list is cleared immediately, before the fetch, so stale
    /// bubbles never show under the new conversation. Each stored exchange
    /// expands into a user and an assistant message in arrival order. A
    /// fetch failure leaves the list empty and is logged, not surfaced.
    pub async fn load_conversation(&self, id: &str) {
        let epoch = {
            let mut state = self.state.lock();
            state.messages.clear();
            state.conversation_id = Some(id.to_string());
            state.epoch += 1;
            state.loading = true;
            state.epoch
        };

        let result = self.api.fetch_transcript(id).await;

        let mut state = self.state.lock();
        if state.epoch != epoch {
            return;
        }
        match result {
            Ok(pairs) => {
                for pair in pairs {
                    state.messages.push(Message::new(Role::User, pair.query));
                    state
                        .messages
                        .push(Message::new(Role::Assistant, pair.response));
                }
            }
            Err(error) => {
                tracing::warn!(%error, conversation = id, "failed to load conversation transcript");
            }
        }
        state.loading = false;
    }

    /// Drop the active conversation and start fresh
    ///
    /// Synchronous; no network call. Any in-flight request becomes stale.
    pub fn start_new_chat(&self) {
        let mut state = self.state.lock();
        state.messages.clear();
        state.conversation_id = None;
        state.epoch += 1;
        state.loading = false;
    }

    /// Append a system bubble, returning its id for later removal
    pub(crate) fn push_system(&self, text: impl Into<String>) -> MessageId {
        let message = Message::new(Role::System, text);
        let id = message.client_id.clone();
        self.state.lock().messages.push(message);
        id
    }

    /// Remove the message with `id`, if still present
    pub(crate) fn remove_message(&self, id: &MessageId) -> bool {
        let mut state = self.state.lock();
        let before = state.messages.len();
        state.messages.retain(|message| &message.client_id != id);
        state.messages.len() != before
    }

    /// Raise the loading flag for an upload in progress
    pub(crate) fn begin_loading(&self) {
        self.state.lock().loading = true;
    }

    /// Release the loading flag after an upload resolved
    pub(crate) fn end_loading(&self) {
        self.state.lock().loading = false;
    }
}
