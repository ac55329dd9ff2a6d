//! Chat Client
//!
//! The orchestration facade that wires the session, the conversation
//! store, the capture state machine and the uploader together, and owns
//! the invariants that span them:
//!
//! - deleting or resetting the active conversation clears the session;
//! - a send that creates a conversation schedules a delayed list refresh,
//!   giving the backend time to persist before the list is read back;
//! - a finished recording flows through transcription into the normal
//!   send path.
//!
//! The facade is UI-agnostic: shells render [`MessageSession`] and
//! [`ConversationStore`] snapshots and forward user intents here.

use std::sync::Arc;
use std::time::Duration;

use crate::api::{ApiError, BackendApi, HttpBackend};
use crate::capture::{CaptureDevice, CaptureError, CaptureStatus, MediaCapture};
use crate::config::Config;
use crate::session::{MessageSession, SendOutcome};
use crate::store::ConversationStore;
use crate::upload::{AttachmentUploader, DocumentOutcome, VoiceOutcome};

/// Delay before re-reading the conversation list after a first send.
///
/// The list is eventually consistent; reading it back immediately tends to
/// miss the conversation the send just created.
pub const HISTORY_REFRESH_DELAY: Duration = Duration::from_millis(1000);

/// Headless chat client
pub struct ChatClient {
    api: Arc<dyn BackendApi>,
    session: Arc<MessageSession>,
    store: Arc<ConversationStore>,
    capture: MediaCapture,
    uploader: AttachmentUploader,
}

impl ChatClient {
    /// Wire a client over `api` with the given capture device
    pub fn new(api: Arc<dyn BackendApi>, device: Box<dyn CaptureDevice>) -> Self {
        let session = Arc::new(MessageSession::new(Arc::clone(&api)));
        let store = Arc::new(ConversationStore::new(Arc::clone(&api)));
        let uploader = AttachmentUploader::new(Arc::clone(&api), Arc::clone(&session));
        Self {
            api,
            session,
            store,
            capture: MediaCapture::new(device),
            uploader,
        }
    }

    /// Build a client for the configured HTTP backend
    ///
    /// Uses the microphone when the `microphone` feature is enabled,
    /// otherwise a [`crate::capture::NullDevice`] that reports capture as
    /// unavailable.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let api: Arc<dyn BackendApi> = Arc::new(HttpBackend::from_config(&config.backend));

        #[cfg(feature = "microphone")]
        let device: Box<dyn CaptureDevice> =
            Box::new(crate::capture::microphone::MicrophoneDevice::new());
        #[cfg(not(feature = "microphone"))]
        let device: Box<dyn CaptureDevice> = Box::new(crate::capture::NullDevice);

        Self::new(api, device)
    }

    /// The active conversation
    pub fn session(&self) -> &Arc<MessageSession> {
        &self.session
    }

    /// The conversation and folder mirror
    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Current recording status
    pub fn recording_status(&self) -> CaptureStatus {
        self.capture.status()
    }

    /// Whether a recording session is buffering
    pub fn is_recording(&self) -> bool {
        self.capture.is_recording()
    }

    /// Populate both mirrors; failures are logged, not surfaced
    pub async fn refresh_all(&self) {
        if let Err(error) = self.store.refresh_conversations().await {
            tracing::warn!(%error, "failed to fetch conversation history");
        }
        if let Err(error) = self.store.refresh_folders().await {
            tracing::warn!(%error, "failed to fetch folders");
        }
    }

    /// Send `text` as the user's next message
    pub async fn send(&self, text: &str) -> SendOutcome {
        let outcome = self.session.send(text).await;
        if matches!(
            outcome,
            SendOutcome::Sent {
                started_conversation: true
            }
        ) {
            self.schedule_history_refresh();
        }
        outcome
    }

    /// Switch the session to the stored conversation `id`
    pub async fn load_conversation(&self, id: &str) {
        self.session.load_conversation(id).await;
    }

    /// Drop the active conversation and start fresh
    pub fn start_new_chat(&self) {
        self.session.start_new_chat();
    }

    /// Create a folder named `name`
    pub async fn create_folder(&self, name: &str) -> Result<(), ApiError> {
        self.store.create_folder(name).await
    }

    /// Delete the folder `id`; destructive, shell confirms first
    pub async fn delete_folder(&self, id: &str) -> Result<(), ApiError> {
        self.store.delete_folder(id).await
    }

    /// Delete the conversation `id`; destructive, shell confirms first
    ///
    /// Deleting the conversation the session is showing also clears the
    /// session, so no active id ever points at a deleted conversation.
    pub async fn delete_conversation(&self, id: &str) -> Result<(), ApiError> {
        self.store.delete_conversation(id).await?;
        if self.session.conversation_id().as_deref() == Some(id) {
            self.session.start_new_chat();
        }
        Ok(())
    }

    /// Clear all server-side history; destructive, shell confirms first
    pub async fn reset_history(&self) -> Result<(), ApiError> {
        self.api.reset_history().await?;
        self.session.start_new_chat();
        self.store.clear_conversations();
        Ok(())
    }

    /// Start a recording session
    ///
    /// A denial leaves everything unchanged; the shell surfaces
    /// [`crate::capture::MIC_DENIED_ALERT`] as a blocking alert.
    pub async fn start_recording(&self) -> Result<(), CaptureError> {
        self.capture.start().await
    }

    /// Stop recording and run the voice pipeline
    ///
    /// Returns `Ok(None)` when no recording was active. The finished take
    /// is transcribed and the text forwarded into the send path.
    pub async fn stop_recording_and_send(&self) -> Result<Option<VoiceOutcome>, CaptureError> {
        let Some(blob) = self.capture.stop().await? else {
            return Ok(None);
        };
        self.capture.mark_uploading();
        let outcome = self.uploader.upload_voice(blob).await;
        self.capture.mark_idle();

        if let VoiceOutcome::Sent(SendOutcome::Sent {
            started_conversation: true,
        }) = outcome
        {
            self.schedule_history_refresh();
        }
        Ok(Some(outcome))
    }

    /// Stop recording and archive the take as a voice note
    pub async fn stop_recording_and_archive(
        &self,
    ) -> Result<Option<DocumentOutcome>, CaptureError> {
        let Some(blob) = self.capture.stop().await? else {
            return Ok(None);
        };
        self.capture.mark_uploading();
        let outcome = self.uploader.ingest_voice_note(blob).await;
        self.capture.mark_idle();
        Ok(Some(outcome))
    }

    /// Ingest a document into the knowledge store
    pub async fn upload_document(&self, filename: &str, bytes: Vec<u8>) -> DocumentOutcome {
        self.uploader.upload_document(filename, bytes).await
    }

    /// Re-read the conversation list once the backend had time to persist
    fn schedule_history_refresh(&self) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            tokio::time::sleep(HISTORY_REFRESH_DELAY).await;
            if let Err(error) = store.refresh_conversations().await {
                tracing::warn!(%error, "failed to refresh conversation list");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use pretty_assertions::assert_eq;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::api::testing::ScriptedApi;
    use crate::api::{HistoryItem, TranscriptPair};
    use crate::capture::NullDevice;
    use crate::session::Role;

    fn client_over(api: Arc<ScriptedApi>) -> ChatClient {
        ChatClient::new(api, Box::new(NullDevice))
    }

    fn history_item(id: &str, query: &str) -> HistoryItem {
        HistoryItem {
            id: id.to_string(),
            query: Some(query.to_string()),
            ..HistoryItem::default()
        }
    }

    fn pair(query: &str, response: &str) -> TranscriptPair {
        TranscriptPair {
            query: query.to_string(),
            response: response.to_string(),
        }
    }

    #[tokio::test]
    async fn test_deleting_active_conversation_clears_session() {
        let api = Arc::new(ScriptedApi::new());
        *api.history.lock() = vec![history_item("c1", "hello")];
        api.transcripts
            .lock()
            .insert("c1".to_string(), vec![pair("hello", "hi")]);
        let client = client_over(Arc::clone(&api));

        client.load_conversation("c1").await;
        assert_eq!(client.session().messages().len(), 2);

        client.delete_conversation("c1").await.unwrap();
        assert!(client.session().conversation_id().is_none());
        assert!(client.session().messages().is_empty());
        assert!(client.store().conversations().is_empty());
    }

    #[tokio::test]
    async fn test_deleting_other_conversation_keeps_session() {
        let api = Arc::new(ScriptedApi::new());
        *api.history.lock() = vec![history_item("c1", "one"), history_item("c2", "two")];
        api.transcripts
            .lock()
            .insert("c1".to_string(), vec![pair("one", "1")]);
        let client = client_over(Arc::clone(&api));

        client.load_conversation("c1").await;
        client.delete_conversation("c2").await.unwrap();

        assert_eq!(client.session().conversation_id().as_deref(), Some("c1"));
        assert_eq!(client.session().messages().len(), 2);
        assert_eq!(client.store().conversations().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_delete_changes_nothing() {
        let api = Arc::new(ScriptedApi::new());
        *api.history.lock() = vec![history_item("c1", "hello")];
        api.transcripts
            .lock()
            .insert("c1".to_string(), vec![pair("hello", "hi")]);
        let client = client_over(Arc::clone(&api));
        client.refresh_all().await;
        client.load_conversation("c1").await;

        api.fail_delete.store(true, Ordering::SeqCst);
        assert!(client.delete_conversation("c1").await.is_err());
        assert_eq!(client.session().conversation_id().as_deref(), Some("c1"));
        assert_eq!(client.store().conversations().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_clears_session_and_mirror() {
        let api = Arc::new(ScriptedApi::answering("hi"));
        *api.assign_conversation.lock() = Some("c1".to_string());
        *api.history.lock() = vec![history_item("c1", "hello")];
        let client = client_over(Arc::clone(&api));
        client.refresh_all().await;
        client.send("hello").await;

        client.reset_history().await.unwrap();
        assert!(client.session().messages().is_empty());
        assert!(client.session().conversation_id().is_none());
        assert!(client.store().conversations().is_empty());
        assert_eq!(api.resets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_reply_is_not_appended_to_switched_conversation() {
        let api = Arc::new(ScriptedApi::answering("late answer"));
        api.transcripts
            .lock()
            .insert("a".to_string(), vec![pair("qa", "ra")]);
        api.transcripts
            .lock()
            .insert("b".to_string(), vec![pair("qb", "rb")]);
        let client = Arc::new(client_over(Arc::clone(&api)));

        client.load_conversation("a").await;

        // Hold conversation A's send in flight
        let gate = Arc::new(Semaphore::new(0));
        *api.chat_gate.lock() = Some(Arc::clone(&gate));
        let in_flight = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.send("follow-up").await }
        });
        tokio::task::yield_now().await;
        assert!(client.session().is_loading());

        // Switch to conversation B while A's reply is pending
        client.load_conversation("b").await;

        // Let A's reply arrive late; it must be discarded
        gate.add_permits(1);
        let outcome = in_flight.await.unwrap();
        assert_eq!(outcome, SendOutcome::Superseded);

        let texts: Vec<_> = client
            .session()
            .messages()
            .into_iter()
            .map(|message| (message.role, message.text))
            .collect();
        assert_eq!(
            texts,
            vec![
                (Role::User, "qb".to_string()),
                (Role::Assistant, "rb".to_string()),
            ]
        );
        assert!(!client.session().is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_send_schedules_delayed_history_refresh() {
        let api = Arc::new(ScriptedApi::answering("hi"));
        *api.assign_conversation.lock() = Some("c1".to_string());
        *api.history.lock() = vec![history_item("c1", "hello")];
        let client = client_over(Arc::clone(&api));

        let outcome = client.send("hello").await;
        assert_eq!(
            outcome,
            SendOutcome::Sent {
                started_conversation: true
            }
        );
        // The mirror lags until the delayed refresh fires
        assert!(client.store().conversations().is_empty());

        tokio::time::sleep(HISTORY_REFRESH_DELAY + Duration::from_millis(100)).await;
        assert_eq!(client.store().conversations().len(), 1);
    }

    #[tokio::test]
    async fn test_recording_denial_leaves_state_unchanged() {
        let api = Arc::new(ScriptedApi::new());
        let client = client_over(api);

        let result = client.start_recording().await;
        assert!(matches!(result, Err(CaptureError::PermissionDenied)));
        assert_eq!(client.recording_status(), CaptureStatus::Idle);
        assert!(client.session().messages().is_empty());
    }

    #[tokio::test]
    async fn test_stop_without_recording_is_a_noop() {
        let api = Arc::new(ScriptedApi::new());
        let client = client_over(api);
        let outcome = client.stop_recording_and_send().await.unwrap();
        assert!(outcome.is_none());
    }
}
