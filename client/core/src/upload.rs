//! Attachment Uploads
//!
//! Sends documents and finished voice recordings to the backend, reporting
//! progress and outcomes as system bubbles in the active session.
//!
//! # Design Philosophy
//!
//! Uploads are single-attempt: a failure becomes a system bubble and the
//! user re-triggers if they want a retry. The voice pipeline keeps exactly
//! one "Processing voice..." placeholder alive while the transcription is
//! in flight; the placeholder is removed before the outcome appears, never
//! shown alongside it. A successful transcription is forwarded into
//! [`MessageSession::send`] as if the user had typed it.

use std::sync::Arc;

use crate::api::BackendApi;
use crate::capture::{AudioBlob, VOICE_FILENAME};
use crate::session::{MessageSession, SendOutcome};

/// System bubble shown while a transcription is in flight.
pub const VOICE_PLACEHOLDER: &str = "Processing voice...";

/// System bubble shown when the transcription came back without text.
pub const VOICE_NO_TEXT_BUBBLE: &str = "Voice processing failed (No text).";

/// System bubble shown when the transcription request failed outright.
pub const VOICE_FAILED_BUBBLE: &str = "Voice processing failed.";

/// System bubble shown when an ingestion request failed outright.
pub const UPLOAD_FAILED_BUBBLE: &str = "Upload failed.";

/// Result of a document or voice-note ingestion
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// The backend stored the extracted chunks
    Stored {
        /// Number of chunks stored
        inserted: u64,
    },
    /// The request failed; a failure bubble was appended
    Failed,
}

/// Result of the voice pipeline
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoiceOutcome {
    /// The transcript was forwarded into the session as typed input
    Sent(SendOutcome),
    /// The transcription came back empty; nothing was sent
    NoText,
    /// The transcription request failed; nothing was sent
    Failed,
}

/// Uploads attachments and reports into the active session
#[derive(Clone)]
pub struct AttachmentUploader {
    api: Arc<dyn BackendApi>,
    session: Arc<MessageSession>,
}

impl AttachmentUploader {
    /// Create an uploader reporting into `session`
    pub fn new(api: Arc<dyn BackendApi>, session: Arc<MessageSession>) -> Self {
        Self { api, session }
    }

    /// Ingest a document into the knowledge store
    ///
    /// Appends an upload-progress bubble, then either the stored chunk
    /// count or a failure bubble. The session's loading flag is held for
    /// the duration and always released.
    pub async fn upload_document(&self, filename: &str, bytes: Vec<u8>) -> DocumentOutcome {
        self.session
            .push_system(format!("Uploading {filename}..."));
        self.session.begin_loading();

        let outcome = match self.api.ingest_document(filename, bytes).await {
            Ok(inserted) => {
                self.session
                    .push_system(format!("processed. {inserted} chunks stored."));
                DocumentOutcome::Stored { inserted }
            }
            Err(error) => {
                tracing::warn!(%error, filename, "document upload failed");
                self.session.push_system(UPLOAD_FAILED_BUBBLE);
                DocumentOutcome::Failed
            }
        };
        self.session.end_loading();
        outcome
    }

    /// Transcribe a finished recording and send the text
    ///
    /// The placeholder bubble exists exactly between here and resolution.
    /// On success it is removed before the transcript enters the session
    /// through the normal send path; on failure it is replaced by a
    /// failure bubble.
    pub async fn upload_voice(&self, audio: AudioBlob) -> VoiceOutcome {
        let placeholder = self.session.push_system(VOICE_PLACEHOLDER);
        self.session.begin_loading();

        match self.api.transcribe(&audio).await {
            Ok(Some(text)) if !text.trim().is_empty() => {
                self.session.remove_message(&placeholder);
                // Release the flag before forwarding: the send owns it next
                self.session.end_loading();
                VoiceOutcome::Sent(self.session.send(&text).await)
            }
            Ok(_) => {
                self.session.remove_message(&placeholder);
                self.session.push_system(VOICE_NO_TEXT_BUBBLE);
                self.session.end_loading();
                VoiceOutcome::NoText
            }
            Err(error) => {
                tracing::warn!(%error, "voice transcription failed");
                self.session.remove_message(&placeholder);
                self.session.push_system(VOICE_FAILED_BUBBLE);
                self.session.end_loading();
                VoiceOutcome::Failed
            }
        }
    }

    /// Archive a finished recording into the knowledge store
    ///
    /// Treats the take like a document: the backend transcribes and chunks
    /// it server-side and reports how many chunks were stored.
    pub async fn ingest_voice_note(&self, audio: AudioBlob) -> DocumentOutcome {
        self.session
            .push_system(format!("Uploading {VOICE_FILENAME}..."));
        self.session.begin_loading();

        let outcome = match self.api.ingest_voice(&audio).await {
            Ok(inserted) => {
                self.session
                    .push_system(format!("processed. {inserted} chunks stored."));
                DocumentOutcome::Stored { inserted }
            }
            Err(error) => {
                tracing::warn!(%error, "voice-note upload failed");
                self.session.push_system(UPLOAD_FAILED_BUBBLE);
                DocumentOutcome::Failed
            }
        };
        self.session.end_loading();
        outcome
    }
}
