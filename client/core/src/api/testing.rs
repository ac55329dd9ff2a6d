//! Scripted backend double for unit tests
//!
//! Behaves like a small in-memory backend: deletions mutate the scripted
//! history so a follow-up refresh observes them, folder creation assigns
//! ids, and every mutating call is recorded for assertions. Individual
//! endpoints can be failed or gated to exercise error and race paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use super::{ApiError, BackendApi, ChatReply, ChatRequest, FolderEntry, HistoryItem, TranscriptPair};
use crate::capture::AudioBlob;

/// In-memory scripted backend
#[derive(Default)]
pub(crate) struct ScriptedApi {
    /// Fail `send_chat` with a 503
    pub fail_chat: AtomicBool,
    /// Answer returned from `send_chat`; `None` omits the field
    pub answer: Mutex<Option<String>>,
    /// Conversation id returned from `send_chat`
    pub assign_conversation: Mutex<Option<String>>,
    /// When set, `send_chat` waits for a permit before replying
    pub chat_gate: Mutex<Option<Arc<Semaphore>>>,

    /// Scripted conversation list
    pub history: Mutex<Vec<HistoryItem>>,
    /// Fail `fetch_history`
    pub fail_history: AtomicBool,
    /// Scripted transcripts by conversation id
    pub transcripts: Mutex<HashMap<String, Vec<TranscriptPair>>>,
    /// Fail `fetch_transcript`
    pub fail_transcript: AtomicBool,
    /// Fail `delete_conversation`
    pub fail_delete: AtomicBool,

    /// Text returned from `transcribe`; `None` omits the field
    pub transcribed_text: Mutex<Option<String>>,
    /// Fail `transcribe`
    pub fail_transcribe: AtomicBool,
    /// When set, `transcribe` waits for a permit before replying
    pub transcribe_gate: Mutex<Option<Arc<Semaphore>>>,
    /// Chunk count returned from ingestion endpoints
    pub inserted: AtomicU64,
    /// Fail both ingestion endpoints
    pub fail_ingest: AtomicBool,

    /// Scripted folder list
    pub folders: Mutex<Vec<FolderEntry>>,
    /// Fail folder mutations
    pub fail_folder_ops: AtomicBool,

    /// Every chat request seen, in order
    pub chat_requests: Mutex<Vec<ChatRequest>>,
    /// Conversation ids deleted
    pub deleted_conversations: Mutex<Vec<String>>,
    /// Document filenames ingested
    pub ingested_documents: Mutex<Vec<String>>,
    /// Voice blob sizes ingested
    pub ingested_voice_bytes: Mutex<Vec<usize>>,
    /// Number of reset calls
    pub resets: AtomicUsize,
}

impl ScriptedApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Scripted answer for every chat request
    pub(crate) fn answering(answer: &str) -> Self {
        let api = Self::default();
        *api.answer.lock() = Some(answer.to_string());
        api
    }

    fn unavailable() -> ApiError {
        ApiError::Status {
            status: 503,
            body: "service unavailable".to_string(),
        }
    }
}

#[async_trait]
impl BackendApi for ScriptedApi {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        self.chat_requests.lock().push(request.clone());
        let gate = self.chat_gate.lock().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if self.fail_chat.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(ChatReply {
            answer: self.answer.lock().clone(),
            conversation_id: self.assign_conversation.lock().clone(),
        })
    }

    async fn fetch_history(&self) -> Result<Vec<HistoryItem>, ApiError> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.history.lock().clone())
    }

    async fn fetch_transcript(&self, id: &str) -> Result<Vec<TranscriptPair>, ApiError> {
        if self.fail_transcript.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.transcripts.lock().get(id).cloned().unwrap_or_default())
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), ApiError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.deleted_conversations.lock().push(id.to_string());
        self.history.lock().retain(|item| item.id != id);
        Ok(())
    }

    async fn reset_history(&self) -> Result<(), ApiError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.history.lock().clear();
        Ok(())
    }

    async fn transcribe(&self, _audio: &AudioBlob) -> Result<Option<String>, ApiError> {
        let gate = self.transcribe_gate.lock().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if self.fail_transcribe.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.transcribed_text.lock().clone())
    }

    async fn ingest_document(&self, filename: &str, _bytes: Vec<u8>) -> Result<u64, ApiError> {
        if self.fail_ingest.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.ingested_documents.lock().push(filename.to_string());
        Ok(self.inserted.load(Ordering::SeqCst))
    }

    async fn ingest_voice(&self, audio: &AudioBlob) -> Result<u64, ApiError> {
        if self.fail_ingest.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.ingested_voice_bytes.lock().push(audio.data.len());
        Ok(self.inserted.load(Ordering::SeqCst))
    }

    async fn fetch_folders(&self) -> Result<Vec<FolderEntry>, ApiError> {
        Ok(self.folders.lock().clone())
    }

    async fn create_folder(&self, name: &str) -> Result<(), ApiError> {
        if self.fail_folder_ops.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let mut folders = self.folders.lock();
        let id = format!("folder_{}", folders.len() + 1);
        folders.push(FolderEntry {
            id,
            name: name.to_string(),
        });
        Ok(())
    }

    async fn delete_folder(&self, id: &str) -> Result<(), ApiError> {
        if self.fail_folder_ops.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.folders.lock().retain(|folder| folder.id != id);
        Ok(())
    }
}
