//! Backend API Contract
//!
//! Trait definition and wire types for the assistant backend. This
//! abstraction lets the core talk to the real HTTP backend or to an
//! in-memory test double without changing session or store logic.
//!
//! # Design Philosophy
//!
//! The backend contract is fixed (see [`http::HttpBackend`] for the
//! endpoint map). The [`BackendApi`] trait mirrors that contract with one
//! method per endpoint, returning decoded payload fields rather than raw
//! responses, so the rest of the core never touches HTTP.

pub mod http;
#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::AudioBlob;

pub use http::HttpBackend;

/// Number of retrieval contexts requested with every chat query.
pub const TOP_K: u32 = 4;

/// Errors from backend calls
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure: connect, timeout, or body decode
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body text, if any
        body: String,
    },
}

/// Body of `POST /api/chat`
#[derive(Clone, Debug, Serialize)]
pub struct ChatRequest {
    /// The user's query text
    pub query: String,
    /// Retrieval depth, always [`TOP_K`]
    pub top_k: u32,
    /// Conversation to continue; omitted for a fresh conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl ChatRequest {
    /// Build a chat request for `query`, continuing `conversation_id` if set
    pub fn new(query: impl Into<String>, conversation_id: Option<String>) -> Self {
        Self {
            query: query.into(),
            top_k: TOP_K,
            conversation_id,
        }
    }
}

/// Decoded reply of `POST /api/chat`
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatReply {
    /// The assistant's answer; absent when the backend had nothing to say
    pub answer: Option<String>,
    /// Conversation id assigned by the backend on the first send
    pub conversation_id: Option<String>,
}

/// One entry of `GET /api/chat/history`
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct HistoryItem {
    /// Server-side conversation id
    pub id: String,
    /// Conversation title, when the backend stores one
    pub title: Option<String>,
    /// First query of the conversation; display fallback for `title`
    pub query: Option<String>,
    /// Folder the conversation is filed under, if any
    pub folder_id: Option<String>,
}

/// One stored exchange of `GET /api/chat/history/{id}`
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TranscriptPair {
    /// What the user asked
    pub query: String,
    /// What the assistant answered
    pub response: String,
}

/// One entry of `GET /api/chat/folders`
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct FolderEntry {
    /// Server-side folder id
    pub id: String,
    /// Folder display name
    pub name: String,
}

/// Assistant backend interface
///
/// Implement this trait to point the core at a different backend, or at a
/// scripted double in tests. All methods suspend at the request boundary
/// and never block the caller.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// `POST /api/chat` - send a query, get an answer
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, ApiError>;

    /// `GET /api/chat/history` - list stored conversations
    async fn fetch_history(&self) -> Result<Vec<HistoryItem>, ApiError>;

    /// `GET /api/chat/history/{id}` - full transcript of one conversation
    async fn fetch_transcript(&self, id: &str) -> Result<Vec<TranscriptPair>, ApiError>;

    /// `DELETE /api/chat/history/{id}` - delete one conversation
    async fn delete_conversation(&self, id: &str) -> Result<(), ApiError>;

    /// `POST /api/chat/reset` - clear all chat history
    async fn reset_history(&self) -> Result<(), ApiError>;

    /// `POST /api/chat/transcribe` - speech to text for a finished recording
    async fn transcribe(&self, audio: &AudioBlob) -> Result<Option<String>, ApiError>;

    /// `POST /api/upload/document` - ingest a document, returns stored chunk count
    async fn ingest_document(&self, filename: &str, bytes: Vec<u8>) -> Result<u64, ApiError>;

    /// `POST /api/upload/voice` - ingest a voice note, returns stored chunk count
    async fn ingest_voice(&self, audio: &AudioBlob) -> Result<u64, ApiError>;

    /// `GET /api/chat/folders` - list folders
    async fn fetch_folders(&self) -> Result<Vec<FolderEntry>, ApiError>;

    /// `POST /api/chat/folders` - create a folder
    async fn create_folder(&self, name: &str) -> Result<(), ApiError>;

    /// `DELETE /api/chat/folders/{id}` - delete a folder
    async fn delete_folder(&self, id: &str) -> Result<(), ApiError>;
}
