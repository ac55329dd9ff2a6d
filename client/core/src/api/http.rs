//! HTTP Backend Implementation
//!
//! [`HttpBackend`] implements [`BackendApi`] against the assistant
//! backend's REST API:
//!
//! - `GET  /api/chat/history` - conversation list
//! - `GET  /api/chat/history/{id}` - one transcript
//! - `DELETE /api/chat/history/{id}` - delete a conversation
//! - `POST /api/chat` - send a query
//! - `POST /api/chat/reset` - clear all history
//! - `POST /api/chat/transcribe` - speech to text
//! - `POST /api/upload/document` - document ingestion
//! - `POST /api/upload/voice` - voice-note ingestion
//! - `GET/POST /api/chat/folders`, `DELETE /api/chat/folders/{id}`
//!
//! Every request is bounded by the configured timeout; a timed-out request
//! fails like any other transport error instead of hanging the session.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ApiError, BackendApi, ChatReply, ChatRequest, FolderEntry, HistoryItem, TranscriptPair};
use crate::capture::{AudioBlob, VOICE_FILENAME};
use crate::config::BackendConfig;

/// HTTP client for the assistant backend
#[derive(Clone)]
pub struct HttpBackend {
    /// Base URL, without a trailing slash
    base_url: String,
    /// HTTP client
    http_client: reqwest::Client,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HistoryEnvelope {
    history: Vec<HistoryItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TranscriptEnvelope {
    messages: Vec<TranscriptPair>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TranscribeEnvelope {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IngestEnvelope {
    inserted: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FoldersEnvelope {
    folders: Vec<FolderEntry>,
}

impl HttpBackend {
    /// Create a backend client for `base_url`
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Create a backend client from configuration
    #[must_use]
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.base_url.clone(), config.request_timeout)
    }

    /// Build a full endpoint URL
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-success response to [`ApiError::Status`]
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Build the multipart form carrying an audio blob
    fn voice_form(audio: &AudioBlob) -> Result<reqwest::multipart::Form, ApiError> {
        let part = reqwest::multipart::Part::bytes(audio.data.clone())
            .file_name(VOICE_FILENAME)
            .mime_str(audio.mime)?;
        Ok(reqwest::multipart::Form::new().part("file", part))
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        let response = self
            .http_client
            .post(self.url("/api/chat"))
            .json(request)
            .send()
            .await?;
        let reply = Self::check(response).await?.json::<ChatReply>().await?;
        Ok(reply)
    }

    async fn fetch_history(&self) -> Result<Vec<HistoryItem>, ApiError> {
        let response = self
            .http_client
            .get(self.url("/api/chat/history"))
            .send()
            .await?;
        let envelope = Self::check(response).await?.json::<HistoryEnvelope>().await?;
        Ok(envelope.history)
    }

    async fn fetch_transcript(&self, id: &str) -> Result<Vec<TranscriptPair>, ApiError> {
        let response = self
            .http_client
            .get(self.url(&format!("/api/chat/history/{id}")))
            .send()
            .await?;
        let envelope = Self::check(response)
            .await?
            .json::<TranscriptEnvelope>()
            .await?;
        Ok(envelope.messages)
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), ApiError> {
        let response = self
            .http_client
            .delete(self.url(&format!("/api/chat/history/{id}")))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn reset_history(&self) -> Result<(), ApiError> {
        let response = self
            .http_client
            .post(self.url("/api/chat/reset"))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn transcribe(&self, audio: &AudioBlob) -> Result<Option<String>, ApiError> {
        let response = self
            .http_client
            .post(self.url("/api/chat/transcribe"))
            .multipart(Self::voice_form(audio)?)
            .send()
            .await?;
        let envelope = Self::check(response)
            .await?
            .json::<TranscribeEnvelope>()
            .await?;
        Ok(envelope.text)
    }

    async fn ingest_document(&self, filename: &str, bytes: Vec<u8>) -> Result<u64, ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .http_client
            .post(self.url("/api/upload/document"))
            .multipart(form)
            .send()
            .await?;
        let envelope = Self::check(response).await?.json::<IngestEnvelope>().await?;
        Ok(envelope.inserted)
    }

    async fn ingest_voice(&self, audio: &AudioBlob) -> Result<u64, ApiError> {
        let response = self
            .http_client
            .post(self.url("/api/upload/voice"))
            .multipart(Self::voice_form(audio)?)
            .send()
            .await?;
        let envelope = Self::check(response).await?.json::<IngestEnvelope>().await?;
        Ok(envelope.inserted)
    }

    async fn fetch_folders(&self) -> Result<Vec<FolderEntry>, ApiError> {
        let response = self
            .http_client
            .get(self.url("/api/chat/folders"))
            .send()
            .await?;
        let envelope = Self::check(response).await?.json::<FoldersEnvelope>().await?;
        Ok(envelope.folders)
    }

    async fn create_folder(&self, name: &str) -> Result<(), ApiError> {
        let response = self
            .http_client
            .post(self.url("/api/chat/folders"))
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_folder(&self, id: &str) -> Result<(), ApiError> {
        let response = self
            .http_client
            .delete(self.url(&format!("/api/chat/folders/{id}")))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
