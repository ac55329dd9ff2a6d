//! Parley Core - Headless Chat Client for the Parley Assistant
//!
//! This crate provides the conversation and capture state machine for the
//! parley chat client, completely independent of any UI framework. It can
//! drive a web UI, a TUI, a desktop shell, or run headless for testing.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        UI Shells                           │
//! │   ┌─────────┐   ┌─────────┐   ┌──────────────────────────┐ │
//! │   │   Web   │   │   TUI   │   │   Headless (parley-cli)  │ │
//! │   └────┬────┘   └────┬────┘   └────────────┬─────────────┘ │
//! │        └─────────────┴─────────────────────┘               │
//! │                user intents (down) / snapshots (up)        │
//! └──────────────────────────┼─────────────────────────────────┘
//!                            │
//! ┌──────────────────────────┼─────────────────────────────────┐
//! │                     PARLEY CORE                            │
//! │  ┌───────────────────────┴─────────────────────────────┐   │
//! │  │                    ChatClient                       │   │
//! │  │ ┌──────────┐ ┌────────────┐ ┌─────────┐ ┌─────────┐ │   │
//! │  │ │ Message  │ │Conversation│ │  Media  │ │Attachmnt│ │   │
//! │  │ │ Session  │ │   Store    │ │ Capture │ │Uploader │ │   │
//! │  │ └──────────┘ └────────────┘ └─────────┘ └─────────┘ │   │
//! │  └────────────────────────┬────────────────────────────┘   │
//! │                     BackendApi (HTTP)                      │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ChatClient`]: the facade shells talk to; owns the cross-component
//!   invariants (active-delete cleanup, delayed list refresh, the voice
//!   pipeline)
//! - [`MessageSession`]: the active conversation's message list and send
//!   lifecycle, with optimistic updates and a stale-response guard
//! - [`ConversationStore`]: mirror of the backend's conversation and
//!   folder lists
//! - [`MediaCapture`]: microphone recording state machine over a pluggable
//!   [`CaptureDevice`]
//! - [`AttachmentUploader`]: document ingestion and the
//!   record-transcribe-send voice pipeline
//!
//! # No UI Dependencies
//!
//! This crate has **zero** dependencies on any UI framework. Shells render
//! snapshots of the session and store and forward user intents; all state
//! transitions live here, where they can be tested headlessly.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod capture;
pub mod client;
pub mod config;
pub mod session;
pub mod store;
pub mod upload;

// Re-exports for convenience
pub use api::{ApiError, BackendApi, ChatReply, ChatRequest, HttpBackend, TOP_K};
pub use capture::{
    AudioBlob, AudioChunk, CaptureDevice, CaptureError, CaptureStatus, MediaCapture, NullDevice,
    MIC_DENIED_ALERT, VOICE_FILENAME, VOICE_MIME,
};
pub use client::{ChatClient, HISTORY_REFRESH_DELAY};
pub use config::{load_config, load_config_from_path, Config, ConfigError, DEFAULT_BASE_URL};
pub use session::{Message, MessageId, MessageSession, Role, SendOutcome};
pub use store::{Conversation, ConversationStore, Folder};
pub use upload::{AttachmentUploader, DocumentOutcome, VoiceOutcome};
