//! Microphone Capture
//!
//! State machine for one recording session: acquire the capture device,
//! buffer encoded audio fragments in arrival order, and finalize them into
//! a single uploadable blob when the user stops.
//!
//! # Design Philosophy
//!
//! The microphone is an exclusive resource. [`MediaCapture`] admits at most
//! one active recording; a second `start()` is rejected explicitly instead
//! of being left to UI disablement. The fragment buffer belongs to the
//! active recording only and is discarded after every stop, so fragments
//! can never leak between sessions.
//!
//! Hardware access sits behind the [`CaptureDevice`] trait so the state
//! machine can be driven by a real microphone (see [`microphone`]) or by a
//! scripted device in tests.

#[cfg(feature = "microphone")]
pub mod microphone;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// MIME type voice blobs are labeled with on the wire.
pub const VOICE_MIME: &str = "audio/webm";

/// File name voice blobs are uploaded under.
pub const VOICE_FILENAME: &str = "voice_message.webm";

/// Blocking alert shown when microphone access cannot be obtained.
pub const MIC_DENIED_ALERT: &str = "Microphone access denied or not available.";

/// Errors from capture operations
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Microphone access was denied or no input device exists
    #[error("microphone access denied or not available")]
    PermissionDenied,

    /// A recording session is already active
    #[error("a recording is already in progress")]
    AlreadyRecording,

    /// The capture device failed mid-session
    #[error("capture device failed: {0}")]
    Device(String),
}

/// One encoded audio fragment, opaque to the state machine
#[derive(Clone, Debug)]
pub struct AudioChunk {
    /// Encoded bytes; concatenating a session's chunks yields the full take
    pub data: Vec<u8>,
}

/// A finished recording, ready for upload
#[derive(Clone, Debug)]
pub struct AudioBlob {
    /// Wire MIME label, always [`VOICE_MIME`]
    pub mime: &'static str,
    /// The assembled audio bytes
    pub data: Vec<u8>,
}

/// Recording session status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureStatus {
    /// No recording session exists
    Idle,
    /// Fragments are being buffered
    Recording,
    /// The device is being closed and the take finalized
    Stopping,
    /// The finished take is being uploaded
    Uploading,
}

/// Audio capture device
///
/// `open()` starts delivering encoded fragments on the returned channel;
/// `close()` flushes any final fragment and closes the channel. A device
/// that cannot obtain the microphone reports
/// [`CaptureError::PermissionDenied`] from `open()`.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Acquire the microphone and start producing fragments
    async fn open(&mut self) -> Result<mpsc::Receiver<AudioChunk>, CaptureError>;

    /// Release the microphone, flushing any buffered fragment
    async fn close(&mut self) -> Result<(), CaptureError>;

    /// Device name for logging
    fn name(&self) -> &str;
}

/// Capture device used when no microphone backend is compiled in
///
/// Every `open()` reports [`CaptureError::PermissionDenied`], which the
/// shell surfaces with the standard alert.
pub struct NullDevice;

#[async_trait]
impl CaptureDevice for NullDevice {
    async fn open(&mut self) -> Result<mpsc::Receiver<AudioChunk>, CaptureError> {
        Err(CaptureError::PermissionDenied)
    }

    async fn close(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Fragment buffer of the active recording session
struct RecordingState {
    status: CaptureStatus,
    chunks: Vec<AudioChunk>,
}

/// Microphone capture state machine
///
/// Normal flow is `idle → recording → idle`; when the finished take is
/// handed to the uploader the session passes through `uploading` before
/// returning to `idle`.
pub struct MediaCapture {
    /// The capture device; device calls need exclusive async access
    device: tokio::sync::Mutex<Box<dyn CaptureDevice>>,
    /// Session status and fragment buffer
    state: Arc<Mutex<RecordingState>>,
    /// Task draining device fragments into the buffer
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl MediaCapture {
    /// Create a capture state machine over `device`
    pub fn new(device: Box<dyn CaptureDevice>) -> Self {
        Self {
            device: tokio::sync::Mutex::new(device),
            state: Arc::new(Mutex::new(RecordingState {
                status: CaptureStatus::Idle,
                chunks: Vec::new(),
            })),
            drain: Mutex::new(None),
        }
    }

    /// Current session status
    pub fn status(&self) -> CaptureStatus {
        self.state.lock().status
    }

    /// Whether a recording session is currently buffering
    pub fn is_recording(&self) -> bool {
        self.status() == CaptureStatus::Recording
    }

    /// Start a recording session
    ///
    /// Fails with [`CaptureError::AlreadyRecording`] while a session is
    /// active, and with [`CaptureError::PermissionDenied`] when the device
    /// cannot obtain the microphone; in both cases the session stays idle.
    pub async fn start(&self) -> Result<(), CaptureError> {
        {
            let mut state = self.state.lock();
            if state.status != CaptureStatus::Idle {
                return Err(CaptureError::AlreadyRecording);
            }
            state.status = CaptureStatus::Recording;
            state.chunks.clear();
        }

        let mut rx = {
            let mut device = self.device.lock().await;
            match device.open().await {
                Ok(rx) => {
                    tracing::debug!(device = device.name(), "recording started");
                    rx
                }
                Err(error) => {
                    self.state.lock().status = CaptureStatus::Idle;
                    return Err(error);
                }
            }
        };

        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                state.lock().chunks.push(chunk);
            }
        });
        *self.drain.lock() = Some(handle);

        Ok(())
    }

    /// Stop the active recording session and assemble the take
    ///
    /// Returns `Ok(None)` when no recording is active (stop is a no-op
    /// outside `recording`). The fragment buffer is consumed either way;
    /// nothing carries over into the next session.
    pub async fn stop(&self) -> Result<Option<AudioBlob>, CaptureError> {
        {
            let mut state = self.state.lock();
            if state.status != CaptureStatus::Recording {
                return Ok(None);
            }
            state.status = CaptureStatus::Stopping;
        }

        let closed = self.device.lock().await.close().await;

        // The drain task ends once the device closes its channel. If the
        // close itself failed the channel may never close; abort instead.
        let drained = self.drain.lock().take();
        if let Some(handle) = drained {
            if closed.is_ok() {
                if let Err(error) = handle.await {
                    tracing::warn!(%error, "fragment drain task failed");
                }
            } else {
                handle.abort();
            }
        }

        let chunks = {
            let mut state = self.state.lock();
            state.status = CaptureStatus::Idle;
            std::mem::take(&mut state.chunks)
        };

        closed?;

        let mut data = Vec::new();
        for chunk in &chunks {
            data.extend_from_slice(&chunk.data);
        }
        tracing::debug!(fragments = chunks.len(), bytes = data.len(), "recording finalized");

        Ok(Some(AudioBlob {
            mime: VOICE_MIME,
            data,
        }))
    }

    /// Mark the finished take as being uploaded
    pub(crate) fn mark_uploading(&self) {
        let mut state = self.state.lock();
        if state.status == CaptureStatus::Idle {
            state.status = CaptureStatus::Uploading;
        }
    }

    /// Return to idle after the upload resolved
    pub(crate) fn mark_idle(&self) {
        let mut state = self.state.lock();
        if state.status == CaptureStatus::Uploading {
            state.status = CaptureStatus::Idle;
        }
    }
}
