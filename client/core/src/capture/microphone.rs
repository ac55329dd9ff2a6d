//! Microphone Capture Device
//!
//! cpal-backed [`CaptureDevice`]. The input stream lives on a dedicated
//! thread (cpal streams are not `Send`); PCM buffers accumulate there and
//! the finished take is encoded as WAV and delivered as a single fragment
//! when the session closes, the way a recorder without a timeslice delivers
//! one chunk at stop.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use hound::{SampleFormat as WavSampleFormat, WavSpec, WavWriter};
use tokio::sync::mpsc;

use super::{AudioChunk, CaptureDevice, CaptureError};

/// Default-input-device microphone
#[derive(Default)]
pub struct MicrophoneDevice {
    stop_flag: Option<Arc<AtomicBool>>,
    worker: Option<JoinHandle<()>>,
}

impl MicrophoneDevice {
    /// Create a device over the host's default input
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CaptureDevice for MicrophoneDevice {
    async fn open(&mut self) -> Result<mpsc::Receiver<AudioChunk>, CaptureError> {
        let (chunk_tx, chunk_rx) = mpsc::channel(4);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let flag = Arc::clone(&stop_flag);
        let worker = std::thread::spawn(move || capture_worker(&flag, &ready_tx, chunk_tx));

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.stop_flag = Some(stop_flag);
                self.worker = Some(worker);
                Ok(chunk_rx)
            }
            Ok(Err(error)) => {
                let _ = worker.join();
                Err(error)
            }
            Err(_) => Err(CaptureError::Device(
                "capture thread exited before starting".to_string(),
            )),
        }
    }

    async fn close(&mut self) -> Result<(), CaptureError> {
        if let Some(flag) = self.stop_flag.take() {
            flag.store(true, Ordering::SeqCst);
        }
        if let Some(worker) = self.worker.take() {
            tokio::task::spawn_blocking(move || worker.join())
                .await
                .map_err(|error| CaptureError::Device(error.to_string()))?
                .map_err(|_| CaptureError::Device("capture thread panicked".to_string()))?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

/// Capture loop: owns the cpal stream, accumulates PCM, encodes at stop
fn capture_worker(
    stop: &AtomicBool,
    ready: &std::sync::mpsc::Sender<Result<(), CaptureError>>,
    chunks: mpsc::Sender<AudioChunk>,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_input_device() else {
        let _ = ready.send(Err(CaptureError::PermissionDenied));
        return;
    };
    let supported = match device.default_input_config() {
        Ok(config) => config,
        Err(_) => {
            let _ = ready.send(Err(CaptureError::PermissionDenied));
            return;
        }
    };

    let sample_format = supported.sample_format();
    let stream_config = supported.config();
    let sample_rate = stream_config.sample_rate.0;
    let channels = stream_config.channels;

    let (frame_tx, frame_rx) = std::sync::mpsc::sync_channel::<Vec<i16>>(64);

    let stream = match build_input_stream(&device, &stream_config, sample_format, frame_tx) {
        Ok(stream) => stream,
        Err(error) => {
            let _ = ready.send(Err(error));
            return;
        }
    };
    if let Err(error) = stream.play() {
        let _ = ready.send(Err(CaptureError::Device(error.to_string())));
        return;
    }
    let _ = ready.send(Ok(()));

    let mut samples: Vec<i16> = Vec::new();
    while !stop.load(Ordering::SeqCst) {
        match frame_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(frame) => samples.extend_from_slice(&frame),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    drop(stream);
    while let Ok(frame) = frame_rx.try_recv() {
        samples.extend_from_slice(&frame);
    }

    match encode_wav(&samples, sample_rate, channels) {
        Ok(data) => {
            let _ = chunks.blocking_send(AudioChunk { data });
        }
        Err(error) => {
            tracing::warn!(%error, "failed to encode recording");
        }
    }
    // Dropping `chunks` here closes the fragment channel
}

fn build_input_stream(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    sample_format: SampleFormat,
    frame_tx: SyncSender<Vec<i16>>,
) -> Result<cpal::Stream, CaptureError> {
    let error_callback = move |error| {
        tracing::warn!(%error, "input stream error");
    };

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            stream_config,
            move |data: &[f32], _| {
                let frame = data
                    .iter()
                    .map(|sample| (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)
                    .collect();
                let _ = frame_tx.try_send(frame);
            },
            error_callback,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            stream_config,
            move |data: &[i16], _| {
                let _ = frame_tx.try_send(data.to_vec());
            },
            error_callback,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            stream_config,
            move |data: &[u16], _| {
                let frame = data
                    .iter()
                    .map(|sample| (i32::from(*sample) - 32768) as i16)
                    .collect();
                let _ = frame_tx.try_send(frame);
            },
            error_callback,
            None,
        ),
        other => {
            return Err(CaptureError::Device(format!(
                "unsupported input sample format: {other:?}"
            )))
        }
    };

    stream.map_err(|error| match error {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::PermissionDenied,
        other => CaptureError::Device(other.to_string()),
    })
}

fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: WavSampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
