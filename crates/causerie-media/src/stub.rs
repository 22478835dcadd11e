//! Loopback device implementations for development and the demo binary.
//!
//! [`StubRecorder`] writes a short placeholder clip to a scratch
//! directory instead of capturing the microphone; [`StubOutput`] accepts
//! any non-empty URL and reports the stream as finished as soon as it is
//! played.

use std::path::PathBuf;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::MediaError;
use crate::playback::{AudioOutput, AudioSink, PlaybackStatus};
use crate::recorder::{AudioRecorder, CaptureHandle, RecordedClip, RecordingPreset};

// Stands in for an encoded audio payload.
const SILENT_CLIP: [u8; 64] = [0u8; 64];

pub struct StubRecorder {
    dir: PathBuf,
}

impl StubRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl AudioRecorder for StubRecorder {
    type Capture = StubCapture;

    async fn request_permission(&self) -> Result<(), MediaError> {
        Ok(())
    }

    async fn start(&self, preset: &RecordingPreset) -> Result<StubCapture, MediaError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| MediaError::Device(e.to_string()))?;

        let path = self.dir.join(format!(
            "clip-{}.{}",
            Utc::now().timestamp_millis(),
            preset.extension
        ));
        debug!(path = %path.display(), "Stub capture started");
        Ok(StubCapture { path })
    }
}

pub struct StubCapture {
    path: PathBuf,
}

impl CaptureHandle for StubCapture {
    async fn stop(self) -> Result<RecordedClip, MediaError> {
        tokio::fs::write(&self.path, SILENT_CLIP)
            .await
            .map_err(|e| MediaError::Device(e.to_string()))?;
        debug!(path = %self.path.display(), "Stub capture stopped");
        Ok(RecordedClip { path: self.path })
    }
}

#[derive(Default)]
pub struct StubOutput;

impl AudioOutput for StubOutput {
    type Sink = StubSink;

    async fn load(
        &self,
        url: &str,
    ) -> Result<(StubSink, mpsc::UnboundedReceiver<PlaybackStatus>), MediaError> {
        if url.is_empty() {
            return Err(MediaError::Stream("empty source url".to_string()));
        }
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        debug!(url = %url, "Stub sink loaded");
        Ok((StubSink { status_tx }, status_rx))
    }
}

pub struct StubSink {
    status_tx: mpsc::UnboundedSender<PlaybackStatus>,
}

impl AudioSink for StubSink {
    async fn play(&mut self) -> Result<(), MediaError> {
        // The zero-length stream ends immediately.
        let _ = self.status_tx.send(PlaybackStatus::Finished);
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), MediaError> {
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), MediaError> {
        Ok(())
    }

    fn unload(&mut self) {
        debug!("Stub sink unloaded");
    }
}
