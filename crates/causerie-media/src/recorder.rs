//! Microphone capture contracts.

use std::future::Future;
use std::path::PathBuf;

use crate::error::MediaError;

/// Capture settings handed to the device recorder.
#[derive(Debug, Clone)]
pub struct RecordingPreset {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_rate: u32,
    /// Container extension of the recorded clip, without the dot.
    pub extension: String,
}

impl RecordingPreset {
    /// The preset used for voice messages.
    pub fn high_quality() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            bit_rate: 128_000,
            extension: "m4a".to_string(),
        }
    }
}

impl Default for RecordingPreset {
    fn default() -> Self {
        Self::high_quality()
    }
}

/// A finished local recording, not yet uploaded.
#[derive(Debug, Clone)]
pub struct RecordedClip {
    /// Local file written by the device recorder.
    pub path: PathBuf,
}

impl RecordedClip {
    /// File extension of the clip, if the recorder produced one.
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }
}

/// Device-side recording API.
pub trait AudioRecorder: Send + Sync + 'static {
    type Capture: CaptureHandle;

    /// Ask the platform for microphone access.
    fn request_permission(&self) -> impl Future<Output = Result<(), MediaError>> + Send;

    /// Configure the device for `preset` and begin capturing.
    fn start(
        &self,
        preset: &RecordingPreset,
    ) -> impl Future<Output = Result<Self::Capture, MediaError>> + Send;
}

/// Exclusive handle to an in-progress device capture.
pub trait CaptureHandle: Send + 'static {
    /// Stop capturing and hand back the local clip.
    fn stop(self) -> impl Future<Output = Result<RecordedClip, MediaError>> + Send;
}
