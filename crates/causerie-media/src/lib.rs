//! # causerie-media
//!
//! Device audio contracts consumed by the client core: microphone
//! capture behind [`AudioRecorder`]/[`CaptureHandle`], playback behind
//! [`AudioOutput`]/[`AudioSink`]. Platform backends (mobile device APIs)
//! implement these traits; [`stub`] ships loopback implementations for
//! development and tests.

pub mod playback;
pub mod recorder;
pub mod stub;

mod error;

pub use error::MediaError;
pub use playback::{AudioOutput, AudioSink, PlaybackStatus};
pub use recorder::{AudioRecorder, CaptureHandle, RecordedClip, RecordingPreset};
