use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("No input device available")]
    NoInputDevice,

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Audio stream error: {0}")]
    Stream(String),
}
