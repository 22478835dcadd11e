use thiserror::Error;

/// Top-level error for the client core. Every failure maps into exactly
/// one of the categories below and leaves its component in a stable state.
#[derive(Error, Debug)]
pub enum CauserieError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Send error: {0}")]
    Send(#[from] SendError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),
}

/// Local, pre-flight login validation. No service call is made when one
/// of these fires.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("All fields are required")]
    MissingFields,

    #[error("Invalid email address")]
    MalformedEmail,
}

/// Auth service rejection, mapped from provider error codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("That email address is invalid")]
    InvalidEmail,

    #[error("Could not sign in: check your credentials")]
    InvalidCredentials,

    #[error("Sign-in failed ({0})")]
    Unknown(String),
}

/// Subscription failure. Reported, never silently dropped; re-activation
/// retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Subscription failed: {0}")]
    Subscribe(String),

    #[error("Snapshot stream error: {0}")]
    Stream(String),
}

/// Append failure. Recoverable: the caller keeps its compose state and
/// may retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("Cannot send an empty message")]
    EmptyMessage,

    #[error("No active conversation")]
    NotActive,

    #[error("Session changed since the operation started")]
    StaleSession,

    #[error("Append failed: {0}")]
    Append(String),
}

/// Device capture failure. Terminal for the attempt; the pipeline
/// returns to idle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordingError {
    #[error("Not signed in")]
    NotSignedIn,

    #[error("A recording is already in progress")]
    AlreadyActive,

    #[error("Previous recording failure has not been acknowledged")]
    Unacknowledged,

    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Recording device error: {0}")]
    Device(String),

    #[error("No recording in progress")]
    NotRecording,
}

/// Upload failure after a recording stopped. Terminal for that
/// recording: the local clip is discarded and no message is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("Could not read the recorded clip: {0}")]
    Read(String),

    #[error("Blob upload failed: {0}")]
    Store(String),

    #[error("Could not resolve a download URL: {0}")]
    Url(String),
}

/// Playback failure, isolated to one message's handle. The device
/// resource is released; other handles are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("Message is not an audio message")]
    NotAudio,

    #[error("Failed to load audio source: {0}")]
    Load(String),

    #[error("Playback device error: {0}")]
    Device(String),
}
