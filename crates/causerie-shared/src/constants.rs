/// Application name
pub const APP_NAME: &str = "Causerie";

/// The single conversation document this client renders.
pub const PRIMARY_CONVERSATION_ID: &str = "primary";

/// Blob store key prefix for uploaded voice clips.
pub const AUDIO_KEY_PREFIX: &str = "audio";

/// Maximum uploaded voice clip size in bytes (10 MiB).
pub const MAX_AUDIO_BLOB_SIZE: usize = 10 * 1024 * 1024;
