use thiserror::Error;

/// Errors produced by the storage backends.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Generic I/O error from a filesystem-backed store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The conversation document does not exist.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The blob key is empty or escapes the store root.
    #[error("Invalid blob key: {0}")]
    InvalidKey(String),

    /// Payload exceeds the configured size cap.
    #[error("Blob too large: {size} bytes (max {max})")]
    BlobTooLarge { size: usize, max: usize },

    /// No blob stored under the requested key.
    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    /// Empty payloads are rejected.
    #[error("Empty blob")]
    EmptyBlob,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
