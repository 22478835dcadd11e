//! # causerie-shared
//!
//! Domain types, error taxonomy, and input validation shared by every
//! Causerie crate.
//!
//! The types here are the exact document shapes the backend stores, so
//! every struct derives `Serialize`/`Deserialize` and serializes with the
//! field names the conversation document uses on the wire.

pub mod constants;
pub mod types;
pub mod validation;

mod error;

pub use error::{
    AuthError, CauserieError, PlaybackError, RecordingError, SendError, SyncError, UploadError,
    ValidationError,
};
