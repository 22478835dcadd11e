//! # causerie-client
//!
//! The chat-client core: session management, realtime synchronization of
//! one conversation, and the audio-message lifecycle.
//!
//! Three components cooperate:
//!
//! - [`session::SessionManager`] owns the current-user identity, derived
//!   from the auth service's session stream.
//! - [`sync::ConversationSync`] maintains the locally observable message
//!   list for one conversation and appends with write-through semantics.
//! - [`recording::RecordingPipeline`] and [`playback::PlaybackController`]
//!   run the voice-message state machines over the device audio traits.
//!
//! [`client::ChatClient`] wires them together: the synchronizer activates
//! only while an identity exists, and every command re-checks the session
//! at its point of effect.

pub mod auth;
pub mod client;
pub mod playback;
pub mod recording;
pub mod session;
pub mod sync;

pub use auth::{AuthService, LocalAuth, ProviderError};
pub use client::ChatClient;
pub use playback::{PlaybackController, PlaybackSnapshot, PlaybackState};
pub use recording::{RecordingPipeline, RecordingState};
pub use session::SessionManager;
pub use sync::{ConversationSync, SyncStatus};
