//! Playback contracts. One sink per loaded source; the device resource
//! stays owned by the sink until `unload`.

use std::future::Future;

use tokio::sync::mpsc;

use crate::error::MediaError;

/// Status updates pushed by the device while a sink is loaded, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// The stream played to the end.
    Finished,

    /// The device reported an unrecoverable error for this sink.
    Error(String),
}

/// Device-side playback API.
pub trait AudioOutput: Send + Sync + 'static {
    type Sink: AudioSink;

    /// Decode the source behind `url` and prepare a sink for it.
    ///
    /// The returned receiver delivers status updates until the sink is
    /// unloaded.
    fn load(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<(Self::Sink, mpsc::UnboundedReceiver<PlaybackStatus>), MediaError>>
           + Send;
}

/// Exclusive handle to a loaded audio source.
pub trait AudioSink: Send + 'static {
    fn play(&mut self) -> impl Future<Output = Result<(), MediaError>> + Send;

    fn pause(&mut self) -> impl Future<Output = Result<(), MediaError>> + Send;

    fn resume(&mut self) -> impl Future<Output = Result<(), MediaError>> + Send;

    /// Release the decoder and device resources. Infallible; callable
    /// exactly once.
    fn unload(&mut self);
}
