//! Per-message audio playback.
//!
//! Each audio message has an independent state machine
//! (`Unloaded -> Loading -> Playing <-> Paused -> Finished/Unloaded`),
//! but at most one device sink is loaded at a time: starting playback of
//! a different message releases the previous sink first. [`LoadedSink`]
//! guarantees the device resource is released on every exit path —
//! finish, error, supersede, teardown, or drop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use causerie_shared::types::{Message, MessageId, MessageKind};
use causerie_shared::PlaybackError;

use causerie_media::{AudioOutput, AudioSink, MediaError, PlaybackStatus};

/// Lifecycle of one message's playback.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Unloaded,
    Loading,
    Playing,
    Paused,
    Finished,
}

/// Last playback transition, for UI refresh.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub message: Option<MessageId>,
    pub state: PlaybackState,
}

/// Owns a loaded device sink; releases it on drop if nothing else did.
struct LoadedSink<S: AudioSink> {
    sink: Option<S>,
}

impl<S: AudioSink> LoadedSink<S> {
    fn new(sink: S) -> Self {
        Self { sink: Some(sink) }
    }

    async fn play(&mut self) -> Result<(), MediaError> {
        match self.sink.as_mut() {
            Some(sink) => sink.play().await,
            None => Ok(()),
        }
    }

    async fn pause(&mut self) -> Result<(), MediaError> {
        match self.sink.as_mut() {
            Some(sink) => sink.pause().await,
            None => Ok(()),
        }
    }

    async fn resume(&mut self) -> Result<(), MediaError> {
        match self.sink.as_mut() {
            Some(sink) => sink.resume().await,
            None => Ok(()),
        }
    }

    fn release(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.unload();
        }
    }
}

impl<S: AudioSink> Drop for LoadedSink<S> {
    fn drop(&mut self) {
        self.release();
    }
}

struct ActivePlayback<S: AudioSink> {
    message: MessageId,
    epoch: u64,
    state: PlaybackState,
    /// `None` while the source is still loading.
    sink: Option<LoadedSink<S>>,
}

pub struct PlaybackController<P: AudioOutput> {
    output: Arc<P>,
    active: Arc<Mutex<Option<ActivePlayback<P::Sink>>>>,
    events: Arc<watch::Sender<PlaybackSnapshot>>,
    next_epoch: AtomicU64,
}

impl<P: AudioOutput> PlaybackController<P> {
    pub fn new(output: Arc<P>) -> Self {
        let (events, _) = watch::channel(PlaybackSnapshot {
            message: None,
            state: PlaybackState::Unloaded,
        });
        Self {
            output,
            active: Arc::new(Mutex::new(None)),
            events: Arc::new(events),
            next_epoch: AtomicU64::new(0),
        }
    }

    /// Playback transitions, for UI refresh.
    pub fn watch(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.events.subscribe()
    }

    /// Current state of one message's playback.
    pub async fn state_of(&self, message: MessageId) -> PlaybackState {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(a) if a.message == message => a.state,
            _ => PlaybackState::Unloaded,
        }
    }

    /// Start (or resume) playback of an audio message.
    ///
    /// A gesture on the currently paused message resumes it; any other
    /// loaded message is released first.
    pub async fn play(&self, message: &Message) -> Result<(), PlaybackError> {
        if message.kind != MessageKind::Audio {
            return Err(PlaybackError::NotAudio);
        }

        let epoch = {
            let mut active = self.active.lock().await;

            // A gesture on the message that already owns the slot.
            if active.as_ref().map(|a| a.message) == Some(message.id) {
                if active.as_ref().map(|a| a.state) != Some(PlaybackState::Paused) {
                    // Already loading or playing; nothing to do.
                    return Ok(());
                }
                let resumed = match active.as_mut() {
                    Some(current) => current.resume_sink().await,
                    None => Ok(()),
                };
                return match resumed {
                    Ok(()) => {
                        if let Some(current) = active.as_mut() {
                            current.state = PlaybackState::Playing;
                        }
                        self.publish(Some(message.id), PlaybackState::Playing);
                        debug!(message = %message.id, "Playback resumed");
                        Ok(())
                    }
                    Err(e) => {
                        active.take();
                        self.publish(None, PlaybackState::Unloaded);
                        warn!(message = %message.id, error = %e, "Resume failed, sink released");
                        Err(PlaybackError::Device(e.to_string()))
                    }
                };
            }

            // A different message owns the slot: release it first.
            if let Some(previous) = active.take() {
                debug!(previous = %previous.message, "Releasing superseded playback");
            }

            // Claim the slot for this attempt before awaiting the load.
            let epoch = self.next_epoch.fetch_add(1, Ordering::SeqCst) + 1;
            *active = Some(ActivePlayback {
                message: message.id,
                epoch,
                state: PlaybackState::Loading,
                sink: None,
            });
            self.publish(Some(message.id), PlaybackState::Loading);
            epoch
        };

        let (sink, mut status_rx) = match self.output.load(&message.content).await {
            Ok(pair) => pair,
            Err(e) => {
                let mut active = self.active.lock().await;
                if active.as_ref().map(|a| a.epoch) == Some(epoch) {
                    active.take();
                    self.publish(None, PlaybackState::Unloaded);
                }
                warn!(message = %message.id, error = %e, "Failed to load audio source");
                return Err(PlaybackError::Load(e.to_string()));
            }
        };

        let mut loaded = LoadedSink::new(sink);
        let mut active = self.active.lock().await;
        if active.as_ref().map(|a| a.epoch) != Some(epoch) {
            // Superseded while loading; the freshly loaded sink is
            // released and the newer playback keeps the slot.
            debug!(message = %message.id, "Load superseded, releasing sink");
            loaded.release();
            return Ok(());
        }

        if let Err(e) = loaded.play().await {
            active.take();
            self.publish(None, PlaybackState::Unloaded);
            warn!(message = %message.id, error = %e, "Playback device refused to start");
            return Err(PlaybackError::Device(e.to_string()));
        }

        if let Some(slot) = active.as_mut() {
            slot.sink = Some(loaded);
            slot.state = PlaybackState::Playing;
        }
        self.publish(Some(message.id), PlaybackState::Playing);
        info!(message = %message.id, "Playback started");

        // Drive finish/error from the device status stream.
        let active_slot = self.active.clone();
        let events = self.events.clone();
        let message_id = message.id;
        tokio::spawn(async move {
            while let Some(status) = status_rx.recv().await {
                match status {
                    PlaybackStatus::Finished => {
                        let mut active = active_slot.lock().await;
                        if active.as_ref().map(|a| a.epoch) == Some(epoch) {
                            active.take();
                            let _ = events.send_replace(PlaybackSnapshot {
                                message: Some(message_id),
                                state: PlaybackState::Finished,
                            });
                            let _ = events.send_replace(PlaybackSnapshot {
                                message: None,
                                state: PlaybackState::Unloaded,
                            });
                            debug!(message = %message_id, "Playback finished, sink released");
                        }
                        break;
                    }
                    PlaybackStatus::Error(err) => {
                        let mut active = active_slot.lock().await;
                        if active.as_ref().map(|a| a.epoch) == Some(epoch) {
                            active.take();
                            let _ = events.send_replace(PlaybackSnapshot {
                                message: None,
                                state: PlaybackState::Unloaded,
                            });
                        }
                        warn!(message = %message_id, error = %err, "Playback failed, sink released");
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    /// Pause the named message. Other messages' handles are unaffected;
    /// pausing something that is not playing is a no-op.
    pub async fn pause(&self, message: MessageId) -> Result<(), PlaybackError> {
        let mut active = self.active.lock().await;
        let playing = matches!(
            active.as_ref(),
            Some(a) if a.message == message && a.state == PlaybackState::Playing
        );
        if !playing {
            return Ok(());
        }

        let paused = match active.as_mut() {
            Some(current) => current.pause_sink().await,
            None => Ok(()),
        };
        match paused {
            Ok(()) => {
                if let Some(current) = active.as_mut() {
                    current.state = PlaybackState::Paused;
                }
                self.publish(Some(message), PlaybackState::Paused);
                debug!(message = %message, "Playback paused");
                Ok(())
            }
            Err(e) => {
                active.take();
                self.publish(None, PlaybackState::Unloaded);
                warn!(message = %message, error = %e, "Pause failed, sink released");
                Err(PlaybackError::Device(e.to_string()))
            }
        }
    }

    /// Mandatory teardown: release whatever sink is loaded.
    pub async fn release_all(&self) {
        let mut active = self.active.lock().await;
        if active.take().is_some() {
            self.publish(None, PlaybackState::Unloaded);
            debug!("Released loaded playback sink");
        }
    }

    fn publish(&self, message: Option<MessageId>, state: PlaybackState) {
        self.events.send_replace(PlaybackSnapshot { message, state });
    }
}

impl<S: AudioSink> ActivePlayback<S> {
    async fn pause_sink(&mut self) -> Result<(), MediaError> {
        match self.sink.as_mut() {
            Some(sink) => sink.pause().await,
            None => Ok(()),
        }
    }

    async fn resume_sink(&mut self) -> Result<(), MediaError> {
        match self.sink.as_mut() {
            Some(sink) => sink.resume().await,
            None => Ok(()),
        }
    }
}
