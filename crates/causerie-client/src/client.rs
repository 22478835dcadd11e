//! Facade wiring the session, synchronizer, and audio pipelines.
//!
//! [`ChatClient::run`] consumes the session stream and keeps the
//! synchronizer active exactly while an identity exists; every command
//! re-checks the session at its point of effect, so commands issued
//! across a sign-out fail as stale instead of racing the deactivation.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use causerie_shared::types::{ConversationId, Message, MessageId, MessageKind, User};
use causerie_shared::{CauserieError, RecordingError, SendError};

use causerie_media::{AudioOutput, AudioRecorder};
use causerie_store::{BlobStore, DocumentStore};

use crate::auth::AuthService;
use crate::playback::{PlaybackController, PlaybackSnapshot, PlaybackState};
use crate::recording::{RecordingPipeline, RecordingState};
use crate::session::SessionManager;
use crate::sync::{ConversationSync, SyncStatus};

pub struct ChatClient<A, D, B, R, P>
where
    A: AuthService,
    D: DocumentStore,
    B: BlobStore,
    R: AudioRecorder,
    P: AudioOutput,
{
    session: SessionManager<A>,
    sync: Arc<ConversationSync<D>>,
    recording: RecordingPipeline<R, B, D>,
    playback: PlaybackController<P>,
    conversation: ConversationId,
}

impl<A, D, B, R, P> ChatClient<A, D, B, R, P>
where
    A: AuthService,
    D: DocumentStore,
    B: BlobStore,
    R: AudioRecorder,
    P: AudioOutput,
{
    pub fn new(
        auth: Arc<A>,
        store: Arc<D>,
        blobs: Arc<B>,
        recorder: Arc<R>,
        output: Arc<P>,
        conversation: ConversationId,
    ) -> Self {
        let session = SessionManager::new(auth);
        let sync = Arc::new(ConversationSync::new(store, session.watch()));
        let recording = RecordingPipeline::new(recorder, blobs, sync.clone());
        let playback = PlaybackController::new(output);
        Self {
            session,
            sync,
            recording,
            playback,
            conversation,
        }
    }

    /// Drive the subscription lifecycle from the session stream: activate
    /// on sign-in, deactivate (and release device resources) on
    /// sign-out. Runs until the auth service drops its session stream.
    pub async fn run(&self) {
        let mut session = self.session.watch();
        loop {
            let signed_in = session.borrow_and_update().is_some();
            if signed_in {
                if let Err(e) = self.sync.activate(self.conversation.clone()) {
                    warn!(error = %e, "Could not activate the conversation");
                }
            } else {
                self.sync.deactivate();
                self.playback.release_all().await;
            }
            if session.changed().await.is_err() {
                break;
            }
        }
        debug!("Session stream closed");
    }

    // -- session --

    pub async fn login(&self, email: &str, password: &str) -> Result<User, CauserieError> {
        self.session.login(email, password).await
    }

    pub async fn logout(&self) {
        self.session.logout().await;
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.current_user()
    }

    // -- conversation --

    pub fn messages(&self) -> Vec<Message> {
        self.sync.messages()
    }

    pub fn watch_messages(&self) -> watch::Receiver<Vec<Message>> {
        self.sync.watch_view()
    }

    pub fn watch_sync_status(&self) -> watch::Receiver<SyncStatus> {
        self.sync.watch_status()
    }

    /// Send the compose text, trimmed. The caller keeps its buffer when
    /// this fails and may retry.
    pub async fn send_text(&self, content: &str) -> Result<Message, CauserieError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(SendError::EmptyMessage.into());
        }
        let user = self.session.current_user().ok_or(SendError::NotActive)?;
        Ok(self.sync.send(&user, content, MessageKind::Text).await?)
    }

    // -- voice messages --

    pub async fn start_recording(&self) -> Result<(), CauserieError> {
        let user = self
            .session
            .current_user()
            .ok_or(RecordingError::NotSignedIn)?;
        self.recording.start(&user).await?;
        Ok(())
    }

    pub async fn stop_recording(&self) -> Result<Message, CauserieError> {
        self.recording.stop().await
    }

    pub fn recording_state(&self) -> RecordingState {
        self.recording.state()
    }

    pub fn watch_recording(&self) -> watch::Receiver<RecordingState> {
        self.recording.watch_state()
    }

    pub fn acknowledge_recording_failure(&self) {
        self.recording.acknowledge_failure()
    }

    // -- playback --

    pub async fn play(&self, message: &Message) -> Result<(), CauserieError> {
        Ok(self.playback.play(message).await?)
    }

    pub async fn pause(&self, message: MessageId) -> Result<(), CauserieError> {
        Ok(self.playback.pause(message).await?)
    }

    pub async fn playback_state(&self, message: MessageId) -> PlaybackState {
        self.playback.state_of(message).await
    }

    pub fn watch_playback(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.playback.watch()
    }

    /// Release loaded device resources. Call on view teardown.
    pub async fn shutdown(&self) {
        self.playback.release_all().await;
    }
}
