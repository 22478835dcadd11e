//! The voice-message recording pipeline.
//!
//! One state machine per client:
//! `Idle -> Recording -> Stopping -> Uploading -> Idle` on success,
//! `Uploading -> Failed -> Idle` (after acknowledgement) on upload
//! failure. Exactly one recording session may be active; the boundary
//! state check enforces it, so no lock is held across device or network
//! awaits.

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use causerie_shared::constants::AUDIO_KEY_PREFIX;
use causerie_shared::types::{Message, MessageKind, User};
use causerie_shared::{CauserieError, RecordingError, UploadError};

use causerie_media::{AudioRecorder, CaptureHandle, MediaError, RecordedClip, RecordingPreset};
use causerie_store::{BlobStore, DocumentStore};

use crate::sync::ConversationSync;

/// Lifecycle of a voice-message recording.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    Idle,
    Recording,
    Stopping,
    Uploading,
    Failed,
}

struct PipelineInner<C> {
    state: RecordingState,
    capture: Option<C>,
    author: Option<User>,
    started_at: Option<DateTime<Utc>>,
}

impl<C> PipelineInner<C> {
    fn reset(&mut self, state: RecordingState) {
        self.state = state;
        self.capture = None;
        self.author = None;
        self.started_at = None;
    }
}

pub struct RecordingPipeline<R: AudioRecorder, B: BlobStore, D: DocumentStore> {
    recorder: Arc<R>,
    blobs: Arc<B>,
    sync: Arc<ConversationSync<D>>,
    preset: RecordingPreset,
    inner: Mutex<PipelineInner<R::Capture>>,
    state_tx: watch::Sender<RecordingState>,
}

impl<R: AudioRecorder, B: BlobStore, D: DocumentStore> RecordingPipeline<R, B, D> {
    pub fn new(recorder: Arc<R>, blobs: Arc<B>, sync: Arc<ConversationSync<D>>) -> Self {
        let (state_tx, _) = watch::channel(RecordingState::Idle);
        Self {
            recorder,
            blobs,
            sync,
            preset: RecordingPreset::high_quality(),
            inner: Mutex::new(PipelineInner {
                state: RecordingState::Idle,
                capture: None,
                author: None,
                started_at: None,
            }),
            state_tx,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.lock().state
    }

    pub fn watch_state(&self) -> watch::Receiver<RecordingState> {
        self.state_tx.subscribe()
    }

    /// When the active capture started, if one is running.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.lock().started_at
    }

    /// Request permission and begin capturing for `author`.
    ///
    /// Rejected while any session is active, and while a failed one is
    /// unacknowledged. Failures here are terminal for the attempt and
    /// leave the pipeline idle.
    pub async fn start(&self, author: &User) -> Result<(), RecordingError> {
        {
            let mut inner = self.lock();
            match inner.state {
                RecordingState::Idle => {}
                RecordingState::Failed => return Err(RecordingError::Unacknowledged),
                _ => return Err(RecordingError::AlreadyActive),
            }
            // Claims the session before the awaits below; concurrent
            // starts now bounce off AlreadyActive.
            inner.state = RecordingState::Recording;
            inner.author = Some(author.clone());
            self.state_tx.send_replace(RecordingState::Recording);
        }

        if let Err(e) = self.recorder.request_permission().await {
            self.reset(RecordingState::Idle);
            warn!(error = %e, "Microphone permission not granted");
            return Err(match e {
                MediaError::PermissionDenied => RecordingError::PermissionDenied,
                other => RecordingError::Device(other.to_string()),
            });
        }

        match self.recorder.start(&self.preset).await {
            Ok(capture) => {
                let mut inner = self.lock();
                inner.capture = Some(capture);
                inner.started_at = Some(Utc::now());
                info!(author = %author.id, "Recording started");
                Ok(())
            }
            Err(e) => {
                self.reset(RecordingState::Idle);
                warn!(error = %e, "Device capture failed to start");
                Err(RecordingError::Device(e.to_string()))
            }
        }
    }

    /// Stop the capture, upload the clip, and append the voice message.
    ///
    /// Device failure while stopping returns the pipeline to idle; any
    /// upload failure discards the clip, moves to `Failed`, and sends
    /// nothing. New `start` calls are refused until this resolves.
    pub async fn stop(&self) -> Result<Message, CauserieError> {
        let (capture, author, started_at) = {
            let mut inner = self.lock();
            if inner.state != RecordingState::Recording {
                return Err(RecordingError::NotRecording.into());
            }
            let capture = match inner.capture.take() {
                Some(capture) => capture,
                // start() has claimed the session but the device has not
                // handed the capture back yet.
                None => return Err(RecordingError::NotRecording.into()),
            };
            let author = match inner.author.clone() {
                Some(author) => author,
                None => return Err(RecordingError::NotRecording.into()),
            };
            inner.state = RecordingState::Stopping;
            self.state_tx.send_replace(RecordingState::Stopping);
            (capture, author, inner.started_at)
        };

        let clip = match capture.stop().await {
            Ok(clip) => clip,
            Err(e) => {
                self.reset(RecordingState::Idle);
                warn!(error = %e, "Device capture failed to stop");
                return Err(RecordingError::Device(e.to_string()).into());
            }
        };

        if let Some(started) = started_at {
            let duration_ms = (Utc::now() - started).num_milliseconds();
            debug!(duration_ms, path = %clip.path.display(), "Recording stopped");
        }

        self.set_state(RecordingState::Uploading);
        match self.upload_and_send(&clip, &author).await {
            Ok(message) => {
                self.reset(RecordingState::Idle);
                info!(id = %message.id, "Voice message sent");
                Ok(message)
            }
            Err(e) => {
                // Clip discarded; the failure must be acknowledged
                // before the next recording.
                self.reset(RecordingState::Failed);
                warn!(error = %e, "Voice message upload failed");
                Err(e)
            }
        }
    }

    /// Return a failed pipeline to idle. No-op in any other state.
    pub fn acknowledge_failure(&self) {
        let mut inner = self.lock();
        if inner.state == RecordingState::Failed {
            inner.reset(RecordingState::Idle);
            self.state_tx.send_replace(RecordingState::Idle);
            debug!("Recording failure acknowledged");
        }
    }

    async fn upload_and_send(
        &self,
        clip: &RecordedClip,
        author: &User,
    ) -> Result<Message, CauserieError> {
        let data = tokio::fs::read(&clip.path)
            .await
            .map_err(|e| UploadError::Read(e.to_string()))?;

        // Key is time-derived and keeps the clip's own extension.
        let extension = clip.extension().unwrap_or(self.preset.extension.as_str());
        let key = format!(
            "{}/{}.{}",
            AUDIO_KEY_PREFIX,
            Utc::now().timestamp_millis(),
            extension
        );

        self.blobs
            .put(&key, Bytes::from(data))
            .await
            .map_err(|e| UploadError::Store(e.to_string()))?;
        let url = self
            .blobs
            .download_url(&key)
            .await
            .map_err(|e| UploadError::Url(e.to_string()))?;
        debug!(key = %key, "Clip uploaded");

        // send() re-checks the session, so a sign-out during the upload
        // fails as stale instead of appending into a dead view.
        let message = self.sync.send(author, &url, MessageKind::Audio).await?;
        Ok(message)
    }

    fn set_state(&self, state: RecordingState) {
        self.lock().state = state;
        self.state_tx.send_replace(state);
    }

    fn reset(&self, state: RecordingState) {
        self.lock().reset(state);
        self.state_tx.send_replace(state);
    }

    fn lock(&self) -> MutexGuard<'_, PipelineInner<R::Capture>> {
        // Nothing panics while this lock is held.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};

    use tempfile::TempDir;
    use tokio::sync::watch;

    use causerie_shared::types::{Conversation, ConversationId, UserId};
    use causerie_shared::SendError;
    use causerie_store::{FsBlobStore, MemoryDocumentStore, StoreError};

    fn user(id: &str) -> User {
        User {
            id: UserId::new(id),
            display_name: None,
        }
    }

    struct Fixture {
        store: Arc<MemoryDocumentStore>,
        session_tx: watch::Sender<Option<User>>,
        conversation: ConversationId,
        _scratch: TempDir,
    }

    async fn pipeline_with_recorder(
        recorder: FakeRecorder,
    ) -> (
        RecordingPipeline<FakeRecorder, FsBlobStore, MemoryDocumentStore>,
        Fixture,
    ) {
        let scratch = TempDir::new().unwrap();
        let store = Arc::new(MemoryDocumentStore::new());
        let conversation = ConversationId::new("c1");
        store.seed(Conversation::new(conversation.clone()));

        let (session_tx, session_rx) = watch::channel(Some(user("u1")));
        let sync = Arc::new(ConversationSync::new(store.clone(), session_rx));
        sync.activate(conversation.clone()).expect("activate");

        let blobs = Arc::new(
            FsBlobStore::new(scratch.path().join("blobs"), 1024 * 1024)
                .await
                .unwrap(),
        );
        let pipeline = RecordingPipeline::new(Arc::new(recorder), blobs, sync);

        (
            pipeline,
            Fixture {
                store,
                session_tx,
                conversation,
                _scratch: scratch,
            },
        )
    }

    /// Recorder writing real clip files into a scratch directory, with
    /// switchable failure modes.
    struct FakeRecorder {
        dir: PathBuf,
        deny_permission: bool,
        fail_start: bool,
        fail_stop: AtomicBool,
        write_clip: bool,
    }

    impl FakeRecorder {
        fn ok(dir: &TempDir) -> Self {
            Self {
                dir: dir.path().join("clips"),
                deny_permission: false,
                fail_start: false,
                fail_stop: AtomicBool::new(false),
                write_clip: true,
            }
        }
    }

    impl AudioRecorder for FakeRecorder {
        type Capture = FakeCapture;

        async fn request_permission(&self) -> Result<(), MediaError> {
            if self.deny_permission {
                Err(MediaError::PermissionDenied)
            } else {
                Ok(())
            }
        }

        async fn start(&self, preset: &RecordingPreset) -> Result<FakeCapture, MediaError> {
            if self.fail_start {
                return Err(MediaError::NoInputDevice);
            }
            Ok(FakeCapture {
                path: self.dir.join(format!("clip.{}", preset.extension)),
                fail: self.fail_stop.load(Ordering::SeqCst),
                write_clip: self.write_clip,
            })
        }
    }

    struct FakeCapture {
        path: PathBuf,
        fail: bool,
        write_clip: bool,
    }

    impl CaptureHandle for FakeCapture {
        async fn stop(self) -> Result<RecordedClip, MediaError> {
            if self.fail {
                return Err(MediaError::Device("capture lost".to_string()));
            }
            if self.write_clip {
                tokio::fs::create_dir_all(self.path.parent().unwrap())
                    .await
                    .unwrap();
                tokio::fs::write(&self.path, b"clip-bytes").await.unwrap();
            }
            Ok(RecordedClip { path: self.path })
        }
    }

    #[tokio::test]
    async fn test_record_stop_upload_appends_one_audio_message() {
        let scratch = TempDir::new().unwrap();
        let (pipeline, fx) = pipeline_with_recorder(FakeRecorder::ok(&scratch)).await;

        pipeline.start(&user("u1")).await.expect("start");
        assert_eq!(pipeline.state(), RecordingState::Recording);
        assert!(pipeline.started_at().is_some());

        let message = pipeline.stop().await.expect("stop");
        assert_eq!(pipeline.state(), RecordingState::Idle);
        assert_eq!(message.kind, MessageKind::Audio);
        assert!(message.content.starts_with("file://"));
        assert!(message.content.ends_with(".m4a"));

        let conv = fx.store.conversation(&fx.conversation).unwrap();
        assert_eq!(conv.messages, vec![message]);
    }

    #[tokio::test]
    async fn test_start_while_active_is_rejected_without_side_effects() {
        let scratch = TempDir::new().unwrap();
        let (pipeline, _fx) = pipeline_with_recorder(FakeRecorder::ok(&scratch)).await;

        pipeline.start(&user("u1")).await.expect("start");
        let err = pipeline.start(&user("u1")).await.unwrap_err();
        assert_eq!(err, RecordingError::AlreadyActive);
        assert_eq!(pipeline.state(), RecordingState::Recording);
    }

    #[tokio::test]
    async fn test_permission_denied_returns_to_idle() {
        let scratch = TempDir::new().unwrap();
        let recorder = FakeRecorder {
            deny_permission: true,
            ..FakeRecorder::ok(&scratch)
        };
        let (pipeline, fx) = pipeline_with_recorder(recorder).await;

        let err = pipeline.start(&user("u1")).await.unwrap_err();
        assert_eq!(err, RecordingError::PermissionDenied);
        assert_eq!(pipeline.state(), RecordingState::Idle);
        assert!(fx.store.conversation(&fx.conversation).unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn test_device_start_failure_returns_to_idle() {
        let scratch = TempDir::new().unwrap();
        let recorder = FakeRecorder {
            fail_start: true,
            ..FakeRecorder::ok(&scratch)
        };
        let (pipeline, _fx) = pipeline_with_recorder(recorder).await;

        let err = pipeline.start(&user("u1")).await.unwrap_err();
        assert!(matches!(err, RecordingError::Device(_)));
        assert_eq!(pipeline.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn test_device_stop_failure_returns_to_idle() {
        let scratch = TempDir::new().unwrap();
        let recorder = FakeRecorder::ok(&scratch);
        recorder.fail_stop.store(true, Ordering::SeqCst);
        let (pipeline, fx) = pipeline_with_recorder(recorder).await;

        pipeline.start(&user("u1")).await.expect("start");
        let err = pipeline.stop().await.unwrap_err();
        assert!(matches!(
            err,
            CauserieError::Recording(RecordingError::Device(_))
        ));
        assert_eq!(pipeline.state(), RecordingState::Idle);
        assert!(fx.store.conversation(&fx.conversation).unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn test_stop_without_recording_is_rejected() {
        let scratch = TempDir::new().unwrap();
        let (pipeline, _fx) = pipeline_with_recorder(FakeRecorder::ok(&scratch)).await;

        let err = pipeline.stop().await.unwrap_err();
        assert!(matches!(
            err,
            CauserieError::Recording(RecordingError::NotRecording)
        ));
    }

    #[tokio::test]
    async fn test_upload_failure_fails_without_sending() {
        let scratch = TempDir::new().unwrap();
        // The capture "succeeds" but never writes the clip file, so the
        // upload read step fails.
        let recorder = FakeRecorder {
            write_clip: false,
            ..FakeRecorder::ok(&scratch)
        };
        let (pipeline, fx) = pipeline_with_recorder(recorder).await;

        pipeline.start(&user("u1")).await.expect("start");
        let err = pipeline.stop().await.unwrap_err();
        assert!(matches!(err, CauserieError::Upload(UploadError::Read(_))));
        assert_eq!(pipeline.state(), RecordingState::Failed);
        assert!(fx.store.conversation(&fx.conversation).unwrap().messages.is_empty());

        // A new start is refused until the failure is acknowledged.
        let err = pipeline.start(&user("u1")).await.unwrap_err();
        assert_eq!(err, RecordingError::Unacknowledged);

        pipeline.acknowledge_failure();
        assert_eq!(pipeline.state(), RecordingState::Idle);
        pipeline.start(&user("u1")).await.expect("start after ack");
    }

    #[tokio::test]
    async fn test_sign_out_during_upload_appends_nothing() {
        let scratch = TempDir::new().unwrap();
        let (pipeline, fx) = pipeline_with_recorder(FakeRecorder::ok(&scratch)).await;

        pipeline.start(&user("u1")).await.expect("start");
        // Sign-out lands between start and the upload completing.
        fx.session_tx.send_replace(None);

        let err = pipeline.stop().await.unwrap_err();
        assert!(matches!(err, CauserieError::Send(SendError::StaleSession)));
        assert_eq!(pipeline.state(), RecordingState::Failed);
        assert!(fx.store.conversation(&fx.conversation).unwrap().messages.is_empty());
    }

    /// Blob store whose writes always fail.
    struct FailingBlobs;

    impl BlobStore for FailingBlobs {
        async fn put(&self, _key: &str, _data: Bytes) -> Result<(), StoreError> {
            Err(StoreError::EmptyBlob)
        }

        async fn download_url(&self, key: &str) -> Result<String, StoreError> {
            Err(StoreError::BlobNotFound(key.to_string()))
        }
    }

    #[tokio::test]
    async fn test_blob_store_failure_fails_the_recording() {
        let scratch = TempDir::new().unwrap();
        let store = Arc::new(MemoryDocumentStore::new());
        let conversation = ConversationId::new("c1");
        store.seed(Conversation::new(conversation.clone()));

        let (_session_tx, session_rx) = watch::channel(Some(user("u1")));
        let sync = Arc::new(ConversationSync::new(store.clone(), session_rx));
        sync.activate(conversation.clone()).expect("activate");

        let pipeline = RecordingPipeline::new(
            Arc::new(FakeRecorder::ok(&scratch)),
            Arc::new(FailingBlobs),
            sync,
        );

        pipeline.start(&user("u1")).await.expect("start");
        let err = pipeline.stop().await.unwrap_err();
        assert!(matches!(err, CauserieError::Upload(UploadError::Store(_))));
        assert_eq!(pipeline.state(), RecordingState::Failed);
        assert!(store.conversation(&conversation).unwrap().messages.is_empty());
    }
}
