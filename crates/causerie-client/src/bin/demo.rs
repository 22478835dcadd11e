//! Local end-to-end demo of the chat core.
//!
//! Runs the whole pipeline over the in-process backends: LocalAuth for
//! sessions, MemoryDocumentStore for the conversation, FsBlobStore for
//! uploaded clips, and the loopback audio devices. Useful for poking at
//! the core without any managed backend.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use causerie_client::{ChatClient, LocalAuth, SyncStatus};
use causerie_media::stub::{StubOutput, StubRecorder};
use causerie_shared::constants::{MAX_AUDIO_BLOB_SIZE, PRIMARY_CONVERSATION_ID};
use causerie_shared::types::{Conversation, ConversationId};
use causerie_store::{FsBlobStore, MemoryDocumentStore};

/// Demo configuration loaded from environment variables.
///
/// All settings have defaults so the demo runs with zero configuration.
#[derive(Debug, Clone)]
struct DemoConfig {
    /// Filesystem path for uploaded clips.
    /// Env: `BLOB_STORAGE_PATH`
    /// Default: `./blobs`
    blob_storage_path: PathBuf,

    /// Conversation document id.
    /// Env: `CONVERSATION_ID`
    conversation_id: String,

    /// Seeded demo account.
    /// Env: `DEMO_EMAIL` / `DEMO_PASSWORD`
    email: String,
    password: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            blob_storage_path: PathBuf::from("./blobs"),
            conversation_id: PRIMARY_CONVERSATION_ID.to_string(),
            email: "jean.marie@causerie.example".to_string(),
            password: "changemoi".to_string(),
        }
    }
}

impl DemoConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("BLOB_STORAGE_PATH") {
            config.blob_storage_path = PathBuf::from(path);
        }
        if let Ok(id) = std::env::var("CONVERSATION_ID") {
            config.conversation_id = id;
        }
        if let Ok(email) = std::env::var("DEMO_EMAIL") {
            config.email = email;
        }
        if let Ok(password) = std::env::var("DEMO_PASSWORD") {
            config.password = password;
        }

        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,causerie_client=debug")),
        )
        .init();

    info!("Starting Causerie demo v{}", env!("CARGO_PKG_VERSION"));

    let config = DemoConfig::from_env();
    info!(?config, "Loaded configuration");

    // In-process backends.
    let auth = Arc::new(LocalAuth::new().with_account(&config.email, &config.password, "Jean-Marie"));
    let store = Arc::new(MemoryDocumentStore::new());
    let conversation = ConversationId::new(config.conversation_id.clone());
    store.seed(Conversation::new(conversation.clone()));
    let blobs = Arc::new(
        FsBlobStore::new(config.blob_storage_path.clone(), MAX_AUDIO_BLOB_SIZE).await?,
    );
    let recorder = Arc::new(StubRecorder::new(config.blob_storage_path.join("scratch")));

    let client = Arc::new(ChatClient::new(
        auth,
        store,
        blobs,
        recorder,
        Arc::new(StubOutput),
        conversation,
    ));
    let runner = {
        let client = client.clone();
        tokio::spawn(async move { client.run().await })
    };

    // Sign in and wait for the conversation subscription to come up.
    let user = client.login(&config.email, &config.password).await?;
    info!(user = %user.id, "Signed in");

    let mut status = client.watch_sync_status();
    while !matches!(&*status.borrow_and_update(), SyncStatus::Active(_)) {
        status.changed().await?;
    }

    // One text message, one voice message.
    client.send_text("Salut !").await?;
    client.start_recording().await?;
    let voice = client.stop_recording().await?;
    info!(url = %voice.content, "Voice message uploaded");

    // Both arrive through the subscription, not a local splice.
    let mut view = client.watch_messages();
    while view.borrow_and_update().len() < 2 {
        view.changed().await?;
    }
    println!("{}", serde_json::to_string_pretty(&client.messages())?);

    client.play(&voice).await?;

    client.logout().await;
    let mut view = client.watch_messages();
    while !view.borrow_and_update().is_empty() {
        view.changed().await?;
    }
    info!("Signed out, view cleared");

    client.shutdown().await;
    runner.abort();
    Ok(())
}
