//! # causerie-store
//!
//! Storage contracts consumed by the client core, plus in-process
//! backends for tests and local development.
//!
//! The [`DocumentStore`] delivers full conversation snapshots on every
//! change and appends with array-union semantics; the [`BlobStore`] holds
//! binary payloads under caller-supplied keys and resolves download URLs.
//! A managed remote backend implements the same traits against its own
//! SDK; nothing in the core depends on which side of the network the
//! store lives on.

pub mod blobs;
pub mod document;
pub mod memory;

mod error;

pub use blobs::{BlobStore, FsBlobStore};
pub use document::{DocumentEvent, DocumentStore, Subscription, SubscriptionGuard};
pub use error::StoreError;
pub use memory::MemoryDocumentStore;
