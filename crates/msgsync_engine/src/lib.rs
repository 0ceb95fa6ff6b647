//! # msgsync Engine
//!
//! Download and reconciliation engine for msgsync accounts.
//!
//! This crate provides:
//! - `DownloadOrchestrator`: replaces the local primary dataset with the
//!   remote one inside a single store transaction
//! - `MediaBackfill`: best-effort, resumable download of media blobs
//!   referenced by placeholder messages
//! - `DownloadService`: runs both phases on a dedicated thread
//! - Collaborator traits (`RemoteSyncClient`, `LocalStore`, `MediaBackend`,
//!   `CredentialContext`) with in-memory implementations
//!
//! ## Download order
//!
//! 1. Wipe local tables (inside the transaction)
//! 2. Messages (paginated)
//! 3. Conversations (whole-list retry on corruption)
//! 4. Blacklist, scheduled messages, drafts, contacts
//! 5. Commit, broadcast `DownloadEvent::Finished`
//! 6. Media backfill, outside any transaction
//!
//! ## Key Invariants
//!
//! - Readers see either the old primary dataset or the new one, never a mix
//! - A message is never dropped because it failed to decrypt
//! - A decrypt failure in blacklist, scheduled, draft or contact data rolls
//!   back the whole run
//! - The media phase never touches the committed primary dataset beyond
//!   rewriting placeholder message data

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod credentials;
mod download;
mod error;
mod http;
mod media;
mod policy;
mod progress;
mod service;
mod store;
mod transport;

pub use config::{DownloadConfig, DEFAULT_MESSAGE_PAGE_SIZE, NUM_MEDIA_TO_UPLOAD};
pub use credentials::{AccountPreferences, AccountSession, CredentialContext, PreferencesStore};
pub use download::{
    ContactImageResolver, DownloadOrchestrator, DownloadOutcome, NoContactImages, SyncSession,
};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpRemote};
pub use media::{
    within_media_window, MediaBackend, MediaBackfill, MediaOutcome, MediaSession,
    MemoryMediaBackend,
};
pub use policy::{Decrypted, FailurePolicy};
pub use progress::{
    DownloadEvent, DownloadEvents, NoopObserver, NotificationId, Progress, ProgressObserver,
    ProgressUpdate, RecordingObserver,
};
pub use service::{CancelHandle, DownloadService, ServiceReport};
pub use store::{transaction, LocalStore, MemoryStore};
pub use transport::{ListCall, MemoryRemote, RemoteSyncClient};
