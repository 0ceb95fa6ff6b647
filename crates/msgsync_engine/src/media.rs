//! Media backfill: the best-effort phase after the primary commit.
//!
//! Placeholder messages (`"firebase <sequence>"`) point at encrypted blobs
//! on the media backend. Only the trailing window of sequences is still
//! held there, so older placeholders are left alone. Every resolved file
//! rewrites its message to a `file://` URI, which makes the phase
//! resumable: a later run only sees what is still unresolved.

use crate::config::DownloadConfig;
use crate::credentials::CredentialContext;
use crate::error::{SyncError, SyncResult};
use crate::progress::{
    DownloadEvent, DownloadEvents, NoopObserver, NotificationId, Progress, ProgressObserver,
};
use crate::service::CancelHandle;
use crate::store::LocalStore;
use msgsync_crypto::Decryptor;
use msgsync_model::{extension_for, parse_placeholder, EntityKind, Message};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// An authenticated media backend session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSession {
    /// Anonymous user id granted by the backend.
    pub user_id: String,
    /// Root folder of the account's blobs.
    pub folder: String,
}

/// Blob storage holding encrypted media.
pub trait MediaBackend: Send + Sync {
    /// Signs in anonymously.
    fn authenticate(&self) -> SyncResult<MediaSession>;

    /// Records the account's folder for the session. Idempotent.
    fn save_folder_ref(&self, session: &MediaSession, account_id: &str) -> SyncResult<()>;

    /// Streams the ciphertext of blob `blob_id` into `sink`.
    ///
    /// Returns the number of bytes written.
    fn fetch(&self, session: &MediaSession, blob_id: i64, sink: &mut dyn Write) -> SyncResult<u64>;
}

/// Returns true if placeholder `sequence` is still held by the backend.
///
/// Sequences older than the trailing `window` of `total` placeholders are
/// skipped, except sequence zero which is always fetched.
pub fn within_media_window(sequence: i64, total: usize, window: u32) -> bool {
    let threshold = total as i64 - i64::from(window);
    !(sequence < threshold && sequence != 0)
}

/// Summary of one media phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaOutcome {
    /// Whether authentication succeeded.
    pub authenticated: bool,
    /// Placeholder messages found.
    pub total_candidates: usize,
    /// Files written and messages rewritten.
    pub fetched: usize,
    /// Placeholders left unresolved on purpose (outside the window or unparseable).
    pub skipped: usize,
    /// The error that stopped the phase early, if any.
    pub aborted: Option<String>,
}

impl MediaOutcome {
    fn unauthenticated(reason: &SyncError) -> Self {
        Self {
            aborted: Some(reason.to_string()),
            ..Self::default()
        }
    }
}

/// Runs the media phase against a store and a backend.
pub struct MediaBackfill<S: LocalStore, M: MediaBackend> {
    config: DownloadConfig,
    store: Arc<S>,
    backend: Arc<M>,
    observer: Arc<dyn ProgressObserver>,
    events: DownloadEvents,
    cancel: CancelHandle,
}

impl<S: LocalStore, M: MediaBackend> MediaBackfill<S, M> {
    /// Creates a backfill.
    pub fn new(config: DownloadConfig, store: Arc<S>, backend: Arc<M>) -> Self {
        Self {
            config,
            store,
            backend,
            observer: Arc::new(NoopObserver),
            events: DownloadEvents::default(),
            cancel: CancelHandle::new(),
        }
    }

    /// Sets the progress observer.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Sets the event channel.
    pub fn with_events(mut self, events: DownloadEvents) -> Self {
        self.events = events;
        self
    }

    /// Sets the cancellation handle.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Both stages back to back.
    pub fn run(&self, credentials: &dyn CredentialContext) -> MediaOutcome {
        match self.authenticate() {
            Ok(session) => self.backfill(&session, credentials),
            Err(e) => MediaOutcome::unauthenticated(&e),
        }
    }

    /// Stage 1: shows the media notification and signs in.
    ///
    /// On failure the notification is released and
    /// [`DownloadEvent::MediaFinished`] is broadcast; stage 2 must not run.
    pub fn authenticate(&self) -> SyncResult<MediaSession> {
        let notification = NotificationId::MediaDownload;
        self.observer
            .notify(notification, notification.description(), Progress::Indeterminate);

        match self.backend.authenticate() {
            Ok(session) => {
                debug!(user = %session.user_id, "media backend authenticated");
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "media authentication failed");
                self.finish();
                Err(e)
            }
        }
    }

    /// Stage 2: fetches every in-window placeholder.
    ///
    /// The first fetch, decrypt or write error stops the phase; files
    /// already written stay written. Always releases the notification and
    /// broadcasts [`DownloadEvent::MediaFinished`].
    pub fn backfill(
        &self,
        session: &MediaSession,
        credentials: &dyn CredentialContext,
    ) -> MediaOutcome {
        let start = Instant::now();
        let mut outcome = MediaOutcome {
            authenticated: true,
            ..MediaOutcome::default()
        };

        if let Err(e) = self.resolve_placeholders(session, credentials, &mut outcome) {
            warn!(
                error = %e,
                fetched = outcome.fetched,
                "media download stopped early"
            );
            outcome.aborted = Some(e.to_string());
        }

        info!(
            candidates = outcome.total_candidates,
            fetched = outcome.fetched,
            skipped = outcome.skipped,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "media phase finished"
        );
        self.finish();
        outcome
    }

    fn resolve_placeholders(
        &self,
        session: &MediaSession,
        credentials: &dyn CredentialContext,
        outcome: &mut MediaOutcome,
    ) -> SyncResult<()> {
        let decryptor = credentials.decryptor().ok_or(SyncError::NoCredential)?;
        fs::create_dir_all(&self.config.files_dir)?;

        if let Err(e) = self.backend.save_folder_ref(session, credentials.account_id()) {
            warn!(error = %e, "could not save media folder reference");
        }

        let placeholders = self.store.placeholder_messages()?;
        let total = placeholders.len();
        outcome.total_candidates = total;

        let notification = NotificationId::MediaDownload;
        for (position, message) in placeholders.iter().enumerate() {
            self.cancel.check()?;

            let data = message.data.as_deref().unwrap_or_default();
            let sequence = match parse_placeholder(data) {
                Ok(sequence) => sequence,
                Err(e) => {
                    warn!(id = message.id, error = %e, "unreadable media placeholder");
                    outcome.skipped += 1;
                    continue;
                }
            };

            if !within_media_window(sequence, total, self.config.media_window) {
                debug!(id = message.id, sequence, "media no longer held remotely");
                outcome.skipped += 1;
                continue;
            }

            let path = self.file_path(message);
            self.fetch_to_file(session, message.id, decryptor.as_ref(), &path)?;
            self.store
                .update_message_data(message.id, &file_uri(&path))?;
            outcome.fetched += 1;

            self.observer.notify(
                notification,
                notification.description(),
                Progress::Determinate {
                    current: position + 1,
                    total,
                },
            );
        }
        Ok(())
    }

    fn fetch_to_file(
        &self,
        session: &MediaSession,
        id: i64,
        decryptor: &dyn Decryptor,
        path: &Path,
    ) -> SyncResult<()> {
        let mut ciphertext = Vec::new();
        self.backend.fetch(session, id, &mut ciphertext)?;

        let plaintext = decryptor
            .decrypt_bytes(&ciphertext)
            .map_err(|e| SyncError::decryption(EntityKind::Message, id, e))?;
        fs::write(path, plaintext)?;

        debug!(id, path = %path.display(), "media file written");
        Ok(())
    }

    fn file_path(&self, message: &Message) -> PathBuf {
        let extension = extension_for(message.mime_type.as_deref().unwrap_or_default());
        self.config
            .files_dir
            .join(format!("{}{}", message.id, extension))
    }

    /// Ends an authenticated phase without running stage 2.
    ///
    /// Releases the media notification and broadcasts
    /// [`DownloadEvent::MediaFinished`], like a completed backfill.
    pub fn abandon(&self) {
        info!("media phase abandoned before backfill");
        self.finish();
    }

    fn finish(&self) {
        self.observer.cancel(NotificationId::MediaDownload);
        self.events.emit(DownloadEvent::MediaFinished);
    }
}

fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// An in-memory [`MediaBackend`] for testing.
#[derive(Default)]
pub struct MemoryMediaBackend {
    blobs: Mutex<HashMap<i64, Vec<u8>>>,
    failing: Mutex<HashSet<i64>>,
    fail_auth: AtomicBool,
    fetches: Mutex<Vec<i64>>,
    folder_refs: Mutex<Vec<String>>,
}

impl MemoryMediaBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an encrypted blob.
    pub fn put_blob(&self, blob_id: i64, ciphertext: Vec<u8>) {
        self.blobs.lock().insert(blob_id, ciphertext);
    }

    /// Makes authentication fail.
    pub fn fail_authentication(&self) {
        self.fail_auth.store(true, Ordering::SeqCst);
    }

    /// Makes fetching `blob_id` fail.
    pub fn fail_fetch(&self, blob_id: i64) {
        self.failing.lock().insert(blob_id);
    }

    /// Blob ids requested, in order.
    pub fn fetches(&self) -> Vec<i64> {
        self.fetches.lock().clone()
    }

    /// Account ids passed to `save_folder_ref`.
    pub fn folder_refs(&self) -> Vec<String> {
        self.folder_refs.lock().clone()
    }
}

impl MediaBackend for MemoryMediaBackend {
    fn authenticate(&self) -> SyncResult<MediaSession> {
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(SyncError::Authentication("anonymous sign-in refused".into()));
        }
        Ok(MediaSession {
            user_id: "anonymous".into(),
            folder: "media".into(),
        })
    }

    fn save_folder_ref(&self, _session: &MediaSession, account_id: &str) -> SyncResult<()> {
        let mut refs = self.folder_refs.lock();
        if !refs.iter().any(|r| r == account_id) {
            refs.push(account_id.to_string());
        }
        Ok(())
    }

    fn fetch(
        &self,
        _session: &MediaSession,
        blob_id: i64,
        sink: &mut dyn Write,
    ) -> SyncResult<u64> {
        self.fetches.lock().push(blob_id);
        if self.failing.lock().contains(&blob_id) {
            return Err(SyncError::transport_retryable(format!("blob {blob_id} unavailable")));
        }
        let blobs = self.blobs.lock();
        let blob = blobs
            .get(&blob_id)
            .ok_or_else(|| SyncError::transport_fatal(format!("blob {blob_id} not found")))?;
        sink.write_all(blob)?;
        Ok(blob.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::AccountSession;
    use crate::progress::RecordingObserver;
    use crate::store::MemoryStore;
    use msgsync_crypto::{AesCipher, EncryptionKey};
    use msgsync_model::placeholder;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        cipher: Arc<AesCipher>,
        store: Arc<MemoryStore>,
        backend: Arc<MemoryMediaBackend>,
        observer: Arc<RecordingObserver>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                cipher: Arc::new(AesCipher::new(&EncryptionKey::generate())),
                store: Arc::new(MemoryStore::new()),
                backend: Arc::new(MemoryMediaBackend::new()),
                observer: Arc::new(RecordingObserver::new()),
            }
        }

        fn session(&self) -> AccountSession {
            AccountSession::with_decryptor("acct", self.cipher.clone())
        }

        fn backfill(&self, window: u32) -> MediaBackfill<MemoryStore, MemoryMediaBackend> {
            let config =
                DownloadConfig::new(self.dir.path().join("files")).with_media_window(window);
            MediaBackfill::new(config, Arc::clone(&self.store), Arc::clone(&self.backend))
                .with_observer(self.observer.clone())
        }

        /// Inserts placeholders for sequences `0..count` with ids `100 + seq`.
        fn placeholders(&self, count: i64) {
            let messages: Vec<Message> = (0..count)
                .map(|seq| Message {
                    id: 100 + seq,
                    conversation_id: 1,
                    message_type: 0,
                    data: Some(placeholder(seq)),
                    timestamp: seq,
                    mime_type: Some("image/png".into()),
                    read: true,
                    seen: true,
                    from: None,
                    color: None,
                })
                .collect();
            self.store.insert_messages(&messages).unwrap();
            for message in &messages {
                let blob = self.cipher.encrypt(format!("png {}", message.id).as_bytes()).unwrap();
                self.backend.put_blob(message.id, blob);
            }
        }
    }

    #[test]
    fn window_boundaries() {
        // 30 placeholders, window 20: threshold 10
        assert!(within_media_window(0, 30, 20));
        assert!(!within_media_window(1, 30, 20));
        assert!(!within_media_window(9, 30, 20));
        assert!(within_media_window(10, 30, 20));
        assert!(within_media_window(29, 30, 20));
        // fewer placeholders than the window
        assert!(within_media_window(3, 5, 20));
    }

    #[test]
    fn fetches_window_and_rewrites_messages() {
        let fx = Fixture::new();
        fx.placeholders(5);

        let outcome = fx.backfill(3).run(&fx.session());

        // threshold 2: sequence 1 is skipped
        assert_eq!(outcome.total_candidates, 5);
        assert_eq!(outcome.fetched, 4);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.aborted, None);
        assert_eq!(fx.backend.fetches(), vec![100, 102, 103, 104]);
        assert_eq!(fx.backend.folder_refs(), vec!["acct".to_string()]);

        let path = fx.dir.path().join("files").join("102.png");
        assert_eq!(fs::read(&path).unwrap(), b"png 102");
        assert_eq!(
            fx.store.message(102).unwrap().data,
            Some(format!("file://{}", path.display()))
        );
        assert!(fx.store.message(101).unwrap().is_media_placeholder());
        assert_eq!(
            fx.observer.progress_for(NotificationId::MediaDownload),
            vec![(1, 5), (3, 5), (4, 5), (5, 5)]
        );
        assert!(fx.observer.is_released(NotificationId::MediaDownload));
    }

    #[test]
    fn second_run_fetches_nothing() {
        let fx = Fixture::new();
        fx.placeholders(4);
        let backfill = fx.backfill(20);

        assert_eq!(backfill.run(&fx.session()).fetched, 4);
        let again = backfill.run(&fx.session());

        assert_eq!(again.total_candidates, 0);
        assert_eq!(fx.backend.fetches().len(), 4);
    }

    #[test]
    fn auth_failure_releases_notification() {
        let fx = Fixture::new();
        fx.placeholders(2);
        fx.backend.fail_authentication();
        let backfill = fx.backfill(20);
        let mut events = backfill.events.subscribe();

        let outcome = backfill.run(&fx.session());

        assert!(!outcome.authenticated);
        assert!(outcome.aborted.is_some());
        assert!(fx.backend.fetches().is_empty());
        assert!(fx.observer.is_released(NotificationId::MediaDownload));
        assert_eq!(events.try_recv().unwrap(), DownloadEvent::MediaFinished);
    }

    #[test]
    fn abandon_after_authentication_releases_notification() {
        let fx = Fixture::new();
        fx.placeholders(2);
        let backfill = fx.backfill(20);
        let mut events = backfill.events.subscribe();

        backfill.authenticate().unwrap();
        backfill.abandon();

        assert!(fx.backend.fetches().is_empty());
        assert!(fx.backend.folder_refs().is_empty());
        assert_eq!(fx.store.placeholder_messages().unwrap().len(), 2);
        assert!(fx.observer.is_released(NotificationId::MediaDownload));
        assert_eq!(events.try_recv().unwrap(), DownloadEvent::MediaFinished);
    }

    #[test]
    fn first_fetch_error_stops_the_phase() {
        let fx = Fixture::new();
        fx.placeholders(4);
        fx.backend.fail_fetch(101);

        let outcome = fx.backfill(20).run(&fx.session());

        assert_eq!(outcome.fetched, 1);
        assert!(outcome.aborted.is_some());
        assert_eq!(fx.backend.fetches(), vec![100, 101]);
        assert!(fx.store.message(102).unwrap().is_media_placeholder());
        assert!(fx.observer.is_released(NotificationId::MediaDownload));
    }

    #[test]
    fn undecryptable_blob_stops_the_phase() {
        let fx = Fixture::new();
        fx.placeholders(2);
        fx.backend.put_blob(100, b"not encrypted".to_vec());

        let outcome = fx.backfill(20).run(&fx.session());

        assert_eq!(outcome.fetched, 0);
        assert!(outcome.aborted.unwrap().contains("decrypt"));
        assert!(!fx.dir.path().join("files").join("100.png").exists());
    }

    #[test]
    fn unparseable_marker_is_skipped() {
        let fx = Fixture::new();
        fx.placeholders(1);
        fx.store
            .update_message_data(100, "firebase not-a-number")
            .unwrap();

        let outcome = fx.backfill(20).run(&fx.session());

        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.fetched, 0);
        assert_eq!(outcome.aborted, None);
    }

    #[test]
    fn unknown_mime_type_has_no_extension() {
        let fx = Fixture::new();
        fx.placeholders(1);
        let mut message = fx.store.message(100).unwrap();
        message.mime_type = Some("application/x-unknown".into());
        fx.store.insert_messages(&[message]).unwrap();

        fx.backfill(20).run(&fx.session());

        assert!(fx.dir.path().join("files").join("100").exists());
    }
}
