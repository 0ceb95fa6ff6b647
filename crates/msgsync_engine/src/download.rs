//! Primary phase: replace the local dataset with the remote one.

use crate::config::DownloadConfig;
use crate::credentials::CredentialContext;
use crate::error::{SyncError, SyncResult};
use crate::policy::{Decrypted, FailurePolicy};
use crate::progress::{
    DownloadEvent, DownloadEvents, NoopObserver, NotificationId, Progress, ProgressObserver,
};
use crate::service::CancelHandle;
use crate::store::{transaction, LocalStore};
use crate::transport::RemoteSyncClient;
use msgsync_crypto::Decryptor;
use msgsync_model::{
    Blacklist, Contact, Conversation, Draft, EntityKind, Message, Record, ScheduledMessage,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Suffix appended to a resolved contact image URI.
const PHOTO_SUFFIX: &str = "/photo";

/// Looks up local contact photos for conversation enrichment.
pub trait ContactImageResolver: Send + Sync {
    /// Finds a contact image URI for the given participant numbers.
    fn find_image_uri(&self, phone_numbers: &[&str]) -> Option<String>;

    /// Returns true if an image actually exists behind `uri`.
    fn has_image(&self, uri: &str) -> bool;
}

/// Resolver for hosts without a contact database.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoContactImages;

impl ContactImageResolver for NoContactImages {
    fn find_image_uri(&self, _phone_numbers: &[&str]) -> Option<String> {
        None
    }

    fn has_image(&self, _uri: &str) -> bool {
        false
    }
}

/// Per-run bookkeeping. Created at the start of a run and consumed by it.
#[derive(Debug, Clone)]
pub struct SyncSession {
    account_id: String,
    inserted: BTreeMap<EntityKind, usize>,
    message_pages: u32,
    message_offset: u64,
    messages_kept_raw: usize,
    conversations_skipped: usize,
    conversation_retried: bool,
    conversation_ids: BTreeSet<i64>,
}

impl SyncSession {
    /// Creates the session for one run.
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            inserted: BTreeMap::new(),
            message_pages: 0,
            message_offset: 0,
            messages_kept_raw: 0,
            conversations_skipped: 0,
            conversation_retried: false,
            conversation_ids: BTreeSet::new(),
        }
    }

    /// Account being downloaded.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Offset of the next message page.
    pub fn message_offset(&self) -> u64 {
        self.message_offset
    }

    fn add(&mut self, kind: EntityKind, count: usize) {
        *self.inserted.entry(kind).or_insert(0) += count;
    }

    /// Records a stored conversation. Upserts of the same id count once.
    fn add_conversation(&mut self, id: i64) {
        self.conversation_ids.insert(id);
        self.inserted
            .insert(EntityKind::Conversation, self.conversation_ids.len());
    }

    fn into_outcome(self, duration: Duration) -> DownloadOutcome {
        DownloadOutcome {
            inserted: self.inserted,
            message_pages: self.message_pages,
            messages_kept_raw: self.messages_kept_raw,
            conversations_skipped: self.conversations_skipped,
            conversation_retried: self.conversation_retried,
            duration,
        }
    }
}

/// Result of a committed download run.
#[derive(Debug, Clone, Default)]
pub struct DownloadOutcome {
    /// Rows inserted per entity type.
    ///
    /// Conversations count distinct ids in the store, so a row kept from
    /// the first pass is counted even if its retry copy was skipped.
    pub inserted: BTreeMap<EntityKind, usize>,
    /// Message list calls issued, including a terminating empty page.
    pub message_pages: u32,
    /// Messages stored with their original ciphertext.
    pub messages_kept_raw: usize,
    /// Conversations that failed the retry and have no row in the store.
    ///
    /// A retry failure for an id stored by the first pass keeps that row
    /// and is not counted here.
    pub conversations_skipped: usize,
    /// Whether the conversation list was fetched a second time.
    pub conversation_retried: bool,
    /// Wall time of the primary phase.
    pub duration: Duration,
}

impl DownloadOutcome {
    /// Rows inserted for one entity type.
    pub fn inserted(&self, kind: EntityKind) -> usize {
        self.inserted.get(&kind).copied().unwrap_or(0)
    }
}

/// Drives the primary phase.
///
/// Callers must not run an upload against the same store concurrently.
pub struct DownloadOrchestrator<R: RemoteSyncClient, S: LocalStore> {
    config: DownloadConfig,
    remote: Arc<R>,
    store: Arc<S>,
    images: Arc<dyn ContactImageResolver>,
    observer: Arc<dyn ProgressObserver>,
    events: DownloadEvents,
    cancel: CancelHandle,
}

impl<R: RemoteSyncClient, S: LocalStore> DownloadOrchestrator<R, S> {
    /// Creates an orchestrator.
    pub fn new(config: DownloadConfig, remote: Arc<R>, store: Arc<S>) -> Self {
        Self {
            config,
            remote,
            store,
            images: Arc::new(NoContactImages),
            observer: Arc::new(NoopObserver),
            events: DownloadEvents::default(),
            cancel: CancelHandle::new(),
        }
    }

    /// Sets the contact image resolver.
    pub fn with_image_resolver(mut self, images: Arc<dyn ContactImageResolver>) -> Self {
        self.images = images;
        self
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

    /// Returns the configuration.
    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Returns the event channel.
    pub fn events(&self) -> &DownloadEvents {
        &self.events
    }

    /// Replaces the local primary dataset with the remote one.
    ///
    /// Everything between the wipe and the last contact insert happens in
    /// one store transaction: on `Err` the store still holds its previous
    /// dataset. On `Ok` the new dataset is committed and
    /// [`DownloadEvent::Finished`] has been broadcast.
    pub fn run_download(&self, credentials: &dyn CredentialContext) -> SyncResult<DownloadOutcome> {
        let decryptor = credentials.decryptor().ok_or(SyncError::NoCredential)?;
        let start = Instant::now();
        let mut session = SyncSession::new(credentials.account_id());

        let notification = NotificationId::MessageDownload;
        self.observer
            .notify(notification, notification.description(), Progress::Indeterminate);

        self.store.set_upload_enabled(false);
        let result = transaction(self.store.as_ref(), |store| {
            self.download_all(store, decryptor.as_ref(), &mut session)
        });
        self.store.set_upload_enabled(true);
        self.observer.cancel(notification);

        match result {
            Ok(()) => {
                let outcome = session.into_outcome(start.elapsed());
                info!(
                    elapsed_ms = outcome.duration.as_millis() as u64,
                    messages = outcome.inserted(EntityKind::Message),
                    conversations = outcome.inserted(EntityKind::Conversation),
                    "download committed"
                );
                self.events.emit(DownloadEvent::Finished);
                Ok(outcome)
            }
            Err(e) => {
                warn!(
                    account = %session.account_id,
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "download rolled back"
                );
                Err(e)
            }
        }
    }

    fn download_all(
        &self,
        store: &S,
        decryptor: &dyn Decryptor,
        session: &mut SyncSession,
    ) -> SyncResult<()> {
        self.cancel.check()?;
        store.clear_all()?;

        self.cancel.check()?;
        self.download_messages(store, decryptor, session)?;

        self.cancel.check()?;
        self.download_conversations(store, decryptor, session)?;

        self.cancel.check()?;
        let blacklists = self.remote.list_blacklists(&session.account_id)?;
        self.download_each(blacklists, decryptor, session, |b: &Blacklist| {
            store.insert_blacklist(b)
        })?;

        self.cancel.check()?;
        let scheduled = self.remote.list_scheduled_messages(&session.account_id)?;
        self.download_each(scheduled, decryptor, session, |m: &ScheduledMessage| {
            store.insert_scheduled_message(m)
        })?;

        self.cancel.check()?;
        let drafts = self.remote.list_drafts(&session.account_id)?;
        self.download_each(drafts, decryptor, session, |d: &Draft| store.insert_draft(d))?;

        self.cancel.check()?;
        self.download_contacts(store, decryptor, session)
    }

    /// Fetches message pages until a page leaves the running total off a
    /// page-size multiple, then inserts everything at once.
    fn download_messages(
        &self,
        store: &S,
        decryptor: &dyn Decryptor,
        session: &mut SyncSession,
    ) -> SyncResult<()> {
        let start = Instant::now();
        let page_size = self.config.message_page_size.max(1);
        let policy = FailurePolicy::for_kind(EntityKind::Message);
        let mut messages: Vec<Message> = Vec::new();

        loop {
            let page = self.remote.list_messages(
                &session.account_id,
                None,
                Some(page_size),
                Some(session.message_offset),
            )?;
            session.message_pages += 1;

            if page.is_empty() {
                break;
            }

            for body in page {
                match policy.apply(Message::from(body), decryptor)? {
                    Decrypted::Plain(message) => messages.push(message),
                    Decrypted::Raw(message) => {
                        session.messages_kept_raw += 1;
                        messages.push(message);
                    }
                    Decrypted::Skipped { .. } => {}
                }
            }
            session.message_offset = messages.len() as u64;

            debug!(
                downloaded = messages.len(),
                pages = session.message_pages,
                "message page downloaded"
            );

            // An exact multiple fetches one more (possibly empty) page.
            if messages.len() % page_size as usize != 0 {
                break;
            }
        }

        if messages.is_empty() {
            info!("no messages to insert");
            return Ok(());
        }

        store.insert_messages(&messages)?;
        session.add(EntityKind::Message, messages.len());
        info!(
            entity = %EntityKind::Message,
            count = messages.len(),
            pages = session.message_pages,
            kept_raw = session.messages_kept_raw,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "inserted"
        );
        Ok(())
    }

    /// Inserts conversations one at a time. The first decrypt failure
    /// abandons the pass and hands over to [`Self::retry_conversations`].
    fn download_conversations(
        &self,
        store: &S,
        decryptor: &dyn Decryptor,
        session: &mut SyncSession,
    ) -> SyncResult<()> {
        let start = Instant::now();
        let conversations = self.remote.list_conversations(&session.account_id)?;

        for body in conversations {
            let conversation = Conversation::from(body);
            let plain = match conversation.decrypt(decryptor) {
                Ok(plain) => plain,
                Err(e) => {
                    warn!(
                        id = conversation.id,
                        error = %e,
                        "decryption error while downloading conversations, retrying"
                    );
                    return self.retry_conversations(store, decryptor, session);
                }
            };

            let id = plain.id;
            store.insert_conversation(&self.enrich(plain))?;
            session.add_conversation(id);
        }

        info!(
            entity = %EntityKind::Conversation,
            count = session.conversation_ids.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "inserted"
        );
        Ok(())
    }

    /// Re-fetches the whole conversation list once; every record gets its
    /// own failure boundary and failures are skipped.
    fn retry_conversations(
        &self,
        store: &S,
        decryptor: &dyn Decryptor,
        session: &mut SyncSession,
    ) -> SyncResult<()> {
        let start = Instant::now();
        session.conversation_retried = true;

        let conversations = self.remote.list_conversations(&session.account_id)?;
        let policy = FailurePolicy::for_kind(EntityKind::Conversation);

        for body in conversations {
            let conversation = Conversation::from(body);
            let id = conversation.id;
            let inserted = policy
                .apply(conversation, decryptor)
                .and_then(|decrypted| match decrypted.into_record() {
                    Some(plain) => store.insert_conversation(&self.enrich(plain)).map(|_| true),
                    None => Ok(false),
                });

            let stored = inserted.unwrap_or_else(|e| {
                warn!(id, error = %e, "error inserting conversation, skipping");
                false
            });
            if stored {
                session.add_conversation(id);
            } else if session.conversation_ids.contains(&id) {
                debug!(id, "keeping conversation stored by the first pass");
            } else {
                session.conversations_skipped += 1;
            }
        }

        info!(
            entity = %EntityKind::Conversation,
            count = session.conversation_ids.len(),
            skipped = session.conversations_skipped,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "inserted after retry"
        );
        Ok(())
    }

    fn enrich(&self, mut conversation: Conversation) -> Conversation {
        let uri = self.images.find_image_uri(&conversation.participants());
        conversation.image_uri = match uri {
            Some(uri) if self.images.has_image(&uri) => Some(format!("{uri}{PHOTO_SUFFIX}")),
            _ => None,
        };
        conversation
    }

    /// Decrypts and inserts records one by one; any failure aborts the run.
    fn download_each<T, B>(
        &self,
        bodies: Vec<B>,
        decryptor: &dyn Decryptor,
        session: &mut SyncSession,
        mut insert: impl FnMut(&T) -> SyncResult<()>,
    ) -> SyncResult<()>
    where
        T: Record + From<B>,
    {
        let start = Instant::now();
        let policy = FailurePolicy::for_kind(T::KIND);
        let mut count = 0;

        for body in bodies {
            if let Some(record) = policy.apply(T::from(body), decryptor)?.into_record() {
                insert(&record)?;
                count += 1;
            }
        }

        session.add(T::KIND, count);
        info!(
            entity = %T::KIND,
            count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "inserted"
        );
        Ok(())
    }

    /// Decrypts every contact, then inserts them as one batch.
    fn download_contacts(
        &self,
        store: &S,
        decryptor: &dyn Decryptor,
        session: &mut SyncSession,
    ) -> SyncResult<()> {
        let start = Instant::now();
        let policy = FailurePolicy::for_kind(EntityKind::Contact);
        let bodies = self.remote.list_contacts(&session.account_id)?;

        let mut contacts = Vec::with_capacity(bodies.len());
        for body in bodies {
            if let Some(contact) = policy.apply(Contact::from(body), decryptor)?.into_record() {
                contacts.push(contact);
            }
        }

        store.insert_contacts(&contacts)?;
        session.add(EntityKind::Contact, contacts.len());
        info!(
            entity = %EntityKind::Contact,
            count = contacts.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "inserted"
        );
        Ok(())
    }
}
