//! Integration tests for the download engine.

use msgsync_engine::{
    AccountPreferences, AccountSession, DownloadConfig, DownloadEvent, DownloadOrchestrator,
    DownloadService, HttpClient, HttpRemote, MediaBackfill, MemoryMediaBackend, MemoryRemote,
    MemoryStore, NotificationId, PreferencesStore, RecordingObserver, SyncError,
};
use msgsync_model::{EntityKind, MessageBody};
use msgsync_testkit::prelude::*;
use std::sync::Arc;

struct Harness {
    account: TestAccount,
    dir: TestDir,
    remote: Arc<MemoryRemote>,
    store: Arc<MemoryStore>,
    backend: Arc<MemoryMediaBackend>,
}

impl Harness {
    fn new() -> Self {
        init_test_tracing();
        Self {
            account: TestAccount::new("acct-1"),
            dir: TestDir::new(),
            remote: Arc::new(MemoryRemote::new()),
            store: Arc::new(MemoryStore::new()),
            backend: Arc::new(MemoryMediaBackend::new()),
        }
    }

    fn config(&self) -> DownloadConfig {
        DownloadConfig::new(self.dir.files_dir())
    }

    fn session(&self) -> AccountSession {
        AccountSession::with_decryptor(self.account.account_id(), self.account.decryptor())
    }

    fn orchestrator(
        &self,
        config: DownloadConfig,
    ) -> DownloadOrchestrator<MemoryRemote, MemoryStore> {
        DownloadOrchestrator::new(config, Arc::clone(&self.remote), Arc::clone(&self.store))
    }

    fn service(
        &self,
        config: DownloadConfig,
    ) -> DownloadService<MemoryRemote, MemoryStore, MemoryMediaBackend> {
        DownloadService::new(
            config,
            Arc::clone(&self.remote),
            Arc::clone(&self.store),
            Arc::clone(&self.backend),
        )
    }

    fn backfill(&self, config: DownloadConfig) -> MediaBackfill<MemoryStore, MemoryMediaBackend> {
        MediaBackfill::new(config, Arc::clone(&self.store), Arc::clone(&self.backend))
    }

    fn serve_full_dataset(&self) {
        self.remote.set_messages(self.account.messages(1..=12));
        self.remote
            .set_conversations((1..=3).map(|id| self.account.conversation(id)).collect());
        self.remote
            .set_blacklists((1..=2).map(|id| self.account.blacklist(id)).collect());
        self.remote
            .set_scheduled_messages(vec![self.account.scheduled_message(1)]);
        self.remote.set_drafts(vec![self.account.draft(1)]);
        self.remote
            .set_contacts((1..=4).map(|id| self.account.contact(id)).collect());
    }

    /// Media messages with sequences `0..count`, ids `1000 + seq`, blobs uploaded.
    fn serve_media(&self, count: i64) -> Vec<MessageBody> {
        let bodies: Vec<MessageBody> = (0..count)
            .map(|seq| self.account.media_message(1000 + seq, seq, "image/jpeg"))
            .collect();
        for seq in 0..count {
            let id = 1000 + seq;
            self.backend
                .put_blob(id, self.account.encrypt_bytes(format!("jpeg {id}").as_bytes()));
        }
        bodies
    }
}

#[test]
fn full_download_replaces_local_state() {
    let h = Harness::new();
    h.serve_full_dataset();

    let outcome = h.orchestrator(h.config()).run_download(&h.session()).unwrap();

    assert_eq!(outcome.inserted(EntityKind::Message), 12);
    assert_eq!(outcome.inserted(EntityKind::Conversation), 3);
    assert_eq!(outcome.inserted(EntityKind::Blacklist), 2);
    assert_eq!(outcome.inserted(EntityKind::ScheduledMessage), 1);
    assert_eq!(outcome.inserted(EntityKind::Draft), 1);
    assert_eq!(outcome.inserted(EntityKind::Contact), 4);
    assert!(!outcome.conversation_retried);

    assert_eq!(h.store.message(5).unwrap().data.as_deref(), Some("message 5"));
    assert_eq!(
        h.store.contacts()[0].name.as_deref(),
        Some("Contact 1")
    );
    assert_eq!(
        h.store.scheduled_messages()[0].data.as_deref(),
        Some("scheduled 1")
    );
    assert_eq!(h.store.drafts()[0].data.as_deref(), Some("draft 1"));

    let kinds: Vec<_> = h.remote.calls().iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EntityKind::Message,
            EntityKind::Conversation,
            EntityKind::Blacklist,
            EntityKind::ScheduledMessage,
            EntityKind::Draft,
            EntityKind::Contact,
        ]
    );
}

#[test]
fn second_download_wipes_previous_dataset() {
    let h = Harness::new();
    h.serve_full_dataset();
    h.orchestrator(h.config()).run_download(&h.session()).unwrap();

    h.remote.set_messages(h.account.messages(100..=101));
    h.remote.set_contacts(Vec::new());
    h.orchestrator(h.config()).run_download(&h.session()).unwrap();

    let ids: Vec<_> = h.store.messages().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![100, 101]);
    assert_eq!(h.store.count(EntityKind::Contact), 0);
}

#[test]
fn twelve_hundred_messages_take_three_pages() {
    let h = Harness::new();
    h.remote.set_messages(h.account.messages(1..=1200));

    let outcome = h.orchestrator(h.config()).run_download(&h.session()).unwrap();

    let calls = h.remote.calls_for(EntityKind::Message);
    let offsets: Vec<_> = calls.iter().map(|c| c.offset).collect();
    assert_eq!(offsets, vec![Some(0), Some(500), Some(1000)]);
    assert!(calls.iter().all(|c| c.page_size == Some(500)));
    assert_eq!(outcome.message_pages, 3);
    assert_eq!(h.store.count(EntityKind::Message), 1200);
}

#[test]
fn exact_page_multiple_costs_one_empty_fetch() {
    let h = Harness::new();
    h.remote.set_messages(h.account.messages(1..=1000));

    h.orchestrator(h.config()).run_download(&h.session()).unwrap();

    let offsets: Vec<_> = h
        .remote
        .calls_for(EntityKind::Message)
        .iter()
        .map(|c| c.offset)
        .collect();
    assert_eq!(offsets, vec![Some(0), Some(500), Some(1000)]);
    assert_eq!(h.store.count(EntityKind::Message), 1000);
}

#[test]
fn corrupt_message_keeps_ciphertext() {
    let h = Harness::new();
    let bad = corrupt_message(h.account.message(2));
    h.remote
        .set_messages(vec![h.account.message(1), bad.clone(), h.account.message(3)]);

    let outcome = h.orchestrator(h.config()).run_download(&h.session()).unwrap();

    assert_eq!(outcome.messages_kept_raw, 1);
    assert_eq!(h.store.count(EntityKind::Message), 3);
    assert_eq!(h.store.message(2).unwrap().data.as_deref(), Some(CORRUPT_CIPHERTEXT));
}

#[test]
fn corrupt_conversation_triggers_single_retry() {
    let h = Harness::new();
    let mut list: Vec<_> = (1..=5).map(|id| h.account.conversation(id)).collect();
    list[2] = corrupt_conversation(list[2].clone());
    h.remote.set_conversations(list);

    let outcome = h.orchestrator(h.config()).run_download(&h.session()).unwrap();

    assert!(outcome.conversation_retried);
    assert_eq!(h.remote.calls_for(EntityKind::Conversation).len(), 2);
    let ids: Vec<_> = h.store.conversations().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 2, 4, 5]);
    assert_eq!(
        h.store.conversations()[0].title.as_deref(),
        Some("Conversation 1")
    );
}

#[test]
fn corrupt_blacklist_restores_previous_dataset() {
    let h = Harness::new();
    h.serve_full_dataset();
    h.orchestrator(h.config()).run_download(&h.session()).unwrap();

    h.remote.set_messages(h.account.messages(50..=60));
    h.remote
        .set_blacklists(vec![corrupt_blacklist(h.account.blacklist(9))]);
    let err = h
        .orchestrator(h.config())
        .run_download(&h.session())
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::Decryption {
            kind: EntityKind::Blacklist,
            id: 9,
            ..
        }
    ));
    assert_eq!(h.store.count(EntityKind::Message), 12);
    assert_eq!(h.store.count(EntityKind::Conversation), 3);
    assert_eq!(h.store.count(EntityKind::Blacklist), 2);
    assert_eq!(h.store.count(EntityKind::Contact), 4);
    assert!(h.store.message(50).is_none());
}

#[test]
fn corrupt_contact_rolls_back() {
    let h = Harness::new();
    h.remote.set_messages(h.account.messages(1..=3));
    h.remote
        .set_contacts(vec![h.account.contact(1), corrupt_contact(h.account.contact(2))]);

    let err = h
        .orchestrator(h.config())
        .run_download(&h.session())
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::Decryption {
            kind: EntityKind::Contact,
            ..
        }
    ));
    for kind in EntityKind::ALL {
        assert_eq!(h.store.count(kind), 0);
    }
}

#[test]
fn transport_failure_rolls_back_and_is_retryable() {
    let h = Harness::new();
    h.remote.set_messages(h.account.messages(1..=3));
    h.remote.fail(EntityKind::Draft);

    let err = h
        .orchestrator(h.config())
        .run_download(&h.session())
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(h.store.count(EntityKind::Message), 0);
    assert!(h.store.upload_enabled());
}

#[test]
fn missing_key_touches_nothing() {
    let h = Harness::new();
    h.serve_full_dataset();

    let report = h
        .service(h.config())
        .run(&AccountSession::without_key(h.account.account_id()));

    assert!(matches!(report.download, Err(SyncError::NoCredential)));
    assert!(h.remote.calls().is_empty());
    assert!(h.backend.fetches().is_empty());
}

#[test]
fn session_opens_from_preferences_file() {
    let h = Harness::new();
    h.serve_full_dataset();
    let prefs = PreferencesStore::new(h.dir.preferences_path());
    prefs
        .save(&AccountPreferences {
            account_id: Some(h.account.account_id().into()),
            key: Some(h.account.key_base64()),
            ..AccountPreferences::default()
        })
        .unwrap();

    let session = AccountSession::open(&prefs.load().unwrap()).unwrap();
    let outcome = h.orchestrator(h.config()).run_download(&session).unwrap();
    session.close();

    assert_eq!(outcome.inserted(EntityKind::Message), 12);
}

#[test]
fn media_window_boundary() {
    let h = Harness::new();
    // 30 placeholders, window 20: sequences 1..=9 are gone remotely
    h.remote.set_messages(h.serve_media(30));
    let config = h.config().with_media_window(20);

    let report = h.service(config).run(&h.session());
    let media = report.media.unwrap();

    assert_eq!(media.total_candidates, 30);
    assert_eq!(media.fetched, 21);
    assert_eq!(media.skipped, 9);
    let fetched = h.backend.fetches();
    assert!(fetched.contains(&1000));
    assert!(fetched.contains(&1010));
    assert!(!fetched.contains(&1009));
    assert!(!fetched.contains(&1001));
    assert!(h.store.message(1009).unwrap().is_media_placeholder());

    let file = h.dir.files_dir().join("1010.jpg");
    assert_eq!(std::fs::read(&file).unwrap(), b"jpeg 1010");
    assert_eq!(
        h.store.message(1010).unwrap().data,
        Some(format!("file://{}", file.display()))
    );
}

#[test]
fn media_phase_is_idempotent() {
    let h = Harness::new();
    h.remote.set_messages(h.serve_media(5));
    h.service(h.config()).run(&h.session()).download.unwrap();
    assert_eq!(h.backend.fetches().len(), 5);

    let again = h.backfill(h.config()).run(&h.session());

    assert_eq!(again.total_candidates, 0);
    assert_eq!(again.fetched, 0);
    assert_eq!(h.backend.fetches().len(), 5);
}

#[test]
fn service_reports_progress_and_events() {
    let h = Harness::new();
    let mut bodies = h.account.messages(1..=3);
    bodies.extend(h.serve_media(2));
    h.remote.set_messages(bodies);
    let observer = Arc::new(RecordingObserver::new());
    let service = h.service(h.config()).with_observer(observer.clone());
    let mut events = service.events().subscribe();

    let report = service.run(&h.session());

    assert!(report.download.is_ok());
    assert_eq!(events.try_recv().unwrap(), DownloadEvent::Finished);
    assert_eq!(events.try_recv().unwrap(), DownloadEvent::MediaFinished);
    assert_eq!(
        observer.progress_for(NotificationId::MediaDownload),
        vec![(1, 2), (2, 2)]
    );
    assert!(observer.is_released(NotificationId::MessageDownload));
    assert!(observer.is_released(NotificationId::MediaDownload));
}

#[test]
fn media_auth_failure_keeps_primary_commit() {
    let h = Harness::new();
    h.remote.set_messages(h.serve_media(3));
    h.backend.fail_authentication();

    let report = h.service(h.config()).run(&h.session());

    assert_eq!(report.download.unwrap().inserted(EntityKind::Message), 3);
    let media = report.media.unwrap();
    assert!(!media.authenticated);
    assert!(h.backend.fetches().is_empty());
    assert!(h.store.message(1000).unwrap().is_media_placeholder());
}

#[test]
fn spawned_service_downloads_in_background() {
    let h = Harness::new();
    h.serve_full_dataset();
    let service = Arc::new(h.service(h.config()));

    let report = service.spawn(h.session()).unwrap().join().unwrap();

    assert_eq!(report.download.unwrap().inserted(EntityKind::Contact), 4);
    assert_eq!(h.store.count(EntityKind::Message), 12);
}

/// Serves JSON from a [`MemoryRemote`] as if it were the HTTP API.
struct JsonLoopback {
    account: String,
    remote: MemoryRemote,
}

impl HttpClient for JsonLoopback {
    fn get(&self, url: &str) -> Result<Vec<u8>, String> {
        use msgsync_engine::RemoteSyncClient;

        let query = |name: &str| {
            url.split(['?', '&'])
                .find_map(|pair| pair.strip_prefix(&format!("{name}=")).map(str::to_string))
        };
        let limit = query("limit").and_then(|v| v.parse().ok());
        let offset = query("offset").and_then(|v| v.parse().ok());
        let account = &self.account;
        let map = |e: SyncError| e.to_string();

        let json = if url.contains("/messages?") {
            let page = self.remote.list_messages(account, None, limit, offset);
            serde_json::to_vec(&page.map_err(map)?)
        } else if url.contains("/conversations?") {
            serde_json::to_vec(&self.remote.list_conversations(account).map_err(map)?)
        } else if url.contains("/blacklists?") {
            serde_json::to_vec(&self.remote.list_blacklists(account).map_err(map)?)
        } else if url.contains("/scheduled_messages?") {
            serde_json::to_vec(&self.remote.list_scheduled_messages(account).map_err(map)?)
        } else if url.contains("/drafts?") {
            serde_json::to_vec(&self.remote.list_drafts(account).map_err(map)?)
        } else if url.contains("/contacts?") {
            serde_json::to_vec(&self.remote.list_contacts(account).map_err(map)?)
        } else {
            return Err(format!("unknown endpoint {url}"));
        };
        json.map_err(|e| e.to_string())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[test]
fn download_over_http_json() {
    let h = Harness::new();
    let loopback = JsonLoopback {
        account: h.account.account_id().into(),
        remote: MemoryRemote::new(),
    };
    loopback.remote.set_messages(h.account.messages(1..=7));
    loopback
        .remote
        .set_conversations(vec![h.account.conversation(1)]);
    loopback.remote.set_contacts(vec![h.account.contact(1)]);
    let remote = Arc::new(HttpRemote::new("https://api.example.com/", loopback));

    let outcome = DownloadOrchestrator::new(
        h.config().with_page_size(5),
        Arc::clone(&remote),
        Arc::clone(&h.store),
    )
    .run_download(&h.session())
    .unwrap();

    assert_eq!(outcome.message_pages, 2);
    assert_eq!(h.store.count(EntityKind::Message), 7);
    assert_eq!(h.store.message(7).unwrap().data.as_deref(), Some("message 7"));
    assert_eq!(h.store.count(EntityKind::Conversation), 1);
    assert_eq!(h.store.count(EntityKind::Contact), 1);
    assert!(remote.last_error().is_none());
}
