//! Property tests for pagination, message text and the media window.

use msgsync_engine::{
    within_media_window, AccountSession, DownloadConfig, DownloadOrchestrator, MemoryRemote,
    MemoryStore,
};
use msgsync_model::EntityKind;
use msgsync_testkit::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn pagination_call_count((count, page_size) in pagination_strategy()) {
        let account = TestAccount::new("acct");
        let remote = Arc::new(MemoryRemote::new());
        let store = Arc::new(MemoryStore::new());
        remote.set_messages(account.messages(1..=count as i64));
        let session = AccountSession::with_decryptor("acct", account.decryptor());

        let outcome = DownloadOrchestrator::new(
            DownloadConfig::default().with_page_size(page_size),
            Arc::clone(&remote),
            Arc::clone(&store),
        )
        .run_download(&session)
        .unwrap();

        let calls = remote.calls_for(EntityKind::Message);
        prop_assert_eq!(calls.len(), expected_page_calls(count, page_size));
        prop_assert_eq!(outcome.message_pages as usize, calls.len());
        prop_assert_eq!(store.count(EntityKind::Message), count);
        for (i, call) in calls.iter().enumerate() {
            prop_assert_eq!(call.offset, Some(i as u64 * u64::from(page_size)));
        }
    }

    #[test]
    fn corrupt_messages_never_shrink_the_download(
        corrupt in corrupt_positions_strategy(25),
    ) {
        let account = TestAccount::new("acct");
        let remote = Arc::new(MemoryRemote::new());
        let store = Arc::new(MemoryStore::new());
        let bodies = corrupt
            .iter()
            .enumerate()
            .map(|(i, bad)| {
                let body = account.message(i as i64 + 1);
                if *bad { corrupt_message(body) } else { body }
            })
            .collect();
        remote.set_messages(bodies);
        let session = AccountSession::with_decryptor("acct", account.decryptor());

        let outcome = DownloadOrchestrator::new(
            DownloadConfig::default().with_page_size(10),
            remote,
            Arc::clone(&store),
        )
        .run_download(&session)
        .unwrap();

        prop_assert_eq!(store.count(EntityKind::Message), 25);
        prop_assert_eq!(outcome.messages_kept_raw, corrupt.iter().filter(|b| **b).count());
    }

    #[test]
    fn message_text_is_stored_decrypted(
        texts in prop::collection::vec(plaintext_strategy(), 1..12),
    ) {
        let account = TestAccount::new("acct");
        let remote = Arc::new(MemoryRemote::new());
        let store = Arc::new(MemoryStore::new());
        let bodies = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let mut body = account.message(i as i64 + 1);
                body.data = Some(account.encrypt(text));
                body
            })
            .collect();
        remote.set_messages(bodies);
        let session = AccountSession::with_decryptor("acct", account.decryptor());

        let config = DownloadConfig::default();
        let outcome = DownloadOrchestrator::new(config, remote, Arc::clone(&store))
            .run_download(&session)
            .unwrap();

        prop_assert_eq!(outcome.messages_kept_raw, 0);
        let stored: Vec<_> = store.messages().into_iter().map(|m| m.data).collect();
        let expected: Vec<_> = texts.into_iter().map(Some).collect();
        prop_assert_eq!(stored, expected);
    }

    #[test]
    fn old_sequences_outside_window_are_skipped(
        (sequence, total, window) in media_window_strategy()
    ) {
        let threshold = total as i64 - i64::from(window);
        let fetched = within_media_window(sequence, total, window);
        if sequence == 0 || sequence >= threshold {
            prop_assert!(fetched);
        } else {
            prop_assert!(!fetched);
        }
    }
}
