//! HTTP remote client.
//!
//! Maps [`RemoteSyncClient`] calls onto the account REST API. The actual
//! HTTP stack is abstracted behind [`HttpClient`] so hosts can plug in
//! whatever client they already ship.

use crate::error::{SyncError, SyncResult};
use crate::transport::RemoteSyncClient;
use msgsync_model::{
    BlacklistBody, ContactBody, ConversationBody, DraftBody, EntityKind, MessageBody,
    ScheduledMessageBody,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// HTTP client abstraction.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request and returns the response body.
    fn get(&self, url: &str) -> Result<Vec<u8>, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// JSON-over-HTTP implementation of [`RemoteSyncClient`].
///
/// Resources live at `{base_url}/api/v1/{resource}` and answer with a JSON
/// array of bodies.
pub struct HttpRemote<C: HttpClient> {
    base_url: String,
    client: C,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpRemote<C> {
    /// Creates a new HTTP remote.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns true if the last call succeeded and the client is healthy.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    /// Builds the URL for a list call.
    pub fn list_url(
        &self,
        kind: EntityKind,
        account_id: &str,
        cursor: Option<&str>,
        page_size: Option<u32>,
        offset: Option<u64>,
    ) -> String {
        let mut url = format!(
            "{}/api/v1/{}?account_id={}",
            self.base_url,
            kind.name(),
            urlencoding::encode(account_id)
        );
        if let Some(cursor) = cursor {
            url.push_str(&format!("&cursor={}", urlencoding::encode(cursor)));
        }
        if let Some(limit) = page_size {
            url.push_str(&format!("&limit={limit}"));
        }
        if let Some(offset) = offset {
            url.push_str(&format!("&offset={offset}"));
        }
        url
    }

    fn get_list<T: DeserializeOwned>(&self, url: &str) -> SyncResult<Vec<T>> {
        let body = self.client.get(url).map_err(|e| {
            *self.last_error.write() = Some(e.clone());
            self.connected.store(false, Ordering::SeqCst);
            SyncError::transport_retryable(e)
        })?;

        *self.last_error.write() = None;
        self.connected.store(true, Ordering::SeqCst);

        let records: Vec<T> = serde_json::from_slice(&body)
            .map_err(|e| SyncError::Protocol(format!("failed to decode response: {e}")))?;
        debug!(url, count = records.len(), "list call returned");
        Ok(records)
    }

    fn list_all<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        account_id: &str,
    ) -> SyncResult<Vec<T>> {
        self.get_list(&self.list_url(kind, account_id, None, None, None))
    }
}

impl<C: HttpClient> RemoteSyncClient for HttpRemote<C> {
    fn list_messages(
        &self,
        account_id: &str,
        cursor: Option<&str>,
        page_size: Option<u32>,
        offset: Option<u64>,
    ) -> SyncResult<Vec<MessageBody>> {
        self.get_list(&self.list_url(EntityKind::Message, account_id, cursor, page_size, offset))
    }

    fn list_conversations(&self, account_id: &str) -> SyncResult<Vec<ConversationBody>> {
        self.list_all(EntityKind::Conversation, account_id)
    }

    fn list_blacklists(&self, account_id: &str) -> SyncResult<Vec<BlacklistBody>> {
        self.list_all(EntityKind::Blacklist, account_id)
    }

    fn list_scheduled_messages(&self, account_id: &str) -> SyncResult<Vec<ScheduledMessageBody>> {
        self.list_all(EntityKind::ScheduledMessage, account_id)
    }

    fn list_drafts(&self, account_id: &str) -> SyncResult<Vec<DraftBody>> {
        self.list_all(EntityKind::Draft, account_id)
    }

    fn list_contacts(&self, account_id: &str) -> SyncResult<Vec<ContactBody>> {
        self.list_all(EntityKind::Contact, account_id)
    }
}
