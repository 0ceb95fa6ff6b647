//! Remote sync client abstraction.

use crate::error::{SyncError, SyncResult};
use msgsync_model::{
    BlacklistBody, ContactBody, ConversationBody, DraftBody, EntityKind, MessageBody,
    ScheduledMessageBody,
};
use parking_lot::Mutex;
use std::collections::HashSet;

/// Account-scoped list calls against the remote service.
///
/// Records come back in the service's order. An empty list means there is
/// nothing (more) to fetch.
pub trait RemoteSyncClient: Send + Sync {
    /// Lists one page of messages.
    fn list_messages(
        &self,
        account_id: &str,
        cursor: Option<&str>,
        page_size: Option<u32>,
        offset: Option<u64>,
    ) -> SyncResult<Vec<MessageBody>>;

    /// Lists every conversation.
    fn list_conversations(&self, account_id: &str) -> SyncResult<Vec<ConversationBody>>;

    /// Lists every blacklist entry.
    fn list_blacklists(&self, account_id: &str) -> SyncResult<Vec<BlacklistBody>>;

    /// Lists every scheduled message.
    fn list_scheduled_messages(&self, account_id: &str) -> SyncResult<Vec<ScheduledMessageBody>>;

    /// Lists every draft.
    fn list_drafts(&self, account_id: &str) -> SyncResult<Vec<DraftBody>>;

    /// Lists every contact.
    fn list_contacts(&self, account_id: &str) -> SyncResult<Vec<ContactBody>>;
}

/// A list call recorded by [`MemoryRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListCall {
    /// Entity type listed.
    pub kind: EntityKind,
    /// Requested page size.
    pub page_size: Option<u32>,
    /// Requested offset.
    pub offset: Option<u64>,
}

#[derive(Default)]
struct Dataset {
    messages: Vec<MessageBody>,
    conversations: Vec<Vec<ConversationBody>>,
    blacklists: Vec<BlacklistBody>,
    scheduled_messages: Vec<ScheduledMessageBody>,
    drafts: Vec<DraftBody>,
    contacts: Vec<ContactBody>,
}

/// An in-memory remote service for testing.
///
/// Serves message pages by offset and records every call. Conversation lists
/// can be queued: each call consumes the front response until one is left,
/// which is then served on every later call.
#[derive(Default)]
pub struct MemoryRemote {
    data: Mutex<Dataset>,
    calls: Mutex<Vec<ListCall>>,
    failing: Mutex<HashSet<EntityKind>>,
}

impl MemoryRemote {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the message list.
    pub fn set_messages(&self, messages: Vec<MessageBody>) {
        self.data.lock().messages = messages;
    }

    /// Sets the conversation list served on every call.
    pub fn set_conversations(&self, conversations: Vec<ConversationBody>) {
        self.data.lock().conversations = vec![conversations];
    }

    /// Queues a conversation list after those already set.
    pub fn push_conversations(&self, conversations: Vec<ConversationBody>) {
        self.data.lock().conversations.push(conversations);
    }

    /// Sets the blacklist.
    pub fn set_blacklists(&self, blacklists: Vec<BlacklistBody>) {
        self.data.lock().blacklists = blacklists;
    }

    /// Sets the scheduled messages.
    pub fn set_scheduled_messages(&self, messages: Vec<ScheduledMessageBody>) {
        self.data.lock().scheduled_messages = messages;
    }

    /// Sets the drafts.
    pub fn set_drafts(&self, drafts: Vec<DraftBody>) {
        self.data.lock().drafts = drafts;
    }

    /// Sets the contacts.
    pub fn set_contacts(&self, contacts: Vec<ContactBody>) {
        self.data.lock().contacts = contacts;
    }

    /// Makes every list call for `kind` fail with a transport error.
    pub fn fail(&self, kind: EntityKind) {
        self.failing.lock().insert(kind);
    }

    /// All calls, in order.
    pub fn calls(&self) -> Vec<ListCall> {
        self.calls.lock().clone()
    }

    /// Calls for one entity type, in order.
    pub fn calls_for(&self, kind: EntityKind) -> Vec<ListCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.kind == kind)
            .cloned()
            .collect()
    }

    fn record(
        &self,
        kind: EntityKind,
        page_size: Option<u32>,
        offset: Option<u64>,
    ) -> SyncResult<()> {
        self.calls.lock().push(ListCall {
            kind,
            page_size,
            offset,
        });
        if self.failing.lock().contains(&kind) {
            return Err(SyncError::transport_retryable(format!(
                "{kind} list unavailable"
            )));
        }
        Ok(())
    }
}

impl RemoteSyncClient for MemoryRemote {
    fn list_messages(
        &self,
        _account_id: &str,
        _cursor: Option<&str>,
        page_size: Option<u32>,
        offset: Option<u64>,
    ) -> SyncResult<Vec<MessageBody>> {
        self.record(EntityKind::Message, page_size, offset)?;
        let data = self.data.lock();
        let start = (offset.unwrap_or(0) as usize).min(data.messages.len());
        let end = match page_size {
            Some(size) => (start + size as usize).min(data.messages.len()),
            None => data.messages.len(),
        };
        Ok(data.messages[start..end].to_vec())
    }

    fn list_conversations(&self, _account_id: &str) -> SyncResult<Vec<ConversationBody>> {
        self.record(EntityKind::Conversation, None, None)?;
        let mut data = self.data.lock();
        let queue = &mut data.conversations;
        Ok(match queue.len() {
            0 => Vec::new(),
            1 => queue[0].clone(),
            _ => queue.remove(0),
        })
    }

    fn list_blacklists(&self, _account_id: &str) -> SyncResult<Vec<BlacklistBody>> {
        self.record(EntityKind::Blacklist, None, None)?;
        Ok(self.data.lock().blacklists.clone())
    }

    fn list_scheduled_messages(&self, _account_id: &str) -> SyncResult<Vec<ScheduledMessageBody>> {
        self.record(EntityKind::ScheduledMessage, None, None)?;
        Ok(self.data.lock().scheduled_messages.clone())
    }

    fn list_drafts(&self, _account_id: &str) -> SyncResult<Vec<DraftBody>> {
        self.record(EntityKind::Draft, None, None)?;
        Ok(self.data.lock().drafts.clone())
    }

    fn list_contacts(&self, _account_id: &str) -> SyncResult<Vec<ContactBody>> {
        self.record(EntityKind::Contact, None, None)?;
        Ok(self.data.lock().contacts.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(id: i64) -> MessageBody {
        MessageBody {
            id,
            conversation_id: 1,
            message_type: 0,
            data: None,
            timestamp: id,
            mime_type: None,
            read: false,
            seen: false,
            from: None,
            color: None,
        }
    }

    fn conversation(id: i64) -> ConversationBody {
        ConversationBody {
            id,
            color: 0,
            color_dark: 0,
            color_light: 0,
            color_accent: 0,
            pinned: false,
            read: false,
            timestamp: 0,
            title: None,
            phone_numbers: None,
            snippet: None,
            ringtone: None,
            image_uri: None,
            id_matcher: None,
            mute: false,
            archive: false,
            private_notifications: false,
        }
    }

    #[test]
    fn pages_by_offset() {
        let remote = MemoryRemote::new();
        remote.set_messages((0..7).map(body).collect());

        let page = remote.list_messages("a", None, Some(3), Some(3)).unwrap();
        assert_eq!(page.iter().map(|m| m.id).collect::<Vec<_>>(), vec![3, 4, 5]);

        let page = remote.list_messages("a", None, Some(3), Some(6)).unwrap();
        assert_eq!(page.len(), 1);

        let page = remote.list_messages("a", None, Some(3), Some(9)).unwrap();
        assert!(page.is_empty());

        assert_eq!(remote.calls_for(EntityKind::Message).len(), 3);
        assert_eq!(remote.calls()[0].offset, Some(3));
    }

    #[test]
    fn conversation_queue() {
        let remote = MemoryRemote::new();
        assert!(remote.list_conversations("a").unwrap().is_empty());

        remote.set_conversations(vec![conversation(1)]);
        remote.push_conversations(vec![conversation(2)]);

        assert_eq!(remote.list_conversations("a").unwrap()[0].id, 1);
        assert_eq!(remote.list_conversations("a").unwrap()[0].id, 2);
        assert_eq!(remote.list_conversations("a").unwrap()[0].id, 2);
    }

    #[test]
    fn injected_failure() {
        let remote = MemoryRemote::new();
        remote.fail(EntityKind::Draft);
        let err = remote.list_drafts("a").unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(remote.calls_for(EntityKind::Draft).len(), 1);
    }
}
