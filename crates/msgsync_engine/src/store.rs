//! Local store abstraction.
//!
//! The engine never talks SQL; it drives the store through [`LocalStore`].
//! [`transaction`] gives the primary phase its all-or-nothing scope.

use crate::error::{SyncError, SyncResult};
use msgsync_model::{
    Blacklist, Contact, Conversation, Draft, EntityKind, Message, Record, ScheduledMessage,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Transactional bulk-write surface of the local database.
///
/// Writes issued while a transaction is open are invisible to other readers
/// until [`commit`](LocalStore::commit). Writes issued with no transaction
/// open apply immediately. Inserts replace any existing row with the same id.
pub trait LocalStore: Send + Sync {
    /// Opens a transaction.
    fn begin_transaction(&self) -> SyncResult<()>;

    /// Publishes every write made since `begin_transaction`.
    fn commit(&self) -> SyncResult<()>;

    /// Discards every write made since `begin_transaction`.
    fn rollback(&self) -> SyncResult<()>;

    /// Enables or suspends echoing local writes to the upload direction.
    fn set_upload_enabled(&self, enabled: bool);

    /// Deletes every row of the six primary tables.
    fn clear_all(&self) -> SyncResult<()>;

    /// Bulk-inserts messages.
    fn insert_messages(&self, messages: &[Message]) -> SyncResult<()>;

    /// Inserts one conversation.
    fn insert_conversation(&self, conversation: &Conversation) -> SyncResult<()>;

    /// Inserts one blacklist entry.
    fn insert_blacklist(&self, blacklist: &Blacklist) -> SyncResult<()>;

    /// Inserts one scheduled message.
    fn insert_scheduled_message(&self, message: &ScheduledMessage) -> SyncResult<()>;

    /// Inserts one draft.
    fn insert_draft(&self, draft: &Draft) -> SyncResult<()>;

    /// Bulk-inserts contacts.
    fn insert_contacts(&self, contacts: &[Contact]) -> SyncResult<()>;

    /// Messages whose data is a media placeholder, in row order.
    fn placeholder_messages(&self) -> SyncResult<Vec<Message>>;

    /// Replaces a message's data.
    fn update_message_data(&self, id: i64, data: &str) -> SyncResult<()>;
}

/// Runs `f` inside a store transaction.
///
/// Commits only if `f` returns `Ok`; any error rolls back and is returned.
pub fn transaction<S, T, F>(store: &S, f: F) -> SyncResult<T>
where
    S: LocalStore + ?Sized,
    F: FnOnce(&S) -> SyncResult<T>,
{
    store.begin_transaction()?;
    match f(store) {
        Ok(value) => {
            store.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = store.rollback() {
                warn!(error = %rollback_err, "rollback failed");
            }
            Err(e)
        }
    }
}

/// Rows in insertion order, indexed by record id.
#[derive(Debug, Clone)]
struct Table<T> {
    rows: Vec<T>,
    index: HashMap<i64, usize>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Record> Table<T> {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn rows(&self) -> &[T] {
        &self.rows
    }

    fn get(&self, id: i64) -> Option<&T> {
        self.index.get(&id).map(|&pos| &self.rows[pos])
    }

    fn get_mut(&mut self, id: i64) -> Option<&mut T> {
        let pos = *self.index.get(&id)?;
        self.rows.get_mut(pos)
    }

    /// Replaces the row with the same id in place, or appends.
    fn upsert(&mut self, row: &T) {
        match self.index.get(&row.id()) {
            Some(&pos) => self.rows[pos] = row.clone(),
            None => {
                self.index.insert(row.id(), self.rows.len());
                self.rows.push(row.clone());
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    messages: Table<Message>,
    conversations: Table<Conversation>,
    blacklists: Table<Blacklist>,
    scheduled_messages: Table<ScheduledMessage>,
    drafts: Table<Draft>,
    contacts: Table<Contact>,
}

impl Tables {
    fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Message => self.messages.len(),
            EntityKind::Conversation => self.conversations.len(),
            EntityKind::Blacklist => self.blacklists.len(),
            EntityKind::ScheduledMessage => self.scheduled_messages.len(),
            EntityKind::Draft => self.drafts.len(),
            EntityKind::Contact => self.contacts.len(),
        }
    }
}

/// An in-memory [`LocalStore`].
///
/// Committed tables and the open transaction's staged copy are kept apart,
/// so accessors always report what an outside reader would see.
pub struct MemoryStore {
    committed: RwLock<Tables>,
    staged: Mutex<Option<Tables>>,
    upload_enabled: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            committed: RwLock::new(Tables::default()),
            staged: Mutex::new(None),
            upload_enabled: AtomicBool::new(true),
        }
    }

    /// Committed row count for an entity type.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.committed.read().count(kind)
    }

    /// Committed messages in row order.
    pub fn messages(&self) -> Vec<Message> {
        self.committed.read().messages.rows().to_vec()
    }

    /// Committed message by id.
    pub fn message(&self, id: i64) -> Option<Message> {
        self.committed.read().messages.get(id).cloned()
    }

    /// Committed conversations in row order.
    pub fn conversations(&self) -> Vec<Conversation> {
        self.committed.read().conversations.rows().to_vec()
    }

    /// Committed blacklist entries.
    pub fn blacklists(&self) -> Vec<Blacklist> {
        self.committed.read().blacklists.rows().to_vec()
    }

    /// Committed scheduled messages.
    pub fn scheduled_messages(&self) -> Vec<ScheduledMessage> {
        self.committed.read().scheduled_messages.rows().to_vec()
    }

    /// Committed drafts.
    pub fn drafts(&self) -> Vec<Draft> {
        self.committed.read().drafts.rows().to_vec()
    }

    /// Committed contacts.
    pub fn contacts(&self) -> Vec<Contact> {
        self.committed.read().contacts.rows().to_vec()
    }

    /// Returns true while a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.staged.lock().is_some()
    }

    /// Returns true unless upload echo is suspended.
    pub fn upload_enabled(&self) -> bool {
        self.upload_enabled.load(Ordering::SeqCst)
    }

    fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        let mut staged = self.staged.lock();
        match staged.as_mut() {
            Some(tables) => f(tables),
            None => f(&mut self.committed.write()),
        }
    }

    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        let staged = self.staged.lock();
        match staged.as_ref() {
            Some(tables) => f(tables),
            None => f(&self.committed.read()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for MemoryStore {
    fn begin_transaction(&self) -> SyncResult<()> {
        let mut staged = self.staged.lock();
        if staged.is_some() {
            return Err(SyncError::Store("transaction already open".into()));
        }
        *staged = Some(self.committed.read().clone());
        Ok(())
    }

    fn commit(&self) -> SyncResult<()> {
        let tables = self
            .staged
            .lock()
            .take()
            .ok_or_else(|| SyncError::Store("commit without transaction".into()))?;
        *self.committed.write() = tables;
        Ok(())
    }

    fn rollback(&self) -> SyncResult<()> {
        self.staged
            .lock()
            .take()
            .map(|_| ())
            .ok_or_else(|| SyncError::Store("rollback without transaction".into()))
    }

    fn set_upload_enabled(&self, enabled: bool) {
        self.upload_enabled.store(enabled, Ordering::SeqCst);
    }

    fn clear_all(&self) -> SyncResult<()> {
        self.write(|tables| *tables = Tables::default());
        Ok(())
    }

    fn insert_messages(&self, messages: &[Message]) -> SyncResult<()> {
        self.write(|tables| {
            for message in messages {
                tables.messages.upsert(message);
            }
        });
        Ok(())
    }

    fn insert_conversation(&self, conversation: &Conversation) -> SyncResult<()> {
        self.write(|tables| tables.conversations.upsert(conversation));
        Ok(())
    }

    fn insert_blacklist(&self, blacklist: &Blacklist) -> SyncResult<()> {
        self.write(|tables| tables.blacklists.upsert(blacklist));
        Ok(())
    }

    fn insert_scheduled_message(&self, message: &ScheduledMessage) -> SyncResult<()> {
        self.write(|tables| tables.scheduled_messages.upsert(message));
        Ok(())
    }

    fn insert_draft(&self, draft: &Draft) -> SyncResult<()> {
        self.write(|tables| tables.drafts.upsert(draft));
        Ok(())
    }

    fn insert_contacts(&self, contacts: &[Contact]) -> SyncResult<()> {
        self.write(|tables| {
            for contact in contacts {
                tables.contacts.upsert(contact);
            }
        });
        Ok(())
    }

    fn placeholder_messages(&self) -> SyncResult<Vec<Message>> {
        Ok(self.read(|tables| {
            tables
                .messages
                .rows()
                .iter()
                .filter(|m| m.is_media_placeholder())
                .cloned()
                .collect()
        }))
    }

    fn update_message_data(&self, id: i64, data: &str) -> SyncResult<()> {
        self.write(|tables| {
            tables
                .messages
                .get_mut(id)
                .map(|m| m.data = Some(data.to_string()))
        })
        .ok_or_else(|| SyncError::Store(format!("message {id} not found")))
    }
}
