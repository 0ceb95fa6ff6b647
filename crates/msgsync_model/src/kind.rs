//! Entity types of the primary dataset.

use std::fmt;

/// One of the six entity types replaced by a download run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// Individual messages.
    Message,
    /// Conversation threads.
    Conversation,
    /// Blocked phone numbers.
    Blacklist,
    /// Messages queued for later sending.
    ScheduledMessage,
    /// Unsent drafts.
    Draft,
    /// Address book entries.
    Contact,
}

impl EntityKind {
    /// All kinds, in download order.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Message,
        EntityKind::Conversation,
        EntityKind::Blacklist,
        EntityKind::ScheduledMessage,
        EntityKind::Draft,
        EntityKind::Contact,
    ];

    /// Table / resource name.
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Message => "messages",
            EntityKind::Conversation => "conversations",
            EntityKind::Blacklist => "blacklists",
            EntityKind::ScheduledMessage => "scheduled_messages",
            EntityKind::Draft => "drafts",
            EntityKind::Contact => "contacts",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
