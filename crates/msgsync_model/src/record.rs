//! Decrypted, locally insertable records.
//!
//! A record is first built from its wire body and still holds ciphertext.
//! [`Record::decrypt`] returns a new, decrypted copy and leaves `self`
//! untouched, so a failed decrypt never leaves a half-converted record behind.

use crate::body::{
    BlacklistBody, ContactBody, ConversationBody, DraftBody, MessageBody, ScheduledMessageBody,
};
use crate::kind::EntityKind;
use crate::marker;
use msgsync_crypto::{DecryptionError, Decryptor};

/// A primary-dataset record that can be decrypted with the account key.
pub trait Record: Clone + Send + Sync {
    /// Entity type of this record.
    const KIND: EntityKind;

    /// Local id. The only field trusted after a failed decrypt.
    fn id(&self) -> i64;

    /// Returns a copy with every encrypted field replaced by its plaintext.
    fn decrypt(&self, decryptor: &dyn Decryptor) -> Result<Self, DecryptionError>;
}

fn open(
    decryptor: &dyn Decryptor,
    field: &Option<String>,
) -> Result<Option<String>, DecryptionError> {
    field.as_deref().map(|text| decryptor.decrypt(text)).transpose()
}

/// A message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Local id.
    pub id: i64,
    /// Owning conversation.
    pub conversation_id: i64,
    /// Sent / received / error.
    pub message_type: i32,
    /// Body text, media placeholder, or local file URI.
    pub data: Option<String>,
    /// Epoch millis.
    pub timestamp: i64,
    /// MIME type.
    pub mime_type: Option<String>,
    /// Read flag.
    pub read: bool,
    /// Seen flag.
    pub seen: bool,
    /// Sender display name.
    pub from: Option<String>,
    /// Sender color.
    pub color: Option<i32>,
}

impl Message {
    /// Returns true if the data is a pending media placeholder.
    pub fn is_media_placeholder(&self) -> bool {
        self.data.as_deref().is_some_and(marker::is_placeholder)
    }
}

impl From<MessageBody> for Message {
    fn from(body: MessageBody) -> Self {
        Self {
            id: body.id,
            conversation_id: body.conversation_id,
            message_type: body.message_type,
            data: body.data,
            timestamp: body.timestamp,
            mime_type: body.mime_type,
            read: body.read,
            seen: body.seen,
            from: body.from,
            color: body.color,
        }
    }
}

impl Record for Message {
    const KIND: EntityKind = EntityKind::Message;

    fn id(&self) -> i64 {
        self.id
    }

    fn decrypt(&self, decryptor: &dyn Decryptor) -> Result<Self, DecryptionError> {
        Ok(Self {
            data: open(decryptor, &self.data)?,
            mime_type: open(decryptor, &self.mime_type)?,
            from: open(decryptor, &self.from)?,
            ..self.clone()
        })
    }
}

/// A conversation thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// Local id.
    pub id: i64,
    /// Primary color.
    pub color: i32,
    /// Dark color.
    pub color_dark: i32,
    /// Light color.
    pub color_light: i32,
    /// Accent color.
    pub color_accent: i32,
    /// Pinned flag.
    pub pinned: bool,
    /// Read flag.
    pub read: bool,
    /// Epoch millis of the last message.
    pub timestamp: i64,
    /// Title.
    pub title: Option<String>,
    /// Comma separated participant numbers.
    pub phone_numbers: Option<String>,
    /// Last message snippet.
    pub snippet: Option<String>,
    /// Ringtone URI.
    pub ringtone: Option<String>,
    /// Contact image URI.
    pub image_uri: Option<String>,
    /// Participant matcher.
    pub id_matcher: Option<String>,
    /// Muted flag.
    pub mute: bool,
    /// Archived flag.
    pub archive: bool,
    /// Hide content in notifications.
    pub private_notifications: bool,
}

impl Conversation {
    /// Participant numbers, split and trimmed.
    pub fn participants(&self) -> Vec<&str> {
        self.phone_numbers
            .as_deref()
            .map(|numbers| {
                numbers
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl From<ConversationBody> for Conversation {
    fn from(body: ConversationBody) -> Self {
        Self {
            id: body.id,
            color: body.color,
            color_dark: body.color_dark,
            color_light: body.color_light,
            color_accent: body.color_accent,
            pinned: body.pinned,
            read: body.read,
            timestamp: body.timestamp,
            title: body.title,
            phone_numbers: body.phone_numbers,
            snippet: body.snippet,
            ringtone: body.ringtone,
            image_uri: body.image_uri,
            id_matcher: body.id_matcher,
            mute: body.mute,
            archive: body.archive,
            private_notifications: body.private_notifications,
        }
    }
}

impl Record for Conversation {
    const KIND: EntityKind = EntityKind::Conversation;

    fn id(&self) -> i64 {
        self.id
    }

    fn decrypt(&self, decryptor: &dyn Decryptor) -> Result<Self, DecryptionError> {
        Ok(Self {
            title: open(decryptor, &self.title)?,
            phone_numbers: open(decryptor, &self.phone_numbers)?,
            snippet: open(decryptor, &self.snippet)?,
            ringtone: open(decryptor, &self.ringtone)?,
            image_uri: open(decryptor, &self.image_uri)?,
            id_matcher: open(decryptor, &self.id_matcher)?,
            ..self.clone()
        })
    }
}

/// A blocked phone number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blacklist {
    /// Local id.
    pub id: i64,
    /// Blocked number.
    pub phone_number: Option<String>,
}

impl From<BlacklistBody> for Blacklist {
    fn from(body: BlacklistBody) -> Self {
        Self {
            id: body.id,
            phone_number: body.phone_number,
        }
    }
}

impl Record for Blacklist {
    const KIND: EntityKind = EntityKind::Blacklist;

    fn id(&self) -> i64 {
        self.id
    }

    fn decrypt(&self, decryptor: &dyn Decryptor) -> Result<Self, DecryptionError> {
        Ok(Self {
            id: self.id,
            phone_number: open(decryptor, &self.phone_number)?,
        })
    }
}

/// A message queued for later sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledMessage {
    /// Local id.
    pub id: i64,
    /// Recipient numbers.
    pub to: Option<String>,
    /// Body.
    pub data: Option<String>,
    /// MIME type.
    pub mime_type: Option<String>,
    /// Send time, epoch millis.
    pub timestamp: i64,
    /// Display title.
    pub title: Option<String>,
}

impl From<ScheduledMessageBody> for ScheduledMessage {
    fn from(body: ScheduledMessageBody) -> Self {
        Self {
            id: body.id,
            to: body.to,
            data: body.data,
            mime_type: body.mime_type,
            timestamp: body.timestamp,
            title: body.title,
        }
    }
}

impl Record for ScheduledMessage {
    const KIND: EntityKind = EntityKind::ScheduledMessage;

    fn id(&self) -> i64 {
        self.id
    }

    fn decrypt(&self, decryptor: &dyn Decryptor) -> Result<Self, DecryptionError> {
        Ok(Self {
            to: open(decryptor, &self.to)?,
            data: open(decryptor, &self.data)?,
            mime_type: open(decryptor, &self.mime_type)?,
            title: open(decryptor, &self.title)?,
            ..self.clone()
        })
    }
}

/// An unsent draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    /// Local id.
    pub id: i64,
    /// Owning conversation.
    pub conversation_id: i64,
    /// Body.
    pub data: Option<String>,
    /// MIME type.
    pub mime_type: Option<String>,
}

impl From<DraftBody> for Draft {
    fn from(body: DraftBody) -> Self {
        Self {
            id: body.id,
            conversation_id: body.conversation_id,
            data: body.data,
            mime_type: body.mime_type,
        }
    }
}

impl Record for Draft {
    const KIND: EntityKind = EntityKind::Draft;

    fn id(&self) -> i64 {
        self.id
    }

    fn decrypt(&self, decryptor: &dyn Decryptor) -> Result<Self, DecryptionError> {
        Ok(Self {
            data: open(decryptor, &self.data)?,
            mime_type: open(decryptor, &self.mime_type)?,
            ..self.clone()
        })
    }
}

/// An address book entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Local id.
    pub id: i64,
    /// Phone number.
    pub phone_number: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Primary color.
    pub color: i32,
    /// Dark color.
    pub color_dark: i32,
    /// Light color.
    pub color_light: i32,
    /// Accent color.
    pub color_accent: i32,
}

impl From<ContactBody> for Contact {
    fn from(body: ContactBody) -> Self {
        Self {
            id: body.id,
            phone_number: body.phone_number,
            name: body.name,
            color: body.color,
            color_dark: body.color_dark,
            color_light: body.color_light,
            color_accent: body.color_accent,
        }
    }
}

impl Record for Contact {
    const KIND: EntityKind = EntityKind::Contact;

    fn id(&self) -> i64 {
        self.id
    }

    fn decrypt(&self, decryptor: &dyn Decryptor) -> Result<Self, DecryptionError> {
        Ok(Self {
            phone_number: open(decryptor, &self.phone_number)?,
            name: open(decryptor, &self.name)?,
            ..self.clone()
        })
    }
}
