//! Encrypted wire bodies.
//!
//! Bodies are produced only by the remote sync client. Routing fields (ids,
//! timestamps, flags) are plaintext; every `String` field documented as
//! encrypted holds a base64 AES-GCM envelope.

use serde::{Deserialize, Serialize};

/// A message as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    /// Device-scoped message id.
    #[serde(rename = "device_id")]
    pub id: i64,
    /// Owning conversation.
    #[serde(rename = "device_conversation_id")]
    pub conversation_id: i64,
    /// Sent / received / error, as stored locally.
    pub message_type: i32,
    /// Body text or media marker (encrypted).
    pub data: Option<String>,
    /// Epoch millis.
    pub timestamp: i64,
    /// MIME type (encrypted).
    pub mime_type: Option<String>,
    /// Read flag.
    #[serde(default)]
    pub read: bool,
    /// Seen flag.
    #[serde(default)]
    pub seen: bool,
    /// Sender display name in group threads (encrypted).
    #[serde(rename = "message_from", default)]
    pub from: Option<String>,
    /// Sender color.
    #[serde(default)]
    pub color: Option<i32>,
}

/// A conversation as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationBody {
    /// Device-scoped conversation id.
    #[serde(rename = "device_id")]
    pub id: i64,
    /// Primary color.
    #[serde(default)]
    pub color: i32,
    /// Dark color.
    #[serde(default)]
    pub color_dark: i32,
    /// Light color.
    #[serde(default)]
    pub color_light: i32,
    /// Accent color.
    #[serde(default)]
    pub color_accent: i32,
    /// Pinned flag.
    #[serde(default)]
    pub pinned: bool,
    /// Read flag.
    #[serde(default)]
    pub read: bool,
    /// Epoch millis of the last message.
    pub timestamp: i64,
    /// Title (encrypted).
    pub title: Option<String>,
    /// Comma separated participant numbers (encrypted).
    pub phone_numbers: Option<String>,
    /// Last message snippet (encrypted).
    pub snippet: Option<String>,
    /// Ringtone URI (encrypted).
    #[serde(default)]
    pub ringtone: Option<String>,
    /// Contact image URI (encrypted).
    #[serde(default)]
    pub image_uri: Option<String>,
    /// Participant matcher (encrypted).
    #[serde(default)]
    pub id_matcher: Option<String>,
    /// Muted flag.
    #[serde(default)]
    pub mute: bool,
    /// Archived flag.
    #[serde(default)]
    pub archive: bool,
    /// Hide content in notifications.
    #[serde(default)]
    pub private_notifications: bool,
}

/// A blacklist entry as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistBody {
    /// Device-scoped id.
    #[serde(rename = "device_id")]
    pub id: i64,
    /// Blocked number (encrypted).
    pub phone_number: Option<String>,
}

/// A scheduled message as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledMessageBody {
    /// Device-scoped id.
    #[serde(rename = "device_id")]
    pub id: i64,
    /// Recipient numbers (encrypted).
    pub to: Option<String>,
    /// Body (encrypted).
    pub data: Option<String>,
    /// MIME type (encrypted).
    pub mime_type: Option<String>,
    /// Send time, epoch millis.
    pub timestamp: i64,
    /// Display title (encrypted).
    pub title: Option<String>,
}

/// A draft as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftBody {
    /// Device-scoped id.
    #[serde(rename = "device_id")]
    pub id: i64,
    /// Owning conversation.
    #[serde(rename = "device_conversation_id")]
    pub conversation_id: i64,
    /// Body (encrypted).
    pub data: Option<String>,
    /// MIME type (encrypted).
    pub mime_type: Option<String>,
}

/// A contact as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactBody {
    /// Server-side id.
    pub id: i64,
    /// Phone number (encrypted).
    pub phone_number: Option<String>,
    /// Display name (encrypted).
    pub name: Option<String>,
    /// Primary color.
    #[serde(default)]
    pub color: i32,
    /// Dark color.
    #[serde(default)]
    pub color_dark: i32,
    /// Light color.
    #[serde(default)]
    pub color_light: i32,
    /// Accent color.
    #[serde(default)]
    pub color_accent: i32,
}
