//! # msgsync Model
//!
//! Account record types for msgsync.
//!
//! This crate provides:
//! - `EntityKind`, the six entity types of the primary dataset
//! - Encrypted wire bodies (`MessageBody`, `ConversationBody`, ...)
//! - Decrypted local records (`Message`, `Conversation`, ...) and the
//!   `Record` trait used by the download engine
//! - The media placeholder marker and MIME extension table
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod body;
mod error;
mod kind;
mod marker;
mod mime;
mod record;

pub use body::{
    BlacklistBody, ContactBody, ConversationBody, DraftBody, MessageBody, ScheduledMessageBody,
};
pub use error::{ModelError, ModelResult};
pub use kind::EntityKind;
pub use marker::{is_placeholder, parse_placeholder, placeholder, MEDIA_MARKER_PREFIX};
pub use mime::extension_for;
pub use record::{Blacklist, Contact, Conversation, Draft, Message, Record, ScheduledMessage};
