//! Account fixture and encrypted body builders.
//!
//! Every builder returns wire bodies encrypted with the fixture's key, the
//! way the remote service would serve them.

use msgsync_crypto::{AesCipher, Decryptor, EncryptionKey};
use msgsync_model::{
    placeholder, BlacklistBody, ContactBody, ConversationBody, DraftBody, MessageBody,
    ScheduledMessageBody,
};
use std::ops::RangeInclusive;
use std::sync::Arc;
use tempfile::TempDir;

/// Text that is not a valid ciphertext envelope under any key.
pub const CORRUPT_CIPHERTEXT: &str = "!!corrupt!!";

/// A test account with a fresh key.
pub struct TestAccount {
    account_id: String,
    key: EncryptionKey,
    cipher: Arc<AesCipher>,
}

impl TestAccount {
    /// Creates an account with a random key.
    pub fn new(account_id: impl Into<String>) -> Self {
        let key = EncryptionKey::generate();
        let cipher = Arc::new(AesCipher::new(&key));
        Self {
            account_id: account_id.into(),
            key,
            cipher,
        }
    }

    /// The account id.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// The key in the base64 form stored in preferences.
    pub fn key_base64(&self) -> String {
        self.key.to_base64()
    }

    /// The account cipher.
    pub fn cipher(&self) -> Arc<AesCipher> {
        Arc::clone(&self.cipher)
    }

    /// The account cipher as a decryptor.
    pub fn decryptor(&self) -> Arc<dyn Decryptor> {
        self.cipher()
    }

    /// Encrypts text into a base64 envelope.
    pub fn encrypt(&self, text: &str) -> String {
        self.cipher
            .encrypt_text(text)
            .expect("Failed to encrypt text")
    }

    /// Encrypts raw bytes, as stored on the media backend.
    pub fn encrypt_bytes(&self, bytes: &[u8]) -> Vec<u8> {
        self.cipher.encrypt(bytes).expect("Failed to encrypt bytes")
    }

    fn seal(&self, text: &str) -> Option<String> {
        Some(self.encrypt(text))
    }

    /// A text message with body `"message <id>"`.
    pub fn message(&self, id: i64) -> MessageBody {
        MessageBody {
            id,
            conversation_id: 1,
            message_type: 0,
            data: self.seal(&format!("message {id}")),
            timestamp: 1_600_000_000_000 + id,
            mime_type: self.seal("text/plain"),
            read: true,
            seen: true,
            from: None,
            color: None,
        }
    }

    /// Text messages for every id in `ids`.
    pub fn messages(&self, ids: RangeInclusive<i64>) -> Vec<MessageBody> {
        ids.map(|id| self.message(id)).collect()
    }

    /// A media message whose data is the placeholder for `sequence`.
    pub fn media_message(&self, id: i64, sequence: i64, mime_type: &str) -> MessageBody {
        MessageBody {
            data: self.seal(&placeholder(sequence)),
            mime_type: self.seal(mime_type),
            ..self.message(id)
        }
    }

    /// A conversation with one participant.
    pub fn conversation(&self, id: i64) -> ConversationBody {
        ConversationBody {
            id,
            color: -16_777_216,
            color_dark: -16_777_216,
            color_light: -1,
            color_accent: -65_536,
            pinned: false,
            read: true,
            timestamp: 1_600_000_000_000 + id,
            title: self.seal(&format!("Conversation {id}")),
            phone_numbers: self.seal(&format!("+1555010{id}")),
            snippet: self.seal("see you soon"),
            ringtone: None,
            image_uri: None,
            id_matcher: self.seal(&format!("0100{id}")),
            mute: false,
            archive: false,
            private_notifications: false,
        }
    }

    /// A blacklist entry.
    pub fn blacklist(&self, id: i64) -> BlacklistBody {
        BlacklistBody {
            id,
            phone_number: self.seal(&format!("+1555020{id}")),
        }
    }

    /// A scheduled message.
    pub fn scheduled_message(&self, id: i64) -> ScheduledMessageBody {
        ScheduledMessageBody {
            id,
            to: self.seal("+15550100"),
            data: self.seal(&format!("scheduled {id}")),
            mime_type: self.seal("text/plain"),
            timestamp: 1_700_000_000_000 + id,
            title: self.seal("Reminder"),
        }
    }

    /// A draft in conversation 1.
    pub fn draft(&self, id: i64) -> DraftBody {
        DraftBody {
            id,
            conversation_id: 1,
            data: self.seal(&format!("draft {id}")),
            mime_type: self.seal("text/plain"),
        }
    }

    /// A contact.
    pub fn contact(&self, id: i64) -> ContactBody {
        ContactBody {
            id,
            phone_number: self.seal(&format!("+1555030{id}")),
            name: self.seal(&format!("Contact {id}")),
            color: -16_777_216,
            color_dark: -16_777_216,
            color_light: -1,
            color_accent: -65_536,
        }
    }
}

/// Replaces the message data with [`CORRUPT_CIPHERTEXT`].
pub fn corrupt_message(mut body: MessageBody) -> MessageBody {
    body.data = Some(CORRUPT_CIPHERTEXT.into());
    body
}

/// Replaces the conversation title with [`CORRUPT_CIPHERTEXT`].
pub fn corrupt_conversation(mut body: ConversationBody) -> ConversationBody {
    body.title = Some(CORRUPT_CIPHERTEXT.into());
    body
}

/// Replaces the blacklisted number with [`CORRUPT_CIPHERTEXT`].
pub fn corrupt_blacklist(mut body: BlacklistBody) -> BlacklistBody {
    body.phone_number = Some(CORRUPT_CIPHERTEXT.into());
    body
}

/// Replaces the contact name with [`CORRUPT_CIPHERTEXT`].
pub fn corrupt_contact(mut body: ContactBody) -> ContactBody {
    body.name = Some(CORRUPT_CIPHERTEXT.into());
    body
}

/// A temporary directory for media files and preferences.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    /// Creates a fresh directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// The directory root.
    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Where media files go.
    pub fn files_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("files")
    }

    /// Where the preferences document goes.
    pub fn preferences_path(&self) -> std::path::PathBuf {
        self.dir.path().join("account.json")
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}
