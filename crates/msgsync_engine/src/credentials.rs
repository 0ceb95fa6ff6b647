//! Account credentials.
//!
//! Credentials are loaded from a JSON preferences document and opened into
//! an explicit [`AccountSession`] for the duration of one run. Nothing here
//! is process-global.

use crate::error::{SyncError, SyncResult};
use msgsync_crypto::{AesCipher, Decryptor, EncryptionKey};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Supplies the account identity and its decryptor to a run.
pub trait CredentialContext: Send + Sync {
    /// The account being downloaded.
    fn account_id(&self) -> &str;

    /// The account decryptor, or `None` if no key is available.
    fn decryptor(&self) -> Option<Arc<dyn Decryptor>>;
}

/// Persisted account preferences.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPreferences {
    /// This device is the account's primary (phone) device.
    #[serde(default)]
    pub primary: bool,
    /// Account owner's display name.
    #[serde(default)]
    pub my_name: Option<String>,
    /// Account owner's phone number.
    #[serde(default)]
    pub my_phone_number: Option<String>,
    /// This device's id.
    #[serde(default)]
    pub device_id: Option<String>,
    /// Remote account id.
    #[serde(default)]
    pub account_id: Option<String>,
    /// Login salt.
    #[serde(default)]
    pub salt: Option<String>,
    /// Login password hash.
    #[serde(default)]
    pub passhash: Option<String>,
    /// Base64 account key.
    #[serde(default)]
    pub key: Option<String>,
}

impl std::fmt::Debug for AccountPreferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |field: &Option<String>| field.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("AccountPreferences")
            .field("primary", &self.primary)
            .field("my_name", &self.my_name)
            .field("my_phone_number", &self.my_phone_number)
            .field("device_id", &self.device_id)
            .field("account_id", &self.account_id)
            .field("salt", &redact(&self.salt))
            .field("passhash", &redact(&self.passhash))
            .field("key", &redact(&self.key))
            .finish()
    }
}

/// JSON file holding [`AccountPreferences`].
#[derive(Debug, Clone)]
pub struct PreferencesStore {
    path: PathBuf,
}

impl PreferencesStore {
    /// Creates a store backed by `path`. The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads preferences. A missing file yields empty preferences.
    pub fn load(&self) -> SyncResult<AccountPreferences> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| SyncError::Preferences(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(AccountPreferences::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes preferences, replacing the file.
    pub fn save(&self, prefs: &AccountPreferences) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec_pretty(prefs)
            .map_err(|e| SyncError::Preferences(e.to_string()))?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Removes the account id and all key material, keeping profile fields.
    pub fn clear_account(&self) -> SyncResult<AccountPreferences> {
        self.update(|prefs| {
            prefs.account_id = None;
            prefs.salt = None;
            prefs.passhash = None;
            prefs.key = None;
        })
    }

    /// Stores the owner's display name.
    pub fn set_name(&self, name: impl Into<String>) -> SyncResult<AccountPreferences> {
        let name = name.into();
        self.update(|prefs| prefs.my_name = Some(name))
    }

    /// Stores the owner's phone number.
    pub fn set_phone_number(&self, number: impl Into<String>) -> SyncResult<AccountPreferences> {
        let number = number.into();
        self.update(|prefs| prefs.my_phone_number = Some(number))
    }

    fn update(&self, f: impl FnOnce(&mut AccountPreferences)) -> SyncResult<AccountPreferences> {
        let mut prefs = self.load()?;
        f(&mut prefs);
        self.save(&prefs)?;
        Ok(prefs)
    }
}

/// Credentials opened for one run.
pub struct AccountSession {
    account_id: String,
    decryptor: Option<Arc<dyn Decryptor>>,
}

impl AccountSession {
    /// Opens a session from persisted preferences.
    ///
    /// Fails with [`SyncError::NoCredential`] if there is no account id. A
    /// missing or malformed key yields a session without a decryptor, which
    /// the download run rejects before touching the store.
    pub fn open(prefs: &AccountPreferences) -> SyncResult<Self> {
        let account_id = prefs
            .account_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(SyncError::NoCredential)?;

        let decryptor = prefs.key.as_deref().and_then(|text| {
            match EncryptionKey::from_base64(text) {
                Ok(key) => Some(Arc::new(AesCipher::new(&key)) as Arc<dyn Decryptor>),
                Err(e) => {
                    warn!(account = %account_id, error = %e, "stored account key is unusable");
                    None
                }
            }
        });

        debug!(account = %account_id, has_key = decryptor.is_some(), "account session opened");
        Ok(Self {
            account_id,
            decryptor,
        })
    }

    /// Opens a session with a host-supplied decryptor.
    pub fn with_decryptor(account_id: impl Into<String>, decryptor: Arc<dyn Decryptor>) -> Self {
        Self {
            account_id: account_id.into(),
            decryptor: Some(decryptor),
        }
    }

    /// Opens a session that has an account id but no key.
    pub fn without_key(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            decryptor: None,
        }
    }

    /// Closes the session, dropping the key.
    pub fn close(self) {
        debug!(account = %self.account_id, "account session closed");
    }
}

impl CredentialContext for AccountSession {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    fn decryptor(&self) -> Option<Arc<dyn Decryptor>> {
        self.decryptor.clone()
    }
}

impl std::fmt::Debug for AccountSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSession")
            .field("account_id", &self.account_id)
            .field("has_key", &self.decryptor.is_some())
            .finish()
    }
}
