//! Per-entity decrypt failure policy.

use crate::error::{SyncError, SyncResult};
use msgsync_crypto::Decryptor;
use msgsync_model::{EntityKind, Record};
use tracing::warn;

/// What a run does with a record that fails to decrypt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log it and store the record with its original ciphertext.
    IsolateAndKeepRaw,
    /// Log it and leave the record out.
    IsolateAndSkip,
    /// Fail the run, rolling back the primary dataset.
    PropagateAndAbort,
}

impl FailurePolicy {
    /// The policy applied to each entity type.
    ///
    /// Messages and conversations are the bulk of the dataset and tolerate
    /// isolated corruption; any corruption in the smaller tables aborts.
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Message => FailurePolicy::IsolateAndKeepRaw,
            EntityKind::Conversation => FailurePolicy::IsolateAndSkip,
            EntityKind::Blacklist
            | EntityKind::ScheduledMessage
            | EntityKind::Draft
            | EntityKind::Contact => FailurePolicy::PropagateAndAbort,
        }
    }

    /// Decrypts `record` and applies this policy to a failure.
    pub fn apply<R: Record>(
        self,
        record: R,
        decryptor: &dyn Decryptor,
    ) -> SyncResult<Decrypted<R>> {
        let id = record.id();
        match record.decrypt(decryptor) {
            Ok(plain) => Ok(Decrypted::Plain(plain)),
            Err(source) => match self {
                FailurePolicy::IsolateAndKeepRaw => {
                    warn!(
                        entity = %R::KIND,
                        id,
                        error = %source,
                        "decryption failed, keeping ciphertext"
                    );
                    Ok(Decrypted::Raw(record))
                }
                FailurePolicy::IsolateAndSkip => {
                    warn!(
                        entity = %R::KIND,
                        id,
                        error = %source,
                        "decryption failed, skipping record"
                    );
                    Ok(Decrypted::Skipped { id })
                }
                FailurePolicy::PropagateAndAbort => Err(SyncError::decryption(R::KIND, id, source)),
            },
        }
    }
}

/// Outcome of decrypting one record under a [`FailurePolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decrypted<R> {
    /// Decrypted successfully.
    Plain(R),
    /// Decryption failed; the original ciphertext record is kept.
    Raw(R),
    /// Decryption failed; the record is dropped.
    Skipped {
        /// Id of the dropped record.
        id: i64,
    },
}

impl<R> Decrypted<R> {
    /// The record to insert, if any.
    pub fn into_record(self) -> Option<R> {
        match self {
            Decrypted::Plain(record) | Decrypted::Raw(record) => Some(record),
            Decrypted::Skipped { .. } => None,
        }
    }
}
