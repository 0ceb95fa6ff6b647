//! Progress notifications and the download-finished broadcast.

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

/// Identity of a progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationId {
    /// Primary dataset download.
    MessageDownload,
    /// Media backfill.
    MediaDownload,
}

impl NotificationId {
    /// Stable numeric id for the host's notification system.
    pub fn code(&self) -> i32 {
        match self {
            NotificationId::MessageDownload => 7237,
            NotificationId::MediaDownload => 7238,
        }
    }

    /// Text shown with the notification.
    pub fn description(&self) -> &'static str {
        match self {
            NotificationId::MessageDownload => "Downloading and decrypting",
            NotificationId::MediaDownload => "Decrypting and downloading media",
        }
    }
}

/// Progress carried by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Spinner, no known total.
    Indeterminate,
    /// `current` of `total` items done.
    Determinate {
        /// Items done.
        current: usize,
        /// Items in the phase.
        total: usize,
    },
}

impl Progress {
    /// Completed fraction, if determinate.
    pub fn fraction(&self) -> Option<f64> {
        match *self {
            Progress::Indeterminate => None,
            Progress::Determinate { total: 0, .. } => Some(1.0),
            Progress::Determinate { current, total } => Some(current as f64 / total as f64),
        }
    }
}

/// Receives progress notifications from a run.
pub trait ProgressObserver: Send + Sync {
    /// Shows or updates a notification.
    fn notify(&self, id: NotificationId, description: &str, progress: Progress);

    /// Removes a notification.
    fn cancel(&self, id: NotificationId);
}

/// Observer that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn notify(&self, _id: NotificationId, _description: &str, _progress: Progress) {}

    fn cancel(&self, _id: NotificationId) {}
}

/// A notification recorded by [`RecordingObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    /// `notify` was called.
    Shown {
        /// Notification identity.
        id: NotificationId,
        /// Text.
        description: String,
        /// Progress value.
        progress: Progress,
    },
    /// `cancel` was called.
    Cancelled(NotificationId),
}

/// Observer that records every call, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingObserver {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded calls, in order.
    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().clone()
    }

    /// Determinate progress values reported for `id`.
    pub fn progress_for(&self, id: NotificationId) -> Vec<(usize, usize)> {
        self.updates
            .lock()
            .iter()
            .filter_map(|update| match update {
                ProgressUpdate::Shown {
                    id: shown,
                    progress: Progress::Determinate { current, total },
                    ..
                } if *shown == id => Some((*current, *total)),
                _ => None,
            })
            .collect()
    }

    /// Returns true if `id` was shown and then cancelled last.
    pub fn is_released(&self, id: NotificationId) -> bool {
        self.updates.lock().iter().rev().find_map(|update| match update {
            ProgressUpdate::Shown { id: shown, .. } if *shown == id => Some(false),
            ProgressUpdate::Cancelled(cancelled) if *cancelled == id => Some(true),
            _ => None,
        }) == Some(true)
    }
}

impl ProgressObserver for RecordingObserver {
    fn notify(&self, id: NotificationId, description: &str, progress: Progress) {
        self.updates.lock().push(ProgressUpdate::Shown {
            id,
            description: description.to_string(),
            progress,
        });
    }

    fn cancel(&self, id: NotificationId) {
        self.updates.lock().push(ProgressUpdate::Cancelled(id));
    }
}

/// Events broadcast to listeners outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadEvent {
    /// The primary dataset committed.
    Finished,
    /// The media phase ended, successfully or not.
    MediaFinished,
}

/// Process-wide broadcast of [`DownloadEvent`]s.
///
/// Cloning shares the channel. Sending with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct DownloadEvents {
    sender: broadcast::Sender<DownloadEvent>,
}

impl DownloadEvents {
    /// Creates a channel buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event.
    pub fn emit(&self, event: DownloadEvent) {
        if self.sender.send(event).is_err() {
            debug!(?event, "no listeners for download event");
        }
    }
}

impl Default for DownloadEvents {
    fn default() -> Self {
        Self::new(16)
    }
}
