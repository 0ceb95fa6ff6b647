//! Background service running both download phases.

use crate::config::DownloadConfig;
use crate::credentials::{AccountSession, CredentialContext};
use crate::download::{ContactImageResolver, DownloadOrchestrator, DownloadOutcome};
use crate::error::{SyncError, SyncResult};
use crate::media::{MediaBackend, MediaBackfill, MediaOutcome};
use crate::progress::{DownloadEvents, ProgressObserver};
use crate::store::LocalStore;
use crate::transport::RemoteSyncClient;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Shared cancellation flag.
///
/// Cancellation is observed between steps; a list call or file fetch
/// already in flight runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Creates a handle that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> SyncResult<()> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// What a service run did.
#[derive(Debug)]
pub struct ServiceReport {
    /// Primary phase result.
    pub download: SyncResult<DownloadOutcome>,
    /// Media phase result; `None` if the phase was not started.
    pub media: Option<MediaOutcome>,
}

/// Runs the primary phase and then the media phase for one account.
pub struct DownloadService<R: RemoteSyncClient, S: LocalStore, M: MediaBackend> {
    orchestrator: DownloadOrchestrator<R, S>,
    media: MediaBackfill<S, M>,
    cancel: CancelHandle,
}

impl<R, S, M> DownloadService<R, S, M>
where
    R: RemoteSyncClient + 'static,
    S: LocalStore + 'static,
    M: MediaBackend + 'static,
{
    /// Creates a service. Both phases share `config`, the store, the
    /// event channel and the cancel handle.
    pub fn new(
        config: DownloadConfig,
        remote: Arc<R>,
        store: Arc<S>,
        media_backend: Arc<M>,
    ) -> Self {
        let cancel = CancelHandle::new();
        let events = DownloadEvents::default();
        Self {
            orchestrator: DownloadOrchestrator::new(config.clone(), remote, Arc::clone(&store))
                .with_events(events.clone())
                .with_cancel_handle(cancel.clone()),
            media: MediaBackfill::new(config, store, media_backend)
                .with_events(events)
                .with_cancel_handle(cancel.clone()),
            cancel,
        }
    }

    /// Sets the progress observer for both phases.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.orchestrator = self.orchestrator.with_observer(Arc::clone(&observer));
        self.media = self.media.with_observer(observer);
        self
    }

    /// Sets the event channel for both phases.
    pub fn with_events(mut self, events: DownloadEvents) -> Self {
        self.orchestrator = self.orchestrator.with_events(events.clone());
        self.media = self.media.with_events(events);
        self
    }

    /// Sets the contact image resolver.
    pub fn with_image_resolver(mut self, images: Arc<dyn ContactImageResolver>) -> Self {
        self.orchestrator = self.orchestrator.with_image_resolver(images);
        self
    }

    /// Returns the cancel handle.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Returns the event channel.
    pub fn events(&self) -> &DownloadEvents {
        self.orchestrator.events()
    }

    /// Runs both phases on the calling thread.
    ///
    /// The media phase starts only after a committed primary phase, and
    /// its second stage only after authentication and while not cancelled.
    pub fn run(&self, credentials: &dyn CredentialContext) -> ServiceReport {
        let download = self.orchestrator.run_download(credentials);
        if download.is_err() || self.cancel.is_cancelled() {
            return ServiceReport {
                download,
                media: None,
            };
        }

        let media = match self.media.authenticate() {
            Ok(session) if !self.cancel.is_cancelled() => {
                self.media.backfill(&session, credentials)
            }
            Ok(_) => {
                self.media.abandon();
                MediaOutcome {
                    authenticated: true,
                    aborted: Some(SyncError::Cancelled.to_string()),
                    ..MediaOutcome::default()
                }
            }
            Err(e) => MediaOutcome {
                aborted: Some(e.to_string()),
                ..MediaOutcome::default()
            },
        };

        ServiceReport {
            download,
            media: Some(media),
        }
    }

    /// Runs both phases on a dedicated thread, closing `session` afterwards.
    pub fn spawn(
        self: Arc<Self>,
        session: AccountSession,
    ) -> io::Result<JoinHandle<ServiceReport>> {
        thread::Builder::new()
            .name("msgsync-download".into())
            .spawn(move || {
                let report = self.run(&session);
                session.close();
                report
            })
    }
}
