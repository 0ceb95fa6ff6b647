//! Configuration for the download engine.

use std::path::{Path, PathBuf};

/// Default number of messages requested per page.
pub const DEFAULT_MESSAGE_PAGE_SIZE: u32 = 500;

/// Number of most recent media uploads kept on the media backend.
///
/// Shared with the upload direction: only placeholders inside this trailing
/// window are fetched again.
pub const NUM_MEDIA_TO_UPLOAD: u32 = 20;

/// Configuration for a download run.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Messages requested per page.
    pub message_page_size: u32,
    /// Trailing window of placeholder sequences eligible for media fetch.
    pub media_window: u32,
    /// Directory receiving downloaded media files.
    pub files_dir: PathBuf,
}

impl DownloadConfig {
    /// Creates a configuration writing media into `files_dir`.
    pub fn new(files_dir: impl Into<PathBuf>) -> Self {
        Self {
            message_page_size: DEFAULT_MESSAGE_PAGE_SIZE,
            media_window: NUM_MEDIA_TO_UPLOAD,
            files_dir: files_dir.into(),
        }
    }

    /// Sets the message page size. Zero is raised to one.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.message_page_size = size.max(1);
        self
    }

    /// Sets the media re-fetch window.
    pub fn with_media_window(mut self, window: u32) -> Self {
        self.media_window = window;
        self
    }

    /// Sets the media directory.
    pub fn with_files_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.files_dir = dir.as_ref().to_path_buf();
        self
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self::new("files")
    }
}
