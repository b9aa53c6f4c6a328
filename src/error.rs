// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use thiserror::Error;

use crate::watcher::WatcherError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    #[error("follower thread panicked")]
    Panicked,

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Classify an IO error observed at `path` into the crate taxonomy.
    pub(crate) fn from_io_at(e: std::io::Error, path: &std::path::Path) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Error::PermissionDenied(path.to_path_buf()),
            _ => Error::Io(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
