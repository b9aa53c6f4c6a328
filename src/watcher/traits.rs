// SPDX-License-Identifier: Apache-2.0

//! Trait and event types shared by both change backends.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Error type for watcher operations
#[derive(Debug)]
pub enum WatcherError {
    /// Failed to initialize the backend (native notifications unavailable)
    Init(String),
    /// Failed to watch or unwatch a path
    Watch(String),
    /// IO error
    Io(std::io::Error),
    /// Event channel error
    Channel(String),
}

impl fmt::Display for WatcherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatcherError::Init(msg) => write!(f, "watcher initialization failed: {}", msg),
            WatcherError::Watch(msg) => write!(f, "watch failed: {}", msg),
            WatcherError::Io(e) => write!(f, "IO error: {}", e),
            WatcherError::Channel(msg) => write!(f, "channel error: {}", msg),
        }
    }
}

impl std::error::Error for WatcherError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WatcherError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WatcherError {
    fn from(e: std::io::Error) -> Self {
        WatcherError::Io(e)
    }
}

/// Kind of change observed at a watched path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A file appeared at the path
    Created,
    /// File content changed
    Modified,
    /// The path was renamed; under rotation the old name moves away
    Renamed,
    /// The file was removed
    Deleted,
}

/// A change notification
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// The path(s) affected; renames may carry both old and new
    pub paths: Vec<PathBuf>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, paths: Vec<PathBuf>) -> Self {
        Self { kind, paths }
    }

    pub fn created(path: PathBuf) -> Self {
        Self::new(ChangeKind::Created, vec![path])
    }

    pub fn modified(path: PathBuf) -> Self {
        Self::new(ChangeKind::Modified, vec![path])
    }

    pub fn renamed(path: PathBuf) -> Self {
        Self::new(ChangeKind::Renamed, vec![path])
    }

    pub fn deleted(path: PathBuf) -> Self {
        Self::new(ChangeKind::Deleted, vec![path])
    }
}

/// Trait for change backends.
///
/// Implementations use native OS notifications or polling; both produce
/// the same event vocabulary, so nothing downstream branches on which
/// backend is active.
pub trait ChangeWatcher: Send {
    /// Add a path to watch. The path is allowed to not exist yet; its
    /// appearance is then reported as `Created`.
    fn watch(&mut self, path: &std::path::Path) -> Result<(), WatcherError>;

    /// Remove a path from watching.
    fn unwatch(&mut self, path: &std::path::Path) -> Result<(), WatcherError>;

    /// Return any pending events without blocking.
    fn try_recv(&mut self) -> Result<Vec<ChangeEvent>, WatcherError>;

    /// Block until events are available or the timeout expires.
    /// Returns an empty vector on timeout.
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Vec<ChangeEvent>, WatcherError>;

    /// True for inotify/kqueue/FSEvents backends, false for polling.
    fn is_native(&self) -> bool;

    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;
}
