// SPDX-License-Identifier: Apache-2.0

//! Event backend using the `notify` crate.
//!
//! OS-level file system notifications:
//! - Linux: inotify
//! - macOS: FSEvents
//! - Windows: ReadDirectoryChangesW
//!
//! Construction can fail on filesystems without notification support
//! (notably network mounts); callers fall back to the polling backend.

use std::path::Path;
use std::sync::Mutex;
use std::sync::mpsc::{Receiver, TryRecvError, channel};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::traits::{ChangeEvent, ChangeKind, ChangeWatcher, WatcherError};

/// Event backend delivering kernel-level change notifications.
pub struct NativeWatcher {
    watcher: RecommendedWatcher,
    receiver: Mutex<Receiver<Result<Event, notify::Error>>>,
}

impl NativeWatcher {
    pub fn new(debounce: Duration) -> Result<Self, WatcherError> {
        let (tx, rx) = channel();

        let config = Config::default().with_poll_interval(debounce);

        let watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            config,
        )
        .map_err(|e| WatcherError::Init(e.to_string()))?;

        Ok(Self {
            watcher,
            receiver: Mutex::new(rx),
        })
    }

    /// Convert a notify event into the backend-neutral vocabulary.
    fn convert_event(event: Event) -> Option<ChangeEvent> {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Renamed,
            EventKind::Modify(_) => ChangeKind::Modified,
            EventKind::Remove(_) => ChangeKind::Deleted,
            // Access events carry no content change; Any/Other are treated
            // as a modification hint so the follower re-checks snapshots.
            EventKind::Access(_) => return None,
            EventKind::Other | EventKind::Any => ChangeKind::Modified,
        };

        if event.paths.is_empty() {
            return None;
        }

        Some(ChangeEvent::new(kind, event.paths))
    }
}

impl ChangeWatcher for NativeWatcher {
    fn watch(&mut self, path: &Path) -> Result<(), WatcherError> {
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| WatcherError::Watch(e.to_string()))
    }

    fn unwatch(&mut self, path: &Path) -> Result<(), WatcherError> {
        self.watcher
            .unwatch(path)
            .map_err(|e| WatcherError::Watch(e.to_string()))
    }

    fn try_recv(&mut self) -> Result<Vec<ChangeEvent>, WatcherError> {
        let mut events = Vec::new();

        let receiver = self
            .receiver
            .lock()
            .map_err(|e| WatcherError::Channel(format!("mutex poisoned: {}", e)))?;

        loop {
            match receiver.try_recv() {
                Ok(Ok(event)) => {
                    if let Some(change) = Self::convert_event(event) {
                        events.push(change);
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!("File watcher error: {}", e);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(WatcherError::Channel("watcher channel disconnected".into()));
                }
            }
        }

        Ok(events)
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Result<Vec<ChangeEvent>, WatcherError> {
        let mut events = Vec::new();

        let receiver = self
            .receiver
            .lock()
            .map_err(|e| WatcherError::Channel(format!("mutex poisoned: {}", e)))?;

        match receiver.recv_timeout(timeout) {
            Ok(Ok(event)) => {
                if let Some(change) = Self::convert_event(event) {
                    events.push(change);
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("File watcher error: {}", e);
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                return Ok(events);
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                return Err(WatcherError::Channel("watcher channel disconnected".into()));
            }
        }

        // Drop the lock before draining the rest through try_recv
        drop(receiver);

        events.extend(self.try_recv()?);

        Ok(events)
    }

    fn is_native(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        #[cfg(target_os = "linux")]
        {
            "inotify"
        }
        #[cfg(target_os = "macos")]
        {
            "FSEvents"
        }
        #[cfg(target_os = "windows")]
        {
            "ReadDirectoryChangesW"
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            "native"
        }
    }
}
