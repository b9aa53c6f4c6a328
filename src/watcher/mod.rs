// SPDX-License-Identifier: Apache-2.0

//! Change backends for the follower.
//!
//! Two interchangeable strategies behind one trait:
//! - **Native watching**: OS-level notifications (inotify on Linux, FSEvents
//!   on macOS, ReadDirectoryChangesW on Windows) for immediate detection.
//! - **Poll watching**: periodic stat cycles for environments where native
//!   watching is unavailable or unreliable (e.g. NFS, network shares).
//!
//! `Auto` mode tries native first and falls back to polling. A backend
//! choice is per-watcher, not global; every follower owns its own instance.

mod native;
mod poll;
mod traits;

pub use native::NativeWatcher;
pub use poll::PollWatcher;
pub use traits::{ChangeEvent, ChangeKind, ChangeWatcher, WatcherError};

use std::time::Duration;

/// Watch mode configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WatchMode {
    /// Try native watching first, fall back to polling on failure.
    #[default]
    Auto,
    /// Force native file system watching. Fails where unsupported.
    Native,
    /// Force polling. Use this for network file systems (NFS) or when
    /// native watching is unreliable.
    Poll,
}

/// Configuration for the change backend
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Watch mode: auto, native, or poll
    pub mode: WatchMode,
    /// Poll interval when using the polling backend
    pub poll_interval: Duration,
    /// Debounce interval for native events to batch rapid changes
    pub debounce_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            mode: WatchMode::Auto,
            poll_interval: Duration::from_secs(1),
            debounce_interval: Duration::from_millis(100),
        }
    }
}

/// Create a change backend per the configuration.
///
/// In `Auto` mode this tries native watching first and falls back to
/// polling if it cannot initialize; the fallback is local recovery and is
/// not surfaced to the caller as an error.
pub fn create_watcher(config: &WatcherConfig) -> Result<Box<dyn ChangeWatcher>, WatcherError> {
    match config.mode {
        WatchMode::Native => {
            let watcher = NativeWatcher::new(config.debounce_interval)?;
            Ok(Box::new(watcher))
        }
        WatchMode::Poll => Ok(Box::new(PollWatcher::new(config.poll_interval))),
        WatchMode::Auto => match NativeWatcher::new(config.debounce_interval) {
            Ok(watcher) => {
                tracing::info!("Using native file system watcher");
                Ok(Box::new(watcher))
            }
            Err(e) => {
                tracing::warn!(
                    "Native file watching unavailable ({}), falling back to polling",
                    e
                );
                Ok(Box::new(PollWatcher::new(config.poll_interval)))
            }
        },
    }
}
