// SPDX-License-Identifier: Apache-2.0

//! Polling backend, the fallback for filesystems where native notifications
//! are unavailable or unreliable (e.g. NFS).
//!
//! On a fixed interval each watched path is stat'd and its identity/size
//! compared to the previous snapshot. Transitions synthesize events; any
//! number of appends between two polls coalesce into a single `Modified`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::identity::PathSnapshot;

use super::traits::{ChangeEvent, ChangeWatcher, WatcherError};

/// Polling change backend over per-path identity/size snapshots.
pub struct PollWatcher {
    /// Last known snapshot per watched path; `None` means absent.
    watched: HashMap<PathBuf, Option<PathSnapshot>>,
    poll_interval: Duration,
    last_poll: Instant,
    pending_events: Vec<ChangeEvent>,
}

impl PollWatcher {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            watched: HashMap::new(),
            poll_interval,
            // ensure the first poll runs immediately
            last_poll: Instant::now() - poll_interval,
            pending_events: Vec::new(),
        }
    }

    /// Compare one path's snapshot to the previous one, synthesizing at
    /// most one event. Identity change outranks size/mtime change.
    fn diff(path: &Path, old: &Option<PathSnapshot>, new: &Option<PathSnapshot>) -> Option<ChangeEvent> {
        match (old, new) {
            (None, None) => None,
            (None, Some(_)) => Some(ChangeEvent::created(path.to_path_buf())),
            (Some(_), None) => Some(ChangeEvent::deleted(path.to_path_buf())),
            (Some(prev), Some(cur)) => {
                if prev.identity != cur.identity {
                    Some(ChangeEvent::renamed(path.to_path_buf()))
                } else if prev.size != cur.size || prev.modified != cur.modified {
                    Some(ChangeEvent::modified(path.to_path_buf()))
                } else {
                    None
                }
            }
        }
    }

    /// Re-stat every watched path and collect transition events.
    fn scan_all(&mut self) -> Result<(), WatcherError> {
        let mut events = Vec::new();

        for (path, state) in self.watched.iter_mut() {
            let new = PathSnapshot::of(path)?;
            if let Some(event) = Self::diff(path, state, &new) {
                events.push(event);
            }
            *state = new;
        }

        self.pending_events.extend(events);
        self.last_poll = Instant::now();

        Ok(())
    }

    fn poll_if_due(&mut self) -> Result<(), WatcherError> {
        if self.last_poll.elapsed() >= self.poll_interval {
            self.scan_all()?;
        }
        Ok(())
    }
}

impl ChangeWatcher for PollWatcher {
    fn watch(&mut self, path: &Path) -> Result<(), WatcherError> {
        // A missing path is fine; its appearance will surface as Created.
        // Permission problems surface here, at registration time.
        let snapshot = PathSnapshot::of(path)?;
        self.watched.insert(path.to_path_buf(), snapshot);
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) -> Result<(), WatcherError> {
        self.watched.remove(path);
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Vec<ChangeEvent>, WatcherError> {
        self.poll_if_due()?;
        Ok(std::mem::take(&mut self.pending_events))
    }

    fn recv_timeout(&mut self, timeout: Duration) -> Result<Vec<ChangeEvent>, WatcherError> {
        let deadline = Instant::now() + timeout;

        loop {
            self.poll_if_due()?;

            if !self.pending_events.is_empty() {
                return Ok(std::mem::take(&mut self.pending_events));
            }

            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }

            // sleep until the next poll or the deadline, whichever is sooner
            let to_next_poll = self.poll_interval.saturating_sub(self.last_poll.elapsed());
            let to_deadline = deadline.saturating_duration_since(Instant::now());
            let sleep = to_next_poll.min(to_deadline);

            if !sleep.is_zero() {
                std::thread::sleep(sleep);
            }
        }
    }

    fn is_native(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "poll"
    }
}
