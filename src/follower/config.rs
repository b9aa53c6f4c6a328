// SPDX-License-Identifier: Apache-2.0

//! Configuration for a follower.

use std::path::PathBuf;
use std::time::Duration;

use crate::watcher::WatchMode;

/// Where a newly constructed follower starts reading.
///
/// Consumed exactly once, at construction; rotation and truncation always
/// resume from offset zero regardless of the start policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartPolicy {
    /// Only lines appended after the follower starts.
    #[default]
    FromEnd,
    /// The whole file, then the live tail.
    FromStart,
    /// The last `n` pre-existing lines, then the live tail. Located by a
    /// reverse scan bounded by `max_tail_scan_bytes`.
    TailLines(usize),
}

/// What the follower does when the file at its path is replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RotationPolicy {
    /// Stop producing once the identity at the path changes, after draining
    /// bytes still reachable through the old handle (like `tail -f`).
    FollowDescriptor,
    /// Drain the old identity, then wait for a file to reappear at the path
    /// and resume from its start (like `tail -F`).
    #[default]
    FollowName,
}

/// Configuration for a follower
#[derive(Debug, Clone)]
pub struct FollowerConfig {
    /// File to follow
    pub path: PathBuf,
    /// Where to start reading
    pub start_policy: StartPolicy,
    /// Behavior on rotation
    pub rotation_policy: RotationPolicy,
    /// Watch mode: auto, native, or poll
    pub watch_mode: WatchMode,
    /// Poll interval for the polling backend; also the upper bound on
    /// cancellation latency
    pub poll_interval: Duration,
    /// Cap on the reverse scan performed by `StartPolicy::TailLines`
    pub max_tail_scan_bytes: u64,
    /// Cap on an unterminated line before it is yielded in chunks
    pub max_line_bytes: usize,
    /// Capacity of the record hand-off channel
    pub channel_capacity: usize,
    /// Interval between diagnostic heartbeats while waiting for a rotated
    /// file to reappear (the wait itself is unbounded)
    pub wait_heartbeat: Duration,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            start_policy: StartPolicy::FromEnd,
            rotation_policy: RotationPolicy::FollowName,
            watch_mode: WatchMode::Auto,
            poll_interval: Duration::from_secs(1),
            max_tail_scan_bytes: 256 * 1024,
            max_line_bytes: crate::line_buffer::DEFAULT_MAX_LINE_BYTES,
            channel_capacity: 256,
            wait_heartbeat: Duration::from_secs(30),
        }
    }
}

impl FollowerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.path.as_os_str().is_empty() {
            return Err("A file path must be specified".to_string());
        }

        if self.poll_interval.is_zero() {
            return Err("Poll interval must be non-zero".to_string());
        }

        if self.channel_capacity == 0 {
            return Err("Channel capacity must be non-zero".to_string());
        }

        if self.max_line_bytes == 0 {
            return Err("Max line size must be non-zero".to_string());
        }

        Ok(())
    }
}
