// SPDX-License-Identifier: Apache-2.0

//! Pure rotation/truncation decisions on identity and size snapshots.
//!
//! Both change backends produce the same snapshots, so nothing here (or
//! downstream) branches on which backend is active.

use crate::identity::{FileIdentity, PathSnapshot};

/// What the follower should do with its current handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationAction {
    /// Same file, nothing lost: keep reading from the cursor.
    Continue,
    /// Same identity but the file shrank below the cursor: rewind to zero
    /// and re-read through the same handle. Safe under either policy.
    Truncated,
    /// The path now refers to a different file, or to none at all: drain
    /// the old handle, then stop (`FollowDescriptor`) or wait for the path
    /// and reopen (`FollowName`).
    Rotated,
}

/// Decide what happened, given the follower's cursor identity and offset,
/// the length reachable through the still-open handle, and a fresh snapshot
/// of the path (`None` when the path is currently absent).
pub fn resolve(
    cursor_identity: FileIdentity,
    cursor_offset: u64,
    handle_len: u64,
    path_snapshot: Option<&PathSnapshot>,
) -> RotationAction {
    match path_snapshot {
        // A vanished path after the file existed is a rotation in
        // progress, not a terminal condition.
        None => RotationAction::Rotated,
        Some(snap) if snap.identity != cursor_identity => RotationAction::Rotated,
        Some(_) => {
            if handle_len < cursor_offset {
                RotationAction::Truncated
            } else {
                RotationAction::Continue
            }
        }
    }
}
