// SPDX-License-Identifier: Apache-2.0

//! The follower: a live stream of parsed lines from one file.
//!
//! Architecture:
//! - A dedicated OS thread hosts the blocking event-wait/read loop, so the
//!   consumer is never blocked on backend I/O.
//! - Parsed records flow to the consumer over a bounded channel that
//!   preserves line order and applies backpressure.
//! - All rotation and truncation decisions are made on identity/size
//!   snapshots; nothing branches on which change backend is active.
//!
//! A follower runs until cancelled, until a terminal error, or (under
//! `FollowDescriptor`) until the file is rotated away. The file handle and
//! watcher subscription are released on every exit path.

mod config;
mod reader;
mod rotation;

pub use config::{FollowerConfig, RotationPolicy, StartPolicy};

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bounded_channel::{self, BoundedReceiver, BoundedSender, SendError};
use crate::error::{Error, Result};
use crate::identity::PathSnapshot;
use crate::parser::{LineParser, ParseResult};
use crate::watcher::{ChangeWatcher, WatcherConfig, WatcherError, create_watcher};

use reader::TailReader;
use rotation::RotationAction;

/// Debounce for native event batching.
const NATIVE_DEBOUNCE: Duration = Duration::from_millis(100);

/// Upper bound on one event wait under the native backend, so cancellation
/// is observed promptly even when no events arrive.
const NATIVE_TICK: Duration = Duration::from_millis(250);

/// Cap on one blocked send, so a full channel never hides a cancellation.
const SEND_TICK: Duration = Duration::from_millis(100);

/// Why a follower stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `FollowDescriptor` policy: the file was rotated away and the old
    /// handle fully drained.
    Rotated,
    /// Cancellation was requested, or the consumer dropped the stream.
    Cancelled,
}

/// A configured follower, ready to start.
pub struct Follower {
    config: FollowerConfig,
    parser: Box<dyn LineParser>,
}

impl Follower {
    pub fn new(config: FollowerConfig, parser: Box<dyn LineParser>) -> Result<Self> {
        config.validate().map_err(Error::Config)?;
        Ok(Self { config, parser })
    }

    /// Open the file, subscribe the change backend, and begin emitting.
    ///
    /// Fails here, not later, when the path cannot be observed at all:
    /// missing under `FollowDescriptor`, permission denied, or no backend
    /// able to watch it. A missing path under `FollowName` instead starts
    /// in the wait state.
    pub fn start(self) -> Result<FollowerHandle> {
        let Follower { config, parser } = self;

        let mut watcher = create_watcher(&WatcherConfig {
            mode: config.watch_mode,
            poll_interval: config.poll_interval,
            debounce_interval: NATIVE_DEBOUNCE,
        })?;

        // Watch the containing directory so deletion+recreation under the
        // same name stays observable, then the file itself. The file watch
        // is allowed to fail only while the path does not exist.
        watcher.watch(&parent_dir(&config.path))?;
        if let Err(e) = watcher.watch(&config.path) {
            if config.path.exists() {
                return Err(e.into());
            }
        }

        let reader = match TailReader::open(
            &config.path,
            config.start_policy,
            config.max_tail_scan_bytes,
            config.max_line_bytes,
        ) {
            Ok(r) => Some(r),
            Err(e) if e.kind() == io::ErrorKind::NotFound => match config.rotation_policy {
                RotationPolicy::FollowName => None,
                RotationPolicy::FollowDescriptor => {
                    return Err(Error::FileNotFound(config.path));
                }
            },
            Err(e) => return Err(Error::from_io_at(e, &config.path)),
        };

        info!(
            path = ?config.path,
            backend = watcher.backend_name(),
            start = ?config.start_policy,
            rotation = ?config.rotation_policy,
            "Starting follower"
        );

        let (records_tx, records_rx) = bounded_channel::bounded(config.channel_capacity);
        let cancel = CancellationToken::new();

        let follow_loop = FollowLoop {
            config,
            watcher,
            parser,
            records_tx,
            cancel: cancel.clone(),
        };

        let thread = std::thread::Builder::new()
            .name("linetail-follower".to_string())
            .spawn(move || follow_loop.run(reader))?;

        Ok(FollowerHandle {
            records: records_rx,
            cancel,
            thread: Some(thread),
        })
    }
}

/// Handle to a running follower: the record stream plus cancel/join.
///
/// The stream is lazy and not restartable in place; to resume after
/// consuming or cancelling it, construct a new [`Follower`].
pub struct FollowerHandle {
    records: BoundedReceiver<ParseResult>,
    cancel: CancellationToken,
    thread: Option<std::thread::JoinHandle<Result<StopReason>>>,
}

impl FollowerHandle {
    /// Next record, awaited. `None` once the follower has terminated and
    /// the stream is drained.
    pub async fn next(&mut self) -> Option<ParseResult> {
        self.records.next().await
    }

    /// Next record, blocking.
    pub fn recv(&mut self) -> Option<ParseResult> {
        self.records.recv_blocking()
    }

    /// Next record, blocking up to `timeout`.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<ParseResult> {
        self.records.recv_timeout(timeout)
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<ParseResult> {
        self.records.try_recv()
    }

    /// Request a prompt stop. Observed at the next event-wait or read
    /// boundary: within one poll interval under the polling backend. The
    /// event backend wakes on an internal tick (250 ms, or the poll
    /// interval if shorter) even when no events arrive, so cancellation is
    /// bounded by that tick rather than instantaneous.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the follower thread and return how it stopped.
    pub fn join(mut self) -> Result<StopReason> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| Error::Panicked)?,
            None => Ok(StopReason::Cancelled),
        }
    }
}

impl Drop for FollowerHandle {
    fn drop(&mut self) {
        // Dropping the receiver alone would stop the thread at its next
        // send; cancelling makes it prompt even when no records are
        // flowing.
        self.cancel.cancel();
    }
}

/// Outcome of servicing the active handle once.
enum Flow {
    Continue,
    /// `FollowName`: old identity fully drained, wait for the path.
    Reopen,
    Stop(StopReason),
}

/// The loop hosted on the follower's dedicated thread. Cursor and identity
/// are mutated only here; there are no concurrent writers to follower
/// state.
struct FollowLoop {
    config: FollowerConfig,
    watcher: Box<dyn ChangeWatcher>,
    parser: Box<dyn LineParser>,
    records_tx: BoundedSender<ParseResult>,
    cancel: CancellationToken,
}

impl FollowLoop {
    fn run(mut self, mut reader: Option<TailReader>) -> Result<StopReason> {
        let tick = if self.watcher.is_native() {
            NATIVE_TICK.min(self.config.poll_interval)
        } else {
            self.config.poll_interval
        };

        let mut wait_started: Option<Instant> = None;
        let mut last_heartbeat = Instant::now();
        if reader.is_none() {
            wait_started = Some(Instant::now());
            info!(path = ?self.config.path, "File absent at start, waiting for it to appear");
        }

        let result = loop {
            if self.cancel.is_cancelled() {
                break Ok(StopReason::Cancelled);
            }

            if let Some(ref mut r) = reader {
                match self.service_active(r) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Reopen) => {
                        reader = None;
                        wait_started = Some(Instant::now());
                        last_heartbeat = Instant::now();
                    }
                    Ok(Flow::Stop(reason)) => break Ok(reason),
                    Err(e) => break Err(e),
                }
            }

            if reader.is_none() {
                match self.try_reopen() {
                    Ok(Some(r)) => {
                        reader = Some(r);
                        wait_started = None;
                        // read the new file's pre-existing content now
                        // rather than after the next event wait
                        continue;
                    }
                    Ok(None) => {
                        // unbounded by design; emit a diagnostic instead of
                        // failing
                        if last_heartbeat.elapsed() >= self.config.wait_heartbeat {
                            last_heartbeat = Instant::now();
                            warn!(
                                path = ?self.config.path,
                                waited = ?wait_started.map(|s| s.elapsed()),
                                "Still waiting for rotated file to reappear"
                            );
                        }
                    }
                    Err(e) => break Err(e),
                }
            }

            // Events are a wakeup hint only; correctness comes from the
            // snapshot checks above, identically for both backends.
            match self.watcher.recv_timeout(tick) {
                Ok(_events) => {}
                Err(e) => break Err(self.classify_watcher_error(e)),
            }
        };

        match &result {
            Ok(reason) => info!(path = ?self.config.path, ?reason, "Follower stopped"),
            Err(e) => warn!(path = ?self.config.path, error = %e, "Follower failed"),
        }

        // reader, watcher and sender drop here, on every exit path
        result
    }

    /// Snapshot the path, resolve rotation/truncation, and pump available
    /// bytes through the parser.
    fn service_active(&mut self, reader: &mut TailReader) -> Result<Flow> {
        let snapshot = PathSnapshot::of(&self.config.path)
            .map_err(|e| Error::from_io_at(e, &self.config.path))?;
        let handle_len = reader.handle_len()?;

        match rotation::resolve(
            reader.identity(),
            reader.offset(),
            handle_len,
            snapshot.as_ref(),
        ) {
            RotationAction::Continue => {
                if !self.pump(reader)? {
                    return Ok(Flow::Stop(StopReason::Cancelled));
                }
                Ok(Flow::Continue)
            }
            RotationAction::Truncated => {
                debug!(
                    path = ?self.config.path,
                    offset = reader.offset(),
                    len = handle_len,
                    "Truncation detected, rewinding"
                );
                reader.rewind();
                if !self.pump(reader)? {
                    return Ok(Flow::Stop(StopReason::Cancelled));
                }
                Ok(Flow::Continue)
            }
            RotationAction::Rotated => {
                debug!(path = ?self.config.path, "Rotation detected, draining old file");
                if !self.pump(reader)? {
                    return Ok(Flow::Stop(StopReason::Cancelled));
                }
                // No future append can complete the fragment on the retired
                // identity; emit it as the old file's final line.
                if let Some(fragment) = reader.take_remainder() {
                    let result = self.parser.parse_line(&fragment);
                    if self.emit(result).is_err() {
                        return Ok(Flow::Stop(StopReason::Cancelled));
                    }
                }

                match self.config.rotation_policy {
                    RotationPolicy::FollowDescriptor => Ok(Flow::Stop(StopReason::Rotated)),
                    RotationPolicy::FollowName => Ok(Flow::Reopen),
                }
            }
        }
    }

    /// One reopen attempt during the rotation wait. The path snapshot is
    /// re-queried on every retry, so a writer recreating the path between
    /// checks is not missed.
    fn try_reopen(&mut self) -> Result<Option<TailReader>> {
        match PathSnapshot::of(&self.config.path) {
            Ok(None) => Ok(None),
            Ok(Some(_)) => match TailReader::reopen(&self.config.path, self.config.max_line_bytes)
            {
                Ok(r) => {
                    info!(path = ?self.config.path, identity = %r.identity(), "File reappeared, resuming from start");
                    // re-register; the previous file watch went away with
                    // the old name
                    if let Err(e) = self.watcher.watch(&self.config.path) {
                        debug!(error = %e, "Re-watch after rotation failed, relying on directory watch");
                    }
                    Ok(Some(r))
                }
                // raced away again between the stat and the open
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(Error::from_io_at(e, &self.config.path)),
            },
            Err(e) => Err(Error::from_io_at(e, &self.config.path)),
        }
    }

    /// Read available bytes, parse each line, and forward the results in
    /// order. Returns `Ok(false)` when emission stopped because of
    /// cancellation or a dropped consumer.
    fn pump(&mut self, reader: &mut TailReader) -> Result<bool> {
        let parser = &mut self.parser;
        let records_tx = &self.records_tx;
        let cancel = &self.cancel;

        let completed = reader.read_lines(&mut |line| {
            let result = parser.parse_line(&line);
            emit_with_backpressure(records_tx, cancel, result).is_ok()
        })?;

        Ok(completed)
    }

    fn emit(&mut self, result: ParseResult) -> std::result::Result<(), ()> {
        emit_with_backpressure(&self.records_tx, &self.cancel, result)
    }

    fn classify_watcher_error(&self, e: WatcherError) -> Error {
        match e {
            WatcherError::Io(ioe) if ioe.kind() == io::ErrorKind::PermissionDenied => {
                Error::PermissionDenied(self.config.path.clone())
            }
            WatcherError::Io(ioe) if ioe.kind() == io::ErrorKind::NotFound => {
                // the watched directory itself vanished
                Error::FileNotFound(self.config.path.clone())
            }
            other => Error::Watcher(other),
        }
    }
}

/// Blocking send with bounded waits: a full channel is backpressure, not an
/// error, but cancellation must stay observable while blocked.
fn emit_with_backpressure(
    tx: &BoundedSender<ParseResult>,
    cancel: &CancellationToken,
    result: ParseResult,
) -> std::result::Result<(), ()> {
    let mut item = result;
    loop {
        if cancel.is_cancelled() {
            return Err(());
        }
        match tx.send_timeout(item, SEND_TICK) {
            Ok(()) => return Ok(()),
            Err(SendError::Timeout(v)) => item = v,
            // consumer dropped the stream: a clean stop, not an error
            Err(SendError::Disconnected(_)) => return Err(()),
        }
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PlainParser;
    use std::fs::File;

    fn plain(path: &Path) -> Box<dyn LineParser> {
        Box::new(PlainParser::new().with_path(path))
    }

    #[test]
    fn test_empty_path_rejected() {
        let result = Follower::new(FollowerConfig::default(), Box::new(PlainParser::new()));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_fatal_under_follow_descriptor() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent.log");

        let config = FollowerConfig {
            path: path.clone(),
            rotation_policy: RotationPolicy::FollowDescriptor,
            ..Default::default()
        };
        let follower = Follower::new(config, plain(&path)).unwrap();

        match follower.start() {
            Err(Error::FileNotFound(p)) => assert_eq!(p, path),
            other => panic!("expected FileNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_file_waits_under_follow_name() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("later.log");

        let config = FollowerConfig {
            path: path.clone(),
            rotation_policy: RotationPolicy::FollowName,
            poll_interval: Duration::from_millis(25),
            ..Default::default()
        };
        let handle = Follower::new(config, plain(&path)).unwrap().start().unwrap();

        handle.cancel();
        assert_eq!(handle.join().unwrap(), StopReason::Cancelled);
    }

    #[test]
    fn test_handle_released_on_cancel() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        File::create(&path).unwrap();

        let config = FollowerConfig {
            path: path.clone(),
            poll_interval: Duration::from_millis(25),
            ..Default::default()
        };
        let handle = Follower::new(config, plain(&path)).unwrap().start().unwrap();

        handle.cancel();
        assert_eq!(handle.join().unwrap(), StopReason::Cancelled);
    }

    #[test]
    fn test_parent_dir_of_bare_filename() {
        assert_eq!(parent_dir(Path::new("app.log")), PathBuf::from("."));
        assert_eq!(parent_dir(Path::new("/var/log/app.log")), PathBuf::from("/var/log"));
    }
}
