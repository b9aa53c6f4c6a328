// SPDX-License-Identifier: Apache-2.0

//! End-to-end follower tests over real files: start policies, append
//! streaming, truncation, rotation under both policies, and cancellation
//! latency.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use linetail::follower::{Follower, FollowerConfig, RotationPolicy, StartPolicy, StopReason};
use linetail::parser::{ParseResult, PlainParser};
use linetail::watcher::WatchMode;

const POLL: Duration = Duration::from_millis(50);
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn config(path: &Path) -> FollowerConfig {
    FollowerConfig {
        path: path.to_path_buf(),
        start_policy: StartPolicy::FromStart,
        rotation_policy: RotationPolicy::FollowName,
        watch_mode: WatchMode::Poll,
        poll_interval: POLL,
        ..Default::default()
    }
}

fn start(config: FollowerConfig) -> linetail::follower::FollowerHandle {
    Follower::new(config, Box::new(PlainParser::new()))
        .unwrap()
        .start()
        .unwrap()
}

fn write_file(path: &Path, content: &[u8]) {
    let mut f = File::create(path).unwrap();
    f.write_all(content).unwrap();
    f.flush().unwrap();
}

fn append(path: &Path, content: &[u8]) {
    let mut f = OpenOptions::new().append(true).open(path).unwrap();
    f.write_all(content).unwrap();
    f.flush().unwrap();
}

fn line_of(result: &ParseResult) -> String {
    result.record().expect("expected a record")["line"]
        .as_str()
        .unwrap()
        .to_string()
}

fn recv_lines(handle: &mut linetail::follower::FollowerHandle, n: usize) -> Vec<String> {
    let mut lines = Vec::with_capacity(n);
    for _ in 0..n {
        let result = handle
            .recv_timeout(RECV_TIMEOUT)
            .expect("timed out waiting for a record");
        lines.push(line_of(&result));
    }
    lines
}

fn temp_log(dir: &TempDir) -> PathBuf {
    dir.path().join("app.log")
}

#[test]
fn from_start_emits_preexisting_then_appended() {
    let dir = TempDir::new().unwrap();
    let path = temp_log(&dir);
    write_file(&path, b"l1\nl2\nl3\nl4\nl5\n");

    let mut handle = start(config(&path));

    assert_eq!(recv_lines(&mut handle, 5), vec!["l1", "l2", "l3", "l4", "l5"]);

    append(&path, b"l6\n");
    assert_eq!(recv_lines(&mut handle, 1), vec!["l6"]);

    handle.cancel();
    assert_eq!(handle.join().unwrap(), StopReason::Cancelled);
}

#[test]
fn tail_lines_emits_exactly_last_n() {
    let dir = TempDir::new().unwrap();
    let path = temp_log(&dir);
    write_file(&path, b"old1\nold2\nold3\nold4\n");

    let mut handle = start(FollowerConfig {
        start_policy: StartPolicy::TailLines(2),
        ..config(&path)
    });

    assert_eq!(recv_lines(&mut handle, 2), vec!["old3", "old4"]);

    // nothing more pending before new appends
    assert!(handle.recv_timeout(POLL * 4).is_none());

    handle.cancel();
    handle.join().unwrap();
}

#[test]
fn from_end_skips_preexisting() {
    let dir = TempDir::new().unwrap();
    let path = temp_log(&dir);
    write_file(&path, b"old1\nold2\n");

    let mut handle = start(FollowerConfig {
        start_policy: StartPolicy::FromEnd,
        ..config(&path)
    });

    append(&path, b"new1\n");
    assert_eq!(recv_lines(&mut handle, 1), vec!["new1"]);

    handle.cancel();
    handle.join().unwrap();
}

#[test]
fn line_split_across_appends_emitted_once() {
    let dir = TempDir::new().unwrap();
    let path = temp_log(&dir);
    write_file(&path, b"");

    let mut handle = start(config(&path));

    append(&path, b"first half, ");
    // give the follower a chance to consume the fragment
    std::thread::sleep(POLL * 4);
    append(&path, b"second half\nnext\n");

    assert_eq!(
        recv_lines(&mut handle, 2),
        vec!["first half, second half", "next"]
    );

    handle.cancel();
    handle.join().unwrap();
}

#[test]
fn no_byte_loss_across_many_appends() {
    let dir = TempDir::new().unwrap();
    let path = temp_log(&dir);
    write_file(&path, b"");

    let mut handle = start(config(&path));

    let mut expected = Vec::new();
    for i in 0..200 {
        let line = format!("record-{:04}", i);
        append(&path, format!("{}\n", line).as_bytes());
        expected.push(line);
        if i % 50 == 0 {
            std::thread::sleep(POLL);
        }
    }

    assert_eq!(recv_lines(&mut handle, 200), expected);

    handle.cancel();
    handle.join().unwrap();
}

#[test]
fn truncation_rewinds_without_stale_replay() {
    let dir = TempDir::new().unwrap();
    let path = temp_log(&dir);
    write_file(&path, b"old line one\nold line two\n");

    let mut handle = start(config(&path));
    assert_eq!(recv_lines(&mut handle, 2), vec!["old line one", "old line two"]);

    // truncate in place, then write fresh content
    write_file(&path, b"");
    std::thread::sleep(POLL * 4);
    append(&path, b"fresh\n");

    assert_eq!(recv_lines(&mut handle, 1), vec!["fresh"]);
    assert!(handle.recv_timeout(POLL * 4).is_none(), "no stale replay");

    handle.cancel();
    handle.join().unwrap();
}

#[test]
fn rotation_follow_name_drains_then_switches() {
    let dir = TempDir::new().unwrap();
    let path = temp_log(&dir);
    write_file(&path, b"old1\nold2\n");

    let mut handle = start(config(&path));
    assert_eq!(recv_lines(&mut handle, 2), vec!["old1", "old2"]);

    // rotate: rename away, then recreate the path with fresh content
    let rotated = dir.path().join("app.log.1");
    fs::rename(&path, &rotated).unwrap();
    write_file(&path, b"new1\nnew2\n");

    // the new file is read from its start, nothing lost or repeated
    assert_eq!(recv_lines(&mut handle, 2), vec!["new1", "new2"]);

    // still live on the new file
    append(&path, b"new3\n");
    assert_eq!(recv_lines(&mut handle, 1), vec!["new3"]);

    handle.cancel();
    handle.join().unwrap();
}

#[test]
fn rotation_follow_name_emits_unterminated_final_line() {
    let dir = TempDir::new().unwrap();
    let path = temp_log(&dir);
    write_file(&path, b"done\npartial");

    let mut handle = start(config(&path));
    assert_eq!(recv_lines(&mut handle, 1), vec!["done"]);

    fs::rename(&path, dir.path().join("app.log.1")).unwrap();
    write_file(&path, b"new\n");

    // no append can ever complete the old fragment; it is the old file's
    // final line
    assert_eq!(recv_lines(&mut handle, 2), vec!["partial", "new"]);

    handle.cancel();
    handle.join().unwrap();
}

#[test]
fn rotation_follow_descriptor_stops_after_drain() {
    let dir = TempDir::new().unwrap();
    let path = temp_log(&dir);
    // the unterminated fragment is buffered in the follower before the
    // rename, so the drain has something deterministic to emit
    write_file(&path, b"old1\nold-fragment");

    let mut handle = start(FollowerConfig {
        rotation_policy: RotationPolicy::FollowDescriptor,
        ..config(&path)
    });
    assert_eq!(recv_lines(&mut handle, 1), vec!["old1"]);

    fs::rename(&path, dir.path().join("app.log.1")).unwrap();
    write_file(&path, b"never seen\n");

    // drains the old identity, then stops without touching the new file
    assert_eq!(recv_lines(&mut handle, 1), vec!["old-fragment"]);
    assert!(handle.recv_timeout(POLL * 6).is_none());

    assert_eq!(handle.join().unwrap(), StopReason::Rotated);
}

#[test]
fn file_created_after_start_under_follow_name() {
    let dir = TempDir::new().unwrap();
    let path = temp_log(&dir);

    let mut handle = start(config(&path));

    std::thread::sleep(POLL * 2);
    write_file(&path, b"born late\n");

    assert_eq!(recv_lines(&mut handle, 1), vec!["born late"]);

    handle.cancel();
    handle.join().unwrap();
}

#[test]
fn invalid_utf8_forwarded_in_order() {
    let dir = TempDir::new().unwrap();
    let path = temp_log(&dir);
    write_file(&path, b"");

    let mut handle = start(config(&path));

    append(&path, b"good one\n");
    append(&path, &[0xff, 0xfe, b'\n']);
    append(&path, b"good two\n");

    let first = handle.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(line_of(&first), "good one");

    let second = handle.recv_timeout(RECV_TIMEOUT).unwrap();
    match second {
        ParseResult::Failed { raw, .. } => assert_eq!(raw, vec![0xff, 0xfe]),
        other => panic!("expected failure, got {:?}", other),
    }

    let third = handle.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(line_of(&third), "good two");

    handle.cancel();
    handle.join().unwrap();
}

// File modes do not bind root, so these assertions are vacuous there.
#[cfg(unix)]
fn lock_dir(dir: &Path, path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(dir, fs::Permissions::from_mode(0o000)).unwrap();
    if File::open(path).is_ok() {
        unlock_dir(dir);
        return false;
    }
    true
}

#[cfg(unix)]
fn unlock_dir(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(unix)]
#[test]
fn permission_denied_is_fatal_at_start() {
    let dir = TempDir::new().unwrap();
    let locked = dir.path().join("locked");
    fs::create_dir(&locked).unwrap();
    let path = locked.join("app.log");
    write_file(&path, b"unreadable\n");

    if !lock_dir(&locked, &path) {
        return;
    }

    let result = Follower::new(config(&path), Box::new(PlainParser::new()))
        .unwrap()
        .start();
    match result {
        Err(linetail::Error::PermissionDenied(p)) => assert_eq!(p, path),
        other => panic!("expected PermissionDenied, got {:?}", other.map(|_| ())),
    }

    unlock_dir(&locked);
}

#[cfg(unix)]
#[test]
fn permission_denied_mid_follow_fails_the_follower() {
    let dir = TempDir::new().unwrap();
    let locked = dir.path().join("locked");
    fs::create_dir(&locked).unwrap();
    let path = locked.join("app.log");
    write_file(&path, b"one\n");

    let mut handle = start(config(&path));
    assert_eq!(recv_lines(&mut handle, 1), vec!["one"]);

    if !lock_dir(&locked, &path) {
        handle.cancel();
        handle.join().unwrap();
        return;
    }

    // the stream ends, and join surfaces the failure rather than a clean
    // stop
    assert!(handle.recv_timeout(RECV_TIMEOUT).is_none());
    match handle.join() {
        Err(linetail::Error::PermissionDenied(p)) => assert_eq!(p, path),
        other => panic!("expected PermissionDenied, got {:?}", other.map(|_| ())),
    }

    unlock_dir(&locked);
}

#[test]
fn cancellation_within_one_poll_interval() {
    let dir = TempDir::new().unwrap();
    let path = temp_log(&dir);
    write_file(&path, b"");

    let interval = Duration::from_millis(200);
    let handle = start(FollowerConfig {
        start_policy: StartPolicy::FromEnd,
        poll_interval: interval,
        ..config(&path)
    });

    // let the loop settle into its event wait
    std::thread::sleep(interval / 2);

    let begin = Instant::now();
    handle.cancel();
    assert_eq!(handle.join().unwrap(), StopReason::Cancelled);

    // one interval plus scheduling slack
    assert!(
        begin.elapsed() < interval + Duration::from_millis(300),
        "cancellation took {:?}",
        begin.elapsed()
    );
}

#[tokio::test]
async fn async_consumption_with_native_backend() {
    let dir = TempDir::new().unwrap();
    let path = temp_log(&dir);
    write_file(&path, b"one\ntwo\n");

    let mut handle = Follower::new(
        FollowerConfig {
            watch_mode: WatchMode::Auto,
            ..config(&path)
        },
        Box::new(PlainParser::new().with_path(&path)),
    )
    .unwrap()
    .start()
    .unwrap();

    let first = tokio::time::timeout(RECV_TIMEOUT, handle.next())
        .await
        .unwrap()
        .unwrap();
    let record = first.record().unwrap();
    assert_eq!(record["line"], "one");
    assert_eq!(record["line_number"], 1);
    assert_eq!(record["path"], path.display().to_string());

    let second = tokio::time::timeout(RECV_TIMEOUT, handle.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(line_of(&second), "two");

    handle.cancel();
    assert_eq!(handle.join().unwrap(), StopReason::Cancelled);
}
