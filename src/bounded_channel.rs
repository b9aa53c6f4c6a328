// SPDX-License-Identifier: Apache-2.0

//! Bounded ordered hand-off between the follower thread and its consumer.
//!
//! One flume channel serves both sides: the follower thread uses the
//! blocking operations, the consumer may use either the blocking or the
//! async ones. A full channel blocks the producer (backpressure); nothing
//! is ever dropped or reordered.

use flume::{Receiver, Sender};
use std::fmt;
use std::time::Duration;

pub struct BoundedSender<T> {
    tx: Sender<T>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SendError<T> {
    /// Receiver side was dropped.
    Disconnected(T),
    /// Channel still full when the timeout expired; the item is returned so
    /// the caller can retry after checking for cancellation.
    Timeout(T),
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Disconnected(_) => write!(f, "channel disconnected"),
            SendError::Timeout(_) => write!(f, "send timed out"),
        }
    }
}

impl<T> BoundedSender<T> {
    pub async fn send(&self, item: T) -> Result<(), SendError<T>> {
        self.tx
            .send_async(item)
            .await
            .map_err(|e| SendError::Disconnected(e.into_inner()))
    }

    /// Blocking send, for use from dedicated OS threads.
    pub fn send_blocking(&self, item: T) -> Result<(), SendError<T>> {
        self.tx
            .send(item)
            .map_err(|e| SendError::Disconnected(e.into_inner()))
    }

    /// Blocking send that gives the item back on timeout, so the producer
    /// can observe cancellation while the channel is full.
    pub fn send_timeout(&self, item: T, timeout: Duration) -> Result<(), SendError<T>> {
        self.tx.send_timeout(item, timeout).map_err(|e| match e {
            flume::SendTimeoutError::Timeout(v) => SendError::Timeout(v),
            flume::SendTimeoutError::Disconnected(v) => SendError::Disconnected(v),
        })
    }
}

impl<T> Clone for BoundedSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

#[derive(Clone)]
pub struct BoundedReceiver<T> {
    rx: Receiver<T>,
}

impl<T> BoundedReceiver<T> {
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv_async().await.ok()
    }

    /// Blocking receive. Returns `None` once the channel is disconnected
    /// and drained.
    pub fn recv_blocking(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Non-blocking receive.
    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Blocking receive with timeout. Returns `None` on timeout or once
    /// disconnected and drained.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

pub fn bounded<T>(size: usize) -> (BoundedSender<T>, BoundedReceiver<T>) {
    let (tx, rx) = flume::bounded::<T>(size);

    (BoundedSender { tx }, BoundedReceiver { rx })
}
