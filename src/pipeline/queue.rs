// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
    time::Duration,
};

use tokio::sync::mpsc;

use crate::model::Message;

const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(1);
const DEPTH_WARN_THRESHOLD: usize = 100;
const DEPTH_WARN_INTERVAL: Duration = Duration::from_secs(5);

/// Bounded FIFO between the listeners and the processor (spec §4.12, §5).
/// Listeners enqueue with a non-blocking `put`; a full queue drops the
/// datagram and bumps `dropped()`. The processor's `dequeue` waits up to
/// one second so cancellation can be checked between polls.
pub struct MessageQueue {
    tx: mpsc::Sender<Message>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Message>>,
    depth: AtomicUsize,
    dropped: AtomicU64,
    last_depth_warning: std::sync::Mutex<Option<std::time::Instant>>,
}

impl MessageQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        MessageQueue {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            depth: AtomicUsize::new(0),
            dropped: AtomicU64::new(0),
            last_depth_warning: std::sync::Mutex::new(None),
        }
    }

    /// Non-blocking enqueue. On a full queue the message is dropped and the
    /// drop counter increments; this is the lossy backpressure signal at
    /// the UDP boundary described in spec §4.1/§5.
    pub fn put(&self, msg: Message) {
        match self.tx.try_send(msg) {
            Ok(()) => {
                let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
                self.warn_if_deep(depth);
            },
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::SeqCst);
                tracing::warn!("message queue full, dropping datagram");
            },
        }
    }

    /// Waits up to one second for the next message. `None` means the
    /// timeout elapsed with nothing to dequeue; callers retry and check
    /// for cancellation between attempts.
    pub async fn dequeue(&self) -> Option<Message> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(DEQUEUE_TIMEOUT, rx.recv()).await {
            Ok(Some(msg)) => {
                self.depth.fetch_sub(1, Ordering::SeqCst);
                Some(msg)
            },
            Ok(None) | Err(_) => None,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    fn warn_if_deep(&self, depth: usize) {
        if depth <= DEPTH_WARN_THRESHOLD {
            return;
        }
        let mut last = self.last_depth_warning.lock().unwrap_or_else(|e| e.into_inner());
        let now = std::time::Instant::now();
        if last.is_none_or(|t| now.duration_since(t) >= DEPTH_WARN_INTERVAL) {
            tracing::warn!(depth, "message queue depth exceeds threshold");
            *last = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Message, Severity};

    use super::*;

    #[tokio::test]
    async fn put_then_dequeue_round_trips() {
        let q = MessageQueue::new(4);
        let msg = Message::new_unknown("10.0.0.1".into(), Severity::Info, "hi".into());
        q.put(msg.clone());
        let got = q.dequeue().await.expect("message present");
        assert_eq!(got.id, msg.id);
    }

    #[tokio::test]
    async fn full_queue_drops_and_counts() {
        let q = MessageQueue::new(1);
        q.put(Message::new_unknown("1".into(), Severity::Info, "a".into()));
        q.put(Message::new_unknown("2".into(), Severity::Info, "b".into()));
        assert_eq!(q.dropped(), 1);
    }

    #[tokio::test]
    async fn dequeue_times_out_on_empty_queue() {
        let q = MessageQueue::new(4);
        assert!(q.dequeue().await.is_none());
    }
}
