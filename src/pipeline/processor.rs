// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
    pipeline::{
        enricher::Enricher, pattern_matcher::PatternMatcher, queue::MessageQueue,
        router::MessageRouter, validator::Validator,
    },
    store::{archive_manager::ArchiveManager, file_buffer::FileBuffer, Store},
};

const ARCHIVE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Owns the three persistent background tasks described in spec §5 and
/// wires the per-message pipeline together (spec §4.12).
pub struct Processor {
    pub queue: Arc<MessageQueue>,
    pub validator: Validator,
    pub matcher: PatternMatcher,
    pub enricher: Enricher,
    pub router: MessageRouter,
    pub buffer: Arc<FileBuffer>,
    pub store: Arc<Store>,
    pub archive_manager: ArchiveManager,
}

impl Processor {
    /// Dequeues messages and runs them through
    /// Validator → PatternMatcher → Enricher → Router → FileBuffer. A
    /// failing message never stops the loop (spec §7 propagation rule).
    pub async fn process_loop(&self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let Some(mut msg) = self.queue.dequeue().await else {
                continue;
            };
            self.process_one(&mut msg).await;
        }
    }

    async fn process_one(&self, msg: &mut crate::model::Message) {
        if !self.validator.validate(msg) {
            tracing::debug!(id = %msg.id, "message failed validation, dropping");
            return;
        }

        let matching = self.matcher.match_message(msg);
        let matching_owned: Vec<&crate::model::AlertRule> = matching;

        self.enricher.enrich(msg).await;

        let discard = self.router.route(msg, &matching_owned).await;
        if discard {
            return;
        }

        if let Err(e) = self.buffer.write(msg).await {
            tracing::warn!(error = %e, id = %msg.id, "failed to write message to file buffer");
        }
    }

    /// Flushes the file buffer into the store on a timer (spec §5).
    pub async fn batch_write_loop(&self, interval: Duration, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    self.flush_buffer_to_store().await;
                }
            }
        }
    }

    async fn flush_buffer_to_store(&self) {
        match self.buffer.flush().await {
            Ok(messages) => {
                for msg in &messages {
                    if let Err(e) = self.store.store_message(msg).await {
                        tracing::warn!(error = %e, id = %msg.id, "failed to persist buffered message");
                    }
                }
            },
            Err(e) => tracing::warn!(error = %e, "file buffer flush failed"),
        }
    }

    /// Rotates aged messages into archive files once a day (spec §5).
    pub async fn archive_loop(&self, retention_days: u32, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(ARCHIVE_INTERVAL) => {
                    if let Err(e) = self.archive_manager.archive_old(retention_days).await {
                        tracing::warn!(error = %e, "archive_old failed");
                    }
                }
            }
        }
    }

    /// Final flush on shutdown: drains the buffer into the store one last
    /// time (spec §4.12).
    pub async fn final_flush(&self) {
        self.flush_buffer_to_store().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        model::{Message, Severity},
        store::device_registry::DeviceRegistry,
    };

    use super::*;

    async fn test_processor() -> (Processor, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("mutt.db");
        let store = Arc::new(Store::initialize(db_path.to_str().expect("utf8")).await.expect("init"));
        let devices = Arc::new(DeviceRegistry::new(store.clone()));
        let buffer = Arc::new(FileBuffer::with_threshold(dir.path().join("buffer"), 100));
        let archive_manager = ArchiveManager::new(store.clone(), dir.path().join("archives"));

        let processor = Processor {
            queue: Arc::new(MessageQueue::new(10)),
            validator: Validator::new(),
            matcher: PatternMatcher::new(vec![]),
            enricher: Enricher::new(devices),
            router: MessageRouter::new(),
            buffer,
            store,
            archive_manager,
        };
        (processor, dir)
    }

    #[tokio::test]
    async fn invalid_message_is_dropped_before_buffering() {
        let (processor, _dir) = test_processor().await;
        let mut msg = Message::new_unknown(String::new(), Severity::Info, "x".into());
        processor.process_one(&mut msg).await;

        let flushed = processor.buffer.flush().await.expect("flush");
        assert!(flushed.is_empty());
    }

    #[tokio::test]
    async fn valid_message_reaches_the_buffer() {
        let (processor, _dir) = test_processor().await;
        let mut msg = Message::new_unknown("10.0.0.1".into(), Severity::Info, "hello".into());
        processor.process_one(&mut msg).await;

        let flushed = processor.buffer.flush().await.expect("flush");
        assert_eq!(flushed.len(), 1);
    }

    #[tokio::test]
    async fn final_flush_persists_buffered_messages_to_store() {
        let (processor, _dir) = test_processor().await;
        let mut msg = Message::new_unknown("10.0.0.2".into(), Severity::Info, "persist me".into());
        processor.process_one(&mut msg).await;

        processor.final_flush().await;

        let rows = processor.store.get_messages(10).await.expect("get_messages");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].payload, "persist me");
    }
}
