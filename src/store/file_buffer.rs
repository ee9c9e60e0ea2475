// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::PathBuf;

use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use crate::{
    error::BufferError,
    model::{Message, MessageType, MessageVariant, Severity},
};

const DEFAULT_FLUSH_THRESHOLD: usize = 100;

/// Durable append-only staging area for processed messages (spec §4.7).
/// Buffers JSON lines in memory up to `flush_threshold`, then appends them
/// to `<buffer_dir>/buffer_active.jsonl`. `flush()` forces everything to
/// disk, reads the whole file back, and truncates it.
pub struct FileBuffer {
    buffer_file: PathBuf,
    flush_threshold: usize,
    memory: Mutex<Vec<String>>,
}

impl FileBuffer {
    pub fn new(buffer_dir: impl Into<PathBuf>) -> Self {
        Self::with_threshold(buffer_dir, DEFAULT_FLUSH_THRESHOLD)
    }

    pub fn with_threshold(buffer_dir: impl Into<PathBuf>, flush_threshold: usize) -> Self {
        let buffer_dir = buffer_dir.into();
        FileBuffer {
            buffer_file: buffer_dir.join("buffer_active.jsonl"),
            flush_threshold,
            memory: Mutex::new(Vec::new()),
        }
    }

    /// Appends `msg` to the in-memory buffer, flushing to disk once
    /// `flush_threshold` lines have accumulated.
    pub async fn write(&self, msg: &Message) -> Result<(), BufferError> {
        let line = encode_line(msg);
        let mut guard = self.memory.lock().await;
        guard.push(line);
        if guard.len() >= self.flush_threshold {
            let lines = std::mem::take(&mut *guard);
            drop(guard);
            self.append_to_disk(lines).await?;
        }
        Ok(())
    }

    /// Forces in-memory lines to disk, then reads the entire file back,
    /// parsing each line into a `Message` (malformed lines are skipped with
    /// a warning) and truncates the file. Returns the messages read.
    pub async fn flush(&self) -> Result<Vec<Message>, BufferError> {
        {
            let mut guard = self.memory.lock().await;
            if !guard.is_empty() {
                let lines = std::mem::take(&mut *guard);
                drop(guard);
                self.append_to_disk(lines).await?;
            }
        }

        if let Some(parent) = self.buffer_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = match tokio::fs::read_to_string(&self.buffer_file).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BufferError::Io(e)),
        };

        let mut messages = Vec::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match decode_line(line) {
                Ok(msg) => messages.push(msg),
                Err(e) => tracing::warn!(error = %e, "skipping malformed buffer line"),
            }
        }

        tokio::fs::write(&self.buffer_file, b"").await?;
        Ok(messages)
    }

    async fn append_to_disk(&self, lines: Vec<String>) -> Result<(), BufferError> {
        if lines.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.buffer_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut batch = lines.join("\n");
        batch.push('\n');

        use tokio::io::AsyncWriteExt;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.buffer_file)
            .await?;
        file.write_all(batch.as_bytes()).await?;
        Ok(())
    }
}

fn encode_line(msg: &Message) -> String {
    let obj = json!({
        "id": msg.id,
        "timestamp": msg.timestamp.to_rfc3339(),
        "source_ip": msg.source_ip,
        "message_type": msg.message_type.to_string(),
        "severity": msg.severity.to_string(),
        "payload": msg.payload,
        "metadata": msg.metadata,
    });
    obj.to_string()
}

fn decode_line(line: &str) -> Result<Message, serde_json::Error> {
    let value: Value = serde_json::from_str(line)?;
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let timestamp = value
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(chrono::Utc::now);
    let source_ip = value
        .get("source_ip")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let message_type = match value.get("message_type").and_then(Value::as_str) {
        Some("SYSLOG") => MessageType::Syslog,
        Some("SNMP_TRAP") => MessageType::SnmpTrap,
        _ => MessageType::Unknown,
    };
    let severity = value
        .get("severity")
        .and_then(Value::as_str)
        .and_then(Severity::parse_loose)
        .unwrap_or(Severity::Info);
    let payload = value
        .get("payload")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let metadata = value
        .get("metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(Map::new);

    Ok(Message {
        id,
        timestamp,
        source_ip,
        message_type,
        severity,
        payload,
        metadata,
        variant: MessageVariant::Unknown,
    })
}

#[cfg(test)]
mod tests {
    use crate::model::Severity;

    use super::*;

    #[tokio::test]
    async fn flush_below_threshold_still_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let buffer = FileBuffer::with_threshold(dir.path(), 100);

        let msg = Message::new_unknown("10.0.0.1".into(), Severity::Critical, "oops".into());
        buffer.write(&msg).await.expect("write");

        let flushed = buffer.flush().await.expect("flush");
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].id, msg.id);
        assert_eq!(flushed[0].severity, Severity::Critical);

        // File is truncated after flush.
        let again = buffer.flush().await.expect("flush again");
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn write_flushes_automatically_at_threshold() {
        let dir = tempfile::tempdir().expect("tempdir");
        let buffer = FileBuffer::with_threshold(dir.path(), 2);

        for i in 0..2 {
            let msg = Message::new_unknown(format!("10.0.0.{i}"), Severity::Info, "x".into());
            buffer.write(&msg).await.expect("write");
        }

        let contents = tokio::fs::read_to_string(dir.path().join("buffer_active.jsonl"))
            .await
            .expect("read buffer file");
        assert_eq!(contents.lines().count(), 2);
    }

    #[tokio::test]
    async fn flush_skips_malformed_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        tokio::fs::write(dir.path().join("buffer_active.jsonl"), b"not json\n")
            .await
            .expect("seed malformed line");

        let buffer = FileBuffer::with_threshold(dir.path(), 100);
        let flushed = buffer.flush().await.expect("flush");
        assert!(flushed.is_empty());
    }
}
