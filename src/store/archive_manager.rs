// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{path::PathBuf, sync::Arc};

use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::Row;
use tokio::{
    fs,
    io::AsyncWriteExt,
};

use crate::{error::StorageError, store::Store};

/// Rotates messages older than a retention cutoff into dated JSONL files
/// and records them in the `archives` index table (spec §4.11).
#[derive(Debug, Clone)]
pub struct ArchiveManager {
    store: Arc<Store>,
    archive_dir: PathBuf,
}

impl ArchiveManager {
    pub fn new(store: Arc<Store>, archive_dir: impl Into<PathBuf>) -> Self {
        ArchiveManager {
            store,
            archive_dir: archive_dir.into(),
        }
    }

    /// Archives every message older than `retention_days`. A no-op if
    /// nothing qualifies; otherwise writes the archive file before deleting
    /// the source rows, so a crash mid-archive never loses data (spec
    /// §4.11 step 8).
    pub async fn archive_old(&self, retention_days: u32) -> Result<(), StorageError> {
        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        let cutoff_str = cutoff.to_rfc3339();

        let rows = sqlx::query(
            "SELECT id, timestamp, source_ip, type, severity, payload, metadata
             FROM messages WHERE timestamp < ? ORDER BY timestamp ASC",
        )
        .bind(&cutoff_str)
        .fetch_all(self.store.pool())
        .await
        .map_err(StorageError::Database)?;

        if rows.is_empty() {
            return Ok(());
        }

        fs::create_dir_all(&self.archive_dir)
            .await
            .map_err(|e| StorageError::Database(sqlx::Error::Io(e)))?;

        let filename = format!("archive_{}.jsonl", Utc::now().format("%Y%m%d_%H%M%S"));
        let filepath = self.archive_dir.join(&filename);

        let mut file = fs::File::create(&filepath)
            .await
            .map_err(|e| StorageError::Database(sqlx::Error::Io(e)))?;

        let mut start_date = String::new();
        let mut end_date = String::new();
        let record_count = rows.len() as i64;

        for (idx, row) in rows.iter().enumerate() {
            let id: String = row.try_get("id").map_err(StorageError::Database)?;
            let timestamp: String = row.try_get("timestamp").map_err(StorageError::Database)?;
            let source_ip: String = row.try_get("source_ip").map_err(StorageError::Database)?;
            let ty: String = row.try_get("type").map_err(StorageError::Database)?;
            let severity: String = row.try_get("severity").map_err(StorageError::Database)?;
            let payload: String = row.try_get("payload").map_err(StorageError::Database)?;
            let metadata_raw: String = row.try_get("metadata").map_err(StorageError::Database)?;
            let metadata: serde_json::Value =
                serde_json::from_str(&metadata_raw).unwrap_or(serde_json::Value::Null);

            if idx == 0 {
                start_date = timestamp.clone();
            }
            end_date = timestamp.clone();

            let line = json!({
                "id": id,
                "timestamp": timestamp,
                "source_ip": source_ip,
                "type": ty,
                "severity": severity,
                "payload": payload,
                "metadata": metadata,
            });
            file.write_all(line.to_string().as_bytes())
                .await
                .map_err(|e| StorageError::Database(sqlx::Error::Io(e)))?;
            file.write_all(b"\n")
                .await
                .map_err(|e| StorageError::Database(sqlx::Error::Io(e)))?;
        }
        file.flush()
            .await
            .map_err(|e| StorageError::Database(sqlx::Error::Io(e)))?;

        let mut tx = self.store.pool().begin().await.map_err(StorageError::Database)?;
        sqlx::query("DELETE FROM messages WHERE timestamp < ?")
            .bind(&cutoff_str)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::Database)?;
        sqlx::query(
            "INSERT INTO archives (filename, start_date, end_date, record_count)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&filename)
        .bind(start_date)
        .bind(end_date)
        .bind(record_count)
        .execute(&mut *tx)
        .await
        .map_err(StorageError::Database)?;
        tx.commit().await.map_err(StorageError::Database)?;

        Ok(())
    }
}
