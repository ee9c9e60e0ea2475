// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Relational storage and the components layered on top of it: the device
//! registry, the SNMPv3 auth-failure tracker, the durable file buffer, and
//! the archival loop (spec §4.8-§4.11).

/// Auth-failure counters persisted in `snmpv3_auth_failures`.
pub mod auth_failure_tracker;
/// Cutoff-based rotation of aged messages into archive files.
pub mod archive_manager;
/// Device upserts keyed by IP.
pub mod device_registry;
/// The durable append-only staging buffer in front of batch writes.
pub mod file_buffer;
/// Schema DDL.
pub mod schema;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::Map;
use sqlx::{
    Row,
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
};

use crate::{
    error::StorageError,
    model::{Message, MessageType, MessageVariant, Severity},
};

/// Wraps a single-connection SQLite pool (spec §4.8, §5: "the connection is
/// single-threaded; callers must serialize through it"). `max_connections(1)`
/// gives that serialization for free: a second caller waits on the pool
/// rather than opening a concurrent connection.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// The underlying pool, for components that need statements this type
    /// doesn't expose directly (`DeviceRegistry`, `AuthFailureTracker`,
    /// `ArchiveManager`).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens the database at `db_path`, creating it if absent, and runs the
    /// schema DDL. Idempotent: safe to call against an already-initialized
    /// database.
    pub async fn initialize(db_path: &str) -> Result<Self, StorageError> {
        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{db_path}"))
            .map_err(StorageError::Database)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .map_err(StorageError::Database)?;
        sqlx::raw_sql(schema::SCHEMA_SQL)
            .execute(&pool)
            .await
            .map_err(StorageError::Database)?;
        Ok(Store { pool })
    }

    /// Inserts `msg`, merging its variant-specific fields into the stored
    /// metadata blob (spec §4.8).
    pub async fn store_message(&self, msg: &Message) -> Result<(), StorageError> {
        let metadata = serde_json::Value::Object(msg.metadata_for_storage());
        let metadata_json = serde_json::to_string(&metadata)?;

        sqlx::query(
            "INSERT INTO messages (id, timestamp, source_ip, type, severity, payload, metadata)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&msg.id)
        .bind(msg.timestamp.to_rfc3339())
        .bind(&msg.source_ip)
        .bind(msg.message_type.to_string())
        .bind(msg.severity.to_string())
        .bind(&msg.payload)
        .bind(metadata_json)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(())
    }

    /// Low-level escape hatch used by components that need a bespoke
    /// statement (spec §4.8). Returns the number of affected rows.
    pub async fn execute(&self, sql: &str) -> Result<u64, StorageError> {
        let result = sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;
        Ok(result.rows_affected())
    }

    /// The most recent `limit` messages, newest first. Variant-specific
    /// fields are not reconstructed out of metadata; callers needing them
    /// read `metadata` directly, matching the original's generic-`Message`
    /// read path (spec §4.8).
    pub async fn get_messages(&self, limit: i64) -> Result<Vec<Message>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, timestamp, source_ip, type, severity, payload, metadata
             FROM messages ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id").map_err(StorageError::Database)?;
            let ts: String = row.try_get("timestamp").map_err(StorageError::Database)?;
            let source_ip: String = row.try_get("source_ip").map_err(StorageError::Database)?;
            let ty: String = row.try_get("type").map_err(StorageError::Database)?;
            let sev: String = row.try_get("severity").map_err(StorageError::Database)?;
            let payload: String = row.try_get("payload").map_err(StorageError::Database)?;
            let metadata_raw: String = row.try_get("metadata").map_err(StorageError::Database)?;

            let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());
            let message_type = parse_message_type(&ty);
            let severity = Severity::parse_loose(&sev).unwrap_or(Severity::Info);
            let metadata: Map<String, serde_json::Value> =
                serde_json::from_str(&metadata_raw).unwrap_or_default();

            out.push(Message {
                id,
                timestamp,
                source_ip,
                message_type,
                severity,
                payload,
                metadata,
                variant: MessageVariant::Unknown,
            });
        }
        Ok(out)
    }
}

fn parse_message_type(s: &str) -> MessageType {
    match s {
        "SYSLOG" => MessageType::Syslog,
        "SNMP_TRAP" => MessageType::SnmpTrap,
        _ => MessageType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Message, Severity};

    use super::*;

    async fn open_temp_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("mutt.db");
        let store = Store::initialize(db_path.to_str().expect("utf8 path"))
            .await
            .expect("initialize");
        (store, dir)
    }

    #[tokio::test]
    async fn store_and_read_back_round_trips() {
        let (store, _dir) = open_temp_store().await;
        let msg = Message::new_unknown("10.0.0.5".into(), Severity::Warning, "disk full".into());
        store.store_message(&msg).await.expect("store");

        let rows = store.get_messages(10).await.expect("get_messages");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, msg.id);
        assert_eq!(rows[0].source_ip, "10.0.0.5");
        assert_eq!(rows[0].severity, Severity::Warning);
    }

    #[tokio::test]
    async fn get_messages_respects_limit_and_order() {
        let (store, _dir) = open_temp_store().await;
        for i in 0..5 {
            let msg = Message::new_unknown(
                format!("10.0.0.{i}"),
                Severity::Info,
                format!("event {i}"),
            );
            store.store_message(&msg).await.expect("store");
        }
        let rows = store.get_messages(3).await.expect("get_messages");
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn execute_escape_hatch_runs_arbitrary_sql() {
        let (store, _dir) = open_temp_store().await;
        let affected = store
            .execute("DELETE FROM messages WHERE id = 'missing'")
            .await
            .expect("execute");
        assert_eq!(affected, 0);
    }
}
