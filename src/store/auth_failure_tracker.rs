// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{error::StorageError, model::AuthFailure, store::Store};

/// Per-user counters of SNMPv3 USM authentication failures (spec §4.10).
#[derive(Debug, Clone)]
pub struct AuthFailureTracker {
    store: Arc<Store>,
}

impl AuthFailureTracker {
    pub fn new(store: Arc<Store>) -> Self {
        AuthFailureTracker { store }
    }

    /// Upserts keyed by `username`: a new row starts at `num_failures = 1`;
    /// an existing row increments, updates `hostname` to the latest, and
    /// advances `last_failure`.
    pub async fn record(&self, username: &str, hostname: &str) -> Result<(), StorageError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO snmpv3_auth_failures (id, username, hostname, num_failures, last_failure)
             VALUES (?, ?, ?, 1, ?)
             ON CONFLICT(username) DO UPDATE SET
                num_failures = num_failures + 1,
                last_failure = excluded.last_failure,
                hostname = excluded.hostname",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(username)
        .bind(hostname)
        .bind(now)
        .execute(self.store.pool())
        .await
        .map_err(StorageError::Database)?;
        Ok(())
    }

    /// Deletes the row for `username`; a missing row is a no-op.
    pub async fn clear(&self, username: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM snmpv3_auth_failures WHERE username = ?")
            .bind(username)
            .execute(self.store.pool())
            .await
            .map_err(StorageError::Database)?;
        Ok(())
    }

    /// All failure rows, ordered by `(num_failures DESC, last_failure DESC)`.
    pub async fn get_all(&self) -> Result<Vec<AuthFailure>, StorageError> {
        let rows = sqlx::query(
            "SELECT username, hostname, num_failures, last_failure
             FROM snmpv3_auth_failures
             ORDER BY num_failures DESC, last_failure DESC",
        )
        .fetch_all(self.store.pool())
        .await
        .map_err(StorageError::Database)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let username: String = row.try_get("username").map_err(StorageError::Database)?;
            let hostname: String = row.try_get("hostname").map_err(StorageError::Database)?;
            let num_failures: i64 =
                row.try_get("num_failures").map_err(StorageError::Database)?;
            let last_failure_raw: String =
                row.try_get("last_failure").map_err(StorageError::Database)?;
            let last_failure: DateTime<Utc> = DateTime::parse_from_rfc3339(&last_failure_raw)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());

            out.push(AuthFailure {
                username,
                hostname,
                num_failures,
                last_failure,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn tracker() -> (AuthFailureTracker, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("mutt.db");
        let store = Store::initialize(db_path.to_str().expect("utf8 path"))
            .await
            .expect("initialize");
        (AuthFailureTracker::new(Arc::new(store)), dir)
    }

    #[tokio::test]
    async fn record_increments_existing_row() {
        let (t, _dir) = tracker().await;
        t.record("alice", "10.0.0.1").await.expect("first");
        t.record("alice", "10.0.0.2").await.expect("second");

        let all = t.get_all().await.expect("get_all");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].num_failures, 2);
        assert_eq!(all[0].hostname, "10.0.0.2");
    }

    #[tokio::test]
    async fn clear_removes_row_and_is_noop_when_missing() {
        let (t, _dir) = tracker().await;
        t.record("bob", "10.0.0.3").await.expect("record");
        t.clear("bob").await.expect("clear existing");
        t.clear("bob").await.expect("clear missing is a no-op");

        assert!(t.get_all().await.expect("get_all").is_empty());
    }

    #[tokio::test]
    async fn get_all_orders_by_failures_then_recency() {
        let (t, _dir) = tracker().await;
        t.record("low", "10.0.0.4").await.expect("low");
        t.record("high", "10.0.0.5").await.expect("high 1");
        t.record("high", "10.0.0.5").await.expect("high 2");

        let all = t.get_all().await.expect("get_all");
        assert_eq!(all[0].username, "high");
        assert_eq!(all[0].num_failures, 2);
    }
}
