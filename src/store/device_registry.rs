// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use chrono::Utc;
#[cfg(test)]
use sqlx::Row;

use crate::{error::StorageError, store::Store};

/// Upserts device rows keyed by IP, coalescing nullable fields (spec §4.9).
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    store: Arc<Store>,
}

impl DeviceRegistry {
    pub fn new(store: Arc<Store>) -> Self {
        DeviceRegistry { store }
    }

    /// Upserts `ip`; a prior non-null `hostname`/`snmp_version` survives
    /// unless the update supplies a non-null replacement. `last_seen` always
    /// advances to now-UTC.
    pub async fn update_device(
        &self,
        ip: &str,
        hostname: Option<&str>,
        snmp_version: Option<&str>,
    ) -> Result<(), StorageError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO devices (ip, hostname, snmp_version, last_seen)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(ip) DO UPDATE SET
                hostname = COALESCE(excluded.hostname, devices.hostname),
                snmp_version = COALESCE(excluded.snmp_version, devices.snmp_version),
                last_seen = excluded.last_seen",
        )
        .bind(ip)
        .bind(hostname)
        .bind(snmp_version)
        .bind(now)
        .execute(self.store.pool())
        .await
        .map_err(StorageError::Database)?;
        Ok(())
    }

    #[cfg(test)]
    async fn hostname_of(&self, ip: &str) -> Option<String> {
        sqlx::query("SELECT hostname FROM devices WHERE ip = ?")
            .bind(ip)
            .fetch_optional(self.store.pool())
            .await
            .expect("query")
            .and_then(|row| row.try_get::<Option<String>, _>("hostname").ok().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn registry() -> (DeviceRegistry, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("mutt.db");
        let store = Store::initialize(db_path.to_str().expect("utf8 path"))
            .await
            .expect("initialize");
        (DeviceRegistry::new(Arc::new(store)), dir)
    }

    #[tokio::test]
    async fn coalesces_hostname_across_updates() {
        let (reg, _dir) = registry().await;
        reg.update_device("10.0.0.1", Some("switch1"), None)
            .await
            .expect("insert");
        reg.update_device("10.0.0.1", None, Some("v2c"))
            .await
            .expect("update without hostname");

        assert_eq!(reg.hostname_of("10.0.0.1").await, Some("switch1".to_string()));
    }

    #[tokio::test]
    async fn overwrites_hostname_when_provided() {
        let (reg, _dir) = registry().await;
        reg.update_device("10.0.0.2", Some("old-name"), None)
            .await
            .expect("insert");
        reg.update_device("10.0.0.2", Some("new-name"), None)
            .await
            .expect("update");

        assert_eq!(reg.hostname_of("10.0.0.2").await, Some("new-name".to_string()));
    }
}
