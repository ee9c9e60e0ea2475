// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use serde_json::Value;

use crate::{
    model::{Message, Severity},
    net::dns::DnsResolver,
    store::device_registry::DeviceRegistry,
};

/// Resolves the source hostname, upserts the device row, and normalizes
/// severity (spec §4.5). `severity` on `Message` is already a typed enum in
/// this rewrite (spec §9 "Dynamic severity coercion" pushes that
/// normalization to the listener boundary), so the coercion step here only
/// covers the metadata-carried `severity` value some callers still set as a
/// loose string for parity with the original contract.
pub struct Enricher {
    resolver: DnsResolver,
    devices: Arc<DeviceRegistry>,
}

impl Enricher {
    pub fn new(devices: Arc<DeviceRegistry>) -> Self {
        Enricher {
            resolver: DnsResolver::new(),
            devices,
        }
    }

    pub async fn enrich(&self, msg: &mut Message) {
        let hostname = self.resolver.resolve(&msg.source_ip).await;

        let snmp_version = match &msg.variant {
            crate::model::MessageVariant::SnmpTrap(ext) => Some(ext.version.as_str()),
            _ => None,
        };
        if let Err(e) = self
            .devices
            .update_device(&msg.source_ip, hostname.as_deref(), snmp_version)
            .await
        {
            tracing::warn!(error = %e, source_ip = %msg.source_ip, "device registry update failed");
        } else if let Some(hostname) = &hostname {
            msg.metadata.insert("hostname".into(), Value::from(hostname.clone()));
        }

        normalize_severity_metadata(msg);
    }
}

/// Coerces a loose `metadata["severity"]` value left by a listener or the
/// buffer round-trip: a string gets uppercased and parsed; anything else
/// becomes `INFO`. Leaves `msg.severity` (already typed) untouched when no
/// such key is present.
fn normalize_severity_metadata(msg: &mut Message) {
    let Some(raw) = msg.metadata.get("severity").cloned() else {
        return;
    };
    let normalized = match raw {
        Value::String(s) => Severity::parse_loose(&s).unwrap_or_else(|| {
            tracing::warn!(value = %s, "unrecognized severity in metadata, defaulting to INFO");
            Severity::Info
        }),
        _ => Severity::Info,
    };
    msg.metadata.insert("severity".into(), Value::from(normalized.to_string()));
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::{model::Message, store::Store};

    use super::*;

    async fn enricher() -> (Enricher, tempfile::TempDir) {
        let dir = tempdir().expect("tempdir");
        let db_path = dir.path().join("mutt.db");
        let store = Arc::new(
            Store::initialize(db_path.to_str().expect("utf8 path"))
                .await
                .expect("initialize"),
        );
        (Enricher::new(Arc::new(DeviceRegistry::new(store))), dir)
    }

    #[tokio::test]
    async fn enrich_never_panics_on_unresolvable_ip() {
        let (e, _dir) = enricher().await;
        let mut msg = Message::new_unknown("203.0.113.5".into(), Severity::Info, "x".into());
        e.enrich(&mut msg).await;
    }

    #[test]
    fn unrecognized_metadata_severity_defaults_to_info() {
        let mut msg = Message::new_unknown("10.0.0.1".into(), Severity::Warning, "x".into());
        msg.metadata.insert("severity".into(), Value::from("bogus"));
        normalize_severity_metadata(&mut msg);
        assert_eq!(msg.metadata.get("severity"), Some(&Value::from("INFO")));
    }

    #[test]
    fn known_metadata_severity_is_normalized_to_canonical_text() {
        let mut msg = Message::new_unknown("10.0.0.1".into(), Severity::Warning, "x".into());
        msg.metadata.insert("severity".into(), Value::from("warning"));
        normalize_severity_metadata(&mut msg);
        assert_eq!(msg.metadata.get("severity"), Some(&Value::from("WARNING")));
    }
}
