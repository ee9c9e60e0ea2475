// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Top-level discriminant carried in the `type` column of the `messages`
/// table and the `message_type` field of the buffer/archive JSON lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "SYSLOG")]
    Syslog,
    #[serde(rename = "SNMP_TRAP")]
    SnmpTrap,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageType::Syslog => "SYSLOG",
            MessageType::SnmpTrap => "SNMP_TRAP",
            MessageType::Unknown => "UNKNOWN",
        })
    }
}

/// The eight RFC 3164 severities, ordered lowest-number-most-severe.
/// Declaration order matches the numeric mapping so the derived `Ord`
/// agrees with "lower number = more severe".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "EMERGENCY")]
    Emergency = 0,
    #[serde(rename = "ALERT")]
    Alert = 1,
    #[serde(rename = "CRITICAL")]
    Critical = 2,
    #[serde(rename = "ERROR")]
    Error = 3,
    #[serde(rename = "WARNING")]
    Warning = 4,
    #[serde(rename = "NOTICE")]
    Notice = 5,
    #[serde(rename = "INFO")]
    Info = 6,
    #[serde(rename = "DEBUG")]
    Debug = 7,
}

impl Severity {
    /// Maps an RFC 3164 `PRI mod 8` value onto a severity. Out-of-range
    /// input (impossible for `n % 8`, kept total for safety) falls back to
    /// `Info`.
    pub fn from_syslog_number(n: u8) -> Severity {
        match n {
            0 => Severity::Emergency,
            1 => Severity::Alert,
            2 => Severity::Critical,
            3 => Severity::Error,
            4 => Severity::Warning,
            5 => Severity::Notice,
            6 => Severity::Info,
            _ => Severity::Debug,
        }
    }

    /// Case-insensitive parse used by the listener boundary and the
    /// `metadata["severity"]` coercion path; unrecognized input is `None`,
    /// callers default to `Info` per spec §4.5.
    pub fn parse_loose(s: &str) -> Option<Severity> {
        match s.to_ascii_uppercase().as_str() {
            "EMERGENCY" => Some(Severity::Emergency),
            "ALERT" => Some(Severity::Alert),
            "CRITICAL" => Some(Severity::Critical),
            "ERROR" => Some(Severity::Error),
            "WARNING" => Some(Severity::Warning),
            "NOTICE" => Some(Severity::Notice),
            "INFO" => Some(Severity::Info),
            "DEBUG" => Some(Severity::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Emergency => "EMERGENCY",
            Severity::Alert => "ALERT",
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Notice => "NOTICE",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
        })
    }
}

/// Syslog-specific extension fields (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyslogExt {
    pub facility: u8,
    pub priority: u16,
    pub hostname: String,
    pub process_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
}

/// SNMP-trap-specific extension fields (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnmpTrapExt {
    pub oid: String,
    pub varbinds: Map<String, Value>,
    pub version: String,
}

/// The polymorphic part of a `Message`: exactly one of the two wire
/// protocols, or `Unknown` for messages reconstructed without their
/// original variant (e.g. read back through the file buffer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant_type", content = "variant_data")]
pub enum MessageVariant {
    Syslog(SyslogExt),
    SnmpTrap(SnmpTrapExt),
    Unknown,
}

/// A received telemetry event, common fields plus one polymorphic variant
/// (spec §3). `id` is a UUIDv4 rendered as text; uniqueness is enforced by
/// the store's primary key, not by this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source_ip: String,
    pub message_type: MessageType,
    pub severity: Severity,
    pub payload: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub variant: MessageVariant,
}

impl Message {
    pub fn new_syslog(source_ip: String, severity: Severity, payload: String, ext: SyslogExt) -> Self {
        Message {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            source_ip,
            message_type: MessageType::Syslog,
            severity,
            payload,
            metadata: Map::new(),
            variant: MessageVariant::Syslog(ext),
        }
    }

    pub fn new_snmp_trap(source_ip: String, severity: Severity, payload: String, ext: SnmpTrapExt) -> Self {
        Message {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            source_ip,
            message_type: MessageType::SnmpTrap,
            severity,
            payload,
            metadata: Map::new(),
            variant: MessageVariant::SnmpTrap(ext),
        }
    }

    #[cfg(test)]
    pub fn new_unknown(source_ip: String, severity: Severity, payload: String) -> Self {
        Message {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            source_ip,
            message_type: MessageType::Unknown,
            severity,
            payload,
            metadata: Map::new(),
            variant: MessageVariant::Unknown,
        }
    }

    /// Metadata as it should be persisted by the store: the free-form
    /// metadata map with the variant's extension fields layered on top,
    /// overriding any colliding keys (spec §4.8).
    pub fn metadata_for_storage(&self) -> Map<String, Value> {
        let mut out = self.metadata.clone();
        match &self.variant {
            MessageVariant::Syslog(ext) => {
                out.insert("facility".into(), Value::from(ext.facility));
                out.insert("priority".into(), Value::from(ext.priority));
                out.insert("hostname".into(), Value::from(ext.hostname.clone()));
                out.insert("process_name".into(), Value::from(ext.process_name.clone()));
                out.insert(
                    "process_id".into(),
                    ext.process_id.map(Value::from).unwrap_or(Value::Null),
                );
            },
            MessageVariant::SnmpTrap(ext) => {
                out.insert("oid".into(), Value::from(ext.oid.clone()));
                out.insert("varbinds".into(), Value::Object(ext.varbinds.clone()));
                out.insert("version".into(), Value::from(ext.version.clone()));
            },
            MessageVariant::Unknown => {},
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_matches_syslog_numbers() {
        assert!(Severity::Emergency < Severity::Alert);
        assert!(Severity::Error < Severity::Warning);
        assert!(Severity::Info < Severity::Debug);
    }

    #[test]
    fn from_syslog_number_covers_all_eight() {
        let expected = [
            Severity::Emergency,
            Severity::Alert,
            Severity::Critical,
            Severity::Error,
            Severity::Warning,
            Severity::Notice,
            Severity::Info,
            Severity::Debug,
        ];
        for (n, sev) in expected.iter().enumerate() {
            assert_eq!(Severity::from_syslog_number(n as u8), *sev);
        }
    }

    #[test]
    fn parse_loose_is_case_insensitive() {
        assert_eq!(Severity::parse_loose("warning"), Some(Severity::Warning));
        assert_eq!(Severity::parse_loose("WARNING"), Some(Severity::Warning));
        assert_eq!(Severity::parse_loose("bogus"), None);
    }

    #[test]
    fn metadata_for_storage_merges_syslog_extension() {
        let msg = Message::new_syslog(
            "10.0.0.1".into(),
            Severity::Info,
            "hello".into(),
            SyslogExt {
                facility: 1,
                priority: 13,
                hostname: "host".into(),
                process_name: "proc".into(),
                process_id: Some(42),
            },
        );
        let merged = msg.metadata_for_storage();
        assert_eq!(merged.get("facility"), Some(&Value::from(1)));
        assert_eq!(merged.get("process_id"), Some(&Value::from(42)));
    }
}
