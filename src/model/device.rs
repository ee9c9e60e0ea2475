// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row in the `devices` table, upserted opportunistically from every
/// processed message (spec §3, §4.9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub ip: String,
    pub hostname: Option<String>,
    pub last_seen: DateTime<Utc>,
    pub snmp_version: Option<String>,
    pub notes: Option<String>,
}
