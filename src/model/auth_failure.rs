// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row in `snmpv3_auth_failures`, keyed by username (spec §3, §4.10).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthFailure {
    pub username: String,
    pub hostname: String,
    pub num_failures: i64,
    pub last_failure: DateTime<Utc>,
}
