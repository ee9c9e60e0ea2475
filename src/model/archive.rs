// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row in the `archives` index table (spec §3, §4.11).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub filename: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub record_count: i64,
}
