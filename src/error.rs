// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Error taxonomy for the ingestion pipeline (see spec §7).
//!
//! Startup failures (`ConfigError`, bind failures) are fatal and propagate
//! as `anyhow::Error` out of `main`. Runtime failures inside the background
//! loops are caught at the loop boundary, logged, and never stop the loop.

use thiserror::Error;

/// Failures raised while loading or validating configuration, rules, or
/// SNMPv3 credential files. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failures raised by the relational store. Logged and the offending
/// operation is skipped; never poisons the pipeline.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to (de)serialize message metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Failures raised by the UDP listeners, at bind time or at runtime.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {host}:{port}: {source}")]
    Bind {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// SNMPv3 USM authentication/decryption rejection. Recorded via
/// `AuthFailureTracker`; the datagram is dropped.
#[derive(Debug, Error)]
#[error("SNMPv3 authentication failed for user {username} from {source_ip}")]
pub struct AuthFailureError {
    pub username: String,
    pub source_ip: String,
}

/// Errors surfaced while reading back the durable file buffer. A malformed
/// line is skipped with a warning, not propagated; this type exists for the
/// few call sites (tests, `flush`) that want to distinguish I/O failure
/// from "file absent".
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("buffer I/O error: {0}")]
    Io(#[from] std::io::Error),
}
