// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Data model shared by the listeners, pipeline, and store (spec §3).

/// Archive index rows written by `ArchiveManager`.
pub mod archive;
/// SNMPv3 authentication-failure counters.
pub mod auth_failure;
/// SNMPv3 credential sets, priority ordering, and rotation.
pub mod credentials;
/// Device registry rows.
pub mod device;
/// Polymorphic `Message`, `Severity`, and variant-specific extensions.
pub mod message;
/// Alert rules: pattern types and action sets.
pub mod rules;

pub use archive::ArchiveRecord;
pub use auth_failure::AuthFailure;
pub use credentials::{load_credentials_file, AuthType, CredentialSet, PrivType, Snmpv3Credential};
pub use device::Device;
pub use message::{Message, MessageType, MessageVariant, Severity, SnmpTrapExt, SyslogExt};
pub use rules::{load_rules_file, ActionType, AlertRule, PatternType};
