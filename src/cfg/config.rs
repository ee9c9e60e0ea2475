// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Where the daemon persists messages, file buffer and archives.
    pub storage: StorageConfig,
    /// Syslog and SNMP trap listener settings.
    pub listeners: ListenersConfig,
    /// Log file path and verbosity.
    pub logging: LoggingConfig,
    /// Path to the alert rules YAML file.
    pub rules_file: String,
    /// Age, in days, past which messages are rotated into archive files.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Interval, in seconds, between FileBuffer flushes into the store.
    #[serde(default = "default_batch_write_interval")]
    pub batch_write_interval: u64,
}

fn default_retention_days() -> u32 {
    30
}

fn default_batch_write_interval() -> u64 {
    2
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct StorageConfig {
    pub db_path: String,
    #[serde(default = "default_buffer_dir")]
    pub buffer_dir: String,
    #[serde(default = "default_archive_dir")]
    pub archive_dir: String,
}

fn default_buffer_dir() -> String {
    "buffer".to_string()
}

fn default_archive_dir() -> String {
    "archives".to_string()
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ListenersConfig {
    pub syslog: SyslogListenerConfig,
    pub snmp: SnmpListenerConfig,
    /// Bound on the shared message queue between listeners and the processor.
    ///
    /// Not part of the original wire format; additive so existing config
    /// files keep loading with the default applied.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    10_000
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SyslogListenerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_syslog_host")]
    pub host: String,
    #[serde(default = "default_syslog_port")]
    pub port: u16,
}

fn default_syslog_host() -> String {
    "0.0.0.0".to_string()
}

fn default_syslog_port() -> u16 {
    5514
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SnmpListenerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_snmp_host")]
    pub host: String,
    #[serde(default = "default_snmp_port")]
    pub port: u16,
    #[serde(default = "default_communities")]
    pub communities: Vec<String>,
}

fn default_snmp_host() -> String {
    "0.0.0.0".to_string()
}

fn default_snmp_port() -> u16 {
    5162
}

fn default_communities() -> Vec<String> {
    vec!["public".to_string()]
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LoggingConfig {
    pub file: String,
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string_lossy().into_owned(),
            source,
        })?;
        let mut cfg: Config =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_string_lossy().into_owned(),
                source,
            })?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants the loaded config must satisfy.
    pub fn validate_and_normalize(&mut self) -> Result<(), ConfigError> {
        if !self.listeners.syslog.enabled && !self.listeners.snmp.enabled {
            tracing::warn!("no listeners enabled; daemon will accept no traffic");
        }

        if self.listeners.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "listeners.queue_capacity must be greater than zero".to_string(),
            ));
        }

        if self.listeners.snmp.enabled && self.listeners.snmp.communities.is_empty() {
            return Err(ConfigError::Invalid(
                "listeners.snmp.communities must not be empty when snmp is enabled"
                    .to_string(),
            ));
        }

        if self.storage.db_path.is_empty() {
            return Err(ConfigError::Invalid(
                "storage.db_path must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
