// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::PathBuf;

use clap::Parser;

/// mutt-daemon: telemetry ingestion daemon for syslog and SNMP trap streams.
#[derive(Debug, Parser)]
#[command(name = "mutt-daemon", about)]
pub struct Cli {
    /// Path to the daemon configuration file (spec §6).
    #[arg(short, long, default_value = "config/mutt.yaml")]
    pub config: PathBuf,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_path() {
        let cli = Cli::parse_from(["mutt-daemon"]);
        assert_eq!(cli.config, PathBuf::from("config/mutt.yaml"));
    }

    #[test]
    fn short_and_long_flags_accepted() {
        let cli = Cli::parse_from(["mutt-daemon", "-c", "other.yaml"]);
        assert_eq!(cli.config, PathBuf::from("other.yaml"));
        let cli = Cli::parse_from(["mutt-daemon", "--config", "other.yaml"]);
        assert_eq!(cli.config, PathBuf::from("other.yaml"));
    }
}
