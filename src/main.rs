// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::PathBuf;

use anyhow::{Context, Result};
use mutt_daemon::{cfg::{cli::Cli, config::Config, logger::init_logger}, daemon};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let cfg = Config::load_from_file(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    let _logger_guard = init_logger(&cfg.logging).context("failed to initialize logging")?;

    let config_dir = cli.config.parent().unwrap_or_else(|| std::path::Path::new("."));
    let rules_path = resolve_relative(config_dir, &cfg.rules_file);
    let credentials_path = credentials_path_next_to(config_dir, &rules_path);

    if let Err(e) = daemon::run(cfg, rules_path, credentials_path).await {
        tracing::error!(error = %e, "daemon exited with error");
        std::process::exit(1);
    }

    Ok(())
}

fn resolve_relative(base: &std::path::Path, path: &str) -> PathBuf {
    let p = PathBuf::from(path);
    if p.is_absolute() { p } else { base.join(p) }
}

/// SNMPv3 credentials live beside the rules file as `credentials.yaml`; the
/// daemon runs without SNMPv3 support if that file isn't present (spec §6).
fn credentials_path_next_to(config_dir: &std::path::Path, _rules_path: &std::path::Path) -> Option<PathBuf> {
    let candidate = config_dir.join("credentials.yaml");
    candidate.exists().then_some(candidate)
}
