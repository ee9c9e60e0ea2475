// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::cfg::config::LoggingConfig;

/// Initializes the global tracing subscriber from the daemon's logging
/// config. The returned guard must be kept alive for the process lifetime;
/// dropping it early silently stops the non-blocking writer from flushing.
pub fn init_logger(cfg: &LoggingConfig) -> Result<WorkerGuard> {
    let level = if cfg.debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("failed to build log filter")?;

    let (writer, guard) = make_writer(&cfg.file)?;

    let fmt_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("failed to install global tracing subscriber")?;

    Ok(guard)
}

fn make_writer(file: &str) -> Result<(BoxMakeWriter, WorkerGuard)> {
    if file.is_empty() {
        let (w, g) = tracing_appender::non_blocking(std::io::stdout());
        return Ok((BoxMakeWriter::new(w), g));
    }

    let path = PathBuf::from(file);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().context("logging.file must name a file")?;

    let appender = RollingFileAppender::new(Rotation::DAILY, dir, file_name);
    let (w, g) = tracing_appender::non_blocking(appender);
    Ok((BoxMakeWriter::new(w), g))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdout_used_when_file_empty() {
        let (_writer, _guard) = make_writer("").expect("stdout writer");
    }

    #[test]
    fn file_writer_splits_dir_and_name() {
        let (_writer, _guard) = make_writer("logs/mutt.log").expect("file writer");
    }
}
