// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::{
    cfg::config::Config,
    model::{load_credentials_file, load_rules_file},
    net::{snmp::SnmpListener, syslog::SyslogListener},
    pipeline::{
        enricher::Enricher, pattern_matcher::PatternMatcher, processor::Processor,
        queue::MessageQueue, router::MessageRouter, validator::Validator,
    },
    store::{archive_manager::ArchiveManager, auth_failure_tracker::AuthFailureTracker, device_registry::DeviceRegistry, file_buffer::FileBuffer, Store},
};

/// Builds every component and runs the daemon to completion, following the
/// startup order in spec §4.12: config → store → supporting components →
/// queue → processor tasks → listeners → wait for shutdown → final flush.
pub async fn run(cfg: Config, rules_path: std::path::PathBuf, credentials_path: Option<std::path::PathBuf>) -> Result<()> {
    let store = Arc::new(
        Store::initialize(&cfg.storage.db_path)
            .await
            .context("failed to initialize store")?,
    );

    let rules = load_rules_file(&rules_path).context("failed to load rules file")?;
    tracing::info!(count = rules.len(), "loaded alert rules");

    let credentials = match &credentials_path {
        Some(path) => load_credentials_file(path).context("failed to load SNMPv3 credentials file")?,
        None => Vec::new(),
    };

    let devices = Arc::new(DeviceRegistry::new(store.clone()));
    let auth_tracker = Arc::new(AuthFailureTracker::new(store.clone()));
    let buffer = Arc::new(FileBuffer::new(&cfg.storage.buffer_dir));
    let archive_manager = ArchiveManager::new(store.clone(), &cfg.storage.archive_dir);

    let validator = Validator::new();
    let matcher = PatternMatcher::new(rules);
    let enricher = Enricher::new(devices);
    let mut router = MessageRouter::new();
    router.register_discard();

    let queue = Arc::new(MessageQueue::new(cfg.listeners.queue_capacity));

    let processor = Arc::new(Processor {
        queue: queue.clone(),
        validator,
        matcher,
        enricher,
        router,
        buffer,
        store: store.clone(),
        archive_manager,
    });

    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    {
        let processor = processor.clone();
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move { processor.process_loop(cancel).await }));
    }
    {
        let processor = processor.clone();
        let cancel = cancel.clone();
        let interval = Duration::from_secs(cfg.batch_write_interval);
        tasks.push(tokio::spawn(async move { processor.batch_write_loop(interval, cancel).await }));
    }
    {
        let processor = processor.clone();
        let cancel = cancel.clone();
        let retention_days = cfg.retention_days;
        tasks.push(tokio::spawn(async move { processor.archive_loop(retention_days, cancel).await }));
    }

    let mut listeners_started = 0;

    if cfg.listeners.syslog.enabled {
        match SyslogListener::bind(&cfg.listeners.syslog.host, cfg.listeners.syslog.port).await {
            Ok(listener) => {
                listeners_started += 1;
                let queue = queue.clone();
                let cancel = cancel.clone();
                tasks.push(tokio::spawn(async move { listener.run(queue, cancel).await }));
            },
            Err(e) => tracing::error!(error = %e, "failed to start syslog listener; continuing without it"),
        }
    }

    if cfg.listeners.snmp.enabled {
        match SnmpListener::bind(
            &cfg.listeners.snmp.host,
            cfg.listeners.snmp.port,
            cfg.listeners.snmp.communities.clone(),
            auth_tracker.clone(),
        )
        .await
        {
            Ok(listener) => {
                for set in &credentials {
                    listener.register_credentials(set.clone());
                }
                listeners_started += 1;
                let listener = Arc::new(listener);
                let queue = queue.clone();
                let cancel = cancel.clone();
                tasks.push(tokio::spawn(async move { listener.run(queue, cancel).await }));
            },
            Err(e) => tracing::error!(error = %e, "failed to start SNMP listener; continuing without it"),
        }
    }

    if listeners_started == 0 {
        tracing::warn!("no listeners started; daemon is running idle");
    }

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining");

    cancel.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "background task panicked during shutdown");
        }
    }

    processor.final_flush().await;
    tracing::info!("shutdown complete");

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    tokio::select! {
        _ = sigterm.recv() => {},
        _ = sigint.recv() => {},
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
