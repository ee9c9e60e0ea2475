// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::{
    error::TransportError,
    model::{Message, Severity, SyslogExt},
    pipeline::queue::MessageQueue,
};

const MAX_DATAGRAM: usize = 65_507;

/// `<PRI>MMM[ ]D HH:MM:SS HOSTNAME TAG: PAYLOAD` (spec §4.1), matching the
/// original's `SYSLOG_REGEX` structurally: PRI, a timestamp group this
/// parser doesn't need, hostname, tag, and the rest of the line as payload.
static SYSLOG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^<(\d+)>\w{3}\s+\d+\s+\d+:\d+:\d+\s+([\w.-]+)\s+([^:]+):\s*(.*)$")
        .expect("static syslog regex is valid")
});

/// Binds a UDP socket and decodes each datagram into a `Message` with a
/// `Syslog` variant, enqueuing it non-blockingly (spec §4.1).
pub struct SyslogListener {
    socket: UdpSocket,
    host: String,
    port: u16,
}

impl SyslogListener {
    pub async fn bind(host: &str, port: u16) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind((host, port))
            .await
            .map_err(|source| TransportError::Bind {
                host: host.to_string(),
                port,
                source,
            })?;
        Ok(SyslogListener {
            socket,
            host: host.to_string(),
            port,
        })
    }

    /// The address actually bound, useful when `port` was `0`.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.socket.local_addr()
    }

    /// Runs until `cancel` fires. Each datagram is decoded and enqueued
    /// inline; syslog has no per-packet security processing, unlike SNMP,
    /// so no transient task is spawned per datagram (spec §5).
    pub async fn run(self, queue: Arc<MessageQueue>, cancel: CancellationToken) {
        tracing::info!(host = %self.host, port = self.port, "syslog listener started");
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, addr)) => {
                            let msg = decode_datagram(&buf[..len], &addr.ip().to_string());
                            queue.put(msg);
                        },
                        Err(e) => tracing::warn!(error = %e, "syslog socket read error"),
                    }
                }
            }
        }
        tracing::info!("syslog listener stopped");
    }
}

/// Decodes one datagram. Parsing never fails outright: an unparseable
/// header falls back to the documented defaults with the raw text as
/// payload (spec §4.1).
fn decode_datagram(data: &[u8], source_ip: &str) -> Message {
    let text = String::from_utf8_lossy(data).trim().to_string();
    parse_syslog(&text, source_ip)
}

fn parse_syslog(text: &str, source_ip: &str) -> Message {
    if let Some(caps) = SYSLOG_PATTERN.captures(text) {
        let priority: u16 = caps[1].parse().unwrap_or(13);
        let facility = (priority / 8) as u8;
        let severity = Severity::from_syslog_number((priority % 8) as u8);
        let hostname = caps[2].to_string();
        let process_name = caps[3].trim().to_string();
        let payload = caps[4].to_string();

        Message::new_syslog(
            source_ip.to_string(),
            severity,
            payload,
            SyslogExt {
                facility,
                priority,
                hostname,
                process_name,
                process_id: None,
            },
        )
    } else {
        Message::new_syslog(
            source_ip.to_string(),
            Severity::Info,
            text.to_string(),
            SyslogExt {
                facility: 1,
                priority: 13,
                hostname: "unknown".to_string(),
                process_name: "unknown".to_string(),
                process_id: None,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::model::MessageVariant;

    use super::*;

    #[test]
    fn parses_well_formed_header() {
        let msg = parse_syslog(
            "<134>Jan  9 20:30:00 myhost myproc: test message",
            "10.0.0.1",
        );
        assert_eq!(msg.severity, Severity::Info);
        assert_eq!(msg.payload, "test message");
        match msg.variant {
            MessageVariant::Syslog(ext) => {
                assert_eq!(ext.priority, 134);
                assert_eq!(ext.facility, 16);
                assert_eq!(ext.hostname, "myhost");
                assert_eq!(ext.process_name, "myproc");
            },
            _ => panic!("expected syslog variant"),
        }
    }

    #[test]
    fn falls_back_to_defaults_on_unstructured_input() {
        let msg = parse_syslog("invalid message", "10.0.0.1");
        assert_eq!(msg.payload, "invalid message");
        assert_eq!(msg.severity, Severity::Info);
        match msg.variant {
            MessageVariant::Syslog(ext) => {
                assert_eq!(ext.hostname, "unknown");
                assert_eq!(ext.process_name, "unknown");
                assert_eq!(ext.priority, 13);
                assert_eq!(ext.facility, 1);
            },
            _ => panic!("expected syslog variant"),
        }
    }

    #[test]
    fn low_priority_kernel_message_maps_facility_and_severity() {
        let msg = parse_syslog(
            "<14>Oct 11 22:14:15 myhost test: integration-test-message",
            "10.0.0.5",
        );
        match msg.variant {
            MessageVariant::Syslog(ext) => {
                assert_eq!(ext.facility, 1);
            },
            _ => panic!("expected syslog variant"),
        }
        assert_eq!(msg.severity, Severity::Info);
        assert_eq!(msg.payload, "integration-test-message");
    }
}
