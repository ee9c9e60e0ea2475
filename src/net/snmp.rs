// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{
    Arc,
    atomic::{AtomicI32, Ordering},
};

use dashmap::DashMap;
use rasn_snmp::{v1, v2, v2c};
use serde_json::{Map, Value};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::{
    error::TransportError,
    model::{CredentialSet, Message, Severity, SnmpTrapExt},
    pipeline::queue::MessageQueue,
    store::auth_failure_tracker::AuthFailureTracker,
};

const MAX_DATAGRAM: usize = 65_535;
const SNMP_TRAP_OID: &str = "1.3.6.1.6.3.1.1.4.1";

/// One decoded trap, independent of wire version. Decoding below delegates
/// the BER/USM heavy lifting to `rasn`/`rasn-snmp`/`rasn-smi` — the
/// "external SNMP library" spec §1 treats as an assumed collaborator.
pub struct DecodedTrap {
    pub version: String,
    pub community: Option<String>,
    pub username: Option<String>,
    pub oid: String,
    pub varbinds: Map<String, Value>,
}

/// The external SNMP library's PDU decode contract (spec §1, §4.2).
/// `decode` returns `None` for anything that isn't a recognizable trap,
/// including a v3 packet this implementation cannot authenticate yet.
pub trait TrapDecoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> Option<DecodedTrap>;
}

/// Hook the decode library would invoke on a USM authentication/privacy
/// rejection (spec §4.2, SPEC_FULL §D). `SNMPListener` implements this to
/// rotate to the next-priority active credential and record the failure.
pub trait UsmAuthHook: Send + Sync {
    fn on_auth_failure(&self, username: &str, source_ip: &str);
}

/// Best-effort v1/v2c decoder; v3 USM cryptographic authentication is
/// outside this crate's scope (spec §1 Non-goals) and is reported as
/// undecodable rather than faked.
pub struct RasnTrapDecoder;

impl TrapDecoder for RasnTrapDecoder {
    fn decode(&self, data: &[u8]) -> Option<DecodedTrap> {
        if let Ok(msg) = rasn::ber::decode::<v1::Message<v1::Pdus>>(data) {
            return decode_v1(msg);
        }
        if let Ok(msg) = rasn::ber::decode::<v2c::Message<v2::Pdus>>(data) {
            return decode_v2c(msg);
        }
        None
    }
}

fn decode_v1(msg: v1::Message<v1::Pdus>) -> Option<DecodedTrap> {
    let community = String::from_utf8_lossy(&msg.community).to_string();
    match msg.data {
        v1::Pdus::Trap(trap) => {
            let enterprise = oid_to_string(&trap.enterprise);
            let mut varbinds = Map::new();
            for vb in trap.variable_bindings.iter() {
                varbinds.insert(oid_to_string(&vb.name), Value::from(format!("{:?}", vb.value)));
            }
            Some(DecodedTrap {
                version: "v1".to_string(),
                community: Some(community),
                username: None,
                oid: enterprise,
                varbinds,
            })
        },
        _ => None,
    }
}

fn decode_v2c(msg: v2c::Message<v2::Pdus>) -> Option<DecodedTrap> {
    let community = String::from_utf8_lossy(&msg.community).to_string();
    let bindings = match msg.data {
        v2::Pdus::Trap(trap) => trap.0.variable_bindings,
        v2::Pdus::InformRequest(inform) => inform.0.variable_bindings,
        _ => return None,
    };

    let mut varbinds = Map::new();
    let mut oid = String::new();
    for vb in bindings.iter() {
        let name = oid_to_string(&vb.name);
        let value = format!("{:?}", vb.value);
        if name.contains("snmpTrapOID") || name == SNMP_TRAP_OID || name == format!("{SNMP_TRAP_OID}.0") {
            oid = value.clone();
        }
        varbinds.insert(name, Value::from(value));
    }

    Some(DecodedTrap {
        version: "v2c".to_string(),
        community: Some(community),
        username: None,
        oid,
        varbinds,
    })
}

fn oid_to_string(oid: &rasn::types::ObjectIdentifier) -> String {
    oid.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(".")
}

/// Binds a UDP socket and decodes v1/v2c/v3 traps via a `TrapDecoder`
/// (spec §4.2). Each datagram is handled in a transient task since SNMP's
/// security processing is per-packet, unlike syslog's inline decode.
pub struct SnmpListener {
    socket: Arc<UdpSocket>,
    host: String,
    port: u16,
    communities: Vec<String>,
    credentials: Arc<DashMap<String, CredentialSet>>,
    registered_priority: Arc<DashMap<String, AtomicI32>>,
    auth_tracker: Arc<AuthFailureTracker>,
    decoder: Arc<dyn TrapDecoder>,
}

impl SnmpListener {
    pub async fn bind(
        host: &str,
        port: u16,
        communities: Vec<String>,
        auth_tracker: Arc<AuthFailureTracker>,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind((host, port))
            .await
            .map_err(|source| TransportError::Bind {
                host: host.to_string(),
                port,
                source,
            })?;
        Ok(SnmpListener {
            socket: Arc::new(socket),
            host: host.to_string(),
            port,
            communities,
            credentials: Arc::new(DashMap::new()),
            registered_priority: Arc::new(DashMap::new()),
            auth_tracker,
            decoder: Arc::new(RasnTrapDecoder),
        })
    }

    /// Registers a user's credential set; the highest-priority active
    /// credential is the one the USM layer uses until a rotation is
    /// triggered (spec §4.2).
    pub fn register_credentials(&self, set: CredentialSet) {
        if let Some(preferred) = set.preferred_credential() {
            self.registered_priority
                .insert(set.username.clone(), AtomicI32::new(preferred.priority));
        }
        self.credentials.insert(set.username.clone(), set);
    }

    pub async fn run(self: Arc<Self>, queue: Arc<MessageQueue>, cancel: CancellationToken) {
        tracing::info!(
            host = %self.host,
            port = self.port,
            communities = ?self.communities,
            "SNMP listener started"
        );
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, addr)) => {
                            let data = buf[..len].to_vec();
                            let source_ip = addr.ip().to_string();
                            let listener = self.clone();
                            let queue = queue.clone();
                            tokio::spawn(async move {
                                listener.handle_datagram(&data, &source_ip, &queue).await;
                            });
                        },
                        Err(e) => tracing::warn!(error = %e, "SNMP socket read error"),
                    }
                }
            }
        }
        tracing::info!("SNMP listener stopped");
    }

    async fn handle_datagram(&self, data: &[u8], source_ip: &str, queue: &MessageQueue) {
        let Some(trap) = self.decoder.decode(data) else {
            tracing::debug!(source_ip, "undecodable SNMP datagram, dropping");
            return;
        };

        if let Some(username) = &trap.username {
            self.auth_tracker_clear(username).await;
        }

        let msg = Message::new_snmp_trap(
            source_ip.to_string(),
            Severity::Info,
            format!("SNMP trap {}", trap.oid),
            SnmpTrapExt {
                oid: trap.oid,
                varbinds: trap.varbinds,
                version: trap.version,
            },
        );
        queue.put(msg);
    }

    async fn auth_tracker_clear(&self, username: &str) {
        if let Err(e) = self.auth_tracker.clear(username).await {
            tracing::warn!(error = %e, username, "failed to clear auth failure record");
        }
    }
}

impl UsmAuthHook for SnmpListener {
    /// Advances to the next-priority active credential and re-registers it,
    /// and records the failure for operator visibility (spec §4.2). The
    /// rejection itself is surfaced as an `AuthFailureError` so the log line
    /// carries the same message USM-layer callers would see if they
    /// propagated it as a `Result` instead of a hook invocation.
    fn on_auth_failure(&self, username: &str, source_ip: &str) {
        let err = crate::error::AuthFailureError {
            username: username.to_string(),
            source_ip: source_ip.to_string(),
        };
        tracing::warn!(error = %err, "SNMPv3 authentication failure");

        let source_ip = source_ip.to_string();
        let username = username.to_string();
        let tracker = self.auth_tracker.clone();
        let credentials = self.credentials.clone();
        let registered = self.registered_priority.clone();

        tokio::spawn(async move {
            if let Err(e) = tracker.record(&username, &source_ip).await {
                tracing::warn!(error = %e, username = %username, "failed to record auth failure");
            }

            if let Some(set) = credentials.get(&username)
                && let Some(current) = registered.get(&username)
            {
                let current_priority = current.load(Ordering::SeqCst);
                if let Some(next) = set.next_credential_after(current_priority) {
                    current.store(next.priority, Ordering::SeqCst);
                    tracing::info!(username = %username, priority = next.priority, "rotated SNMPv3 credential after auth failure");
                }
            }
        });
    }
}
