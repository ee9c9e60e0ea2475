// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::{Deserialize, Serialize};

/// SNMPv3 USM authentication protocol (spec §3). Crypto for these is the
/// assumed external SNMP library's responsibility (spec §1 Non-goals); this
/// enum only carries operator intent through registration and rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthType {
    Md5,
    Sha,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    None,
}

/// SNMPv3 USM privacy protocol (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrivType {
    Des,
    #[serde(rename = "3DES")]
    TripleDes,
    Aes,
    Aes128,
    Aes192,
    Aes256,
    None,
}

/// A single priority-ordered auth/priv credential for one SNMPv3 user
/// (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snmpv3Credential {
    pub priority: i32,
    pub auth_type: AuthType,
    pub auth_password: String,
    pub priv_type: PrivType,
    pub priv_password: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// All configured credentials for one SNMPv3 username.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialSet {
    pub username: String,
    #[serde(default)]
    pub credentials: Vec<Snmpv3Credential>,
}

impl CredentialSet {
    /// Active credentials sorted ascending by priority (lower = preferred),
    /// per spec §3.
    pub fn get_active_credentials(&self) -> Vec<&Snmpv3Credential> {
        let mut active: Vec<&Snmpv3Credential> =
            self.credentials.iter().filter(|c| c.active).collect();
        active.sort_by_key(|c| c.priority);
        active
    }

    /// The credential the listener should currently register into USM: the
    /// highest-priority (lowest number) active entry (spec §4.2).
    pub fn preferred_credential(&self) -> Option<&Snmpv3Credential> {
        self.get_active_credentials().into_iter().next()
    }

    /// The next-priority active credential after `current`, used when the
    /// assumed external library's auth-failure hook signals rotation is
    /// required (spec §4.2, SPEC_FULL §D).
    pub fn next_credential_after(&self, current_priority: i32) -> Option<&Snmpv3Credential> {
        self.get_active_credentials()
            .into_iter()
            .find(|c| c.priority > current_priority)
    }
}

/// Top-level shape of the SNMPv3 credentials YAML file (spec §6).
#[derive(Debug, Deserialize)]
pub struct CredentialsFile {
    #[serde(default)]
    pub snmpv3_credentials: Vec<CredentialSet>,
}

/// Loads the SNMPv3 credentials file. Unlike the rules file, a malformed
/// entry here is fatal: a credential set with an unparseable auth/priv
/// protocol would otherwise silently leave that SNMPv3 user unauthenticatable.
pub fn load_credentials_file(
    path: &std::path::Path,
) -> Result<Vec<CredentialSet>, crate::error::ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| crate::error::ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let parsed: CredentialsFile =
        serde_yaml::from_str(&text).map_err(|source| crate::error::ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    Ok(parsed.snmpv3_credentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred(priority: i32, active: bool) -> Snmpv3Credential {
        Snmpv3Credential {
            priority,
            auth_type: AuthType::Sha,
            auth_password: format!("pw{priority}"),
            priv_type: PrivType::Aes,
            priv_password: format!("priv{priority}"),
            active,
        }
    }

    #[test]
    fn rotation_picks_next_active_by_priority() {
        let set = CredentialSet {
            username: "u1".into(),
            credentials: vec![
                Snmpv3Credential {
                    active: true,
                    ..cred(1, true)
                },
                Snmpv3Credential {
                    auth_password: "new".into(),
                    ..cred(2, false)
                },
            ],
        };
        // Only priority 1 is active; flip as the scenario in spec §8 #4 does.
        let mut set = set;
        set.credentials[0].active = false;
        set.credentials[1].active = true;

        let active = set.get_active_credentials();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].priority, 2);
        assert_eq!(active[0].auth_password, "new");
    }

    #[test]
    fn preferred_is_lowest_priority_active() {
        let set = CredentialSet {
            username: "u2".into(),
            credentials: vec![cred(3, true), cred(1, true), cred(2, true)],
        };
        assert_eq!(set.preferred_credential().map(|c| c.priority), Some(1));
    }

    #[test]
    fn next_after_skips_inactive_and_lower_priority() {
        let set = CredentialSet {
            username: "u3".into(),
            credentials: vec![cred(1, true), cred(2, false), cred(3, true)],
        };
        assert_eq!(set.next_credential_after(1).map(|c| c.priority), Some(3));
    }
}
