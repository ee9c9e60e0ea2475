// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::{Deserialize, Serialize};

/// How `AlertRule::pattern` is matched against a message payload (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    Regex,
    Keyword,
    Exact,
}

/// What to do with a message that a rule matched (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Store,
    Discard,
    Webhook,
}

/// An operator-defined alert rule, immutable once loaded. `actions` is
/// ordered and duplicate-free: later duplicates in the YAML list are
/// dropped rather than reordered, preserving first-seen order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub name: String,
    pub pattern_type: PatternType,
    pub pattern: String,
    #[serde(deserialize_with = "dedup_actions")]
    pub actions: Vec<ActionType>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

fn dedup_actions<'de, D>(deserializer: D) -> Result<Vec<ActionType>, D::Error>
where D: serde::Deserializer<'de> {
    let raw: Vec<ActionType> = Vec::deserialize(deserializer)?;
    let mut out = Vec::with_capacity(raw.len());
    for a in raw {
        if !out.contains(&a) {
            out.push(a);
        }
    }
    Ok(out)
}

impl AlertRule {
    /// A disabled rule, or one with an empty pattern, never matches
    /// (spec §3).
    pub fn is_matchable(&self) -> bool {
        self.enabled && !self.pattern.is_empty()
    }
}

/// Top-level shape of the rules YAML file (spec §6).
#[derive(Debug, Deserialize)]
struct RulesFile {
    #[serde(default)]
    rules: Vec<serde_yaml::Value>,
}

/// Loads the rules file. A YAML syntax error in the file itself is fatal
/// (`ConfigError::Parse`); an individual rule entry with an unknown enum
/// value or missing field is skipped with a warning, matching the
/// original's `_load_rules` tolerance (SPEC_FULL §C.1).
pub fn load_rules_file(path: &std::path::Path) -> Result<Vec<AlertRule>, crate::error::ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| crate::error::ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let parsed: RulesFile =
        serde_yaml::from_str(&text).map_err(|source| crate::error::ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

    let mut rules = Vec::with_capacity(parsed.rules.len());
    for (idx, entry) in parsed.rules.into_iter().enumerate() {
        match serde_yaml::from_value::<AlertRule>(entry) {
            Ok(rule) => rules.push(rule),
            Err(e) => tracing::warn!(index = idx, error = %e, "skipping malformed rule entry"),
        }
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_actions_preserving_order() {
        let yaml = "
id: r1
name: test
pattern_type: keyword
pattern: fail
actions: [store, webhook, store]
";
        let rule: AlertRule = serde_yaml::from_str(yaml).expect("valid rule yaml");
        assert_eq!(rule.actions, vec![ActionType::Store, ActionType::Webhook]);
    }

    #[test]
    fn disabled_or_empty_pattern_is_not_matchable() {
        let mut rule = AlertRule {
            id: "r".into(),
            name: "n".into(),
            pattern_type: PatternType::Exact,
            pattern: "x".into(),
            actions: vec![ActionType::Store],
            enabled: false,
        };
        assert!(!rule.is_matchable());
        rule.enabled = true;
        rule.pattern.clear();
        assert!(!rule.is_matchable());
    }
}
