// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use regex::RegexBuilder;

use crate::model::{AlertRule, Message, PatternType};

/// Holds an immutable, load-ordered list of enabled rules and matches a
/// message's payload against each (spec §4.4). Rules with an unknown
/// pattern type never match; this only arises if `PatternType` grows a
/// variant this matcher hasn't been taught yet.
pub struct PatternMatcher {
    rules: Vec<AlertRule>,
}

impl PatternMatcher {
    /// Keeps only matchable rules (enabled, non-empty pattern), in load
    /// order.
    pub fn new(rules: Vec<AlertRule>) -> Self {
        let rules = rules.into_iter().filter(AlertRule::is_matchable).collect();
        PatternMatcher { rules }
    }

    /// Rules whose pattern matches `payload`, in rule-list order.
    pub fn matches(&self, payload: &str) -> Vec<&AlertRule> {
        self.rules.iter().filter(|r| rule_matches(r, payload)).collect()
    }

    pub fn match_message(&self, msg: &Message) -> Vec<&AlertRule> {
        self.matches(&msg.payload)
    }
}

fn rule_matches(rule: &AlertRule, payload: &str) -> bool {
    match rule.pattern_type {
        PatternType::Regex => RegexBuilder::new(&rule.pattern)
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(payload))
            .unwrap_or(false),
        PatternType::Keyword => payload.to_lowercase().contains(&rule.pattern.to_lowercase()),
        PatternType::Exact => payload == rule.pattern,
    }
}
