// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde_json::{Value, json};

use crate::model::Message;

/// Pure validity check over a `Message` (spec §4.3). A message is valid iff
/// `source_ip` and `payload` are both non-empty. On failure, human-readable
/// error strings are appended to `metadata["validation_errors"]` and the
/// message is discarded by the caller — this function has no side effects
/// on the store.
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Validator
    }

    /// Returns `true` if `msg` should continue through the pipeline.
    /// `msg.metadata["validation_errors"]` is populated when it returns
    /// `false`.
    pub fn validate(&self, msg: &mut Message) -> bool {
        let mut errors = Vec::new();
        if msg.source_ip.is_empty() {
            errors.push("source_ip is empty");
        }
        if msg.payload.is_empty() {
            errors.push("payload is empty");
        }

        if errors.is_empty() {
            return true;
        }

        let arr: Vec<Value> = errors.into_iter().map(|e| json!(e)).collect();
        msg.metadata.insert("validation_errors".into(), Value::Array(arr));
        false
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::Severity;

    use super::*;

    #[test]
    fn valid_message_passes() {
        let v = Validator::new();
        let mut msg = Message::new_unknown("10.0.0.1".into(), Severity::Info, "hello".into());
        assert!(v.validate(&mut msg));
        assert!(!msg.metadata.contains_key("validation_errors"));
    }

    #[test]
    fn empty_source_ip_fails_with_reason() {
        let v = Validator::new();
        let mut msg = Message::new_unknown(String::new(), Severity::Info, "hello".into());
        assert!(!v.validate(&mut msg));
        let errs = msg.metadata.get("validation_errors").expect("errors present");
        assert!(errs.to_string().contains("source_ip"));
    }

    #[test]
    fn empty_payload_fails_with_reason() {
        let v = Validator::new();
        let mut msg = Message::new_unknown("10.0.0.1".into(), Severity::Info, String::new());
        assert!(!v.validate(&mut msg));
        let errs = msg.metadata.get("validation_errors").expect("errors present");
        assert!(errs.to_string().contains("payload"));
    }
}
