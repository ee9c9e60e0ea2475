// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use crate::model::{ActionType, AlertRule, Message};

type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type Handler = Arc<dyn Fn(Message, Vec<AlertRule>) -> HandlerFuture + Send + Sync>;

/// Dispatches a matched message to per-action handlers (spec §4.6).
/// `route` never gates persistence on its own: the caller decides whether
/// to buffer based on the returned `discard` flag (SPEC_FULL §D resolves
/// the spec's open question this way — STORE remains the default, DISCARD
/// is opt-in).
#[derive(Default, Clone)]
pub struct MessageRouter {
    handlers: HashMap<ActionType, Handler>,
}

impl MessageRouter {
    pub fn new() -> Self {
        MessageRouter { handlers: HashMap::new() }
    }

    /// Registers an async handler for `action`. A later call for the same
    /// action replaces the earlier one.
    pub fn register<F, Fut>(&mut self, action: ActionType, handler: F)
    where
        F: Fn(Message, Vec<AlertRule>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handlers
            .insert(action, Arc::new(move |msg, rules| Box::pin(handler(msg, rules))));
    }

    /// Registers `DISCARD` as a no-op handler whose only effect is the
    /// `discard` signal `route` returns to the caller.
    pub fn register_discard(&mut self) {
        self.register(ActionType::Discard, |_msg, _rules| async {});
    }

    /// Routes `msg` to every handler whose action was requested by a rule
    /// in `matching_rules`. Returns whether the caller should drop the
    /// message from persistence (`true` iff `DISCARD` was both matched and
    /// registered).
    pub async fn route(&self, msg: &Message, matching_rules: &[&AlertRule]) -> bool {
        if matching_rules.is_empty() {
            return false;
        }

        let mut by_action: HashMap<ActionType, Vec<AlertRule>> = HashMap::new();
        for rule in matching_rules {
            for action in &rule.actions {
                by_action.entry(*action).or_default().push((*rule).clone());
            }
        }

        let discard = by_action.contains_key(&ActionType::Discard) && self.handlers.contains_key(&ActionType::Discard);

        let mut tasks = Vec::new();
        for (action, rules) in by_action {
            if let Some(handler) = self.handlers.get(&action) {
                tasks.push(tokio::spawn(handler(msg.clone(), rules)));
            }
        }
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "action handler task panicked");
            }
        }

        discard
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::model::{PatternType, Severity};

    use super::*;

    fn rule(id: &str, actions: Vec<ActionType>) -> AlertRule {
        AlertRule {
            id: id.into(),
            name: id.into(),
            pattern_type: PatternType::Keyword,
            pattern: "x".into(),
            actions,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn empty_rules_never_discard() {
        let router = MessageRouter::new();
        let msg = Message::new_unknown("1".into(), Severity::Info, "x".into());
        assert!(!router.route(&msg, &[]).await);
    }

    #[tokio::test]
    async fn unregistered_discard_is_noop_store_is_default() {
        let router = MessageRouter::new();
        let msg = Message::new_unknown("1".into(), Severity::Info, "x".into());
        let r = rule("r1", vec![ActionType::Discard]);
        assert!(!router.route(&msg, &[&r]).await);
    }

    #[tokio::test]
    async fn registered_discard_signals_drop() {
        let mut router = MessageRouter::new();
        router.register_discard();
        let msg = Message::new_unknown("1".into(), Severity::Info, "x".into());
        let r = rule("r1", vec![ActionType::Discard]);
        assert!(router.route(&msg, &[&r]).await);
    }

    #[tokio::test]
    async fn handler_runs_once_per_action_across_rules() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = MessageRouter::new();
        let calls_clone = calls.clone();
        router.register(ActionType::Webhook, move |_msg, rules| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(rules.len(), Ordering::SeqCst);
            }
        });

        let msg = Message::new_unknown("1".into(), Severity::Info, "x".into());
        let r1 = rule("r1", vec![ActionType::Webhook]);
        let r2 = rule("r2", vec![ActionType::Webhook]);
        router.route(&msg, &[&r1, &r2]).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
