//! Effective removal-condition resolution.
//!
//! Per-tracker and per-label override rules supersede the global two-factor
//! policy. Override rules are folded left-to-right over a combinator-sorted
//! list — `and` rules before `or` rules — with no short-circuiting, because
//! evaluation order changes the folded result.

use chrono::{DateTime, Utc};
use culler_config::{MetricKind, OverrideRule, PolicySettings};
use culler_core::ItemSnapshot;
use tracing::debug;

use crate::metrics::evaluate;

/// Outcome of resolving the removal condition for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalDecision {
    /// Whether the removal condition holds.
    pub remove: bool,
    /// Whether the condition came from override rules; gates the
    /// finished-item seeding-time logic.
    pub from_overrides: bool,
}

/// Resolve the effective removal condition for one item.
#[must_use]
pub fn resolve(
    item: &ItemSnapshot,
    label: Option<&str>,
    settings: &PolicySettings,
    labels_enabled: bool,
    now: DateTime<Utc>,
) -> RemovalDecision {
    let mut rules = gather_override_rules(item, label, settings, labels_enabled);
    // Stable sort: `and` rules fold in before `or` rules, ties keep their
    // configured order.
    rules.sort_by_key(|rule| rule.combinator);

    if let Some((first, rest)) = rules.split_first() {
        let mut condition = rule_test(first, item, now);
        for rule in rest {
            let test = rule_test(rule, item, now);
            condition = rule.combinator.apply(condition, test);
        }
        debug!(item = %item.id, rules = rules.len(), condition, "override rules resolved");
        return RemovalDecision {
            remove: condition,
            from_overrides: true,
        };
    }

    let primary = metric_test(settings.filter, item, now, |value| value <= settings.min);
    let secondary = metric_test(settings.filter2, item, now, |value| {
        value >= settings.effective_min2()
    });

    let remove = match (settings.rule_1_enabled, settings.rule_2_enabled) {
        (true, true) => settings.sel_func.apply(primary, secondary),
        (true, false) => primary,
        (false, true) => secondary,
        (false, false) => false,
    };
    RemovalDecision {
        remove,
        from_overrides: false,
    }
}

/// Collect every override rule whose tracker key substring-matches one of
/// the item's tracker URLs, plus the rule set keyed by the item's exact
/// label when the label subsystem is present.
fn gather_override_rules(
    item: &ItemSnapshot,
    label: Option<&str>,
    settings: &PolicySettings,
    labels_enabled: bool,
) -> Vec<OverrideRule> {
    let mut rules = Vec::new();

    for (key, rule_set) in &settings.tracker_rules {
        let key = key.to_lowercase();
        if item
            .trackers
            .iter()
            .any(|url| url.to_lowercase().contains(&key))
        {
            rules.extend(rule_set.iter().copied());
        }
    }

    if labels_enabled
        && let Some(label) = label
        && let Some(rule_set) = settings.label_rules.get(label)
    {
        rules.extend(rule_set.iter().copied());
    }

    rules
}

fn rule_test(rule: &OverrideRule, item: &ItemSnapshot, now: DateTime<Utc>) -> bool {
    metric_test(rule.metric, item, now, |value| value >= rule.threshold)
}

fn metric_test<F>(metric: MetricKind, item: &ItemSnapshot, now: DateTime<Utc>, predicate: F) -> bool
where
    F: FnOnce(f64) -> bool,
{
    match evaluate(metric, item, now) {
        Ok(value) => predicate(value),
        Err(err) => {
            debug!(item = %err.item, metric = err.metric.id(), "metric unavailable; rule not satisfied");
            false
        }
    }
}
