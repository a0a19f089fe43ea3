//! Scalar metric functions over item snapshots.
//!
//! Pure apart from diagnostic logging; age is recomputed against the wall
//! clock on every call rather than cached.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use culler_config::MetricKind;
use culler_core::ItemSnapshot;
use tracing::trace;

use crate::error::MetricUnavailable;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Compute one metric for an item at evaluation time `now`.
///
/// # Errors
///
/// Returns [`MetricUnavailable`] when the host does not report the metric;
/// callers degrade to "rule not satisfied" or "skip this item".
pub fn evaluate(
    metric: MetricKind,
    item: &ItemSnapshot,
    now: DateTime<Utc>,
) -> Result<f64, MetricUnavailable> {
    let value = match metric {
        MetricKind::Ratio => item.metrics.ratio,
        MetricKind::AgeDays => item
            .metrics
            .added_at
            .map(|added| seconds_to_days((now - added).num_seconds())),
        MetricKind::SeedTime => item
            .metrics
            .seeding_secs
            .map(|secs| unsigned_to_f64(secs) / SECONDS_PER_DAY),
        MetricKind::Seeders => item.metrics.seeders.map(unsigned_to_f64),
        MetricKind::Availability => item.metrics.availability,
    };
    trace!(item = %item.id, metric = metric.id(), value = ?value, "metric evaluated");
    value.ok_or_else(|| MetricUnavailable {
        metric,
        item: item.id.clone(),
    })
}

/// Catalog of available metric functions, keyed by stable id, for UI
/// population through the control surface.
#[must_use]
pub fn rule_catalog() -> BTreeMap<&'static str, &'static str> {
    MetricKind::ALL
        .iter()
        .map(|metric| (metric.id(), metric.display_name()))
        .collect()
}

const fn seconds_to_days(seconds: i64) -> f64 {
    #[expect(
        clippy::cast_precision_loss,
        reason = "metric values are coarse day counts; sub-second precision is irrelevant"
    )]
    {
        seconds as f64 / SECONDS_PER_DAY
    }
}

pub(crate) const fn unsigned_to_f64(value: u64) -> f64 {
    #[expect(
        clippy::cast_precision_loss,
        reason = "metric values are compared against user-entered thresholds"
    )]
    {
        value as f64
    }
}
