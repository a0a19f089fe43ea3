//! Typed policy settings and rule vocabulary.
//!
//! # Design
//! - Pure data carriers with serde defaults matching the engine's
//!   historically recognized option set.
//! - Threshold floors live here as `effective_*` accessors so every caller
//!   sees the same clamped values.

use std::collections::BTreeMap;

use culler_core::InventoryKind;
use serde::{Deserialize, Serialize};

/// Metric selector usable for ranking and rule thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Seed ratio.
    Ratio,
    /// Age since the item was added, in days.
    AgeDays,
    /// Seeding time, in days.
    SeedTime,
    /// Seeder count.
    Seeders,
    /// Distributed copies / availability.
    Availability,
}

impl MetricKind {
    /// All metric kinds, in catalog order.
    pub const ALL: [Self; 5] = [
        Self::Ratio,
        Self::AgeDays,
        Self::SeedTime,
        Self::Seeders,
        Self::Availability,
    ];

    /// Stable identifier used in configuration documents and the rule catalog.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Ratio => "ratio",
            Self::AgeDays => "age_days",
            Self::SeedTime => "seed_time",
            Self::Seeders => "seeders",
            Self::Availability => "availability",
        }
    }

    /// Human-readable name surfaced through the rule catalog.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Ratio => "Ratio",
            Self::AgeDays => "Age in days",
            Self::SeedTime => "Seed Time",
            Self::Seeders => "Seeders",
            Self::Availability => "Availability",
        }
    }
}

/// Boolean combinator joining two threshold tests.
///
/// The derived ordering (`And` before `Or`) drives the rule resolver's
/// evaluation order; `and`-type rules must fold in before `or`-type rules.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// Both tests must hold.
    #[default]
    And,
    /// Either test may hold.
    Or,
}

impl Combinator {
    /// Combine an accumulated result with the next test result.
    #[must_use]
    pub const fn apply(self, accumulated: bool, test: bool) -> bool {
        match self {
            Self::And => accumulated && test,
            Self::Or => accumulated || test,
        }
    }
}

/// One per-tracker or per-label override rule: `metric >= threshold`,
/// joined to the running result by `combinator`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverrideRule {
    /// How the rule combines with the rules folded in before it.
    pub combinator: Combinator,
    /// Metric the rule tests.
    pub metric: MetricKind,
    /// Inclusive lower bound the metric is tested against.
    pub threshold: f64,
}

/// Full recognized option set for the retention policy.
///
/// Snapshotted once per evaluation pass; a reconfiguration mid-pass is never
/// observed. Unknown keys in the stored document are preserved by the store
/// but ignored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Master switch for the per-item decision loop.
    pub enabled: bool,
    /// Retention quota; negative disables the policy entirely.
    pub max_seeds: i64,
    /// Primary ranking/rule metric.
    pub filter: MetricKind,
    /// Secondary ranking/rule metric.
    pub filter2: MetricKind,
    /// Threshold for the primary test (`metric <= min`).
    pub min: f64,
    /// Threshold for the secondary test (`metric >= min2`, floored at 0.5).
    pub min2: f64,
    /// Combinator joining the two global threshold tests.
    pub sel_func: Combinator,
    /// Enable flag for the primary global test.
    pub rule_1_enabled: bool,
    /// Enable flag for the secondary global test.
    pub rule_2_enabled: bool,
    /// Whether exempted items count against the quota.
    pub count_exempt: bool,
    /// Whether surplus items are removed (paused otherwise).
    pub remove: bool,
    /// Whether payload data is deleted with unfinished removals.
    pub remove_data: bool,
    /// Exempt-tracker substrings.
    pub trackers: Vec<String>,
    /// Exempt-label substrings.
    pub labels: Vec<String>,
    /// Per-tracker override rule sets, keyed by tracker substring.
    pub tracker_rules: BTreeMap<String, Vec<OverrideRule>>,
    /// Per-label override rule sets, keyed by exact label.
    pub label_rules: BTreeMap<String, Vec<OverrideRule>>,
    /// Hours of seeding after which a finished item is removed (floored at 24).
    pub seedtime_limit: f64,
    /// Hours of seeding after which a finished item is paused (floored at 20).
    pub seedtime_pause: f64,
    /// When set, finished items past the limit are paused, never removed.
    pub pause_seed: bool,
    /// Minimum free space in GiB below which removal proceeds; negative
    /// disables the space check.
    pub hdd_space: f64,
    /// Evaluation interval in hours.
    pub interval: f64,
    /// Reconcile removals against a sonarr queue.
    pub enable_sonarr: bool,
    /// Reconcile removals against a radarr queue.
    pub enable_radarr: bool,
    /// Reconcile removals against a lidarr queue.
    pub enable_lidarr: bool,
    /// API key for sonarr.
    pub api_sonarr: Option<String>,
    /// API key for radarr.
    pub api_radarr: Option<String>,
    /// API key for lidarr.
    pub api_lidarr: Option<String>,
    /// Base URL of the server hosting the inventory services.
    pub server_url: Option<String>,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_seeds: 0,
            filter: MetricKind::Ratio,
            filter2: MetricKind::AgeDays,
            min: 0.0,
            min2: 0.0,
            sel_func: Combinator::And,
            rule_1_enabled: true,
            rule_2_enabled: true,
            count_exempt: false,
            remove: true,
            remove_data: false,
            trackers: Vec::new(),
            labels: Vec::new(),
            tracker_rules: BTreeMap::new(),
            label_rules: BTreeMap::new(),
            seedtime_limit: 24.0,
            seedtime_pause: 20.0,
            pause_seed: false,
            hdd_space: -1.0,
            interval: 0.5,
            enable_sonarr: false,
            enable_radarr: false,
            enable_lidarr: false,
            api_sonarr: None,
            api_radarr: None,
            api_lidarr: None,
            server_url: None,
        }
    }
}

/// Floor applied to the secondary global threshold to prevent hit-and-run
/// removals.
const MIN2_FLOOR: f64 = 0.5;
/// Floor applied to the finished-item removal threshold, in hours.
const SEEDTIME_LIMIT_FLOOR: f64 = 24.0;
/// Floor applied to the finished-item pause threshold, in hours.
const SEEDTIME_PAUSE_FLOOR: f64 = 20.0;

impl PolicySettings {
    /// Secondary threshold with the hit-and-run floor applied.
    #[must_use]
    pub fn effective_min2(&self) -> f64 {
        self.min2.max(MIN2_FLOOR)
    }

    /// Finished-item removal threshold in hours, floored at 24.
    #[must_use]
    pub fn effective_seedtime_limit(&self) -> f64 {
        self.seedtime_limit.max(SEEDTIME_LIMIT_FLOOR)
    }

    /// Finished-item pause threshold in hours, floored at 20.
    #[must_use]
    pub fn effective_seedtime_pause(&self) -> f64 {
        self.seedtime_pause.max(SEEDTIME_PAUSE_FLOOR)
    }

    /// Whether reconciliation with the given inventory kind is switched on.
    #[must_use]
    pub const fn inventory_enabled(&self, kind: InventoryKind) -> bool {
        match kind {
            InventoryKind::Sonarr => self.enable_sonarr,
            InventoryKind::Radarr => self.enable_radarr,
            InventoryKind::Lidarr => self.enable_lidarr,
        }
    }

    /// API key configured for the given inventory kind.
    #[must_use]
    pub fn api_key(&self, kind: InventoryKind) -> Option<&str> {
        let key = match kind {
            InventoryKind::Sonarr => &self.api_sonarr,
            InventoryKind::Radarr => &self.api_radarr,
            InventoryKind::Lidarr => &self.api_lidarr,
        };
        key.as_deref()
    }
}
