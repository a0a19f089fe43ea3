//! The evaluation-pass state machine.
//!
//! A pass snapshots the policy settings, partitions items into exempt and
//! active sets, ranks the active set, and walks the surplus tail dispatching
//! removal or pause side effects. Items are evaluated strictly sequentially;
//! later decisions depend on a monotonically shrinking quota, and the
//! free-space check can end the pass early.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use culler_config::{
    ConfigError, ExemptionLedger, JsonDocumentStore, MetricKind, PolicySettings,
};
use culler_core::{
    DeleteOutcome, InventoryKind, ItemHost, ItemId, ItemSnapshot, LabelProvider, QueueIndex,
    QueueReconciler,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{PolicyError, PolicyResult};
use crate::exempt::ExemptionFilter;
use crate::metrics::{evaluate, unsigned_to_f64};
use crate::rules;

const GIB: f64 = 1_073_741_824.0;
const SECONDS_PER_HOUR: f64 = 3_600.0;

/// Builds reconciler handles for the inventory services a settings snapshot
/// enables. Rebuilt every pass so credential changes take effect without a
/// restart.
pub trait ReconcilerFactory: Send + Sync {
    /// Reconcilers for every enabled, fully configured service.
    fn build(&self, settings: &PolicySettings)
    -> HashMap<InventoryKind, Arc<dyn QueueReconciler>>;
}

/// Counters describing what one pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Items listed by the host at pass start.
    pub examined: usize,
    /// Items excluded by ignore flags or tracker/label exemptions.
    pub exempted: usize,
    /// Items beyond the effective quota.
    pub surplus: usize,
    /// Items removed through the host.
    pub removed_local: usize,
    /// Items deleted from an upstream queue instead of locally.
    pub removed_remote: usize,
    /// Items paused.
    pub paused: usize,
    /// Items skipped for unavailable metrics, snapshots, or services.
    pub skipped: usize,
}

struct Candidate {
    snapshot: ItemSnapshot,
    label: Option<String>,
    rank: (f64, f64),
}

enum UnfinishedAction {
    RemoteDeleted,
    RemoteFailed,
    LocalRemoved { success: bool },
    Deferred,
    None,
}

/// Drives one evaluation pass over the host's item collection.
pub struct PolicyEvaluator {
    host: Arc<dyn ItemHost>,
    labels: Option<Arc<dyn LabelProvider>>,
    factory: Arc<dyn ReconcilerFactory>,
    settings_store: JsonDocumentStore,
    state_store: JsonDocumentStore,
    ledger: Mutex<ExemptionLedger>,
}

impl PolicyEvaluator {
    /// Build an evaluator, loading the exemption ledger from its store.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger document exists but cannot be read.
    pub fn new(
        host: Arc<dyn ItemHost>,
        labels: Option<Arc<dyn LabelProvider>>,
        factory: Arc<dyn ReconcilerFactory>,
        settings_store: JsonDocumentStore,
        state_store: JsonDocumentStore,
    ) -> Result<Self, ConfigError> {
        let ledger = ExemptionLedger::load(&state_store)?;
        Ok(Self {
            host,
            labels,
            factory,
            settings_store,
            state_store,
            ledger: Mutex::new(ledger),
        })
    }

    /// Ignore flags for a batch of items, in input order.
    pub async fn ignore_flags(&self, ids: &[ItemId]) -> Vec<bool> {
        self.ledger.lock().await.flags_for(ids)
    }

    /// Set the ignore flag for a batch of items and persist the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger document cannot be written.
    pub async fn set_ignore(&self, ids: &[ItemId], ignored: bool) -> Result<(), ConfigError> {
        let mut ledger = self.ledger.lock().await;
        ledger.set_ignored(ids, ignored);
        ledger.persist(&self.state_store)
    }

    /// Run one evaluation pass against a fresh settings snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when the settings document is unreadable or an
    /// initial host query fails; per-item failures degrade to skip-and-log.
    #[allow(clippy::too_many_lines)]
    pub async fn run_pass(&self) -> PolicyResult<PassSummary> {
        let settings: PolicySettings = self
            .settings_store
            .load_or_default()
            .map_err(|source| PolicyError::ConfigRead { source })?;

        let mut summary = PassSummary::default();

        // A negative quota disables the policy outright.
        if settings.max_seeds < 0 {
            debug!("max_seeds is negative; retention policy disabled");
            return Ok(summary);
        }
        let quota_base = usize::try_from(settings.max_seeds).unwrap_or(usize::MAX);

        let ids = self
            .host
            .list_item_ids()
            .await
            .map_err(|source| PolicyError::Host {
                operation: "list_item_ids",
                source,
            })?;
        summary.examined = ids.len();
        info!(items = ids.len(), max_seeds = settings.max_seeds, "retention pass starting");
        if ids.len() <= quota_base {
            return Ok(summary);
        }

        let labels_enabled = self.labels.is_some();
        if !labels_enabled {
            warn!("label subsystem unavailable; label exemptions and rules disabled this pass");
        }

        let now = Utc::now();
        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            let snapshot = match self.host.get_item(&id).await {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => {
                    debug!(item = %id, "item vanished before evaluation");
                    continue;
                }
                Err(err) => {
                    warn!(item = %id, error = %err, "item snapshot unavailable; skipping");
                    summary.skipped += 1;
                    continue;
                }
            };
            let label = self.lookup_label(&id).await;
            entries.push((snapshot, label));
        }

        let filter = ExemptionFilter::new(&settings, labels_enabled);
        let mut active: Vec<Candidate> = Vec::new();
        {
            let ledger = self.ledger.lock().await;
            for (snapshot, label) in entries {
                let ignored = ledger.is_ignored(&snapshot.id);
                if filter.is_exempt(&snapshot, label.as_deref(), ignored) {
                    summary.exempted += 1;
                } else {
                    active.push(Candidate {
                        snapshot,
                        label,
                        rank: (f64::NEG_INFINITY, f64::NEG_INFINITY),
                    });
                }
            }
        }
        info!(active = active.len(), exempted = summary.exempted, "items partitioned");

        // Exempted items can count against the quota; the working quota
        // shrinks accordingly, floored at zero.
        let counted = active.len()
            + if settings.count_exempt {
                summary.exempted
            } else {
                0
            };
        if counted <= quota_base {
            return Ok(summary);
        }
        let quota = if settings.count_exempt {
            quota_base.saturating_sub(summary.exempted)
        } else {
            quota_base
        };

        for candidate in &mut active {
            candidate.rank = (
                rank_value(settings.filter, &candidate.snapshot, now),
                rank_value(settings.filter2, &candidate.snapshot, now),
            );
        }
        // Stable two-key ascending sort; ties keep their listing order.
        active.sort_by(|a, b| {
            a.rank
                .0
                .total_cmp(&b.rank.0)
                .then_with(|| a.rank.1.total_cmp(&b.rank.1))
        });

        let surplus = if active.len() > quota {
            active.split_off(quota)
        } else {
            Vec::new()
        };
        summary.surplus = surplus.len();
        if surplus.is_empty() {
            return Ok(summary);
        }

        // One queue snapshot per enabled service per pass. A failed fetch
        // makes that service unavailable for the pass, nothing more.
        let reconcilers = self.factory.build(&settings);
        let mut queues: HashMap<InventoryKind, QueueIndex> = HashMap::new();
        for (kind, reconciler) in &reconcilers {
            match reconciler.fetch_queue().await {
                Ok(queue) => {
                    debug!(service = %kind, records = queue.len(), "inventory queue fetched");
                    queues.insert(*kind, queue);
                }
                Err(err) => {
                    warn!(service = %kind, error = %err, "queue fetch failed; service unavailable this pass");
                }
            }
        }

        let mut removal_occurred = false;
        for candidate in surplus.iter().rev() {
            if self.free_space_target_met(&settings).await {
                info!("free space target met; no further action needed this pass");
                break;
            }
            if !settings.enabled {
                continue;
            }

            let decision = rules::resolve(
                &candidate.snapshot,
                candidate.label.as_deref(),
                &settings,
                labels_enabled,
                now,
            );
            let snapshot = &candidate.snapshot;

            if snapshot.finished {
                // Override rules veto the seeding-time logic when present
                // and unsatisfied.
                if decision.from_overrides && !decision.remove {
                    continue;
                }
                let Some(seeding_secs) = snapshot.metrics.seeding_secs else {
                    warn!(item = %snapshot.id, "seeding time unavailable; skipping finished item");
                    summary.skipped += 1;
                    continue;
                };
                let seed_hours = unsigned_to_f64(seeding_secs) / SECONDS_PER_HOUR;
                if seed_hours > settings.effective_seedtime_limit() {
                    if settings.pause_seed {
                        if !snapshot.paused && self.pause(snapshot).await {
                            summary.paused += 1;
                        }
                    } else {
                        info!(
                            item = %snapshot.id,
                            name = %snapshot.name,
                            seed_hours,
                            "removing finished item past seed-time limit"
                        );
                        // Finished payloads are never force-deleted here.
                        if self.remove_locally(&snapshot.id, false).await {
                            summary.removed_local += 1;
                        }
                        removal_occurred = true;
                    }
                } else if seed_hours > settings.effective_seedtime_pause() && !snapshot.paused {
                    info!(
                        item = %snapshot.id,
                        name = %snapshot.name,
                        seed_hours,
                        "pausing finished item past seed-time pause threshold"
                    );
                    if self.pause(snapshot).await {
                        summary.paused += 1;
                    }
                }
                continue;
            }

            if !decision.remove {
                continue;
            }
            if !settings.remove {
                if !snapshot.paused && self.pause(snapshot).await {
                    summary.paused += 1;
                }
                continue;
            }
            match self
                .dispatch_unfinished_removal(
                    snapshot,
                    candidate.label.as_deref(),
                    &settings,
                    &queues,
                    &reconcilers,
                )
                .await
            {
                UnfinishedAction::RemoteDeleted => {
                    summary.removed_remote += 1;
                    removal_occurred = true;
                }
                UnfinishedAction::LocalRemoved { success } => {
                    if success {
                        summary.removed_local += 1;
                    }
                    removal_occurred = true;
                }
                UnfinishedAction::Deferred => summary.skipped += 1,
                UnfinishedAction::RemoteFailed | UnfinishedAction::None => {}
            }
        }

        if removal_occurred {
            let mut ledger = self.ledger.lock().await;
            if let Err(err) = ledger.persist(&self.state_store) {
                warn!(error = %err, "exemption ledger save failed");
            }
        }

        info!(
            removed_local = summary.removed_local,
            removed_remote = summary.removed_remote,
            paused = summary.paused,
            skipped = summary.skipped,
            "retention pass finished"
        );
        Ok(summary)
    }

    /// Route an unfinished removal through the item's inventory service, or
    /// the host when no enabled service claims it.
    async fn dispatch_unfinished_removal(
        &self,
        snapshot: &ItemSnapshot,
        label: Option<&str>,
        settings: &PolicySettings,
        queues: &HashMap<InventoryKind, QueueIndex>,
        reconcilers: &HashMap<InventoryKind, Arc<dyn QueueReconciler>>,
    ) -> UnfinishedAction {
        let Some(kind) = label.and_then(InventoryKind::from_label) else {
            debug!(
                item = %snapshot.id,
                label = label.unwrap_or_default(),
                "label maps to no inventory service; leaving item in place"
            );
            return UnfinishedAction::None;
        };

        if !settings.inventory_enabled(kind) {
            return UnfinishedAction::LocalRemoved {
                success: self
                    .remove_locally(&snapshot.id, settings.remove_data)
                    .await,
            };
        }

        let Some(queue) = queues.get(&kind) else {
            warn!(item = %snapshot.id, service = %kind, "service unavailable this pass; deferring removal");
            return UnfinishedAction::Deferred;
        };

        let Some(entry) = queue.get(&snapshot.content_hash) else {
            warn!(
                item = %snapshot.id,
                service = %kind,
                hash = %snapshot.content_hash,
                "item missing from service queue; removing locally"
            );
            return UnfinishedAction::LocalRemoved {
                success: self
                    .remove_locally(&snapshot.id, settings.remove_data)
                    .await,
            };
        };

        let Some(reconciler) = reconcilers.get(&kind) else {
            return UnfinishedAction::Deferred;
        };
        match reconciler.delete_entry(entry.remote_id, true).await {
            Ok(DeleteOutcome::Deleted(_)) => {
                // The upstream service's own reconciliation removes the
                // item locally later; the host is deliberately untouched.
                info!(
                    item = %snapshot.id,
                    name = %snapshot.name,
                    service = %kind,
                    remote_id = entry.remote_id,
                    "queue entry deleted and blacklisted upstream"
                );
                UnfinishedAction::RemoteDeleted
            }
            Ok(DeleteOutcome::Failed { status }) => {
                warn!(
                    item = %snapshot.id,
                    service = %kind,
                    remote_id = entry.remote_id,
                    status,
                    "queue delete rejected upstream"
                );
                UnfinishedAction::RemoteFailed
            }
            Err(err) => {
                warn!(
                    item = %snapshot.id,
                    service = %kind,
                    remote_id = entry.remote_id,
                    error = %err,
                    "queue delete unreachable"
                );
                UnfinishedAction::RemoteFailed
            }
        }
    }

    /// Remove an item through the host and drop its ledger entry.
    ///
    /// Ledger cleanup is attempted even when the host removal fails.
    async fn remove_locally(&self, id: &ItemId, delete_data: bool) -> bool {
        let removed = match self.host.remove_item(id, delete_data).await {
            Ok(()) => {
                info!(item = %id, delete_data, "item removed from host");
                true
            }
            Err(err) => {
                warn!(item = %id, error = %err, "local removal failed");
                false
            }
        };
        let mut ledger = self.ledger.lock().await;
        if ledger.forget(id) {
            debug!(item = %id, "exemption ledger entry dropped");
        }
        removed
    }

    async fn pause(&self, snapshot: &ItemSnapshot) -> bool {
        match self.host.pause_item(&snapshot.id).await {
            Ok(()) => {
                info!(item = %snapshot.id, name = %snapshot.name, "item paused");
                true
            }
            Err(err) => {
                warn!(item = %snapshot.id, error = %err, "pause failed; item left in current state");
                false
            }
        }
    }

    async fn lookup_label(&self, id: &ItemId) -> Option<String> {
        let provider = self.labels.as_ref()?;
        match provider.get_label(id).await {
            Ok(label) => label.filter(|l| !l.is_empty()),
            Err(err) => {
                warn!(item = %id, error = %err, "label lookup failed; treating item as unlabeled");
                None
            }
        }
    }

    async fn free_space_target_met(&self, settings: &PolicySettings) -> bool {
        if settings.hdd_space < 0.0 {
            return false;
        }
        match self.host.free_space_bytes().await {
            Ok(bytes) => {
                let free_gib = unsigned_to_f64(bytes) / GIB;
                debug!(free_gib, target_gib = settings.hdd_space, "free space checked");
                free_gib > settings.hdd_space
            }
            Err(err) => {
                warn!(error = %err, "free space query failed; space check disabled this pass");
                false
            }
        }
    }
}

fn rank_value(metric: MetricKind, snapshot: &ItemSnapshot, now: DateTime<Utc>) -> f64 {
    match evaluate(metric, snapshot, now) {
        Ok(value) => value,
        Err(err) => {
            // Unmeasurable items sort into the retained head; the engine
            // never acts on an item it cannot rank.
            debug!(item = %err.item, metric = err.metric.id(), "ranking metric unavailable");
            f64::NEG_INFINITY
        }
    }
}
