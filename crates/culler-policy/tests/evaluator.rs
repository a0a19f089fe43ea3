//! End-to-end tests for the evaluation pass, driven through mock
//! collaborators.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use culler_config::{JsonDocumentStore, MetricKind, PolicySettings};
use culler_core::{
    ContentHash, DeleteOutcome, InventoryKind, ItemHost, ItemId, ItemMetrics, ItemSnapshot,
    LabelProvider, QueueEntry, QueueIndex, QueueReconciler,
};
use culler_policy::{PolicyError, PolicyEvaluator, ReconcilerFactory};
use tempfile::TempDir;

#[derive(Default)]
struct MockHost {
    items: Vec<ItemSnapshot>,
    removed: Mutex<Vec<(ItemId, bool)>>,
    paused: Mutex<Vec<ItemId>>,
    free_bytes: u64,
    fail_removal: bool,
}

#[async_trait]
impl ItemHost for MockHost {
    async fn list_item_ids(&self) -> anyhow::Result<Vec<ItemId>> {
        Ok(self.items.iter().map(|item| item.id.clone()).collect())
    }

    async fn get_item(&self, id: &ItemId) -> anyhow::Result<Option<ItemSnapshot>> {
        Ok(self.items.iter().find(|item| &item.id == id).cloned())
    }

    async fn remove_item(&self, id: &ItemId, delete_data: bool) -> anyhow::Result<()> {
        self.removed
            .lock()
            .expect("lock")
            .push((id.clone(), delete_data));
        if self.fail_removal {
            anyhow::bail!("host refused the removal");
        }
        Ok(())
    }

    async fn pause_item(&self, id: &ItemId) -> anyhow::Result<()> {
        self.paused.lock().expect("lock").push(id.clone());
        Ok(())
    }

    async fn free_space_bytes(&self) -> anyhow::Result<u64> {
        Ok(self.free_bytes)
    }
}

struct MapLabels(BTreeMap<ItemId, String>);

#[async_trait]
impl LabelProvider for MapLabels {
    async fn get_label(&self, id: &ItemId) -> anyhow::Result<Option<String>> {
        Ok(self.0.get(id).cloned())
    }
}

struct MockReconciler {
    kind: InventoryKind,
    queue: QueueIndex,
    fail_fetch: bool,
    reject_deletes: bool,
    deletes: Mutex<Vec<(i64, bool)>>,
}

impl MockReconciler {
    fn new(kind: InventoryKind, queue: QueueIndex) -> Arc<Self> {
        Arc::new(Self {
            kind,
            queue,
            fail_fetch: false,
            reject_deletes: false,
            deletes: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl QueueReconciler for MockReconciler {
    fn kind(&self) -> InventoryKind {
        self.kind
    }

    async fn fetch_queue(&self) -> anyhow::Result<QueueIndex> {
        if self.fail_fetch {
            anyhow::bail!("connection refused");
        }
        Ok(self.queue.clone())
    }

    async fn delete_entry(&self, remote_id: i64, blacklist: bool) -> anyhow::Result<DeleteOutcome> {
        self.deletes
            .lock()
            .expect("lock")
            .push((remote_id, blacklist));
        if self.reject_deletes {
            Ok(DeleteOutcome::Failed { status: 404 })
        } else {
            Ok(DeleteOutcome::Deleted(serde_json::json!({"id": remote_id})))
        }
    }
}

struct FixedFactory(HashMap<InventoryKind, Arc<dyn QueueReconciler>>);

impl ReconcilerFactory for FixedFactory {
    fn build(
        &self,
        _settings: &PolicySettings,
    ) -> HashMap<InventoryKind, Arc<dyn QueueReconciler>> {
        self.0.clone()
    }
}

struct Harness {
    _dir: TempDir,
    host: Arc<MockHost>,
    state_store: JsonDocumentStore,
    settings_store: JsonDocumentStore,
    evaluator: PolicyEvaluator,
}

fn harness(
    settings: &PolicySettings,
    host: MockHost,
    labels: Option<BTreeMap<ItemId, String>>,
    reconcilers: Vec<Arc<MockReconciler>>,
    initial_states: Option<&BTreeMap<String, bool>>,
) -> Harness {
    let dir = TempDir::new().expect("tempdir");
    let settings_store = JsonDocumentStore::new(dir.path().join("culler.json"));
    settings_store.save(settings).expect("settings saved");
    let state_store = JsonDocumentStore::new(dir.path().join("culler_states.json"));
    if let Some(states) = initial_states {
        state_store.save(states).expect("states saved");
    }

    let host = Arc::new(host);
    let map: HashMap<InventoryKind, Arc<dyn QueueReconciler>> = reconcilers
        .into_iter()
        .map(|reconciler| {
            (
                reconciler.kind,
                reconciler as Arc<dyn QueueReconciler>,
            )
        })
        .collect();
    let evaluator = PolicyEvaluator::new(
        Arc::clone(&host) as Arc<dyn ItemHost>,
        labels.map(|map| Arc::new(MapLabels(map)) as Arc<dyn LabelProvider>),
        Arc::new(FixedFactory(map)),
        settings_store.clone(),
        state_store.clone(),
    )
    .expect("evaluator builds");

    Harness {
        _dir: dir,
        host,
        state_store,
        settings_store,
        evaluator,
    }
}

fn unfinished(id: &str, ratio: f64) -> ItemSnapshot {
    ItemSnapshot {
        id: ItemId::new(id),
        name: format!("item-{id}"),
        trackers: Vec::new(),
        metrics: ItemMetrics {
            ratio: Some(ratio),
            ..ItemMetrics::default()
        },
        finished: false,
        paused: false,
        content_hash: ContentHash::new(id),
    }
}

fn finished(id: &str, seed_hours: u64) -> ItemSnapshot {
    ItemSnapshot {
        id: ItemId::new(id),
        name: format!("item-{id}"),
        trackers: Vec::new(),
        metrics: ItemMetrics {
            ratio: Some(1.0),
            seeding_secs: Some(seed_hours * 3_600),
            ..ItemMetrics::default()
        },
        finished: true,
        paused: false,
        content_hash: ContentHash::new(id),
    }
}

/// Settings under which a low-ratio unfinished item meets the removal
/// condition through the primary test alone.
fn removing_settings() -> PolicySettings {
    PolicySettings {
        enabled: true,
        max_seeds: 0,
        filter: MetricKind::Ratio,
        min: 1.0,
        rule_2_enabled: false,
        ..PolicySettings::default()
    }
}

#[tokio::test]
async fn negative_quota_disables_the_pass() {
    let host = MockHost {
        items: vec![unfinished("a1", 0.1)],
        ..MockHost::default()
    };
    let settings = PolicySettings {
        max_seeds: -1,
        enabled: true,
        ..PolicySettings::default()
    };
    let h = harness(&settings, host, None, Vec::new(), None);

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    assert_eq!(summary.examined, 0);
    assert!(h.host.removed.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn quota_of_twenty_retains_twenty_of_twenty_five() {
    let items = (0..25)
        .map(|index| unfinished(&format!("t{index:02}"), f64::from(index) * 0.1))
        .collect();
    let host = MockHost {
        items,
        ..MockHost::default()
    };
    let settings = PolicySettings {
        max_seeds: 20,
        ..PolicySettings::default()
    };
    let h = harness(&settings, host, None, Vec::new(), None);

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    assert_eq!(summary.examined, 25);
    assert_eq!(summary.exempted, 0);
    assert_eq!(summary.surplus, 5);
    // The policy itself is disabled, so surplus items were only counted.
    assert!(h.host.removed.lock().expect("lock").is_empty());
    assert!(h.host.paused.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn equal_ranks_keep_listing_order_and_process_in_reverse() {
    // All four items rank identically; the stable sort must retain listing
    // order, so the surplus tail is c,d and processing order d,c.
    let host = MockHost {
        items: vec![
            finished("aa", 30),
            finished("bb", 30),
            finished("cc", 30),
            finished("dd", 30),
        ],
        ..MockHost::default()
    };
    let settings = PolicySettings {
        enabled: true,
        max_seeds: 2,
        ..PolicySettings::default()
    };
    let h = harness(&settings, host, None, Vec::new(), None);

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    assert_eq!(summary.surplus, 2);
    assert_eq!(summary.removed_local, 2);
    let removed = h.host.removed.lock().expect("lock").clone();
    assert_eq!(
        removed,
        vec![(ItemId::new("dd"), false), (ItemId::new("cc"), false)]
    );
}

#[tokio::test]
async fn finished_item_past_limit_is_removed_without_data() {
    let host = MockHost {
        items: vec![finished("f1", 30)],
        ..MockHost::default()
    };
    let settings = PolicySettings {
        enabled: true,
        max_seeds: 0,
        seedtime_limit: 24.0,
        ..PolicySettings::default()
    };
    let mut states = BTreeMap::new();
    states.insert("f1".to_string(), false);
    let h = harness(&settings, host, None, Vec::new(), Some(&states));

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    assert_eq!(summary.removed_local, 1);
    assert_eq!(
        h.host.removed.lock().expect("lock").clone(),
        vec![(ItemId::new("f1"), false)]
    );

    // The ledger entry went with the item and the change was persisted.
    let states: BTreeMap<String, bool> = h.state_store.load_or_default().expect("states load");
    assert!(!states.contains_key("f1"));
}

#[tokio::test]
async fn finished_item_past_pause_threshold_is_paused() {
    let host = MockHost {
        items: vec![finished("f2", 22)],
        ..MockHost::default()
    };
    let settings = PolicySettings {
        enabled: true,
        max_seeds: 0,
        seedtime_limit: 24.0,
        seedtime_pause: 20.0,
        ..PolicySettings::default()
    };
    let h = harness(&settings, host, None, Vec::new(), None);

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    assert_eq!(summary.paused, 1);
    assert_eq!(summary.removed_local, 0);
    assert_eq!(
        h.host.paused.lock().expect("lock").clone(),
        vec![ItemId::new("f2")]
    );
    assert!(h.host.removed.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn pause_seed_pauses_instead_of_removing() {
    let host = MockHost {
        items: vec![finished("f3", 30)],
        ..MockHost::default()
    };
    let settings = PolicySettings {
        enabled: true,
        max_seeds: 0,
        pause_seed: true,
        ..PolicySettings::default()
    };
    let h = harness(&settings, host, None, Vec::new(), None);

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    assert_eq!(summary.paused, 1);
    assert_eq!(summary.removed_local, 0);
    assert!(h.host.removed.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn already_paused_finished_item_is_left_alone() {
    let mut item = finished("f4", 22);
    item.paused = true;
    let host = MockHost {
        items: vec![item],
        ..MockHost::default()
    };
    let settings = PolicySettings {
        enabled: true,
        max_seeds: 0,
        ..PolicySettings::default()
    };
    let h = harness(&settings, host, None, Vec::new(), None);

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    assert_eq!(summary.paused, 0);
    assert!(h.host.paused.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn finished_item_without_seed_time_is_skipped() {
    let mut item = finished("f5", 30);
    item.metrics.seeding_secs = None;
    let host = MockHost {
        items: vec![item],
        ..MockHost::default()
    };
    let settings = PolicySettings {
        enabled: true,
        max_seeds: 0,
        ..PolicySettings::default()
    };
    let h = harness(&settings, host, None, Vec::new(), None);

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    assert_eq!(summary.skipped, 1);
    assert!(h.host.removed.lock().expect("lock").is_empty());
    assert!(h.host.paused.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn ignored_items_are_exempt_and_can_consume_quota() {
    let items = vec![
        unfinished("i1", 0.1),
        unfinished("i2", 0.2),
        unfinished("i3", 0.3),
    ];
    let mut states = BTreeMap::new();
    states.insert("i1".to_string(), true);

    let base = PolicySettings {
        max_seeds: 1,
        ..PolicySettings::default()
    };
    let host = MockHost {
        items: items.clone(),
        ..MockHost::default()
    };
    let h = harness(&base, host, None, Vec::new(), Some(&states));
    let summary = h.evaluator.run_pass().await.expect("pass runs");
    assert_eq!(summary.exempted, 1);
    assert_eq!(summary.surplus, 1);

    let counting = PolicySettings {
        count_exempt: true,
        ..base
    };
    let host = MockHost {
        items,
        ..MockHost::default()
    };
    let h = harness(&counting, host, None, Vec::new(), Some(&states));
    let summary = h.evaluator.run_pass().await.expect("pass runs");
    assert_eq!(summary.exempted, 1);
    // The exempt item came off the top of the allowance.
    assert_eq!(summary.surplus, 2);
}

#[tokio::test]
async fn remote_queue_hit_deletes_upstream_and_skips_local_removal() {
    let host = MockHost {
        items: vec![unfinished("abcd1234", 0.5)],
        ..MockHost::default()
    };
    let settings = PolicySettings {
        enable_sonarr: true,
        ..removing_settings()
    };
    let mut labels = BTreeMap::new();
    labels.insert(ItemId::new("abcd1234"), "tv-sonarr".to_string());

    let mut queue = QueueIndex::new();
    queue.insert(
        ContentHash::new("ABCD1234"),
        QueueEntry {
            remote_id: 77,
            title: "remote-item".to_string(),
        },
    );
    let reconciler = MockReconciler::new(InventoryKind::Sonarr, queue);
    let h = harness(
        &settings,
        host,
        Some(labels),
        vec![Arc::clone(&reconciler)],
        None,
    );

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    assert_eq!(summary.removed_remote, 1);
    assert_eq!(summary.removed_local, 0);
    assert_eq!(
        reconciler.deletes.lock().expect("lock").clone(),
        vec![(77, true)]
    );
    assert!(h.host.removed.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn queue_miss_falls_back_to_local_removal() {
    let host = MockHost {
        items: vec![unfinished("beef0001", 0.5)],
        ..MockHost::default()
    };
    let settings = PolicySettings {
        enable_radarr: true,
        remove_data: true,
        ..removing_settings()
    };
    let mut labels = BTreeMap::new();
    labels.insert(ItemId::new("beef0001"), "radarr".to_string());

    let reconciler = MockReconciler::new(InventoryKind::Radarr, QueueIndex::new());
    let h = harness(
        &settings,
        host,
        Some(labels),
        vec![Arc::clone(&reconciler)],
        None,
    );

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    assert_eq!(summary.removed_remote, 0);
    assert_eq!(summary.removed_local, 1);
    assert!(reconciler.deletes.lock().expect("lock").is_empty());
    assert_eq!(
        h.host.removed.lock().expect("lock").clone(),
        vec![(ItemId::new("beef0001"), true)]
    );
}

#[tokio::test]
async fn disabled_service_removes_locally() {
    let host = MockHost {
        items: vec![unfinished("beef0002", 0.5)],
        ..MockHost::default()
    };
    // The label matches lidarr but the integration is switched off.
    let settings = removing_settings();
    let mut labels = BTreeMap::new();
    labels.insert(ItemId::new("beef0002"), "lidarr".to_string());
    let h = harness(&settings, host, Some(labels), Vec::new(), None);

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    assert_eq!(summary.removed_local, 1);
    assert_eq!(
        h.host.removed.lock().expect("lock").clone(),
        vec![(ItemId::new("beef0002"), false)]
    );
}

#[tokio::test]
async fn unavailable_service_defers_its_items() {
    let host = MockHost {
        items: vec![unfinished("beef0003", 0.5)],
        ..MockHost::default()
    };
    let settings = PolicySettings {
        enable_sonarr: true,
        ..removing_settings()
    };
    let mut labels = BTreeMap::new();
    labels.insert(ItemId::new("beef0003"), "tv-sonarr".to_string());

    let reconciler = Arc::new(MockReconciler {
        kind: InventoryKind::Sonarr,
        queue: QueueIndex::new(),
        fail_fetch: true,
        reject_deletes: false,
        deletes: Mutex::new(Vec::new()),
    });
    let h = harness(
        &settings,
        host,
        Some(labels),
        vec![Arc::clone(&reconciler)],
        None,
    );

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.removed_local, 0);
    assert!(reconciler.deletes.lock().expect("lock").is_empty());
    assert!(h.host.removed.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn unknown_label_leaves_the_item_in_place() {
    let host = MockHost {
        items: vec![unfinished("beef0004", 0.5), unfinished("beef0005", 0.5)],
        ..MockHost::default()
    };
    let settings = removing_settings();
    // One labeled outside the known services, one unlabeled.
    let mut labels = BTreeMap::new();
    labels.insert(ItemId::new("beef0004"), "books".to_string());
    let h = harness(&settings, host, Some(labels), Vec::new(), None);

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    assert_eq!(summary.removed_local, 0);
    assert!(h.host.removed.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn rejected_delete_is_soft_and_the_loop_continues() {
    let host = MockHost {
        items: vec![unfinished("cafe0001", 0.4), unfinished("cafe0002", 0.5)],
        ..MockHost::default()
    };
    let settings = PolicySettings {
        enable_sonarr: true,
        ..removing_settings()
    };
    let mut labels = BTreeMap::new();
    labels.insert(ItemId::new("cafe0001"), "tv-sonarr".to_string());
    labels.insert(ItemId::new("cafe0002"), "tv-sonarr".to_string());

    let mut queue = QueueIndex::new();
    queue.insert(
        ContentHash::new("cafe0001"),
        QueueEntry {
            remote_id: 1,
            title: "one".to_string(),
        },
    );
    queue.insert(
        ContentHash::new("cafe0002"),
        QueueEntry {
            remote_id: 2,
            title: "two".to_string(),
        },
    );
    let reconciler = Arc::new(MockReconciler {
        kind: InventoryKind::Sonarr,
        queue,
        fail_fetch: false,
        reject_deletes: true,
        deletes: Mutex::new(Vec::new()),
    });
    let h = harness(
        &settings,
        host,
        Some(labels),
        vec![Arc::clone(&reconciler)],
        None,
    );

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    // Both rejections were logged and swallowed; nothing removed anywhere.
    assert_eq!(reconciler.deletes.lock().expect("lock").len(), 2);
    assert_eq!(summary.removed_remote, 0);
    assert_eq!(summary.removed_local, 0);
    assert!(h.host.removed.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn sufficient_space_ends_the_pass_before_any_action() {
    let host = MockHost {
        items: vec![finished("f6", 30)],
        free_bytes: 100 * 1_073_741_824,
        ..MockHost::default()
    };
    let settings = PolicySettings {
        enabled: true,
        max_seeds: 0,
        hdd_space: 10.0,
        ..PolicySettings::default()
    };
    let h = harness(&settings, host, None, Vec::new(), None);

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    assert_eq!(summary.surplus, 1);
    assert_eq!(summary.removed_local, 0);
    assert!(h.host.removed.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn negative_hdd_space_disables_the_space_check() {
    let host = MockHost {
        items: vec![finished("f7", 30)],
        free_bytes: 100 * 1_073_741_824,
        ..MockHost::default()
    };
    let settings = PolicySettings {
        enabled: true,
        max_seeds: 0,
        hdd_space: -1.0,
        ..PolicySettings::default()
    };
    let h = harness(&settings, host, None, Vec::new(), None);

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    // No early break: the surplus item was processed and removed.
    assert_eq!(summary.removed_local, 1);
}

#[tokio::test]
async fn removal_failure_still_cleans_the_ledger() {
    let host = MockHost {
        items: vec![finished("f8", 30)],
        fail_removal: true,
        ..MockHost::default()
    };
    let settings = PolicySettings {
        enabled: true,
        max_seeds: 0,
        ..PolicySettings::default()
    };
    let mut states = BTreeMap::new();
    states.insert("f8".to_string(), false);
    let h = harness(&settings, host, None, Vec::new(), Some(&states));

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    // The host refused, so nothing counts as removed...
    assert_eq!(summary.removed_local, 0);
    assert_eq!(h.host.removed.lock().expect("lock").len(), 1);
    // ...but the ledger entry was still dropped and persisted.
    let states: BTreeMap<String, bool> = h.state_store.load_or_default().expect("states load");
    assert!(!states.contains_key("f8"));
}

#[tokio::test]
async fn condition_with_remove_disabled_pauses_unfinished_items() {
    let host = MockHost {
        items: vec![unfinished("dead0001", 0.5)],
        ..MockHost::default()
    };
    let settings = PolicySettings {
        remove: false,
        ..removing_settings()
    };
    let h = harness(&settings, host, None, Vec::new(), None);

    let summary = h.evaluator.run_pass().await.expect("pass runs");
    assert_eq!(summary.paused, 1);
    assert_eq!(
        h.host.paused.lock().expect("lock").clone(),
        vec![ItemId::new("dead0001")]
    );
    assert!(h.host.removed.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn unreadable_settings_abort_the_pass() {
    let host = MockHost {
        items: vec![unfinished("dead0002", 0.5)],
        ..MockHost::default()
    };
    let h = harness(
        &PolicySettings::default(),
        host,
        None,
        Vec::new(),
        None,
    );
    std::fs::write(h.settings_store.path(), "{broken").expect("write garbage");

    let result = h.evaluator.run_pass().await;
    assert!(matches!(result, Err(PolicyError::ConfigRead { .. })));
    assert!(h.host.removed.lock().expect("lock").is_empty());
    assert!(h.host.paused.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn ignore_flags_round_trip_through_the_control_api() {
    let h = harness(
        &PolicySettings::default(),
        MockHost::default(),
        None,
        Vec::new(),
        None,
    );
    let ids = vec![ItemId::new("x1"), ItemId::new("x2")];
    assert_eq!(h.evaluator.ignore_flags(&ids).await, vec![false, false]);

    h.evaluator
        .set_ignore(&ids[..1], true)
        .await
        .expect("flags persist");
    assert_eq!(h.evaluator.ignore_flags(&ids).await, vec![true, false]);

    let states: BTreeMap<String, bool> = h.state_store.load_or_default().expect("states load");
    assert_eq!(states.get("x1"), Some(&true));
}
