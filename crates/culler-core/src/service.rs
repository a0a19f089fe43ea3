//! Collaborator traits implemented by the host adapter and inventory clients.

use async_trait::async_trait;

use crate::model::{DeleteOutcome, InventoryKind, ItemId, ItemSnapshot, QueueIndex};

/// Host download-client surface the engine evaluates against.
///
/// The engine only reads item state; the two mutation entry points are the
/// removal and pause side effects dispatched at the end of a pass.
#[async_trait]
pub trait ItemHost: Send + Sync {
    /// List the identifiers of every managed item.
    async fn list_item_ids(&self) -> anyhow::Result<Vec<ItemId>>;

    /// Fetch a point-in-time snapshot of one item, `None` if it vanished.
    async fn get_item(&self, id: &ItemId) -> anyhow::Result<Option<ItemSnapshot>>;

    /// Remove an item, optionally deleting its payload data.
    async fn remove_item(&self, id: &ItemId, delete_data: bool) -> anyhow::Result<()>;

    /// Pause an item.
    async fn pause_item(&self, id: &ItemId) -> anyhow::Result<()>;

    /// Free space on the download volume, in bytes.
    async fn free_space_bytes(&self) -> anyhow::Result<u64>;
}

/// Optional label subsystem; absence degrades to "no labels".
#[async_trait]
pub trait LabelProvider: Send + Sync {
    /// Category label attached to an item, if any.
    async fn get_label(&self, id: &ItemId) -> anyhow::Result<Option<String>>;
}

/// One upstream inventory service the engine reconciles removals with.
#[async_trait]
pub trait QueueReconciler: Send + Sync {
    /// Service kind this reconciler talks to.
    fn kind(&self) -> InventoryKind;

    /// Retrieve the full download queue, indexed by content hash.
    ///
    /// Any failure makes the service unavailable for the current pass; the
    /// caller must not retry within the pass.
    async fn fetch_queue(&self) -> anyhow::Result<QueueIndex>;

    /// Delete (and optionally blacklist) one queue entry.
    ///
    /// Rejections surface as [`DeleteOutcome::Failed`]; only transport
    /// failures return an error.
    async fn delete_entry(&self, remote_id: i64, blacklist: bool) -> anyhow::Result<DeleteOutcome>;
}
