//! Per-item ignore flags, persisted as their own document.
//!
//! The ledger is owned exclusively by the engine: entries are created on
//! demand (absent means not ignored) and deleted when the item itself is
//! removed, so it never references an item the host no longer tracks.

use std::collections::BTreeMap;

use culler_core::ItemId;
use tracing::debug;

use crate::error::ConfigResult;
use crate::store::JsonDocumentStore;

/// In-memory ignore map with a dirty flag guarding persistence.
#[derive(Debug, Default)]
pub struct ExemptionLedger {
    flags: BTreeMap<ItemId, bool>,
    dirty: bool,
}

impl ExemptionLedger {
    /// Load the ledger from its backing document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read.
    pub fn load(store: &JsonDocumentStore) -> ConfigResult<Self> {
        let flags: BTreeMap<ItemId, bool> = store.load_or_default()?;
        Ok(Self {
            flags,
            dirty: false,
        })
    }

    /// Whether the item carries a manual ignore flag.
    #[must_use]
    pub fn is_ignored(&self, id: &ItemId) -> bool {
        self.flags.get(id).copied().unwrap_or(false)
    }

    /// Ignore flags for a batch of items, in input order.
    #[must_use]
    pub fn flags_for(&self, ids: &[ItemId]) -> Vec<bool> {
        ids.iter().map(|id| self.is_ignored(id)).collect()
    }

    /// Set the ignore flag for a batch of items.
    pub fn set_ignored<'a>(&mut self, ids: impl IntoIterator<Item = &'a ItemId>, ignored: bool) {
        for id in ids {
            self.flags.insert(id.clone(), ignored);
        }
        self.dirty = true;
    }

    /// Drop the entry for a removed item. Returns whether an entry existed.
    pub fn forget(&mut self, id: &ItemId) -> bool {
        let existed = self.flags.remove(id).is_some();
        if existed {
            self.dirty = true;
        }
        existed
    }

    /// Whether unsaved changes exist.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persist the ledger if it changed since the last save.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    pub fn persist(&mut self, store: &JsonDocumentStore) -> ConfigResult<()> {
        if !self.dirty {
            return Ok(());
        }
        store.save(&self.flags)?;
        self.dirty = false;
        debug!(path = %store.path().display(), entries = self.flags.len(), "exemption ledger saved");
        Ok(())
    }
}
