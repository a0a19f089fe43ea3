//! Host-agnostic domain types and collaborator traits for the culler engine.
//!
//! The decision engine never talks to a download client or an upstream
//! media-management service directly; it goes through the traits defined
//! here so hosts and inventory backends stay swappable.

pub mod model;
pub mod service;

pub use model::{
    ContentHash, DeleteOutcome, InventoryKind, ItemId, ItemMetrics, ItemSnapshot, QueueEntry,
    QueueIndex,
};
pub use service::{ItemHost, LabelProvider, QueueReconciler};
