#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! HTTP client for sonarr/radarr/lidarr-style inventory services.
//!
//! Implements the queue retrieval and delete/blacklist contract the policy
//! evaluator reconciles removals through. Each service kind carries its own
//! endpoint prefix and pagination quirks; see
//! [`culler_core::InventoryKind`].

pub mod client;
pub mod error;

pub use client::InventoryClient;
pub use error::InventoryError;
