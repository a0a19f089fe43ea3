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

//! Policy settings model and state persistence for the culler engine.
//!
//! Layout: `model.rs` (typed settings, metric/combinator vocabulary, override
//! rules), `ledger.rs` (per-item ignore flags), `store.rs` (JSON document
//! store with per-key merge and explicit save), `error.rs` (`ConfigError`).

pub mod error;
pub mod ledger;
pub mod model;
pub mod store;

pub use error::ConfigError;
pub use ledger::ExemptionLedger;
pub use model::{Combinator, MetricKind, OverrideRule, PolicySettings};
pub use store::JsonDocumentStore;
