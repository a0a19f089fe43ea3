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
#![allow(clippy::module_name_repetitions, clippy::significant_drop_tightening)]

//! The retention decision engine.
//!
//! Layout: `metrics.rs` (scalar metric functions and the rule catalog),
//! `exempt.rs` (manual/tracker/label exemptions), `rules.rs` (override-rule
//! fold and the global two-factor policy), `evaluator.rs` (the per-pass
//! state machine dispatching removals and pauses).

pub mod error;
pub mod evaluator;
pub mod exempt;
pub mod metrics;
pub mod rules;

pub use error::{MetricUnavailable, PolicyError, PolicyResult};
pub use evaluator::{PassSummary, PolicyEvaluator, ReconcilerFactory};
pub use exempt::ExemptionFilter;
pub use metrics::{evaluate, rule_catalog};
pub use rules::{RemovalDecision, resolve};
