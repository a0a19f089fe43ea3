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

//! Culler application wiring.
//!
//! Layout: `control.rs` (service lifecycle + control surface exposed to the
//! hosting process), `scheduler.rs` (interval timer with non-overlapping
//! passes), `inventory.rs` (per-pass inventory client construction),
//! `telemetry.rs` (logging init), `cli.rs` (operator command line).

pub mod cli;
pub mod control;
pub mod error;
pub mod inventory;
pub mod scheduler;
pub mod telemetry;

pub use control::CullerService;
pub use error::{AppError, AppResult};
pub use inventory::ArrReconcilerFactory;
pub use telemetry::{LogFormat, LoggingConfig, init_logging};

use std::path::PathBuf;

/// Environment variable locating the configuration directory.
pub const CONFIG_DIR_ENV: &str = "CULLER_CONFIG_DIR";
/// File name of the policy settings document.
pub const SETTINGS_FILE: &str = "culler.json";
/// File name of the exemption state document.
pub const STATES_FILE: &str = "culler_states.json";

/// Resolve the configuration directory from the environment, defaulting to
/// the working directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    std::env::var_os(CONFIG_DIR_ENV)
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
}
