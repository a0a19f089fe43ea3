//! Error types for the decision engine.

use culler_config::{ConfigError, MetricKind};
use culler_core::ItemId;
use thiserror::Error;

/// A host did not report the metric a rule or ranking needed.
///
/// Scoped to one item: the rule resolver maps it to "rule not satisfied",
/// the evaluator skips the affected item. Never fatal to a pass.
#[derive(Debug, Error)]
#[error("metric unavailable")]
pub struct MetricUnavailable {
    /// Metric that could not be computed.
    pub metric: MetricKind,
    /// Item the metric was requested for.
    pub item: ItemId,
}

/// Pass-fatal error type for the policy evaluator.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy configuration could not be read; no partial action taken.
    #[error("policy configuration unreadable")]
    ConfigRead {
        /// Underlying configuration error.
        #[source]
        source: ConfigError,
    },
    /// A host query required to start the pass failed.
    #[error("host operation failed")]
    Host {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying host error.
        #[source]
        source: anyhow::Error,
    },
}

/// Convenience alias for evaluator results.
pub type PolicyResult<T> = Result<T, PolicyError>;
