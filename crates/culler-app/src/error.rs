//! # Design
//!
//! - Centralize application-level errors for wiring, the control surface,
//!   and the operator CLI.
//! - Keep error messages constant while carrying context fields for
//!   debugging.

use culler_arr::InventoryError;
use culler_config::ConfigError;
use culler_policy::PolicyError;
use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        #[source]
        source: ConfigError,
    },
    /// An evaluation pass failed.
    #[error("evaluation pass failed")]
    Policy {
        /// Operation identifier.
        operation: &'static str,
        /// Source policy error.
        #[source]
        source: PolicyError,
    },
    /// Inventory service operations failed.
    #[error("inventory operation failed")]
    Inventory {
        /// Operation identifier.
        operation: &'static str,
        /// Source inventory error.
        #[source]
        source: InventoryError,
    },
    /// A setting required by the requested operation is absent.
    #[error("missing required setting")]
    MissingSetting {
        /// Name of the absent setting.
        name: &'static str,
    },
    /// A command-line argument did not parse.
    #[error("invalid argument")]
    InvalidArgument {
        /// Argument name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
    /// Logging initialisation failed.
    #[error("logging initialisation failed")]
    Logging {
        /// Underlying subscriber error.
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn policy(operation: &'static str, source: PolicyError) -> Self {
        Self::Policy { operation, source }
    }

    pub(crate) const fn inventory(operation: &'static str, source: InventoryError) -> Self {
        Self::Inventory { operation, source }
    }
}
