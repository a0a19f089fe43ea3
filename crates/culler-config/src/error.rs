//! Error types for configuration and state persistence.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing a document file failed.
    #[error("configuration io failed")]
    Io {
        /// Path of the document involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A document on disk did not parse as the expected shape.
    #[error("configuration document malformed")]
    Parse {
        /// Path of the malformed document.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
    /// A document could not be serialized for writing.
    #[error("configuration document not serializable")]
    Encode {
        /// Underlying encode error.
        #[source]
        source: serde_json::Error,
    },
    /// The stored document was valid JSON but not a key-value object.
    #[error("configuration document is not an object")]
    NotAnObject {
        /// Path of the offending document.
        path: PathBuf,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
