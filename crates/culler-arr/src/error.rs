//! Error types for inventory service operations.

use culler_core::InventoryKind;
use thiserror::Error;

/// Primary error type for inventory client operations.
///
/// `Connection` marks the service unavailable for the current pass;
/// `Status` is scoped to the failing request. Queue-delete rejections do not
/// surface here at all — they come back as a sentinel outcome.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The configured server URL did not parse.
    #[error("invalid inventory server url")]
    InvalidBaseUrl {
        /// Offending URL value.
        value: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// The configured API key is not a valid header value.
    #[error("invalid inventory api key")]
    InvalidApiKey {
        /// Service the key was configured for.
        kind: InventoryKind,
    },
    /// The HTTP client could not be constructed.
    #[error("inventory http client construction failed")]
    Client {
        /// Underlying client builder error.
        #[source]
        source: reqwest::Error,
    },
    /// The service could not be reached.
    #[error("inventory service unreachable")]
    Connection {
        /// Service that was unreachable.
        kind: InventoryKind,
        /// Request URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The service answered with a non-success status.
    #[error("inventory service returned error status")]
    Status {
        /// Service that rejected the request.
        kind: InventoryKind,
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// The service answered 200 with a body that did not decode.
    #[error("inventory response undecodable")]
    Decode {
        /// Service that produced the body.
        kind: InventoryKind,
        /// Request URL.
        url: String,
        /// Underlying decode error.
        #[source]
        source: reqwest::Error,
    },
}

/// Convenience alias for inventory client results.
pub type InventoryResult<T> = Result<T, InventoryError>;
