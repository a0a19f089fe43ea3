//! Core domain types shared across the workspace.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier assigned to an item by the host download client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wrap a host-assigned identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Content hash of an item payload, normalized to upper-case hexadecimal.
///
/// Hosts and inventory services disagree on hash casing; normalizing at
/// construction makes lookups across the two case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Normalize a reported hash into its canonical upper-case form.
    #[must_use]
    pub fn new(hash: impl AsRef<str>) -> Self {
        Self(hash.as_ref().trim().to_ascii_uppercase())
    }

    /// Borrow the canonical hash as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<String> for ContentHash {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ContentHash {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.0
    }
}

/// Scalar metrics reported by the host for one item.
///
/// A `None` field means the host does not report that metric; metric
/// evaluation surfaces it as an unavailable-metric error rather than a
/// default value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemMetrics {
    /// Seed ratio as reported by the host.
    pub ratio: Option<f64>,
    /// Timestamp when the item was added to the host.
    pub added_at: Option<DateTime<Utc>>,
    /// Total seeding duration in seconds.
    pub seeding_secs: Option<u64>,
    /// Number of seeders observed by the host.
    pub seeders: Option<u64>,
    /// Distributed copies / availability figure.
    pub availability: Option<f64>,
}

/// Read-only snapshot of one managed item, taken at evaluation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSnapshot {
    /// Host-assigned identifier.
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Announce URLs of every tracker attached to the item.
    pub trackers: Vec<String>,
    /// Scalar metrics used by ranking and rule evaluation.
    pub metrics: ItemMetrics,
    /// Whether the download has finished.
    pub finished: bool,
    /// Whether the item is currently paused.
    pub paused: bool,
    /// Content hash used to match the item against inventory queues.
    pub content_hash: ContentHash,
}

/// Upstream inventory service kinds the engine can reconcile against.
///
/// Each kind carries its own endpoint prefix and pagination quirks, so the
/// per-item dispatch stays a closed match instead of string comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryKind {
    /// TV inventory (`tv-sonarr` label).
    Sonarr,
    /// Movie inventory (`radarr` label).
    Radarr,
    /// Music inventory (`lidarr` label).
    Lidarr,
}

impl InventoryKind {
    /// All supported kinds, in display order.
    pub const ALL: [Self; 3] = [Self::Sonarr, Self::Radarr, Self::Lidarr];

    /// Map an item category label onto an inventory kind.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "tv-sonarr" => Some(Self::Sonarr),
            "radarr" => Some(Self::Radarr),
            "lidarr" => Some(Self::Lidarr),
            _ => None,
        }
    }

    /// API prefix appended to the configured server URL.
    #[must_use]
    pub const fn api_base(self) -> &'static str {
        match self {
            Self::Sonarr => "/sonarr/api/v3",
            Self::Radarr => "/radarr/api",
            Self::Lidarr => "/lidarr/api/v1",
        }
    }

    /// Whether queue responses arrive wrapped in a paging envelope with a
    /// `totalRecords` count. Radarr returns a bare record list instead and
    /// is fetched in a single page.
    #[must_use]
    pub const fn paged_envelope(self) -> bool {
        match self {
            Self::Sonarr | Self::Lidarr => true,
            Self::Radarr => false,
        }
    }

    /// Lowercase service name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sonarr => "sonarr",
            Self::Radarr => "radarr",
            Self::Lidarr => "lidarr",
        }
    }
}

impl fmt::Display for InventoryKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for InventoryKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sonarr" => Ok(Self::Sonarr),
            "radarr" => Ok(Self::Radarr),
            "lidarr" => Ok(Self::Lidarr),
            other => Err(anyhow::anyhow!("unknown inventory service '{other}'")),
        }
    }
}

/// One queue record held by an inventory service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Identifier of the queue record on the remote service.
    pub remote_id: i64,
    /// Display title reported by the service.
    pub title: String,
}

/// Queue snapshot indexed by content hash, rebuilt fresh each pass.
pub type QueueIndex = HashMap<ContentHash, QueueEntry>;

/// Result of a queue-entry delete request.
///
/// Non-success responses come back as the [`DeleteOutcome::Failed`] sentinel
/// rather than an error; only transport failures raise. Callers treat a
/// failed delete as a soft condition and an unreachable service as
/// unavailable for the pass.
#[derive(Debug, Clone)]
pub enum DeleteOutcome {
    /// The service accepted the delete; carries the parsed response body.
    Deleted(Value),
    /// The service rejected the delete, or returned an undecodable body.
    Failed {
        /// HTTP status of the rejected request.
        status: u16,
    },
}

impl DeleteOutcome {
    /// Whether the delete was accepted upstream.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted(_))
    }
}
