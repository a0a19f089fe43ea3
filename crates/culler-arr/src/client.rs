//! Queue and blacklist operations against one inventory service.

use std::time::Duration;

use async_trait::async_trait;
use culler_core::{ContentHash, DeleteOutcome, InventoryKind, QueueEntry, QueueIndex, QueueReconciler};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{InventoryError, InventoryResult};

/// Per-request timeout applied to every call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Page size the queue endpoints serve regardless of what we ask for.
const QUEUE_PAGE_SIZE: i64 = 10;
/// Hard cap on queue pages, guarding against a misbehaving paginator.
const MAX_QUEUE_PAGES: u32 = 500;
/// User agent advertised on every request.
const USER_AGENT: &str = "culler";
/// API key header the services authenticate on.
const HEADER_API_KEY: &str = "x-api-key";

/// Wire shape of one queue record.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueRecord {
    id: i64,
    download_id: Option<String>,
    title: Option<String>,
}

/// Paging envelope served by sonarr and lidarr queue endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueEnvelope {
    total_records: i64,
    records: Vec<QueueRecord>,
}

/// HTTP client bound to one configured inventory service.
#[derive(Debug, Clone)]
pub struct InventoryClient {
    kind: InventoryKind,
    base: String,
    http: reqwest::Client,
}

impl InventoryClient {
    /// Build a client for `kind` rooted at `server_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL or API key is unusable, or the
    /// HTTP client cannot be constructed.
    pub fn new(server_url: &str, api_key: &str, kind: InventoryKind) -> InventoryResult<Self> {
        // Validate early so a bad URL fails at configuration time, not
        // mid-pass.
        Url::parse(server_url).map_err(|err| InventoryError::InvalidBaseUrl {
            value: server_url.to_string(),
            source: err,
        })?;

        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(api_key)
            .map_err(|_| InventoryError::InvalidApiKey { kind })?;
        headers.insert(HEADER_API_KEY, api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|err| InventoryError::Client { source: err })?;

        Ok(Self {
            kind,
            base: server_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Service kind this client is bound to.
    #[must_use]
    pub const fn service_kind(&self) -> InventoryKind {
        self.kind
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}{}{}", self.base, self.kind.api_base(), suffix)
    }

    /// Retrieve the full download queue, indexed by content hash.
    ///
    /// Sonarr and lidarr paginate inside a `totalRecords` envelope; radarr
    /// serves a bare record list in a single page. Pagination stops when the
    /// reported total is exhausted or after [`MAX_QUEUE_PAGES`] pages.
    ///
    /// # Errors
    ///
    /// Any transport failure, non-success status, or undecodable body
    /// aborts the whole fetch; the caller treats the service as
    /// unavailable for the pass and must not retry here.
    pub async fn get_queue(&self) -> InventoryResult<QueueIndex> {
        let url = self.endpoint("/queue");
        let mut index = QueueIndex::new();
        let mut page: u32 = 1;

        loop {
            debug!(service = %self.kind, url = %url, page, "fetching queue page");
            let response = self
                .http
                .get(&url)
                .query(&[("page", page)])
                .send()
                .await
                .map_err(|err| InventoryError::Connection {
                    kind: self.kind,
                    url: url.clone(),
                    source: err,
                })?;

            let status = response.status();
            if status != StatusCode::OK {
                return Err(InventoryError::Status {
                    kind: self.kind,
                    url,
                    status: status.as_u16(),
                });
            }

            let (records, total) = if self.kind.paged_envelope() {
                let envelope: QueueEnvelope =
                    response.json().await.map_err(|err| InventoryError::Decode {
                        kind: self.kind,
                        url: url.clone(),
                        source: err,
                    })?;
                (envelope.records, Some(envelope.total_records))
            } else {
                let records: Vec<QueueRecord> =
                    response.json().await.map_err(|err| InventoryError::Decode {
                        kind: self.kind,
                        url: url.clone(),
                        source: err,
                    })?;
                (records, None)
            };

            for record in records {
                let Some(download_id) = record.download_id else {
                    debug!(service = %self.kind, remote_id = record.id, "queue record without download id");
                    continue;
                };
                index.insert(
                    ContentHash::new(&download_id),
                    QueueEntry {
                        remote_id: record.id,
                        title: record.title.unwrap_or_default(),
                    },
                );
            }

            let remaining = total.map_or(-1, |t| t - i64::from(page) * QUEUE_PAGE_SIZE);
            if remaining <= 0 {
                break;
            }
            page += 1;
            if page > MAX_QUEUE_PAGES {
                warn!(
                    service = %self.kind,
                    total = total.unwrap_or(-1),
                    "queue pagination capped at {MAX_QUEUE_PAGES} pages"
                );
                break;
            }
        }

        info!(service = %self.kind, records = index.len(), "queue retrieved");
        Ok(index)
    }

    /// Delete one queue entry, optionally blacklisting the release upstream.
    ///
    /// A non-200 response or an undecodable 200 body yields the
    /// [`DeleteOutcome::Failed`] sentinel; only transport failures error.
    /// Deleting the same id twice is safe; the second call reports the
    /// service's rejection instead of raising.
    ///
    /// # Errors
    ///
    /// Returns an error only when the service cannot be reached.
    pub async fn delete_queue_item(
        &self,
        remote_id: i64,
        blacklist: bool,
    ) -> InventoryResult<DeleteOutcome> {
        let url = format!("{}/{remote_id}", self.endpoint("/queue"));
        info!(service = %self.kind, url = %url, remote_id, blacklist, "deleting queue entry");

        let response = self
            .http
            .delete(&url)
            .query(&[("blacklist", blacklist)])
            .send()
            .await
            .map_err(|err| InventoryError::Connection {
                kind: self.kind,
                url: url.clone(),
                source: err,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            error!(service = %self.kind, remote_id, status = status.as_u16(), "queue delete rejected");
            return Ok(DeleteOutcome::Failed {
                status: status.as_u16(),
            });
        }

        match response.json::<Value>().await {
            Ok(body) => Ok(DeleteOutcome::Deleted(body)),
            Err(err) => {
                error!(service = %self.kind, remote_id, error = %err, "queue delete response undecodable");
                Ok(DeleteOutcome::Failed {
                    status: status.as_u16(),
                })
            }
        }
    }

    /// Retrieve the service's blacklist, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status, or an
    /// undecodable body.
    pub async fn get_blacklist(&self) -> InventoryResult<Vec<Value>> {
        let url = self.endpoint("/blacklist");
        let response = self
            .http
            .get(&url)
            .query(&[("sortkey", "date")])
            .send()
            .await
            .map_err(|err| InventoryError::Connection {
                kind: self.kind,
                url: url.clone(),
                source: err,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(InventoryError::Status {
                kind: self.kind,
                url,
                status: status.as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(|err| InventoryError::Decode {
            kind: self.kind,
            url: url.clone(),
            source: err,
        })?;

        // Some kinds wrap the list in a records envelope, others serve it bare.
        let records = match body {
            Value::Object(mut map) => match map.remove("records") {
                Some(Value::Array(list)) => list,
                _ => Vec::new(),
            },
            Value::Array(list) => list,
            _ => Vec::new(),
        };
        Ok(records)
    }

    /// Delete one blacklist entry by its remote id.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status, or an
    /// undecodable body.
    pub async fn delete_blacklist_item(&self, remote_id: i64) -> InventoryResult<Value> {
        let url = format!("{}/{remote_id}", self.endpoint("/blacklist"));
        info!(service = %self.kind, url = %url, remote_id, "deleting blacklist entry");

        let response =
            self.http
                .delete(&url)
                .send()
                .await
                .map_err(|err| InventoryError::Connection {
                    kind: self.kind,
                    url: url.clone(),
                    source: err,
                })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(InventoryError::Status {
                kind: self.kind,
                url,
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|err| InventoryError::Decode {
            kind: self.kind,
            url,
            source: err,
        })
    }
}

#[async_trait]
impl QueueReconciler for InventoryClient {
    fn kind(&self) -> InventoryKind {
        self.kind
    }

    async fn fetch_queue(&self) -> anyhow::Result<QueueIndex> {
        Ok(self.get_queue().await?)
    }

    async fn delete_entry(&self, remote_id: i64, blacklist: bool) -> anyhow::Result<DeleteOutcome> {
        Ok(self.delete_queue_item(remote_id, blacklist).await?)
    }
}
