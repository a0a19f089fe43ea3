//! File-backed JSON document store.
//!
//! Documents are flat key-value objects. The store supports a full-document
//! typed read, an incremental per-key merge, and an explicit save; writes go
//! through a temp file and rename so a crashed save never leaves a truncated
//! document behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Key-value JSON document persisted at a fixed path.
#[derive(Debug, Clone)]
pub struct JsonDocumentStore {
    path: PathBuf,
}

impl JsonDocumentStore {
    /// Create a store for the document at `path`. The file need not exist
    /// yet; a missing document reads as empty.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the raw document object; missing file reads as an empty object.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// is valid JSON but not an object.
    pub fn load_object(&self) -> ConfigResult<Map<String, Value>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source: err,
                });
            }
        };
        let value: Value = serde_json::from_str(&raw).map_err(|err| ConfigError::Parse {
            path: self.path.clone(),
            source: err,
        })?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(ConfigError::NotAnObject {
                path: self.path.clone(),
            }),
        }
    }

    /// Read the full document into a typed model; missing keys take their
    /// serde defaults and a missing file yields the model's default.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or does not
    /// deserialize into `T`.
    pub fn load_or_default<T>(&self) -> ConfigResult<T>
    where
        T: DeserializeOwned,
    {
        let object = self.load_object()?;
        serde_json::from_value(Value::Object(object)).map_err(|err| ConfigError::Parse {
            path: self.path.clone(),
            source: err,
        })
    }

    /// Merge the given keys into the stored document and save it.
    ///
    /// Keys absent from `patch` are preserved, including keys the typed
    /// models do not recognize.
    ///
    /// # Errors
    ///
    /// Returns an error if the existing document cannot be read or the
    /// merged document cannot be written.
    pub fn merge_keys(&self, patch: &Map<String, Value>) -> ConfigResult<()> {
        let mut object = self.load_object()?;
        for (key, value) in patch {
            object.insert(key.clone(), value.clone());
        }
        debug!(path = %self.path.display(), keys = patch.len(), "merging document keys");
        self.save(&Value::Object(object))
    }

    /// Serialize and persist the full document atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized or written.
    pub fn save<T>(&self, document: &T) -> ConfigResult<()>
    where
        T: Serialize,
    {
        let encoded = serde_json::to_vec_pretty(document)
            .map_err(|err| ConfigError::Encode { source: err })?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| ConfigError::Io {
                path: parent.to_path_buf(),
                source: err,
            })?;
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &encoded).map_err(|err| ConfigError::Io {
            path: tmp.clone(),
            source: err,
        })?;
        fs::rename(&tmp, &self.path).map_err(|err| ConfigError::Io {
            path: self.path.clone(),
            source: err,
        })
    }
}
