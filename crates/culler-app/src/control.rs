//! Service lifecycle and the control surface exposed to the hosting
//! process.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use culler_config::{JsonDocumentStore, PolicySettings};
use culler_core::{ItemHost, ItemId, LabelProvider};
use culler_policy::{PassSummary, PolicyEvaluator, rule_catalog};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::inventory::ArrReconcilerFactory;
use crate::scheduler::Scheduler;
use crate::{SETTINGS_FILE, STATES_FILE};

/// The retention engine as exposed to its host: lifecycle management plus
/// the configuration/ignore control surface.
pub struct CullerService {
    evaluator: Arc<PolicyEvaluator>,
    settings_store: JsonDocumentStore,
    scheduler: Mutex<Scheduler>,
}

impl CullerService {
    /// Wire the service against a host adapter and configuration directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the exemption state document exists but cannot
    /// be read.
    pub fn new(
        host: Arc<dyn ItemHost>,
        labels: Option<Arc<dyn LabelProvider>>,
        config_dir: &Path,
    ) -> AppResult<Self> {
        let settings_store = JsonDocumentStore::new(config_dir.join(SETTINGS_FILE));
        let state_store = JsonDocumentStore::new(config_dir.join(STATES_FILE));
        let evaluator = PolicyEvaluator::new(
            host,
            labels,
            Arc::new(ArrReconcilerFactory),
            settings_store.clone(),
            state_store,
        )
        .map_err(|err| AppError::config("ledger.load", err))?;

        Ok(Self {
            evaluator: Arc::new(evaluator),
            settings_store,
            scheduler: Mutex::new(Scheduler::default()),
        })
    }

    /// Start the periodic evaluation loop at the configured cadence.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings document cannot be read.
    pub async fn start(&self) -> AppResult<()> {
        let settings = self.load_settings("start")?;
        let mut scheduler = self.scheduler.lock().await;
        scheduler
            .start(Arc::clone(&self.evaluator), settings.interval)
            .await;
        Ok(())
    }

    /// Stop the loop, letting an in-flight pass finish first.
    pub async fn stop(&self) {
        self.scheduler.lock().await.stop().await;
    }

    /// Run one evaluation pass immediately, outside the timer.
    ///
    /// # Errors
    ///
    /// Returns an error when the pass aborts before taking any action.
    pub async fn run_pass_now(&self) -> AppResult<PassSummary> {
        self.evaluator
            .run_pass()
            .await
            .map_err(|err| AppError::policy("run_pass", err))
    }

    /// Merge the given keys into the settings document and persist it.
    ///
    /// A running timer is restarted so an interval change takes effect
    /// immediately; two passes never race across the restart.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be merged or re-read.
    pub async fn set_config(&self, patch: &Map<String, Value>) -> AppResult<()> {
        self.settings_store
            .merge_keys(patch)
            .map_err(|err| AppError::config("set_config", err))?;
        let settings = self.load_settings("set_config")?;

        let mut scheduler = self.scheduler.lock().await;
        if scheduler.is_running() {
            scheduler
                .start(Arc::clone(&self.evaluator), settings.interval)
                .await;
        }
        Ok(())
    }

    /// The effective configuration document, defaults filled in.
    ///
    /// Reads never error across the control surface; an unreadable document
    /// is logged and served as defaults.
    #[must_use]
    pub fn get_config(&self) -> Map<String, Value> {
        let settings: PolicySettings = self.settings_store.load_or_default().unwrap_or_else(|err| {
            warn!(error = %err, "settings unreadable; serving defaults");
            PolicySettings::default()
        });
        match serde_json::to_value(&settings) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => Map::new(),
        }
    }

    /// Ignore flags for a batch of items, in input order.
    pub async fn get_ignore(&self, ids: &[ItemId]) -> Vec<bool> {
        self.evaluator.ignore_flags(ids).await
    }

    /// Set the ignore flag for a batch of items and persist the change.
    ///
    /// # Errors
    ///
    /// Returns an error if the state document cannot be written.
    pub async fn set_ignore(&self, ids: &[ItemId], ignored: bool) -> AppResult<()> {
        self.evaluator
            .set_ignore(ids, ignored)
            .await
            .map_err(|err| AppError::config("set_ignore", err))
    }

    /// Catalog of available metric functions for UI population.
    #[must_use]
    pub fn get_rule_catalog() -> BTreeMap<&'static str, &'static str> {
        rule_catalog()
    }

    fn load_settings(&self, operation: &'static str) -> AppResult<PolicySettings> {
        self.settings_store
            .load_or_default()
            .map_err(|err| AppError::config(operation, err))
    }
}
