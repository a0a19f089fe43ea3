//! Per-pass construction of inventory clients from the settings snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use culler_arr::InventoryClient;
use culler_config::PolicySettings;
use culler_core::{InventoryKind, QueueReconciler};
use culler_policy::ReconcilerFactory;
use tracing::warn;

/// Builds one [`InventoryClient`] per enabled, fully configured service.
///
/// Rebuilding on every pass means credential or URL changes applied through
/// the control surface take effect on the next pass without a restart.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrReconcilerFactory;

impl ReconcilerFactory for ArrReconcilerFactory {
    fn build(
        &self,
        settings: &PolicySettings,
    ) -> HashMap<InventoryKind, Arc<dyn QueueReconciler>> {
        let mut reconcilers: HashMap<InventoryKind, Arc<dyn QueueReconciler>> = HashMap::new();

        let enabled_kinds: Vec<InventoryKind> = InventoryKind::ALL
            .into_iter()
            .filter(|kind| settings.inventory_enabled(*kind))
            .collect();
        if enabled_kinds.is_empty() {
            return reconcilers;
        }

        let Some(server_url) = settings.server_url.as_deref() else {
            warn!("inventory integration enabled but server_url is not configured");
            return reconcilers;
        };

        for kind in enabled_kinds {
            let Some(api_key) = settings.api_key(kind) else {
                warn!(service = %kind, "api key missing; service skipped");
                continue;
            };
            match InventoryClient::new(server_url, api_key, kind) {
                Ok(client) => {
                    reconcilers.insert(kind, Arc::new(client));
                }
                Err(err) => {
                    warn!(service = %kind, error = %err, "inventory client construction failed");
                }
            }
        }
        reconcilers
    }
}
