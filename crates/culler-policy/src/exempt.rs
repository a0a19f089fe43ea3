//! Exemption checks: manual ignore flags, tracker and label substrings.

use culler_config::PolicySettings;
use culler_core::ItemSnapshot;
use tracing::debug;

/// Per-pass view of the configured exemption lists.
///
/// Label matching only participates when the label subsystem is present;
/// label lookup failures upstream surface here as `label = None`.
#[derive(Debug, Clone, Copy)]
pub struct ExemptionFilter<'a> {
    exempt_trackers: &'a [String],
    exempt_labels: &'a [String],
    labels_enabled: bool,
}

impl<'a> ExemptionFilter<'a> {
    /// Build the filter from a settings snapshot.
    #[must_use]
    pub fn new(settings: &'a PolicySettings, labels_enabled: bool) -> Self {
        Self {
            exempt_trackers: &settings.trackers,
            exempt_labels: &settings.labels,
            labels_enabled,
        }
    }

    /// Whether the item is excluded from consideration this pass.
    #[must_use]
    pub fn is_exempt(&self, item: &ItemSnapshot, label: Option<&str>, ignored: bool) -> bool {
        if ignored {
            debug!(item = %item.id, "item carries manual ignore flag");
            return true;
        }

        for tracker in &item.trackers {
            let tracker = tracker.to_lowercase();
            for exempt in self.exempt_trackers {
                if tracker.contains(&exempt.to_lowercase()) {
                    debug!(item = %item.id, tracker = %tracker, "exempted by tracker match");
                    return true;
                }
            }
        }

        if self.labels_enabled
            && let Some(label) = label
        {
            let label = label.to_lowercase();
            for exempt in self.exempt_labels {
                if label.contains(&exempt.to_lowercase()) {
                    debug!(item = %item.id, label = %label, "exempted by label match");
                    return true;
                }
            }
        }

        false
    }
}
