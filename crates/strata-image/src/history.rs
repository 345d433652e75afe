//! History normalization.
//!
//! History entries pair with layers by position. Entries flagged
//! `empty_layer` have no layer of their own and are dropped; the rest are
//! padded at the front with blank entries, or trimmed to the most recent
//! ones, until there is exactly one entry per layer.

use strata_common::NORMALIZED_DATE_TIME;
use strata_oci::HistoryEntry;

/// Blank history entry used when no provenance is kept for a layer.
#[must_use]
pub fn empty_history() -> HistoryEntry {
    HistoryEntry::blank(*NORMALIZED_DATE_TIME)
}

/// Reconcile a history list with a layer count.
#[must_use]
pub fn normalized_history(history: &[HistoryEntry], n_layers: usize) -> Vec<HistoryEntry> {
    let layered: Vec<&HistoryEntry> = history.iter().filter(|h| !h.empty_layer).collect();

    if layered.len() > n_layers {
        tracing::warn!(
            history = layered.len(),
            layers = n_layers,
            "History longer than layer list, keeping most recent entries"
        );
        return layered[layered.len() - n_layers..]
            .iter()
            .map(|h| (*h).clone())
            .collect();
    }

    let missing = n_layers - layered.len();
    std::iter::repeat_with(empty_history)
        .take(missing)
        .chain(layered.into_iter().cloned())
        .collect()
}
