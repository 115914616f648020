use tracing::warn;

use crate::bridge::messages::ExactMatch;

/// Status of a key as seen through the latest search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Active,
    Trashed,
    Absent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    /// Query the surface last sent.
    pub query: String,
    /// Query the current results were computed for.
    pub results_query: String,
    pub active_keys: Vec<String>,
    pub trashed_keys: Vec<String>,
    pub exact_match: ExactMatch,
}

impl SearchState {
    /// Classifies `key` against the current results.
    ///
    /// `exact_match` is authoritative only when the results were computed for
    /// a query equal to `key`; result lists are truncated, so membership is
    /// the fallback for any other key.
    pub fn classify(&self, key: &str) -> KeyStatus {
        let by_lists = if self.active_keys.iter().any(|k| k == key) {
            KeyStatus::Active
        } else if self.trashed_keys.iter().any(|k| k == key) {
            KeyStatus::Trashed
        } else {
            KeyStatus::Absent
        };

        if self.results_query != key {
            return by_lists;
        }

        let by_field = match self.exact_match {
            ExactMatch::Active => KeyStatus::Active,
            ExactMatch::Trashed => KeyStatus::Trashed,
            ExactMatch::None => KeyStatus::Absent,
        };
        if by_lists != KeyStatus::Absent && by_lists != by_field {
            warn!(key, ?by_lists, ?by_field, "exact match disagrees with result lists");
        }
        by_field
    }
}
