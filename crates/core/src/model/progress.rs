use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::ids::ItemId;
use crate::model::status::Status;

/// Mutable per-item user state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressEntry {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
}

/// Progress keyed by item id, stored separately from the roadmap.
///
/// Entries whose id is not in the current roadmap are kept as-is; the merged
/// views simply never see them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressMap(BTreeMap<ItemId, ProgressEntry>);

impl ProgressMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ProgressEntry> {
        self.0.get(id)
    }

    /// Entry for `id`, created with defaults on first access.
    pub fn entry_mut(&mut self, id: &ItemId) -> &mut ProgressEntry {
        self.0.entry(id.clone()).or_default()
    }

    pub fn insert(&mut self, id: ItemId, entry: ProgressEntry) -> Option<ProgressEntry> {
        self.0.insert(id, entry)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, &ProgressEntry)> {
        self.0.iter()
    }
}
