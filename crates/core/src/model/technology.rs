use chrono::NaiveDate;
use serde::Serialize;

use crate::model::ids::ItemId;
use crate::model::progress::{ProgressEntry, ProgressMap};
use crate::model::roadmap::{Item, Resource, Roadmap};
use crate::model::status::Status;

/// Read-only merge of an item with its progress entry.
///
/// This is the shape handed to front ends; it is derived on every query and
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Technology {
    pub id: ItemId,
    pub title: String,
    pub description: String,
    pub resources: Vec<Resource>,
    pub status: Status,
    pub notes: String,
    pub deadline: Option<NaiveDate>,
}

impl Technology {
    /// Left-outer-join of `item` with `entry`, defaults applied when absent.
    #[must_use]
    pub fn merge(item: &Item, entry: Option<&ProgressEntry>) -> Self {
        let entry = entry.cloned().unwrap_or_default();
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
            resources: item.resources.clone(),
            status: entry.status,
            notes: entry.notes,
            deadline: entry.deadline,
        }
    }
}

/// All items of `roadmap` merged with `progress`, in roadmap order.
#[must_use]
pub fn merge_all(roadmap: &Roadmap, progress: &ProgressMap) -> Vec<Technology> {
    roadmap
        .items
        .iter()
        .map(|item| Technology::merge(item, progress.get(item.id.as_str())))
        .collect()
}
