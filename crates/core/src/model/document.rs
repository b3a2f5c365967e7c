use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::progress::ProgressMap;
use crate::model::roadmap::Roadmap;

/// Export shape: the roadmap fields, the full progress map and a timestamp.
///
/// Serialized, it is accepted unchanged by the import validator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    #[serde(flatten)]
    pub roadmap: Roadmap,
    pub user_progress: ProgressMap,
    pub exported_at: DateTime<Utc>,
}

impl ExportDocument {
    #[must_use]
    pub fn new(roadmap: Roadmap, user_progress: ProgressMap, exported_at: DateTime<Utc>) -> Self {
        Self {
            roadmap,
            user_progress,
            exported_at,
        }
    }

    /// JSON value form, suitable for writing to a file or feeding back into import.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
