use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use roadmap_core::import::{self, ImportedRoadmap};
use roadmap_core::model::{
    ExportDocument, ItemId, ProgressEntry, ProgressMap, Roadmap, Status, Technology, merge_all,
};
use roadmap_core::stats::{self, ProgressStats, TechnologyQuery};
use storage::repository::{JsonStore, KeyValueStore, StorageError};

use crate::Clock;
use crate::error::ProgressServiceError;

pub const DEFAULT_NAMESPACE: &str = "default";

/// Storage keys for the two aggregates within one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    roadmap: String,
    progress: String,
}

impl StorageKeys {
    #[must_use]
    pub fn namespaced(namespace: &str) -> Self {
        Self {
            roadmap: format!("{namespace}/roadmap"),
            progress: format!("{namespace}/userProgress"),
        }
    }

    #[must_use]
    pub fn roadmap(&self) -> &str {
        &self.roadmap
    }

    #[must_use]
    pub fn progress(&self) -> &str {
        &self.progress
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::namespaced(DEFAULT_NAMESPACE)
    }
}

/// Dashboard header: roadmap identity plus aggregate progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapOverview {
    pub title: String,
    pub description: String,
    pub stats: ProgressStats,
    pub percent: u8,
}

/// Owns the roadmap and progress aggregates.
///
/// Every operation reads the current aggregates from storage, so derived views
/// are always recomputed from what is persisted. Mutations are written through
/// before the call returns.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    store: JsonStore,
    keys: StorageKeys,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, kv: Arc<dyn KeyValueStore>, keys: StorageKeys) -> Self {
        Self {
            clock,
            store: JsonStore::new(kv),
            keys,
        }
    }

    //
    // ─── AGGREGATES ────────────────────────────────────────────────────────────
    //

    async fn load_roadmap(&self) -> Result<Option<Roadmap>, StorageError> {
        self.store.read(self.keys.roadmap()).await
    }

    async fn load_progress(&self) -> Result<ProgressMap, StorageError> {
        Ok(self
            .store
            .read(self.keys.progress())
            .await?
            .unwrap_or_default())
    }

    async fn save_progress(&self, progress: &ProgressMap) -> Result<(), StorageError> {
        self.store.write(self.keys.progress(), progress).await
    }

    /// The currently loaded roadmap, if any.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the backend fails.
    pub async fn roadmap(&self) -> Result<Option<Roadmap>, ProgressServiceError> {
        Ok(self.load_roadmap().await?)
    }

    //
    // ─── IMPORT / EXPORT ───────────────────────────────────────────────────────
    //

    /// Validate `doc` and replace both roadmap and progress with its contents.
    ///
    /// Without `userProgress` the progress map is reset to empty. On any
    /// validation failure nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Import` naming the first violated rule,
    /// or `ProgressServiceError::Storage` if persistence fails.
    pub async fn import_roadmap(&self, doc: &Value) -> Result<Roadmap, ProgressServiceError> {
        let ImportedRoadmap { roadmap, progress } = import::validate_document(doc)?;
        let supplied_progress = progress.is_some();
        let progress = progress.unwrap_or_default();

        self.store
            .write_pair(
                (self.keys.roadmap(), &roadmap),
                (self.keys.progress(), &progress),
            )
            .await?;

        info!(
            title = %roadmap.title,
            items = roadmap.items.len(),
            progress_entries = progress.len(),
            supplied_progress,
            "roadmap imported"
        );
        Ok(roadmap)
    }

    /// Parse raw document text, then import it.
    ///
    /// # Errors
    ///
    /// Returns `ImportError::ParseFailure` (wrapped) for invalid JSON, otherwise
    /// the same errors as [`Self::import_roadmap`].
    pub async fn import_text(&self, text: &str) -> Result<Roadmap, ProgressServiceError> {
        let doc = import::parse_document(text)?;
        self.import_roadmap(&doc).await
    }

    /// Current roadmap with its full progress map and an export timestamp.
    ///
    /// Returns `Ok(None)` when no roadmap is loaded.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the backend fails.
    pub async fn export_roadmap(&self) -> Result<Option<ExportDocument>, ProgressServiceError> {
        let Some(roadmap) = self.load_roadmap().await? else {
            return Ok(None);
        };
        let progress = self.load_progress().await?;
        Ok(Some(ExportDocument::new(roadmap, progress, self.clock.now())))
    }

    /// Remove both roadmap and progress.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the backend fails.
    pub async fn clear_roadmap(&self) -> Result<(), ProgressServiceError> {
        self.store
            .remove_all(&[self.keys.roadmap(), self.keys.progress()])
            .await?;
        info!("roadmap cleared");
        Ok(())
    }

    //
    // ─── QUERIES ───────────────────────────────────────────────────────────────
    //

    /// All items merged with progress, in roadmap order. Empty without a roadmap.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the backend fails.
    pub async fn list_technologies(&self) -> Result<Vec<Technology>, ProgressServiceError> {
        let Some(roadmap) = self.load_roadmap().await? else {
            return Ok(Vec::new());
        };
        let progress = self.load_progress().await?;
        Ok(merge_all(&roadmap, &progress))
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the backend fails.
    pub async fn get_technology_by_id(
        &self,
        id: &str,
    ) -> Result<Option<Technology>, ProgressServiceError> {
        let Some(roadmap) = self.load_roadmap().await? else {
            return Ok(None);
        };
        let Some(item) = roadmap.item(id) else {
            return Ok(None);
        };
        let progress = self.load_progress().await?;
        Ok(Some(Technology::merge(item, progress.get(id))))
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the backend fails.
    pub async fn search_technologies(
        &self,
        query: Option<&str>,
    ) -> Result<Vec<Technology>, ProgressServiceError> {
        let technologies = self.list_technologies().await?;
        Ok(stats::search(&technologies, query))
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the backend fails.
    pub async fn filter_by_status(
        &self,
        status: Status,
    ) -> Result<Vec<Technology>, ProgressServiceError> {
        let technologies = self.list_technologies().await?;
        Ok(stats::filter_by_status(&technologies, status))
    }

    /// Status filter and search combined, as the list view applies them.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the backend fails.
    pub async fn query(
        &self,
        query: &TechnologyQuery,
    ) -> Result<Vec<Technology>, ProgressServiceError> {
        let technologies = self.list_technologies().await?;
        Ok(query.apply(&technologies, self.clock.now()))
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the backend fails.
    pub async fn stats(&self) -> Result<ProgressStats, ProgressServiceError> {
        let technologies = self.list_technologies().await?;
        Ok(ProgressStats::from_technologies(&technologies))
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the backend fails.
    pub async fn progress_percent(&self) -> Result<u8, ProgressServiceError> {
        Ok(self.stats().await?.percent())
    }

    /// Title, description and aggregate progress, or `None` without a roadmap.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the backend fails.
    pub async fn overview(&self) -> Result<Option<RoadmapOverview>, ProgressServiceError> {
        let Some(roadmap) = self.load_roadmap().await? else {
            return Ok(None);
        };
        let progress = self.load_progress().await?;
        let stats = ProgressStats::from_technologies(&merge_all(&roadmap, &progress));
        Ok(Some(RoadmapOverview {
            title: roadmap.title,
            description: roadmap.description,
            percent: stats.percent(),
            stats,
        }))
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the backend fails.
    pub async fn overdue(&self) -> Result<Vec<Technology>, ProgressServiceError> {
        let technologies = self.list_technologies().await?;
        Ok(stats::overdue(&technologies, self.clock.now()))
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the backend fails.
    pub async fn upcoming_deadlines(
        &self,
        limit: usize,
    ) -> Result<Vec<Technology>, ProgressServiceError> {
        let technologies = self.list_technologies().await?;
        Ok(stats::upcoming_deadlines(&technologies, limit))
    }

    /// Pick one unfinished item at random.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Stats` (`NoRemainingItems`) when nothing
    /// is left, or `ProgressServiceError::Storage` if the backend fails.
    pub async fn random_unfinished(&self) -> Result<Technology, ProgressServiceError> {
        let technologies = self.list_technologies().await?;
        Ok(stats::random_unfinished(&technologies, &mut rand::rng())?)
    }

    //
    // ─── MUTATIONS ─────────────────────────────────────────────────────────────
    //

    /// Apply `change` to the entry of a current roadmap item and persist.
    async fn update_entry(
        &self,
        id: &str,
        change: impl FnOnce(&mut ProgressEntry),
    ) -> Result<Technology, ProgressServiceError> {
        let roadmap = self.load_roadmap().await?;
        let item = roadmap
            .as_ref()
            .and_then(|roadmap| roadmap.item(id))
            .ok_or_else(|| ProgressServiceError::UnknownItem(ItemId::new(id)))?;

        let mut progress = self.load_progress().await?;
        change(progress.entry_mut(&item.id));
        self.save_progress(&progress).await?;

        Ok(Technology::merge(item, progress.get(id)))
    }

    /// Set the status of one item. Any transition is accepted.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::UnknownItem` if `id` is not in the
    /// current roadmap, or `ProgressServiceError::Storage`.
    pub async fn update_status(
        &self,
        id: &str,
        status: Status,
    ) -> Result<Technology, ProgressServiceError> {
        let tech = self.update_entry(id, |entry| entry.status = status).await?;
        debug!(id, %status, "status updated");
        Ok(tech)
    }

    /// Move one item to the next status in the cycle.
    ///
    /// # Errors
    ///
    /// Same as [`Self::update_status`].
    pub async fn advance_status(&self, id: &str) -> Result<Technology, ProgressServiceError> {
        let tech = self
            .update_entry(id, |entry| entry.status = entry.status.next())
            .await?;
        debug!(id, status = %tech.status, "status advanced");
        Ok(tech)
    }

    /// # Errors
    ///
    /// Same as [`Self::update_status`].
    pub async fn update_notes(
        &self,
        id: &str,
        notes: impl Into<String>,
    ) -> Result<Technology, ProgressServiceError> {
        let notes = notes.into();
        let tech = self.update_entry(id, |entry| entry.notes = notes).await?;
        debug!(id, "notes updated");
        Ok(tech)
    }

    /// Set or clear (`None`) the deadline of one item.
    ///
    /// # Errors
    ///
    /// Same as [`Self::update_status`].
    pub async fn update_deadline(
        &self,
        id: &str,
        deadline: Option<NaiveDate>,
    ) -> Result<Technology, ProgressServiceError> {
        let tech = self
            .update_entry(id, |entry| entry.deadline = deadline)
            .await?;
        debug!(id, ?deadline, "deadline updated");
        Ok(tech)
    }

    /// Drop every progress entry.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the backend fails.
    pub async fn reset_all_progress(&self) -> Result<(), ProgressServiceError> {
        self.save_progress(&ProgressMap::new()).await?;
        info!("progress reset");
        Ok(())
    }

    /// Mark every current item completed, keeping notes and deadlines.
    ///
    /// A no-op when there is no roadmap or it has no items.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the backend fails.
    pub async fn mark_all_completed(&self) -> Result<(), ProgressServiceError> {
        let Some(roadmap) = self.load_roadmap().await? else {
            return Ok(());
        };
        if roadmap.items.is_empty() {
            return Ok(());
        }

        let mut progress = self.load_progress().await?;
        for id in roadmap.item_ids() {
            progress.entry_mut(id).status = Status::Completed;
        }
        self.save_progress(&progress).await?;

        info!(items = roadmap.items.len(), "all items marked completed");
        Ok(())
    }
}
