use std::sync::Arc;

use jobs::GenerationOrchestrator;
use sched_core::services::{EntityStore, ExportService, FileSink, Optimizer, ScheduleCatalog};
use sched_core::CoreError;
use tracing::info;
use types::{Schedule, ScheduleId, ScheduleStatistics};

use crate::cache::EntityCache;
use crate::config::ClientConfig;
use crate::export::{DirectorySink, ExportDispatcher};
use crate::http::HttpBackend;

/// Everything a front end needs, wired to one set of services.
#[derive(Clone)]
pub struct AppState {
    pub entities: Arc<EntityCache>,
    pub generation: GenerationOrchestrator,
    pub export: Arc<ExportDispatcher>,
    catalog: Arc<dyn ScheduleCatalog>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn EntityStore>,
        catalog: Arc<dyn ScheduleCatalog>,
        optimizer: Arc<dyn Optimizer>,
        exporter: Arc<dyn ExportService>,
        sink: Arc<dyn FileSink>,
    ) -> Self {
        Self {
            entities: Arc::new(EntityCache::new(store)),
            generation: GenerationOrchestrator::new(optimizer, catalog.clone()),
            export: Arc::new(ExportDispatcher::new(exporter, sink)),
            catalog,
        }
    }

    pub fn from_config(cfg: &ClientConfig) -> Result<Self, CoreError> {
        let backend = Arc::new(HttpBackend::from_config(cfg)?);
        info!(backend = %cfg.backend_url, export_dir = %cfg.export_dir.display(), "client configured");
        Ok(Self::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend,
            Arc::new(DirectorySink::new(&cfg.export_dir)),
        ))
    }

    pub fn catalog(&self) -> &Arc<dyn ScheduleCatalog> {
        &self.catalog
    }

    /// The given schedule, or the newest one when `id` is `None`.
    pub async fn schedule(&self, id: Option<&ScheduleId>) -> Result<Schedule, CoreError> {
        match id {
            Some(id) => self.catalog.get_schedule(id).await,
            None => {
                let latest = self
                    .catalog
                    .list_schedules()
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| CoreError::NotFound("no schedules have been generated".into()))?;
                self.catalog.get_schedule(&latest.id).await
            }
        }
    }

    pub async fn delete_schedule(&self, id: &ScheduleId) -> Result<(), CoreError> {
        self.catalog.delete_schedule(id).await?;
        info!(schedule = %id, "schedule deleted");
        Ok(())
    }

    pub async fn statistics(&self) -> Result<ScheduleStatistics, CoreError> {
        self.catalog.statistics().await
    }
}
