use crate::algorithms::{ContentModel, LatentFactorModel};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::services::source::{CatalogSource, RatingSource};
use crate::services::store::ModelStore;
use crate::utils::metrics::EvaluationReport;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Summary of one completed training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub catalog_entries: usize,
    pub rating_events: usize,
    pub content_artifact_id: Uuid,
    pub collaborative_artifact_id: Uuid,
    pub seed: u64,
    pub holdout: Option<EvaluationReport>,
}

/// Offline batch pipeline: reads both sources, trains both engines, and
/// persists the artifacts. Runs to completion; serving processes pick up
/// the new generation at their next load or reload. Snapshots are
/// dropped when the run finishes.
pub struct TrainingPipeline {
    catalog_source: Arc<dyn CatalogSource>,
    rating_source: Arc<dyn RatingSource>,
    store: Arc<ModelStore>,
    config: Arc<Config>,
}

impl TrainingPipeline {
    pub fn new(
        catalog_source: Arc<dyn CatalogSource>,
        rating_source: Arc<dyn RatingSource>,
        store: Arc<ModelStore>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            catalog_source,
            rating_source,
            store,
            config,
        }
    }

    /// Trains and persists one model generation. Precondition failures
    /// (empty catalog, empty rating log, degenerate genre corpus) abort
    /// before anything is written, so a broken run never clobbers the
    /// previous generation's artifacts.
    pub async fn run(&self) -> Result<TrainingReport> {
        let catalog = self.catalog_source.load_catalog().await?;
        let ratings = self.rating_source.load_ratings().await?;

        if catalog.is_empty() {
            return Err(Error::EmptyCatalog);
        }
        if ratings.is_empty() {
            return Err(Error::EmptyDataset);
        }

        info!(
            catalog = catalog.len(),
            ratings = ratings.len(),
            "starting training run"
        );

        let content = ContentModel::build(&catalog)?;
        let collaborative = LatentFactorModel::train(&ratings, &self.config.training)?;

        if let Some(report) = collaborative.evaluation() {
            info!(
                rmse = report.rmse,
                mae = report.mae,
                samples = report.sample_count,
                "holdout diagnostics"
            );
        }

        let content_artifact = content.to_artifact();
        let collaborative_artifact = collaborative.to_artifact();
        self.store
            .save(&content_artifact, &self.config.store.content_key)?;
        self.store
            .save(&collaborative_artifact, &self.config.store.collaborative_key)?;

        info!(
            content = %content_artifact.artifact_id,
            collaborative = %collaborative_artifact.artifact_id,
            "training run complete"
        );

        Ok(TrainingReport {
            catalog_entries: catalog.len(),
            rating_events: ratings.len(),
            content_artifact_id: content_artifact.artifact_id,
            collaborative_artifact_id: collaborative_artifact.artifact_id,
            seed: collaborative.seed(),
            holdout: collaborative.evaluation().cloned(),
        })
    }
}
