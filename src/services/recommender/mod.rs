use crate::algorithms::{ContentModel, LatentFactorModel};
use crate::config::Config;
use crate::error::Result;
use crate::models::{CollaborativeArtifact, ContentArtifact, Recommendation};
use crate::services::store::ModelStore;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Lifecycle of the serving process. Training never happens here; it is
/// a separate offline pipeline whose artifacts are consumed at the next
/// load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Uninitialized,
    Serving,
}

/// Immutable, process-resident view of one trained model generation.
/// Concurrent requests share it read-only; a reload swaps the `Arc`
/// while in-flight requests keep the snapshot they started with.
pub struct ServingSnapshot {
    content: ContentModel,
    collaborative: LatentFactorModel,
    titles: HashMap<u32, String>,
    catalog_ids: Vec<u32>,
}

impl ServingSnapshot {
    fn new(content: ContentModel, collaborative: LatentFactorModel) -> Self {
        let titles: HashMap<u32, String> = content
            .entries()
            .map(|(id, title)| (id, title.to_string()))
            .collect();
        let catalog_ids: Vec<u32> = content.entries().map(|(id, _)| id).collect();
        Self {
            content,
            collaborative,
            titles,
            catalog_ids,
        }
    }
}

/// Serving entry point over the trained artifacts. The store is injected
/// at construction; there is no process-global model state, so tests can
/// substitute fixture stores.
pub struct RecommenderService {
    store: Arc<ModelStore>,
    config: Arc<Config>,
    snapshot: RwLock<Option<Arc<ServingSnapshot>>>,
    stats: DashMap<String, u64>,
}

impl RecommenderService {
    pub fn new(store: Arc<ModelStore>, config: Arc<Config>) -> Self {
        Self {
            store,
            config,
            snapshot: RwLock::new(None),
            stats: DashMap::new(),
        }
    }

    /// Reads both artifacts from the store and transitions to `Serving`.
    /// On failure the previous state is kept: an uninitialized service
    /// stays uninitialized, and a serving one keeps its old snapshot.
    pub async fn load(&self) -> Result<()> {
        self.load_snapshot().await.map(|_| ())
    }

    async fn load_snapshot(&self) -> Result<Arc<ServingSnapshot>> {
        let content: ContentArtifact = self.store.load(&self.config.store.content_key)?;
        let collaborative: CollaborativeArtifact =
            self.store.load(&self.config.store.collaborative_key)?;

        let next = Arc::new(ServingSnapshot::new(
            ContentModel::from_artifact(content)?,
            LatentFactorModel::from_artifact(collaborative)?,
        ));

        let mut guard = self.snapshot.write().await;
        *guard = Some(next.clone());
        info!("serving snapshot loaded");
        Ok(next)
    }

    /// Picks up a newer trained generation. Atomic from the caller's
    /// perspective: requests already running keep their snapshot, new
    /// requests see the new one once the swap completes.
    pub async fn reload(&self) -> Result<()> {
        self.load().await
    }

    pub async fn state(&self) -> ServiceState {
        if self.snapshot.read().await.is_some() {
            ServiceState::Serving
        } else {
            ServiceState::Uninitialized
        }
    }

    /// An uninitialized service retries the store on every call, so the
    /// caller sees the genuine underlying condition ("never trained" vs
    /// schema mismatch) and the first call after a successful retraining
    /// cycle starts serving without an explicit load.
    async fn current(&self) -> Result<Arc<ServingSnapshot>> {
        if let Some(snapshot) = self.snapshot.read().await.as_ref() {
            return Ok(snapshot.clone());
        }
        self.load_snapshot().await
    }

    /// Content-based: catalog entries most similar to `title` by genre
    /// TF-IDF cosine. Scores are similarities in [0, 1].
    pub async fn recommend_by_title(
        &self,
        title: &str,
        top_n: usize,
    ) -> Result<Vec<Recommendation>> {
        self.increment("content_requests");
        let snapshot = self.current().await?;
        let result = snapshot.content.top_similar(title, top_n);
        if result.is_err() {
            self.increment("failed_requests");
        }
        result
    }

    /// Collaborative: unrated catalog entries ranked by predicted rating
    /// for `user_id`. Scores live in the rating domain and are not
    /// comparable to content similarities without explicit normalization;
    /// merging the two lists is the caller's decision.
    pub async fn recommend_for_user(
        &self,
        user_id: u32,
        top_n: usize,
    ) -> Result<Vec<Recommendation>> {
        self.increment("user_requests");
        let snapshot = self.current().await?;

        let ranked = snapshot
            .collaborative
            .recommend(&snapshot.catalog_ids, user_id, top_n);

        Ok(ranked
            .into_iter()
            .map(|(movie_id, score)| Recommendation {
                movie_id,
                title: snapshot.titles.get(&movie_id).cloned().unwrap_or_default(),
                score,
            })
            .collect())
    }

    /// Predicted rating for one `(user, movie)` pair.
    pub async fn predict_rating(&self, user_id: u32, movie_id: u32) -> Result<f32> {
        let snapshot = self.current().await?;
        snapshot.collaborative.predict(user_id, movie_id)
    }

    pub fn stats(&self) -> HashMap<String, u64> {
        self.stats
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    fn increment(&self, key: &str) {
        *self.stats.entry(key.to_string()).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::error::Error;
    use crate::models::{CatalogEntry, RatingEvent};

    fn sample_catalog() -> Vec<CatalogEntry> {
        vec![
            CatalogEntry::new(1, "Toy Story")
                .with_tags(vec!["Animation".to_string(), "Comedy".to_string()]),
            CatalogEntry::new(2, "Jumanji")
                .with_tags(vec!["Action".to_string(), "Adventure".to_string()]),
            CatalogEntry::new(3, "Grumpier Old Men")
                .with_tags(vec!["Comedy".to_string(), "Romance".to_string()]),
        ]
    }

    fn sample_ratings() -> Vec<RatingEvent> {
        vec![
            RatingEvent::new(1, 1, 5.0),
            RatingEvent::new(1, 2, 2.0),
            RatingEvent::new(2, 1, 4.5),
            RatingEvent::new(2, 3, 4.0),
        ]
    }

    fn train_config() -> TrainingConfig {
        TrainingConfig {
            factors: 8,
            learning_rate: 0.01,
            regularization: 0.02,
            epochs: 10,
            test_fraction: 0.0,
            rating_min: 1.0,
            rating_max: 5.0,
            seed: 7,
        }
    }

    fn write_artifacts(store: &ModelStore, config: &Config) {
        let content = ContentModel::build(&sample_catalog()).unwrap();
        let collaborative =
            LatentFactorModel::train(&sample_ratings(), &train_config()).unwrap();
        store
            .save(&content.to_artifact(), &config.store.content_key)
            .unwrap();
        store
            .save(&collaborative.to_artifact(), &config.store.collaborative_key)
            .unwrap();
    }

    #[tokio::test]
    async fn test_serving_before_training_fails_typed() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(Config::default());
        let service =
            RecommenderService::new(Arc::new(ModelStore::new(dir.path())), config);

        assert_eq!(service.state().await, ServiceState::Uninitialized);
        assert!(matches!(
            service.recommend_by_title("Toy Story", 5).await,
            Err(Error::ArtifactNotFound(_))
        ));
        assert!(matches!(
            service.recommend_for_user(1, 5).await,
            Err(Error::ArtifactNotFound(_))
        ));
        assert_eq!(service.state().await, ServiceState::Uninitialized);
    }

    #[tokio::test]
    async fn test_serving_after_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(Config::default());
        let store = Arc::new(ModelStore::new(dir.path()));
        write_artifacts(&store, &config);

        let service = RecommenderService::new(store, config);
        service.load().await.unwrap();
        assert_eq!(service.state().await, ServiceState::Serving);

        let by_title = service.recommend_by_title("Toy Story", 2).await.unwrap();
        assert_eq!(by_title.len(), 2);
        assert!(by_title.iter().all(|r| r.movie_id != 1));

        let for_user = service.recommend_for_user(1, 5).await.unwrap();
        // User 1 rated movies 1 and 2; only 3 is a candidate.
        assert_eq!(for_user.len(), 1);
        assert_eq!(for_user[0].movie_id, 3);
        assert_eq!(for_user[0].title, "Grumpier Old Men");
    }

    #[tokio::test]
    async fn test_first_call_after_training_starts_serving() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(Config::default());
        let store = Arc::new(ModelStore::new(dir.path()));
        let service = RecommenderService::new(store.clone(), config.clone());

        assert!(service.recommend_for_user(1, 5).await.is_err());

        write_artifacts(&store, &config);
        assert!(service.recommend_for_user(1, 5).await.is_ok());
        assert_eq!(service.state().await, ServiceState::Serving);
    }

    #[tokio::test]
    async fn test_reload_swaps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(Config::default());
        let store = Arc::new(ModelStore::new(dir.path()));
        write_artifacts(&store, &config);

        let service = RecommenderService::new(store.clone(), config.clone());
        service.load().await.unwrap();

        // New generation with an extra catalog entry.
        let mut catalog = sample_catalog();
        catalog.push(CatalogEntry::new(4, "Heat").with_tags(vec!["Action".to_string()]));
        let content = ContentModel::build(&catalog).unwrap();
        store
            .save(&content.to_artifact(), &config.store.content_key)
            .unwrap();

        service.reload().await.unwrap();
        let recs = service.recommend_by_title("Jumanji", 3).await.unwrap();
        assert!(recs.iter().any(|r| r.movie_id == 4));
    }

    #[tokio::test]
    async fn test_predict_rating_unknown_item() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(Config::default());
        let store = Arc::new(ModelStore::new(dir.path()));
        write_artifacts(&store, &config);

        let service = RecommenderService::new(store, config);
        assert!(matches!(
            service.predict_rating(1, 999).await,
            Err(Error::UnknownItem(999))
        ));
    }
}
