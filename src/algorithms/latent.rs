use crate::config::TrainingConfig;
use crate::error::{Error, Result};
use crate::models::{Artifact, CollaborativeArtifact, RatingEvent};
use crate::utils::clip;
use crate::utils::metrics::{self, EvaluationReport};
use chrono::Utc;
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

/// Biased matrix factorization trained with stochastic gradient descent.
///
/// A rating is modeled as
/// `global_bias + user_bias[u] + item_bias[i] + dot(user_factors[u], item_factors[i])`,
/// clipped to the rating range. Users and items are indexed over the
/// rating snapshot seen at training time; the per-user observed item sets
/// travel with the model so serving can exclude already-rated movies
/// without re-reading the rating source.
#[derive(Debug, Clone)]
pub struct LatentFactorModel {
    factors: usize,
    global_bias: f32,
    user_ids: Vec<u32>,
    item_ids: Vec<u32>,
    user_index: HashMap<u32, usize>,
    item_index: HashMap<u32, usize>,
    user_bias: Vec<f32>,
    item_bias: Vec<f32>,
    user_factors: Vec<DVector<f32>>,
    item_factors: Vec<DVector<f32>>,
    seen_items: Vec<HashSet<u32>>,
    rating_min: f32,
    rating_max: f32,
    seed: u64,
    evaluation: Option<EvaluationReport>,
}

impl LatentFactorModel {
    /// Fits the model on the rating snapshot. The snapshot is shuffled
    /// with the configured seed; a `test_fraction` slice is held out for
    /// RMSE/MAE diagnostics and never used to select the deployed model.
    pub fn train(ratings: &[RatingEvent], config: &TrainingConfig) -> Result<Self> {
        if ratings.is_empty() {
            return Err(Error::EmptyDataset);
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut shuffled: Vec<&RatingEvent> = ratings.iter().collect();
        shuffled.shuffle(&mut rng);

        let test_len = ((ratings.len() as f32 * config.test_fraction) as usize)
            .min(ratings.len().saturating_sub(1));
        let (holdout, train) = shuffled.split_at(test_len);

        // Index users and items over the full snapshot so holdout events
        // still resolve and every observed rating is excluded at serving.
        let mut model = Self::with_vocabulary(ratings, config, &mut rng);

        let train_mean: f32 =
            train.iter().map(|e| e.rating).sum::<f32>() / train.len() as f32;
        model.global_bias = train_mean;

        let lr = config.learning_rate;
        let reg = config.regularization;
        let mut order: Vec<usize> = (0..train.len()).collect();

        for epoch in 0..config.epochs {
            order.shuffle(&mut rng);
            let mut sum_sq = 0.0f64;

            for &idx in &order {
                let event = train[idx];
                let u = model.user_index[&event.user_id];
                let i = model.item_index[&event.movie_id];

                let predicted = model.global_bias
                    + model.user_bias[u]
                    + model.item_bias[i]
                    + model.user_factors[u].dot(&model.item_factors[i]);
                let err = event.rating - predicted;
                sum_sq += (err * err) as f64;

                model.user_bias[u] += lr * (err - reg * model.user_bias[u]);
                model.item_bias[i] += lr * (err - reg * model.item_bias[i]);

                let pu = model.user_factors[u].clone();
                let qi = model.item_factors[i].clone();
                model.user_factors[u] += (&qi * err - &pu * reg) * lr;
                model.item_factors[i] += (&pu * err - &qi * reg) * lr;
            }

            debug!(
                epoch,
                train_rmse = (sum_sq / train.len() as f64).sqrt(),
                "sgd epoch complete"
            );
        }

        if !holdout.is_empty() {
            let pairs: Vec<(f32, f32)> = holdout
                .iter()
                .map(|e| (model.score(e.user_id, e.movie_id), e.rating))
                .collect();
            model.evaluation = Some(metrics::evaluate(&pairs));
        }

        Ok(model)
    }

    fn with_vocabulary(
        ratings: &[RatingEvent],
        config: &TrainingConfig,
        rng: &mut StdRng,
    ) -> Self {
        let mut user_ids = Vec::new();
        let mut item_ids = Vec::new();
        let mut user_index = HashMap::new();
        let mut item_index = HashMap::new();
        let mut seen_items: Vec<HashSet<u32>> = Vec::new();

        for event in ratings {
            user_index.entry(event.user_id).or_insert_with(|| {
                user_ids.push(event.user_id);
                seen_items.push(HashSet::new());
                user_ids.len() - 1
            });
            item_index.entry(event.movie_id).or_insert_with(|| {
                item_ids.push(event.movie_id);
                item_ids.len() - 1
            });
            seen_items[user_index[&event.user_id]].insert(event.movie_id);
        }

        let k = config.factors;
        let limit = (6.0 / k as f32).sqrt();
        let mut init_vector = || {
            DVector::from_iterator(k, (0..k).map(|_| rng.gen_range(-limit..limit)))
        };
        let user_factors = (0..user_ids.len()).map(|_| init_vector()).collect();
        let item_factors = (0..item_ids.len()).map(|_| init_vector()).collect();

        Self {
            factors: k,
            global_bias: 0.0,
            user_bias: vec![0.0; user_ids.len()],
            item_bias: vec![0.0; item_ids.len()],
            user_factors,
            item_factors,
            user_ids,
            item_ids,
            user_index,
            item_index,
            seen_items,
            rating_min: config.rating_min,
            rating_max: config.rating_max,
            seed: config.seed,
            evaluation: None,
        }
    }

    fn score_indices(&self, user: Option<usize>, item: Option<usize>) -> f32 {
        let mut score = self.global_bias;
        if let Some(u) = user {
            score += self.user_bias[u];
        }
        if let Some(i) = item {
            score += self.item_bias[i];
        }
        if let (Some(u), Some(i)) = (user, item) {
            score += self.user_factors[u].dot(&self.item_factors[i]);
        }
        clip(score, self.rating_min, self.rating_max)
    }

    /// Lenient scoring: unknown users and items fall back to the bias
    /// terms that exist. Used for candidate ranking and diagnostics.
    pub fn score(&self, user_id: u32, movie_id: u32) -> f32 {
        self.score_indices(
            self.user_index.get(&user_id).copied(),
            self.item_index.get(&movie_id).copied(),
        )
    }

    /// Strict prediction for a specific pair. Items never observed at
    /// training time are a typed failure; an unseen user degrades to the
    /// global/item bias prediction rather than failing.
    pub fn predict(&self, user_id: u32, movie_id: u32) -> Result<f32> {
        let item = self
            .item_index
            .get(&movie_id)
            .copied()
            .ok_or(Error::UnknownItem(movie_id))?;
        Ok(self.score_indices(self.user_index.get(&user_id).copied(), Some(item)))
    }

    /// Ranks the catalog candidates the user has not rated. Candidates
    /// are scored independently (in parallel) and sorted by predicted
    /// rating descending with ties broken by ascending movie id.
    pub fn recommend(&self, catalog_ids: &[u32], user_id: u32, top_n: usize) -> Vec<(u32, f32)> {
        let seen = self
            .user_index
            .get(&user_id)
            .map(|&u| &self.seen_items[u]);

        let mut candidates: Vec<u32> = catalog_ids
            .iter()
            .copied()
            .filter(|id| seen.map_or(true, |s| !s.contains(id)))
            .collect();
        candidates.sort_unstable();

        let mut scored: Vec<(u32, f32)> = candidates
            .par_iter()
            .map(|&id| (id, self.score(user_id, id)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_n);
        scored
    }

    pub fn factors(&self) -> usize {
        self.factors
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn knows_user(&self, user_id: u32) -> bool {
        self.user_index.contains_key(&user_id)
    }

    /// Holdout diagnostics from training, if a test fraction was held
    /// out. Not persisted with the artifact.
    pub fn evaluation(&self) -> Option<&EvaluationReport> {
        self.evaluation.as_ref()
    }

    pub fn to_artifact(&self) -> CollaborativeArtifact {
        let flatten = |vectors: &[DVector<f32>]| -> Vec<f32> {
            vectors
                .iter()
                .flat_map(|v| v.iter().copied().collect::<Vec<f32>>())
                .collect()
        };

        let seen_items = self
            .seen_items
            .iter()
            .map(|set| {
                let mut ids: Vec<u32> = set.iter().copied().collect();
                ids.sort_unstable();
                ids
            })
            .collect();

        CollaborativeArtifact {
            schema_version: CollaborativeArtifact::SCHEMA_VERSION,
            artifact_id: Uuid::new_v4(),
            created_at: Utc::now(),
            factors: self.factors,
            global_bias: self.global_bias,
            user_ids: self.user_ids.clone(),
            item_ids: self.item_ids.clone(),
            user_bias: self.user_bias.clone(),
            item_bias: self.item_bias.clone(),
            user_factors: flatten(&self.user_factors),
            item_factors: flatten(&self.item_factors),
            seen_items,
            rating_min: self.rating_min,
            rating_max: self.rating_max,
            seed: self.seed,
        }
    }

    pub fn from_artifact(artifact: CollaborativeArtifact) -> Result<Self> {
        let k = artifact.factors;
        let unflatten = |flat: &[f32], rows: usize, what: &str| -> Result<Vec<DVector<f32>>> {
            if flat.len() != rows * k {
                return Err(Error::Decode(Box::new(bincode::ErrorKind::Custom(format!(
                    "{what} factor block has {} values, expected {}",
                    flat.len(),
                    rows * k
                )))));
            }
            Ok(flat
                .chunks_exact(k)
                .map(|chunk| DVector::from_column_slice(chunk))
                .collect())
        };

        let user_factors = unflatten(&artifact.user_factors, artifact.user_ids.len(), "user")?;
        let item_factors = unflatten(&artifact.item_factors, artifact.item_ids.len(), "item")?;

        let user_index = artifact
            .user_ids
            .iter()
            .enumerate()
            .map(|(idx, &id)| (id, idx))
            .collect();
        let item_index = artifact
            .item_ids
            .iter()
            .enumerate()
            .map(|(idx, &id)| (id, idx))
            .collect();
        let seen_items = artifact
            .seen_items
            .iter()
            .map(|ids| ids.iter().copied().collect())
            .collect();

        Ok(Self {
            factors: k,
            global_bias: artifact.global_bias,
            user_ids: artifact.user_ids,
            item_ids: artifact.item_ids,
            user_index,
            item_index,
            user_bias: artifact.user_bias,
            item_bias: artifact.item_bias,
            user_factors,
            item_factors,
            seen_items,
            rating_min: artifact.rating_min,
            rating_max: artifact.rating_max,
            seed: artifact.seed,
            evaluation: None,
        })
    }
}
