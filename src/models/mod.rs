use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// MovieLens-style placeholder for entries without genre annotations.
const NO_GENRES: &str = "(no genres listed)";

/// One row of the movie catalog. Immutable once captured in a training
/// snapshot; the canonical copy lives in the catalog source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub movie_id: u32,
    pub title: String,
    pub genre_tags: Vec<String>,
}

impl CatalogEntry {
    pub fn new(movie_id: u32, title: impl Into<String>) -> Self {
        Self {
            movie_id,
            title: title.into(),
            genre_tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.genre_tags = tags;
        self
    }

    /// Joins the tags into the whitespace-delimited document the
    /// vectorizer consumes. Empty for untagged entries.
    pub fn genre_document(&self) -> String {
        self.genre_tags.join(" ")
    }
}

/// One observed rating. Duplicate `(user, movie)` pairs are the rating
/// source's concern; the core takes events as given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingEvent {
    pub user_id: u32,
    pub movie_id: u32,
    pub rating: f32,
    pub timestamp: DateTime<Utc>,
}

impl RatingEvent {
    pub fn new(user_id: u32, movie_id: u32, rating: f32) -> Self {
        Self {
            user_id,
            movie_id,
            rating,
            timestamp: Utc::now(),
        }
    }
}

/// A ranked recommendation. `score` is a cosine similarity in [0, 1] for
/// content-based results and a predicted rating for collaborative ones;
/// the two scales are not comparable without explicit normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub movie_id: u32,
    pub title: String,
    pub score: f32,
}

/// Splits a raw `|`-separated genre string into tags. The MovieLens
/// placeholder for untagged movies maps to an empty list.
pub fn parse_genre_tags(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == NO_GENRES {
        return Vec::new();
    }
    raw.split('|')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Persisted model artifacts carry an explicit schema version; the store
/// rejects a mismatch on load instead of deserializing blind.
pub trait Artifact: Serialize + for<'de> Deserialize<'de> {
    const KIND: &'static str;
    const SCHEMA_VERSION: u32;

    fn schema_version(&self) -> u32;
}

/// Content model artifact: the similarity matrix plus the catalog
/// snapshot it was built from, flattened to explicit fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentArtifact {
    pub schema_version: u32,
    pub artifact_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub movie_ids: Vec<u32>,
    pub titles: Vec<String>,
    /// Row-major `dimension x dimension` similarity values.
    pub similarity: Vec<f32>,
    pub dimension: usize,
}

impl Artifact for ContentArtifact {
    const KIND: &'static str = "content";
    const SCHEMA_VERSION: u32 = 1;

    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

/// Collaborative model artifact: every parameter of the latent factor
/// model, plus the per-user observed item sets serving needs to exclude
/// already-rated movies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborativeArtifact {
    pub schema_version: u32,
    pub artifact_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub factors: usize,
    pub global_bias: f32,
    pub user_ids: Vec<u32>,
    pub item_ids: Vec<u32>,
    pub user_bias: Vec<f32>,
    pub item_bias: Vec<f32>,
    /// Row-major `users x factors` latent values, aligned with `user_ids`.
    pub user_factors: Vec<f32>,
    /// Row-major `items x factors` latent values, aligned with `item_ids`.
    pub item_factors: Vec<f32>,
    /// Observed item ids per user, aligned with `user_ids`.
    pub seen_items: Vec<Vec<u32>>,
    pub rating_min: f32,
    pub rating_max: f32,
    pub seed: u64,
}

impl Artifact for CollaborativeArtifact {
    const KIND: &'static str = "collaborative";
    const SCHEMA_VERSION: u32 = 1;

    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_genre_tags() {
        assert_eq!(
            parse_genre_tags("Animation|Comedy"),
            vec!["Animation".to_string(), "Comedy".to_string()]
        );
        assert!(parse_genre_tags("(no genres listed)").is_empty());
        assert!(parse_genre_tags("   ").is_empty());
    }

    #[test]
    fn test_genre_document() {
        let entry = CatalogEntry::new(1, "Toy Story")
            .with_tags(vec!["Animation".to_string(), "Comedy".to_string()]);
        assert_eq!(entry.genre_document(), "Animation Comedy");

        let bare = CatalogEntry::new(2, "Untitled");
        assert_eq!(bare.genre_document(), "");
    }
}
