use crate::error::Result;
use crate::models::{parse_genre_tags, CatalogEntry, RatingEvent};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Read side of the external movie catalog. Returns every row; the core
/// does not filter or paginate beyond one training run.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load_catalog(&self) -> Result<Vec<CatalogEntry>>;
}

/// Read side of the external rating event log.
#[async_trait]
pub trait RatingSource: Send + Sync {
    async fn load_ratings(&self) -> Result<Vec<RatingEvent>>;
}

/// MovieLens-style `movies.csv` snapshot: `movieId,title,genres` with a
/// `|`-separated genre column.
pub struct CsvCatalogSource {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct MovieRow {
    #[serde(rename = "movieId")]
    movie_id: u32,
    title: String,
    genres: String,
}

impl CsvCatalogSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl CatalogSource for CsvCatalogSource {
    async fn load_catalog(&self) -> Result<Vec<CatalogEntry>> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut entries = Vec::new();
        for row in reader.deserialize::<MovieRow>() {
            let row = row?;
            entries.push(
                CatalogEntry::new(row.movie_id, row.title)
                    .with_tags(parse_genre_tags(&row.genres)),
            );
        }

        info!(entries = entries.len(), path = %self.path.display(), "loaded catalog snapshot");
        Ok(entries)
    }
}

/// MovieLens-style `ratings.csv` snapshot:
/// `userId,movieId,rating,timestamp` with epoch-second timestamps.
pub struct CsvRatingSource {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RatingRow {
    #[serde(rename = "userId")]
    user_id: u32,
    #[serde(rename = "movieId")]
    movie_id: u32,
    rating: f32,
    timestamp: i64,
}

impl CsvRatingSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

fn epoch_seconds(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_default()
}

#[async_trait]
impl RatingSource for CsvRatingSource {
    async fn load_ratings(&self) -> Result<Vec<RatingEvent>> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut events = Vec::new();
        for row in reader.deserialize::<RatingRow>() {
            let row = row?;
            events.push(RatingEvent {
                user_id: row.user_id,
                movie_id: row.movie_id,
                rating: row.rating,
                timestamp: epoch_seconds(row.timestamp),
            });
        }

        info!(events = events.len(), path = %self.path.display(), "loaded rating snapshot");
        Ok(events)
    }
}

/// In-memory sources for tests and fixtures.
pub struct VecCatalogSource {
    entries: Vec<CatalogEntry>,
}

impl VecCatalogSource {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl CatalogSource for VecCatalogSource {
    async fn load_catalog(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.entries.clone())
    }
}

pub struct VecRatingSource {
    events: Vec<RatingEvent>,
}

impl VecRatingSource {
    pub fn new(events: Vec<RatingEvent>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl RatingSource for VecRatingSource {
    async fn load_ratings(&self) -> Result<Vec<RatingEvent>> {
        Ok(self.events.clone())
    }
}
