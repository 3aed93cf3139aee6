use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub training: TrainingConfig,
    pub store: StoreConfig,
}

/// Location of the catalog/rating CSV snapshots consumed at training time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub data_dir: PathBuf,
    pub movies_file: String,
    pub ratings_file: String,
}

impl DataConfig {
    pub fn movies_path(&self) -> PathBuf {
        self.data_dir.join(&self.movies_file)
    }

    pub fn ratings_path(&self) -> PathBuf {
        self.data_dir.join(&self.ratings_file)
    }
}

/// Hyperparameters for the latent factor engine. The holdout fraction is
/// evaluation-only; the deployed model is always the one fitted on the
/// training split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub factors: usize,
    pub learning_rate: f32,
    pub regularization: f32,
    pub epochs: usize,
    pub test_fraction: f32,
    pub rating_min: f32,
    pub rating_max: f32,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub model_dir: PathBuf,
    pub content_key: String,
    pub collaborative_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                data_dir: PathBuf::from("data"),
                movies_file: "movies.csv".to_string(),
                ratings_file: "ratings.csv".to_string(),
            },
            training: TrainingConfig {
                factors: 100,
                learning_rate: 0.005,
                regularization: 0.02,
                epochs: 20,
                test_fraction: 0.25,
                rating_min: 1.0,
                rating_max: 5.0,
                seed: 42,
            },
            store: StoreConfig {
                model_dir: PathBuf::from("models"),
                content_key: "content_model.bin".to_string(),
                collaborative_key: "collaborative_model.bin".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("CINEREC"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
