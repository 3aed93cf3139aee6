pub mod algorithms;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use algorithms::{ContentModel, LatentFactorModel, SimilarityMatrix};
pub use config::Config;
pub use error::{Error, Result};
pub use models::*;
pub use services::recommender::{RecommenderService, ServiceState};
pub use services::store::ModelStore;
pub use services::training::{TrainingPipeline, TrainingReport};

pub async fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
