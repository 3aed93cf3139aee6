use anyhow::Result;
use cinerec::services::source::{CsvCatalogSource, CsvRatingSource};
use cinerec::{init_tracing, Config, ModelStore, TrainingPipeline};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Overrides the configured directory holding movies.csv/ratings.csv.
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Overrides the configured artifact directory.
    #[arg(short, long)]
    model_dir: Option<String>,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing().await;

    info!("Starting cinerec trainer");

    let mut config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };
    if let Some(data_dir) = args.data_dir {
        config.data.data_dir = data_dir.into();
    }
    if let Some(model_dir) = args.model_dir {
        config.store.model_dir = model_dir.into();
    }

    info!("Trainer configuration loaded: {:?}", config.training);

    let config = Arc::new(config);
    let pipeline = TrainingPipeline::new(
        Arc::new(CsvCatalogSource::new(config.data.movies_path())),
        Arc::new(CsvRatingSource::new(config.data.ratings_path())),
        Arc::new(ModelStore::new(&config.store.model_dir)),
        config.clone(),
    );

    let report = pipeline.run().await?;

    info!(
        catalog = report.catalog_entries,
        ratings = report.rating_events,
        seed = report.seed,
        "training finished"
    );
    if let Some(holdout) = &report.holdout {
        info!(
            rmse = holdout.rmse,
            mae = holdout.mae,
            samples = holdout.sample_count,
            "holdout accuracy"
        );
    }

    Ok(())
}
