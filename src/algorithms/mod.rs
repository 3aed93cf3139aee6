pub mod content;
pub mod latent;

pub use content::{ContentModel, SimilarityMatrix};
pub use latent::LatentFactorModel;
