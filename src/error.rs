use thiserror::Error;

/// Errors surfaced by the recommendation core.
///
/// Every variant is recoverable from the caller's perspective: serving code
/// maps each one to a distinct user-facing condition instead of crashing.
#[derive(Error, Debug)]
pub enum Error {
    #[error("title not found: {0}")]
    NotFound(String),

    #[error("title matches more than one catalog entry: {0}")]
    AmbiguousMatch(String),

    #[error("catalog contains no entries")]
    EmptyCatalog,

    #[error("rating source contains no events")]
    EmptyDataset,

    #[error("every catalog entry has an empty genre document; nothing to vectorize")]
    DegenerateCorpus,

    #[error("item {0} was not seen at training time")]
    UnknownItem(u32),

    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("artifact {key} has schema version {found}, expected {expected}")]
    ArtifactSchema {
        key: String,
        found: u32,
        expected: u32,
    },

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("artifact encode error: {0}")]
    Encode(bincode::Error),

    #[error("artifact decode error: {0}")]
    Decode(bincode::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
