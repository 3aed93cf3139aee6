use crate::error::{Error, Result};
use crate::models::Artifact;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Durable storage for trained model artifacts, keyed by string
/// identifiers (filenames under the model directory). Artifacts are
/// bincode-encoded with an explicit schema version that is checked on
/// load, so a stale or foreign file is a typed error instead of a
/// silent mis-deserialization.
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Writes through a temp file and renames, so readers never observe
    /// a half-written artifact.
    pub fn save<A: Artifact>(&self, artifact: &A, key: &str) -> Result<()> {
        fs::create_dir_all(&self.root)?;

        let bytes = bincode::serialize(artifact).map_err(Error::Encode)?;
        let path = self.path_for(key);
        let tmp = self.path_for(&format!("{key}.tmp"));
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;

        info!(kind = A::KIND, key, bytes = bytes.len(), "saved artifact");
        Ok(())
    }

    pub fn load<A: Artifact>(&self, key: &str) -> Result<A> {
        let path = self.path_for(key);
        let bytes = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ArtifactNotFound(key.to_string())
            } else {
                Error::Io(e)
            }
        })?;

        let artifact: A = bincode::deserialize(&bytes).map_err(Error::Decode)?;
        if artifact.schema_version() != A::SCHEMA_VERSION {
            return Err(Error::ArtifactSchema {
                key: key.to_string(),
                found: artifact.schema_version(),
                expected: A::SCHEMA_VERSION,
            });
        }

        info!(kind = A::KIND, key, "loaded artifact");
        Ok(artifact)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::ContentModel;
    use crate::models::{CatalogEntry, ContentArtifact};

    fn sample_artifact() -> ContentArtifact {
        let catalog = vec![
            CatalogEntry::new(1, "Toy Story")
                .with_tags(vec!["Animation".to_string(), "Comedy".to_string()]),
            CatalogEntry::new(2, "Jumanji")
                .with_tags(vec!["Action".to_string(), "Adventure".to_string()]),
        ];
        ContentModel::build(&catalog).unwrap().to_artifact()
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());

        let artifact = sample_artifact();
        store.save(&artifact, "content_model.bin").unwrap();

        let loaded: ContentArtifact = store.load("content_model.bin").unwrap();
        assert_eq!(loaded.artifact_id, artifact.artifact_id);
        assert_eq!(loaded.movie_ids, artifact.movie_ids);
        assert_eq!(loaded.similarity, artifact.similarity);
    }

    #[test]
    fn test_missing_key_is_artifact_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());

        let result: Result<ContentArtifact> = store.load("never_trained.bin");
        assert!(matches!(result, Err(Error::ArtifactNotFound(_))));
    }

    #[test]
    fn test_schema_mismatch_is_typed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());

        let mut artifact = sample_artifact();
        artifact.schema_version = 99;
        store.save(&artifact, "content_model.bin").unwrap();

        let result: Result<ContentArtifact> = store.load("content_model.bin");
        assert!(matches!(
            result,
            Err(Error::ArtifactSchema {
                found: 99,
                expected: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        assert!(!store.exists("content_model.bin"));

        store.save(&sample_artifact(), "content_model.bin").unwrap();
        assert!(store.exists("content_model.bin"));
    }
}
